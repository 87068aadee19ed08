//! `makeRedeemTransaction` (§4.3.3): the PSET a user broadcasts to unilaterally exit their vUTXO.

use crate::vtxo::ExtendedVirtualUtxo;
use crate::Error;
use ark_script::taproot::Leaf;
use elements::confidential;
use elements::TxIn;
use elements::TxOut;

/// The unfinalized redeem transaction plus everything needed to complete its witness once the
/// owner has signed.
#[derive(Debug, Clone)]
pub struct RedeemTransaction {
    pub unsigned_tx: elements::Transaction,
    /// The output index the `FrozenReceiver` covenant forces input 0 to pay — always `0`.
    pub redeem_output_index: u32,
}

/// The `FrozenReceiver` covenant forces output 0 to be the redeem tree's P2TR, carrying the
/// vUTXO's full value and asset. This builder does not add a fee input; the caller (the wallet)
/// is expected to append one and a corresponding fee output before signing, since the covenant
/// only constrains output 0 and leaves later outputs free.
pub fn make_redeem_transaction(
    extended: &ExtendedVirtualUtxo,
) -> Result<RedeemTransaction, Error> {
    let vtxo = &extended.vtxo;

    let tx_in = TxIn {
        previous_output: vtxo.outpoint(),
        ..Default::default()
    };

    let redeem_output = TxOut {
        asset: confidential::Asset::Explicit(vtxo.witness_utxo.asset),
        value: confidential::Value::Explicit(vtxo.witness_utxo.value),
        nonce: confidential::Nonce::Null,
        script_pubkey: elements::Script::from(
            extended.redeem_tree.script_pubkey.to_bytes(),
        ),
        witness: Default::default(),
    };

    let unsigned_tx = elements::Transaction {
        version: 2,
        lock_time: elements::LockTime::ZERO,
        input: vec![tx_in],
        output: vec![redeem_output],
    };

    Ok(RedeemTransaction {
        unsigned_tx,
        redeem_output_index: 0,
    })
}

/// The `FrozenReceiver` witness finalizer for the redeem spend: index `0` (the covenant's forced
/// output), the owner's signature, then `<script> <controlBlock>` (appended by the caller).
pub fn redeem_finalizer(
    redeem_leaf: &Leaf,
    owner_sig: bitcoin::taproot::Signature,
) -> Vec<Vec<u8>> {
    let mut witness = ark_script::frozen_receiver::finalizer(0, owner_sig);
    witness.push(redeem_leaf.script.to_bytes());
    witness.push(redeem_leaf.control_block.serialize());
    witness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::vtxo::VirtualUtxo;
    use crate::vtxo::VirtualUtxoTaprootTree;
    use crate::vtxo::WitnessUtxo;
    use ark_script::taproot;
    use std::str::FromStr;

    fn pubkey(n: u8) -> bitcoin::secp256k1::XOnlyPublicKey {
        let mut hex = "18845781f631c48f1c9709e23092067d06837f30aa0cd0544ac887fe91ddd166".to_string();
        hex.replace_range(0..2, &format!("{n:02x}"));
        bitcoin::secp256k1::XOnlyPublicKey::from_str(&hex).unwrap()
    }

    #[test]
    fn redeem_tx_pays_the_redeem_tree_at_output_zero() {
        let owner = pubkey(0x11);
        let asp = pubkey(0x22);
        let redeem_timeout = ark_script::bip68::from_seconds(512).unwrap();
        let claim_timeout = ark_script::bip68::from_seconds(1024).unwrap();

        let redeem_tree =
            taproot::build_redeem_tree(constants::x_h_point(), owner, asp, redeem_timeout)
                .unwrap();

        let asset = elements::AssetId::from_slice(&[0x42u8; 32]).unwrap();
        let txid =
            elements::Txid::from_str(&hex::encode([0x01u8; 32])).unwrap();

        let vtxo = VirtualUtxo {
            txid,
            index: 0,
            tap_internal_key: constants::x_h_point(),
            witness_utxo: WitnessUtxo::new(
                asset,
                100_000,
                elements::Script::new(),
            ),
        };

        let claim_script = ark_script::csv::compile(asp, claim_timeout);
        let claim_leaf = taproot::Leaf {
            script: claim_script,
            control_block: redeem_tree.claim_leaf.control_block.clone(),
            leaf_version: redeem_tree.claim_leaf.leaf_version,
        };

        let extended = ExtendedVirtualUtxo {
            vtxo,
            vtxo_tree: VirtualUtxoTaprootTree {
                claim_leaf,
                redeem_leaf: redeem_tree.forfeit_leaf.clone(),
            },
            redeem_tree,
        };

        let redeem_tx = make_redeem_transaction(&extended).unwrap();

        assert_eq!(redeem_tx.redeem_output_index, 0);
        assert_eq!(redeem_tx.unsigned_tx.output.len(), 1);
        assert_eq!(
            redeem_tx.unsigned_tx.output[0].script_pubkey,
            elements::Script::from(extended.redeem_tree.script_pubkey.to_bytes())
        );
    }
}
