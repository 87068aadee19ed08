//! `createPoolTransaction` (§4.3.2): batches vUTXO→vUTXO transfer orders into the periodic pool
//! transaction, plus one dust connector per transfer.

use crate::constants;
use crate::constants::DUST;
use crate::vtxo::ExtendedVirtualUtxo;
use crate::vtxo::RedeemTaprootTree;
use crate::vtxo::VirtualUtxoTaprootTree;
use crate::wallet::Wallet;
use crate::Error;
use ark_script::taproot;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::confidential;
use elements::AssetId;
use elements::TxIn;
use elements::TxOut;

/// `{vUtxo, redeemLeaf (sender's), toPublicKey, optional amount}`.
#[derive(Debug, Clone)]
pub struct VirtualTransfer {
    pub extended_vtxo: ExtendedVirtualUtxo,
    pub to_public_key: XOnlyPublicKey,
    pub amount: Option<u64>,
}

/// `(psetBase64, vUtxo, leaves: map from ownerXOnlyPubkey→(vUtxoTree, redeemTree), connectors:
/// [u32])`. We keep the unsigned transaction rather than a base64 PSET string at this layer;
/// callers serialize at the boundary.
#[derive(Debug, Clone)]
pub struct UnsignedPoolTransaction {
    pub unsigned_tx: elements::Transaction,
    /// Per-stakeholder leaves, keyed by owner x-only pubkey. A sender who synthesizes change
    /// appears twice: once under the recipient's key (their `receiverUtxo`), once under their
    /// own (the `changeUtxo`).
    pub leaves: Vec<StakeholderLeaves>,
    pub connectors: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct StakeholderLeaves {
    pub owner_pubkey: XOnlyPublicKey,
    pub vtxo_tree: VirtualUtxoTaprootTree,
    pub redeem_tree: RedeemTaprootTree,
    pub amount: u64,
    /// `true` for a stakeholder entry synthesized as a sender's change, as opposed to a
    /// transfer's recipient.
    pub is_change: bool,
}

pub fn create_pool_transaction(
    wallet: &impl Wallet,
    asp_pubkey: XOnlyPublicKey,
    transfers: &[VirtualTransfer],
    native_asset: AssetId,
    miner_fee: u64,
    claim_timeout: bitcoin::Sequence,
    redeem_timeout: bitcoin::Sequence,
) -> Result<UnsignedPoolTransaction, Error> {
    if transfers.is_empty() {
        return Err(Error::validation("createPoolTransaction needs at least one transfer"));
    }

    let n = transfers.len() as u64;

    let mut tx_ins = Vec::new();
    let mut weighted_leaves = Vec::new();
    let mut stakeholders = Vec::new();

    for transfer in transfers {
        tx_ins.push(TxIn {
            previous_output: transfer.extended_vtxo.vtxo.outpoint(),
            ..Default::default()
        });

        let full_value = transfer.extended_vtxo.vtxo.witness_utxo.value;
        let amount = transfer.amount.unwrap_or(full_value);

        if amount > full_value {
            return Err(Error::validation(
                "transfer amount exceeds the vUTXO's value",
            ));
        }

        let sender_pubkey = ark_script::frozen_receiver::decompile(
            &transfer.extended_vtxo.vtxo_tree.redeem_leaf.script,
        )
        .map_err(|e| Error::validation(format!("sender redeemLeaf: {e}")))?
        .owner_pubkey;

        let recipient_redeem_tree = taproot::build_redeem_tree(
            constants::x_h_point(),
            transfer.to_public_key,
            asp_pubkey,
            redeem_timeout,
        )?;
        let recipient_leaf_script = ark_script::frozen_receiver::compile(
            transfer.to_public_key,
            recipient_redeem_tree.witness_program(),
        );

        weighted_leaves.push(taproot::WeightedLeaf {
            weight: amount,
            script: recipient_leaf_script,
        });
        stakeholders.push((transfer.to_public_key, recipient_redeem_tree, amount, false));

        if amount < full_value {
            let change_amount = full_value - amount;

            let change_redeem_tree = taproot::build_redeem_tree(
                constants::x_h_point(),
                sender_pubkey,
                asp_pubkey,
                redeem_timeout,
            )?;
            let change_leaf_script = ark_script::frozen_receiver::compile(
                sender_pubkey,
                change_redeem_tree.witness_program(),
            );

            weighted_leaves.push(taproot::WeightedLeaf {
                weight: change_amount,
                script: change_leaf_script,
            });
            stakeholders.push((sender_pubkey, change_redeem_tree, change_amount, true));
        }
    }

    let asp_claim_leaf = ark_script::csv::compile(asp_pubkey, claim_timeout);
    let shared_tree = taproot::build_shared_coin_tree(
        constants::x_h_point(),
        weighted_leaves,
        asp_claim_leaf,
        1,
    )?;

    let shared_amount: u64 = stakeholders.iter().map(|(_, _, amount, _)| amount).sum();
    let connector_script = wallet.change_script_pubkey()?;
    let connector_total = DUST * n;
    let required = shared_amount + miner_fee + connector_total;

    let selection = wallet.coin_select(required, native_asset)?;
    let selected_total: u64 = selection.coins.iter().map(|c| c.value).sum();
    if selected_total < required {
        return Err(Error::coin_select(format!(
            "wallet could not cover {required}, only selected {selected_total}"
        )));
    }

    for coin in &selection.coins {
        tx_ins.push(TxIn {
            previous_output: coin.outpoint,
            ..Default::default()
        });
    }

    let shared_output = TxOut {
        asset: confidential::Asset::Explicit(native_asset),
        value: confidential::Value::Explicit(shared_amount),
        nonce: confidential::Nonce::Null,
        script_pubkey: elements::Script::from(shared_tree.script_pubkey.to_bytes()),
        witness: Default::default(),
    };
    let fee_output = TxOut::new_fee(miner_fee, native_asset);

    let mut tx_outs = vec![shared_output, fee_output];

    let connectors_start = tx_outs.len() as u32;
    for _ in 0..n {
        tx_outs.push(TxOut {
            asset: confidential::Asset::Explicit(native_asset),
            value: confidential::Value::Explicit(DUST),
            nonce: confidential::Nonce::Null,
            script_pubkey: connector_script.clone(),
            witness: Default::default(),
        });
    }
    let connectors: Vec<u32> = (connectors_start..connectors_start + n as u32).collect();

    if let Some(change) = selection.change {
        tx_outs.push(TxOut {
            asset: confidential::Asset::Explicit(change.asset),
            value: confidential::Value::Explicit(change.value),
            nonce: confidential::Nonce::Null,
            script_pubkey: change.script_pubkey,
            witness: Default::default(),
        });
    }

    let unsigned_tx = elements::Transaction {
        version: 2,
        lock_time: elements::LockTime::ZERO,
        input: tx_ins,
        output: tx_outs,
    };

    let leaves = stakeholders
        .into_iter()
        .zip(shared_tree.leaves)
        .map(|((owner_pubkey, redeem_tree, amount, is_change), redeem_leaf)| StakeholderLeaves {
            owner_pubkey,
            vtxo_tree: VirtualUtxoTaprootTree {
                claim_leaf: shared_tree.asp_claim_leaf.clone(),
                redeem_leaf,
            },
            redeem_tree,
            amount,
            is_change,
        })
        .collect();

    tracing::debug!(
        transfers = n,
        shared_amount,
        connectors = connectors.len(),
        "assembled pool transaction"
    );

    Ok(UnsignedPoolTransaction {
        unsigned_tx,
        leaves,
        connectors,
    })
}
