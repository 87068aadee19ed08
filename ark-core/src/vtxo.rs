//! The vUTXO data model (§3) and its validator (§4.5.1).

use crate::constants;
use crate::Error;
use ark_script::taproot;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::confidential;
use elements::AssetId;
use elements::Script;
use elements::Txid;

/// The witness UTXO a `VirtualUtxo` refers to. Spec invariant: both `asset` and `value` must be
/// explicit (non-confidential) — this is enforced at construction, not just at use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessUtxo {
    pub asset: AssetId,
    pub value: u64,
    pub script_pubkey: Script,
}

impl WitnessUtxo {
    pub fn new(asset: AssetId, value: u64, script_pubkey: Script) -> Self {
        Self {
            asset,
            value,
            script_pubkey,
        }
    }

    /// Rejects a confidential asset/value carried on an `elements::TxOut`, matching the
    /// "all inputs and outputs are non-confidential" invariant.
    pub fn from_explicit_tx_out(tx_out: &elements::TxOut) -> Result<Self, Error> {
        let asset = match tx_out.asset {
            confidential::Asset::Explicit(asset) => asset,
            _ => return Err(Error::validation("confidential asset is not permitted")),
        };
        let value = match tx_out.value {
            confidential::Value::Explicit(value) => value,
            _ => return Err(Error::validation("confidential value is not permitted")),
        };

        Ok(Self {
            asset,
            value,
            script_pubkey: tx_out.script_pubkey.clone(),
        })
    }
}

/// An off-chain claim on one index within a pool transaction. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualUtxo {
    pub txid: Txid,
    pub index: u32,
    pub tap_internal_key: XOnlyPublicKey,
    pub witness_utxo: WitnessUtxo,
}

impl VirtualUtxo {
    pub fn outpoint(&self) -> elements::OutPoint {
        elements::OutPoint {
            txid: self.txid,
            vout: self.index,
        }
    }
}

/// The two leaves over the shared pool output that belong to one vUTXO: the ASP's claim leaf
/// (shared by every stakeholder in the same pool) and this stakeholder's own redeem leaf.
#[derive(Debug, Clone)]
pub struct VirtualUtxoTaprootTree {
    pub claim_leaf: taproot::Leaf,
    pub redeem_leaf: taproot::Leaf,
}

/// The per-user redeem tree: `{claimLeaf, forfeitLeaf}`, keyed by the unspendable `H_POINT`.
pub type RedeemTaprootTree = taproot::RedeemTree;

/// `(VirtualUtxo, VirtualUtxoTaprootTree, RedeemTaprootTree)`.
#[derive(Debug, Clone)]
pub struct ExtendedVirtualUtxo {
    pub vtxo: VirtualUtxo,
    pub vtxo_tree: VirtualUtxoTaprootTree,
    pub redeem_tree: RedeemTaprootTree,
}

/// Validates an `ExtendedVirtualUtxo` against the invariants in §4.5.1. Any mismatch is a fatal
/// `ValidationError`.
pub fn validate(
    extended: &ExtendedVirtualUtxo,
    asp_pubkey: XOnlyPublicKey,
) -> Result<XOnlyPublicKey, Error> {
    let ExtendedVirtualUtxo {
        vtxo,
        vtxo_tree,
        redeem_tree,
    } = extended;

    if vtxo.tap_internal_key != constants::x_h_point() {
        return Err(Error::validation(
            "vUTXO's tapInternalKey must be X_H_POINT",
        ));
    }

    let asp_claim = ark_script::csv::decompile(&vtxo_tree.claim_leaf.script)
        .map_err(|e| Error::validation(format!("vUtxoTree.claimLeaf: {e}")))?;
    if asp_claim.owner_pubkey != asp_pubkey {
        return Err(Error::validation(
            "vUtxoTree.claimLeaf is not owned by the ASP",
        ));
    }

    let redeem_claim = ark_script::csv::decompile(&redeem_tree.claim_leaf.script)
        .map_err(|e| Error::validation(format!("redeemTree.claimLeaf: {e}")))?;
    let owner_key = redeem_claim.owner_pubkey;

    let forfeit = ark_script::forfeit::decompile(&redeem_tree.forfeit_leaf.script)
        .map_err(|e| Error::validation(format!("redeemTree.forfeitLeaf: {e}")))?;
    if forfeit.owner_pubkey != owner_key || forfeit.provider_pubkey != asp_pubkey {
        return Err(Error::validation(
            "redeemTree.forfeitLeaf key mismatch",
        ));
    }

    let frozen_receiver = ark_script::frozen_receiver::decompile(&vtxo_tree.redeem_leaf.script)
        .map_err(|e| Error::validation(format!("vUtxoTree.redeemLeaf: {e}")))?;
    if frozen_receiver.owner_pubkey != owner_key {
        return Err(Error::validation(
            "vUtxoTree.redeemLeaf is not owned by the redeem tree's claim key",
        ));
    }
    if frozen_receiver.witness_program != redeem_tree.witness_program() {
        return Err(Error::validation(
            "vUtxoTree.redeemLeaf witness program does not match the redeem tree",
        ));
    }

    let claim_root = ark_script::taproot::compute_merkle_root_from_control_block(
        &vtxo_tree.claim_leaf.script,
        vtxo_tree.claim_leaf.leaf_version,
        &vtxo_tree.claim_leaf.control_block,
    );
    let redeem_root = ark_script::taproot::compute_merkle_root_from_control_block(
        &vtxo_tree.redeem_leaf.script,
        vtxo_tree.redeem_leaf.leaf_version,
        &vtxo_tree.redeem_leaf.control_block,
    );
    if claim_root != redeem_root {
        return Err(Error::validation(
            "vUtxoTree leaves do not share a common Merkle root",
        ));
    }

    let tweaked_output_key = constants::x_h_point()
        .add_tweak(
            &bitcoin::secp256k1::Secp256k1::verification_only(),
            &bitcoin::secp256k1::Scalar::from_be_bytes(claim_root.to_byte_array())
                .map_err(|_| Error::validation("invalid merkle root scalar"))?,
        )
        .map(|(key, _)| key)
        .map_err(|e| Error::validation(format!("failed to tweak internal key: {e}")))?;

    let actual_program = &vtxo.witness_utxo.script_pubkey.as_bytes()[2..];
    if tweaked_output_key.serialize() != actual_program {
        return Err(Error::validation(
            "vUTXO witnessUtxo script does not match the vUTXO tree's Merkle root",
        ));
    }

    tracing::debug!(%owner_key, "vUTXO validated");

    Ok(owner_key)
}
