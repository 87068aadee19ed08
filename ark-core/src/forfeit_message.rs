//! The forfeit-message format and its canonical digest, plus Schnorr sign/verify helpers used by
//! both the `PoolManager` (verifying a user's signature) and the `PoolWatcher` (producing the
//! ASP's own signature).

use crate::Error;
use bitcoin::hashes::sha256;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1;
use bitcoin::secp256k1::schnorr;
use bitcoin::secp256k1::Keypair;
use bitcoin::secp256k1::Message;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::Txid;

/// `(vUtxoTxID, vUtxoIndex, promisedPoolTxID)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForfeitMessage {
    pub vtxo_txid: Txid,
    pub vtxo_index: u32,
    pub promised_pool_txid: Txid,
}

impl ForfeitMessage {
    /// Canonical serialization: `reverse(vUtxoTxID) || u32_le(vUtxoIndex) ||
    /// reverse(promisedPoolTxID)`.
    pub fn serialize(&self) -> [u8; 68] {
        let mut buf = [0u8; 68];

        let mut vtxo_txid = *self.vtxo_txid.as_raw_hash().as_byte_array();
        vtxo_txid.reverse();
        buf[0..32].copy_from_slice(&vtxo_txid);

        buf[32..36].copy_from_slice(&self.vtxo_index.to_le_bytes());

        let mut promised_txid = *self.promised_pool_txid.as_raw_hash().as_byte_array();
        promised_txid.reverse();
        buf[36..68].copy_from_slice(&promised_txid);

        buf
    }
}

/// `SHA256` of [`ForfeitMessage::serialize`]. Injective on its three inputs: changing any
/// component changes the digest.
pub fn hash_forfeit_message(msg: &ForfeitMessage) -> [u8; 32] {
    *sha256::Hash::hash(&msg.serialize()).as_byte_array()
}

/// `BIP-340` Schnorr signature over the forfeit-message digest, with empty aux-rand.
pub fn sign_forfeit_message(
    secp: &Secp256k1<secp256k1::All>,
    keypair: &Keypair,
    msg: &ForfeitMessage,
) -> Result<schnorr::Signature, Error> {
    let digest = hash_forfeit_message(msg);
    let message = Message::from_digest(digest);
    Ok(secp.sign_schnorr_with_aux_rand(&message, keypair, &[0u8; 32]))
}

pub fn verify_forfeit_message_signature(
    secp: &Secp256k1<secp256k1::All>,
    pubkey: &XOnlyPublicKey,
    msg: &ForfeitMessage,
    signature: &schnorr::Signature,
) -> Result<(), Error> {
    let digest = hash_forfeit_message(msg);
    let message = Message::from_digest(digest);

    secp.verify_schnorr(signature, &message, pubkey)
        .map_err(|e| Error::signature(format!("forfeit message signature invalid: {e}")))
}

/// Composes the full `forfeitLeaf` witness (§4.4): `ForfeitScript`'s four-element prefix plus the
/// trailing `<script> <controlBlock>`. The ASP's signature and the user's signature are both over
/// `hashForfeitMessage(msg)`, never over the spending transaction's own sighash — the covenant's
/// `INSPECTINPUTOUTPOINT` check, not a signature, binds this spend to the promised pool tx.
pub fn forfeit_witness(
    msg: &ForfeitMessage,
    outpoint_bytes: [u8; 36],
    provider_sig: &schnorr::Signature,
    owner_sig: &schnorr::Signature,
    forfeit_leaf: &ark_script::taproot::Leaf,
) -> Vec<Vec<u8>> {
    let mut promised_txid_reversed = *msg
        .promised_pool_txid
        .as_raw_hash()
        .as_byte_array();
    promised_txid_reversed.reverse();

    let mut witness = ark_script::forfeit::finalizer(
        outpoint_bytes,
        promised_txid_reversed,
        provider_sig.as_ref().try_into().expect("64-byte signature"),
        owner_sig.as_ref().try_into().expect("64-byte signature"),
    );
    witness.push(forfeit_leaf.script.to_bytes());
    witness.push(forfeit_leaf.control_block.serialize());
    witness
}
