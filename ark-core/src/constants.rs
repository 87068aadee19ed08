use crate::Error;
use bitcoin::secp256k1::PublicKey;
use bitcoin::Sequence;
use bitcoin::XOnlyPublicKey;

/// A fixed, provably-unspendable 33-byte public key: the internal key of every taproot output in
/// this protocol. Nobody knows its discrete log, so the only way to spend a `H_POINT`-keyed
/// output is through one of its script leaves.
pub const H_POINT: &str = "0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

pub fn h_point() -> PublicKey {
    PublicKey::from_slice(&hex::decode(H_POINT).expect("valid hex")).expect("valid point")
}

/// `H_POINT`'s 32-byte x-only form, used inside script leaves and as a `VirtualUtxo`'s
/// `tapInternalKey`.
pub fn x_h_point() -> XOnlyPublicKey {
    h_point().x_only_public_key().0
}

pub const CLAIM_TIMEOUT_SECONDS: u32 = 30 * 24 * 60 * 60;
pub const REDEEM_TIMEOUT_SECONDS: u32 = 15 * 24 * 60 * 60;

pub fn claim_timeout() -> Result<Sequence, Error> {
    ark_script::bip68::from_seconds_ceil(CLAIM_TIMEOUT_SECONDS).map_err(Error::from)
}

pub fn redeem_timeout() -> Result<Sequence, Error> {
    ark_script::bip68::from_seconds_ceil(REDEEM_TIMEOUT_SECONDS).map_err(Error::from)
}

/// The value of each connector output.
pub const DUST: u64 = 400;

/// Fee the watcher pays when broadcasting a forfeit transaction.
pub const FORFEIT_TX_FEE: u64 = 500;

pub const FORFEIT_TX_CONNECTOR_INDEX: usize = 0;
pub const FORFEIT_TX_REDEEM_INDEX: usize = 1;
