//! The `Wallet` boundary consumed by the transaction builders (§6). The core never performs
//! key management, UTXO selection, or signing itself — it asks the wallet.

use crate::Error;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::confidential;
use elements::AssetId;
use elements::OutPoint;
use elements::Script;

/// One on-chain coin the wallet is willing to spend.
#[derive(Debug, Clone)]
pub struct UpdaterInput {
    pub outpoint: OutPoint,
    pub asset: AssetId,
    pub value: u64,
    pub script_pubkey: Script,
}

/// A change output the wallet wants appended if `coinSelect` overshoots the requested amount.
#[derive(Debug, Clone)]
pub struct UpdaterOutput {
    pub asset: AssetId,
    pub value: u64,
    pub script_pubkey: Script,
}

#[derive(Debug, Clone)]
pub struct CoinSelection {
    pub coins: Vec<UpdaterInput>,
    pub change: Option<UpdaterOutput>,
}

/// The wallet boundary. Implemented by the integrator; `ark-core`/`ark-client` only depend on
/// this trait.
pub trait Wallet {
    /// 33-byte compressed public key. Used (in its x-only form) as the ASP's identity in every
    /// script leaf it owns.
    fn public_key(&self) -> Result<bitcoin::secp256k1::PublicKey, Error>;

    fn public_key_x_only(&self) -> Result<XOnlyPublicKey, Error> {
        Ok(self.public_key()?.x_only_public_key().0)
    }

    /// A SegWit script the wallet can sign for; used for connector outputs and ASP change.
    fn change_script_pubkey(&self) -> Result<Script, Error>;

    /// Selects coins covering at least `(amount, asset)`. Returns `CoinSelectionError` if it
    /// can't.
    fn coin_select(&self, amount: u64, asset: AssetId) -> Result<CoinSelection, Error>;

    /// Signs every input the wallet can sign in `pset`, leaving the rest untouched.
    fn sign(&self, pset: elements::pset::PartiallySignedTransaction) -> Result<elements::pset::PartiallySignedTransaction, Error>;

    /// BIP-340 Schnorr signature over a 32-byte message, with empty aux-rand.
    fn sign_schnorr(&self, message: &[u8; 32]) -> Result<bitcoin::secp256k1::schnorr::Signature, Error>;
}
