//! Shared fakes for `ark-client`'s integration tests: an ASP-side `Wallet` that always succeeds,
//! and an in-memory `ChainSource` the tests drive by hand.

#![allow(dead_code)]

use ark_client::ChainSource;
use ark_client::Error;
use ark_client::Unspent;
use ark_core::lift;
use ark_core::vtxo::ExtendedVirtualUtxo;
use ark_core::vtxo::VirtualUtxo;
use ark_core::vtxo::VirtualUtxoTaprootTree;
use ark_core::vtxo::WitnessUtxo;
use ark_core::wallet::CoinSelection;
use ark_core::wallet::UpdaterInput;
use ark_core::wallet::Wallet;
use bitcoin::secp256k1::schnorr;
use bitcoin::secp256k1::Keypair;
use bitcoin::secp256k1::PublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::AssetId;
use elements::Script;
use elements::Transaction;
use elements::Txid;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn asset() -> AssetId {
    AssetId::from_slice(&[0x11u8; 32]).unwrap()
}

/// An always-succeeding wallet standing in for the ASP's own signing/coin-selection backend.
/// `sign` is a pass-through (no real signatures are attached) since these tests exercise
/// coordination logic, not consensus validity.
pub struct FakeWallet {
    keypair: Keypair,
    change_script: Script,
}

impl FakeWallet {
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        Self {
            keypair: Keypair::new(&secp, &mut rand::thread_rng()),
            change_script: Script::new(),
        }
    }

    pub fn public_key_x_only(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }
}

impl Wallet for FakeWallet {
    fn public_key(&self) -> Result<PublicKey, ark_core::Error> {
        Ok(self.keypair.public_key())
    }

    fn change_script_pubkey(&self) -> Result<Script, ark_core::Error> {
        Ok(self.change_script.clone())
    }

    fn coin_select(&self, amount: u64, asset: AssetId) -> Result<CoinSelection, ark_core::Error> {
        Ok(CoinSelection {
            coins: vec![UpdaterInput {
                outpoint: elements::OutPoint::null(),
                asset,
                value: amount,
                script_pubkey: self.change_script.clone(),
            }],
            change: None,
        })
    }

    fn sign(
        &self,
        pset: elements::pset::PartiallySignedTransaction,
    ) -> Result<elements::pset::PartiallySignedTransaction, ark_core::Error> {
        Ok(pset)
    }

    fn sign_schnorr(&self, message: &[u8; 32]) -> Result<schnorr::Signature, ark_core::Error> {
        let secp = Secp256k1::new();
        let msg = bitcoin::secp256k1::Message::from_digest(*message);
        Ok(secp.sign_schnorr_with_aux_rand(&msg, &self.keypair, &[0u8; 32]))
    }
}

/// A hand-driven chain view: unspents and transactions are registered by the test, broadcasts are
/// recorded for later assertions.
#[derive(Default)]
pub struct FakeChainSource {
    unspents: Mutex<HashMap<Vec<u8>, Vec<Unspent>>>,
    transactions: Mutex<HashMap<Txid, Transaction>>,
    pub broadcasts: Mutex<Vec<Transaction>>,
}

impl FakeChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_unspent(&self, script_pubkey: &Script, unspent: Unspent) {
        self.unspents
            .lock()
            .unwrap()
            .entry(script_pubkey.to_bytes())
            .or_default()
            .push(unspent);
    }

    pub fn register_transaction(&self, tx: Transaction) {
        self.transactions.lock().unwrap().insert(tx.txid(), tx);
    }
}

impl ChainSource for FakeChainSource {
    async fn list_unspents(&self, script_pubkey: &Script) -> Result<Vec<Unspent>, Error> {
        Ok(self
            .unspents
            .lock()
            .unwrap()
            .get(&script_pubkey.to_bytes())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_transaction(&self, txid: Txid) -> Result<Transaction, Error> {
        self.transactions
            .lock()
            .unwrap()
            .get(&txid)
            .cloned()
            .ok_or_else(|| Error::chain(format!("unknown txid {txid}")))
    }

    async fn broadcast_transaction(&self, tx: &Transaction) -> Result<Txid, Error> {
        let txid = tx.txid();
        self.broadcasts.lock().unwrap().push(tx.clone());
        self.transactions.lock().unwrap().insert(txid, tx.clone());
        Ok(txid)
    }

    async fn close(&self) {}
}

/// Builds a genuine `ExtendedVirtualUtxo` for `owner` by running it through the real lift
/// builder, exactly as a production vUTXO would be minted, so it passes `vtxo::validate`.
pub fn lift_vtxo(
    asp_pubkey: XOnlyPublicKey,
    owner: XOnlyPublicKey,
    value: u64,
    claim_timeout: bitcoin::Sequence,
    redeem_timeout: bitcoin::Sequence,
) -> ExtendedVirtualUtxo {
    let orders = vec![lift::LiftArgs {
        coins: vec![UpdaterInput {
            outpoint: elements::OutPoint::null(),
            asset: asset(),
            value,
            script_pubkey: Script::new(),
        }],
        change: None,
        vtxo_public_key: owner,
    }];

    let lift_tx =
        lift::create_lift_transaction(asp_pubkey, &orders, asset(), 0, claim_timeout, redeem_timeout)
            .unwrap();
    let order = lift_tx.orders.into_iter().next().unwrap();
    let txid = lift_tx.unsigned_tx.txid();

    ExtendedVirtualUtxo {
        vtxo: VirtualUtxo {
            txid,
            index: 0,
            tap_internal_key: ark_core::constants::x_h_point(),
            witness_utxo: WitnessUtxo::new(
                asset(),
                order.stakeholder_amount,
                lift_tx.unsigned_tx.output[0].script_pubkey.clone(),
            ),
        },
        vtxo_tree: VirtualUtxoTaprootTree {
            claim_leaf: order.claim_leaf,
            redeem_leaf: order.redeem_leaf,
        },
        redeem_tree: order.redeem_tree,
    }
}
