//! `PoolWatcher::watch_redeem` (§4.6): the ASP-side sweep that forfeits a stakeholder's vUTXO the
//! moment it sees the redeem path move on chain, using the forfeit message and signature the
//! `PoolManager` collected back when the pool transaction was promised.

use crate::chain_source::ChainSource;
use crate::repository::PoolWatcherRepository;
use crate::Error;
use ark_core::constants;
use ark_core::forfeit_message;
use ark_core::wallet::Wallet;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::confidential;
use elements::AssetId;
use elements::OutPoint;
use elements::Script;
use elements::Transaction;
use elements::TxIn;
use elements::TxOut;
use elements::Txid;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on how long a single `broadcast_transaction` call is allowed to hang before this
/// forfeit attempt gives up and surfaces an error to the caller.
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PoolWatcherConfig {
    pub asp_pubkey: XOnlyPublicKey,
    pub native_asset: AssetId,
    pub redeem_timeout: bitcoin::Sequence,
}

pub struct PoolWatcher<W, R, C> {
    wallet: Arc<W>,
    repository: Arc<R>,
    chain_source: Arc<C>,
    config: PoolWatcherConfig,
    secp: Secp256k1<bitcoin::secp256k1::All>,
}

impl<W, R, C> PoolWatcher<W, R, C>
where
    W: Wallet,
    R: PoolWatcherRepository,
    C: ChainSource,
{
    pub fn new(wallet: Arc<W>, repository: Arc<R>, chain_source: Arc<C>, config: PoolWatcherConfig) -> Self {
        Self {
            wallet,
            repository,
            chain_source,
            config,
            secp: Secp256k1::new(),
        }
    }

    /// Watches the redeem tree of one vUTXO owner and forfeits every unspent that moved through
    /// its `redeemLeaf` claim path. Returns the txids of the forfeit transactions it broadcast.
    ///
    /// Fatal (stops processing the whole batch) if the stored forfeit entry is missing, or if the
    /// promised pool's connector pool has run dry — both indicate the watcher's own bookkeeping
    /// has fallen behind, not a transient fault.
    pub async fn watch_redeem(&self, vtxo_public_key: XOnlyPublicKey) -> Result<Vec<Txid>, Error> {
        let redeem_tree = ark_script::taproot::build_redeem_tree(
            constants::x_h_point(),
            vtxo_public_key,
            self.config.asp_pubkey,
            self.config.redeem_timeout,
        )
        .map_err(Error::from)?;

        let stored = self
            .repository
            .get_forfeit(&Script::from(redeem_tree.script_pubkey.to_bytes()))
            .await?
            .ok_or(Error::MissingForfeit)?;

        let digest = forfeit_message::hash_forfeit_message(&stored.message);
        let asp_sig = self.wallet.sign_schnorr(&digest)?;

        let unspents = self
            .chain_source
            .list_unspents(&Script::from(redeem_tree.script_pubkey.to_bytes()))
            .await?;

        let mut broadcast = Vec::new();
        for unspent in unspents {
            let txid = self
                .forfeit_one(&redeem_tree, &stored, &asp_sig, unspent.txid, unspent.tx_pos)
                .await?;
            broadcast.push(txid);
        }

        Ok(broadcast)
    }

    async fn forfeit_one(
        &self,
        redeem_tree: &ark_script::taproot::RedeemTree,
        stored: &crate::repository::StoredForfeit,
        asp_sig: &bitcoin::secp256k1::schnorr::Signature,
        redeemed_txid: Txid,
        redeemed_vout: u32,
    ) -> Result<Txid, Error> {
        let redeemed_tx = self.chain_source.fetch_transaction(redeemed_txid).await?;
        let redeemed_out = redeemed_tx
            .output
            .get(redeemed_vout as usize)
            .ok_or_else(|| Error::chain("redeem utxo vout out of range"))?
            .clone();

        let pool = self
            .repository
            .get_pool_transaction(stored.message.promised_pool_txid)
            .await?
            .ok_or_else(|| Error::unknown_pending_pool(stored.message.promised_pool_txid))?;

        let connector_vout = *pool
            .connectors
            .first()
            .ok_or_else(|| Error::insufficient_connectors(stored.message.promised_pool_txid))?;

        let pool_tx_bytes =
            hex::decode(&pool.hex).map_err(|e| Error::chain(format!("stored pool tx is not valid hex: {e}")))?;
        let pool_tx: Transaction = elements::encode::deserialize(&pool_tx_bytes)
            .map_err(|e| Error::chain(format!("stored pool tx does not decode: {e}")))?;
        let connector_out = pool_tx
            .output
            .get(connector_vout as usize)
            .ok_or_else(|| Error::chain("connector vout out of range"))?
            .clone();
        let connector_value = explicit_value(&connector_out)?;
        let redeemed_value = explicit_value(&redeemed_out)?;

        let connector_outpoint = OutPoint {
            txid: stored.message.promised_pool_txid,
            vout: connector_vout,
        };
        let redeemed_outpoint = OutPoint {
            txid: redeemed_txid,
            vout: redeemed_vout,
        };

        let change_script = self.wallet.change_script_pubkey()?;
        let change_value = (connector_value + redeemed_value)
            .checked_sub(constants::FORFEIT_TX_FEE)
            .ok_or_else(|| Error::chain("forfeit inputs do not cover the fee"))?;

        let change_output = TxOut {
            asset: confidential::Asset::Explicit(self.config.native_asset),
            value: confidential::Value::Explicit(change_value),
            nonce: confidential::Nonce::Null,
            script_pubkey: change_script,
            witness: Default::default(),
        };
        let fee_output = TxOut::new_fee(constants::FORFEIT_TX_FEE, self.config.native_asset);

        let unsigned_tx = Transaction {
            version: 2,
            lock_time: elements::LockTime::ZERO,
            input: vec![
                TxIn {
                    previous_output: connector_outpoint,
                    ..Default::default()
                },
                TxIn {
                    previous_output: redeemed_outpoint,
                    ..Default::default()
                },
            ],
            output: vec![change_output, fee_output],
        };

        let mut pset = elements::pset::PartiallySignedTransaction::from_tx(unsigned_tx);
        pset.inputs[constants::FORFEIT_TX_CONNECTOR_INDEX].witness_utxo = Some(connector_out);
        pset.inputs[constants::FORFEIT_TX_REDEEM_INDEX].witness_utxo = Some(redeemed_out);

        let pset = self.wallet.sign(pset)?;
        let mut tx = pset
            .extract_tx()
            .map_err(|e| Error::chain(format!("failed to extract forfeit tx: {e}")))?;

        let outpoint_bytes = outpoint_bytes(&tx.input[constants::FORFEIT_TX_REDEEM_INDEX].previous_output);
        let witness = forfeit_message::forfeit_witness(
            &stored.message,
            outpoint_bytes,
            asp_sig,
            &stored.signature,
            &redeem_tree.forfeit_leaf,
        );
        tx.input[constants::FORFEIT_TX_REDEEM_INDEX].witness.script_witness = witness;

        let broadcast_txid =
            crate::utils::timeout_op(BROADCAST_TIMEOUT, self.chain_source.broadcast_transaction(&tx))
                .await??;

        let remaining = pool.connectors[1..].to_vec();
        self.repository
            .update_connectors(stored.message.promised_pool_txid, remaining)
            .await?;

        Ok(broadcast_txid)
    }
}

fn explicit_value(tx_out: &TxOut) -> Result<u64, Error> {
    match tx_out.value {
        confidential::Value::Explicit(value) => Ok(value),
        _ => Err(Error::chain("confidential value on a pool/connector output")),
    }
}

/// Encodes an outpoint the same way [`ForfeitMessage::serialize`](ark_core::ForfeitMessage) does:
/// the reversed (display-order) txid followed by the little-endian vout.
fn outpoint_bytes(outpoint: &OutPoint) -> [u8; 36] {
    let mut txid = *outpoint.txid.as_raw_hash().as_byte_array();
    txid.reverse();

    let mut buf = [0u8; 36];
    buf[0..32].copy_from_slice(&txid);
    buf[32..36].copy_from_slice(&outpoint.vout.to_le_bytes());
    buf
}
