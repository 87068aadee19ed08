//! The `ChainSource` boundary (§6): an Electrum-like view of the chain. `ark-client` never talks
//! to a node directly — it only depends on this trait, so tests can supply an in-memory fake.

use crate::Error;
use backon::ConstantBuilder;
use backon::Retryable;
use elements::Script;
use elements::Transaction;
use elements::Txid;
use std::future::Future;
use std::time::Duration;

/// One entry from `listUnspents`, keyed by the reversed-SHA256 Electrum script hash.
#[derive(Debug, Clone, Copy)]
pub struct Unspent {
    pub height: i64,
    pub tx_pos: u32,
    pub txid: Txid,
}

pub trait ChainSource: Send + Sync {
    fn list_unspents(
        &self,
        script_pubkey: &Script,
    ) -> impl Future<Output = Result<Vec<Unspent>, Error>> + Send;

    /// Fetches one transaction by txid. Implementations may return a transient "not yet visible"
    /// error; [`fetch_transactions`] retries those up to 5 times at 1s spacing.
    fn fetch_transaction(
        &self,
        txid: Txid,
    ) -> impl Future<Output = Result<Transaction, Error>> + Send;

    fn broadcast_transaction(
        &self,
        tx: &Transaction,
    ) -> impl Future<Output = Result<Txid, Error>> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Fetches a batch of transactions, retrying each individually up to 5 times at 1-second spacing
/// to absorb the Electrum `missingtransaction` race (broadcast observed before the server's own
/// mempool view catches up).
pub async fn fetch_transactions(
    chain_source: &impl ChainSource,
    txids: &[Txid],
) -> Result<Vec<Transaction>, Error> {
    let mut out = Vec::with_capacity(txids.len());

    for txid in txids {
        let tx = (|| async { chain_source.fetch_transaction(*txid).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::from_secs(1))
                    .with_max_times(5),
            )
            .await?;
        out.push(tx);
    }

    Ok(out)
}
