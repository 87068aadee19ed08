//! The `Repository` boundary (§6), split into the two disjoint capability sets the `PoolManager`
//! and `PoolWatcher` each need, plus an in-memory reference implementation for tests.

use crate::Error;
use ark_core::ForfeitMessage;
use bitcoin::secp256k1::schnorr;
use elements::Script;
use elements::Txid;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredForfeit {
    pub message: ForfeitMessage,
    pub signature: schnorr::Signature,
}

#[derive(Debug, Clone)]
pub struct StoredPoolTransaction {
    pub hex: String,
    pub connectors: Vec<u32>,
}

pub trait PoolManagerRepository: Send + Sync {
    fn set_forfeit(
        &self,
        redeem_script_pubkey: Script,
        message: ForfeitMessage,
        signature: schnorr::Signature,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn set_pool_transaction(
        &self,
        txid: Txid,
        hex: String,
        connectors: Vec<u32>,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

pub trait PoolWatcherRepository: Send + Sync {
    fn get_forfeit(
        &self,
        redeem_script_pubkey: &Script,
    ) -> impl Future<Output = Result<Option<StoredForfeit>, Error>> + Send;

    fn get_pool_transaction(
        &self,
        txid: Txid,
    ) -> impl Future<Output = Result<Option<StoredPoolTransaction>, Error>> + Send;

    fn update_connectors(
        &self,
        txid: Txid,
        connectors: Vec<u32>,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Reference implementation used by tests; the real persistence layer is left to the integrator
/// (it sits outside the scope documented in §1).
#[derive(Default)]
pub struct InMemoryRepository {
    forfeits: Mutex<HashMap<Vec<u8>, StoredForfeit>>,
    pools: Mutex<HashMap<Txid, StoredPoolTransaction>>,
}

impl PoolManagerRepository for InMemoryRepository {
    async fn set_forfeit(
        &self,
        redeem_script_pubkey: Script,
        message: ForfeitMessage,
        signature: schnorr::Signature,
    ) -> Result<(), Error> {
        self.forfeits.lock().unwrap().insert(
            redeem_script_pubkey.to_bytes(),
            StoredForfeit { message, signature },
        );
        Ok(())
    }

    async fn set_pool_transaction(
        &self,
        txid: Txid,
        hex: String,
        connectors: Vec<u32>,
    ) -> Result<(), Error> {
        self.pools
            .lock()
            .unwrap()
            .insert(txid, StoredPoolTransaction { hex, connectors });
        Ok(())
    }
}

impl PoolWatcherRepository for InMemoryRepository {
    async fn get_forfeit(
        &self,
        redeem_script_pubkey: &Script,
    ) -> Result<Option<StoredForfeit>, Error> {
        Ok(self
            .forfeits
            .lock()
            .unwrap()
            .get(&redeem_script_pubkey.to_bytes())
            .cloned())
    }

    async fn get_pool_transaction(
        &self,
        txid: Txid,
    ) -> Result<Option<StoredPoolTransaction>, Error> {
        Ok(self.pools.lock().unwrap().get(&txid).cloned())
    }

    async fn update_connectors(&self, txid: Txid, connectors: Vec<u32>) -> Result<(), Error> {
        if let Some(pool) = self.pools.lock().unwrap().get_mut(&txid) {
            pool.connectors = connectors;
        }
        Ok(())
    }
}
