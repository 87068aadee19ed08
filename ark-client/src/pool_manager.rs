//! The `PoolManager` (§4.5): batches transfer requests on a timer into one pool transaction,
//! collects each sender's forfeit signature, then finalizes and persists once every sender has
//! signed.
//!
//! Two things this type does not handle:
//!
//! - ASP key rotation. `config.asp_pubkey` is fixed for the manager's lifetime; every queued
//!   vUTXO is validated and every forfeit signature is collected against that one key, with no
//!   replay protection against a key that has since been rotated out.
//! - Atomic persist-then-broadcast. [`persist_and_broadcast`] records the pool transaction and
//!   every collected forfeit before it submits anything to the chain; a crash in that window
//!   leaves a pool transaction marked persisted that never reached the network. Recovering from
//!   that gap is left to an out-of-process reconciliation pass against [`crate::ChainSource`].

use crate::repository::PoolManagerRepository;
use crate::utils::sleep;
use crate::Error;
use ark_core::forfeit_message;
use ark_core::pool;
use ark_core::vtxo;
use ark_core::wallet::Wallet;
use ark_core::ExtendedVirtualUtxo;
use ark_core::ForfeitMessage;
use bitcoin::secp256k1::schnorr;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::XOnlyPublicKey;
use elements::AssetId;
use elements::Script;
use elements::Txid;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct PoolManagerConfig {
    pub asp_pubkey: XOnlyPublicKey,
    pub native_asset: AssetId,
    pub miner_fee: u64,
    pub claim_timeout: bitcoin::Sequence,
    pub redeem_timeout: bitcoin::Sequence,
    /// How long the batching timer waits after the first request in a new batch arrives.
    /// Default 5s, matching the source's default.
    pub interval: Duration,
}

impl Default for PoolManagerConfig {
    fn default() -> Self {
        Self {
            asp_pubkey: ark_core::constants::x_h_point(),
            native_asset: AssetId::from_slice(&[0u8; 32]).expect("valid asset id"),
            miner_fee: 0,
            claim_timeout: bitcoin::Sequence::ZERO,
            redeem_timeout: bitcoin::Sequence::ZERO,
            interval: Duration::from_secs(5),
        }
    }
}

/// What `sendRequest` resolves with once the batch it was queued in has been assembled.
#[derive(Debug, Clone)]
pub struct SendRequestResponse {
    pub pool_unsigned_tx: elements::Transaction,
    pub forfeit_message: ForfeitMessage,
    pub receiver_utxo: ExtendedVirtualUtxo,
    pub change_utxo: Option<ExtendedVirtualUtxo>,
}

struct QueuedTransfer {
    extended_vtxo: ExtendedVirtualUtxo,
    to_public_key: XOnlyPublicKey,
    amount: Option<u64>,
    signer_pubkey: XOnlyPublicKey,
    responder: oneshot::Sender<Result<SendRequestResponse, Error>>,
}

struct ToForfeitEntry {
    redeem_script_pubkey: Script,
}

struct CollectedSignature {
    message: ForfeitMessage,
    signature: schnorr::Signature,
    redeem_script_pubkey: Script,
    responder: oneshot::Sender<Result<String, Error>>,
}

struct PendingPool {
    unsigned_tx: elements::Transaction,
    connectors: Vec<u32>,
    to_forfeit: HashMap<(Txid, u32), ToForfeitEntry>,
    collected: Vec<CollectedSignature>,
}

struct PoolManagerState {
    queue: Vec<QueuedTransfer>,
    timer_armed: bool,
    pending: HashMap<Txid, PendingPool>,
}

/// Collects transfer orders, batches them on a timer, and drives each resulting pool through its
/// forfeit-collection lifecycle: `Open` (awaiting signatures) → `Closed` (every sender signed) →
/// persisted + broadcast → removed.
pub struct PoolManager<W, R> {
    state: Arc<Mutex<PoolManagerState>>,
    wallet: Arc<W>,
    repository: Arc<R>,
    config: PoolManagerConfig,
    secp: Secp256k1<bitcoin::secp256k1::All>,
}

impl<W, R> PoolManager<W, R>
where
    W: Wallet + Send + Sync + 'static,
    R: PoolManagerRepository + Send + Sync + 'static,
{
    pub fn new(wallet: Arc<W>, repository: Arc<R>, config: PoolManagerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolManagerState {
                queue: Vec::new(),
                timer_armed: false,
                pending: HashMap::new(),
            })),
            wallet,
            repository,
            config,
            secp: Secp256k1::new(),
        }
    }

    /// Queues a transfer request. Validates the sender's `ExtendedVirtualUtxo`, arms the batching
    /// timer if it isn't already running, and resolves once this batch's pool transaction has
    /// been assembled.
    pub async fn send_request(
        self: &Arc<Self>,
        extended_vtxo: ExtendedVirtualUtxo,
        to_public_key: XOnlyPublicKey,
        amount: Option<u64>,
    ) -> Result<SendRequestResponse, Error> {
        let signer_pubkey = vtxo::validate(&extended_vtxo, self.config.asp_pubkey)?;

        let (tx, rx) = oneshot::channel();

        let arm_timer = {
            let mut state = self.state.lock().unwrap();
            state.queue.push(QueuedTransfer {
                extended_vtxo,
                to_public_key,
                amount,
                signer_pubkey,
                responder: tx,
            });

            if state.timer_armed {
                false
            } else {
                state.timer_armed = true;
                true
            }
        };

        if arm_timer {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                sleep(this.config.interval).await;
                this.fire_batch().await;
            });
        }

        rx.await
            .map_err(|_| Error::ad_hoc("batch was dropped before it resolved"))?
    }

    async fn fire_batch(self: &Arc<Self>) {
        let queued = {
            let mut state = self.state.lock().unwrap();
            state.timer_armed = false;
            std::mem::take(&mut state.queue)
        };

        if queued.is_empty() {
            return;
        }

        let transfers: Vec<pool::VirtualTransfer> = queued
            .iter()
            .map(|q| pool::VirtualTransfer {
                extended_vtxo: q.extended_vtxo.clone(),
                to_public_key: q.to_public_key,
                amount: q.amount,
            })
            .collect();

        let built = pool::create_pool_transaction(
            self.wallet.as_ref(),
            self.config.asp_pubkey,
            &transfers,
            self.config.native_asset,
            self.config.miner_fee,
            self.config.claim_timeout,
            self.config.redeem_timeout,
        );

        let built = match built {
            Ok(built) => built,
            Err(error) => {
                tracing::warn!(%error, "failed to assemble pool transaction, rejecting batch");
                for q in queued {
                    let _ = q.responder.send(Err(Error::ad_hoc(error.to_string())));
                }
                return;
            }
        };

        let promised_txid = built.unsigned_tx.txid();

        tracing::debug!(
            %promised_txid,
            stakeholders = built.leaves.len(),
            "assembled pool transaction"
        );

        let shared_witness_utxo = ark_core::WitnessUtxo::new(
            self.config.native_asset,
            0,
            built.unsigned_tx.output[0].script_pubkey.clone(),
        );

        // `pool::create_pool_transaction` pushes, per transfer in queue order, the recipient's
        // stakeholder leaf followed by an optional change leaf for the sender — so walking
        // `built.leaves` with one cursor, consuming one non-change entry per queued transfer plus
        // any immediately-following change entry, recovers the same pairing.
        let mut leaves = built.leaves.into_iter();
        let mut to_forfeit = HashMap::new();
        let mut responses = Vec::with_capacity(queued.len());

        for q in queued {
            let recipient = leaves
                .next()
                .expect("one recipient stakeholder per queued transfer");
            debug_assert!(!recipient.is_change);

            let change = if q
                .amount
                .is_some_and(|amount| amount < q.extended_vtxo.vtxo.witness_utxo.value)
            {
                leaves.next()
            } else {
                None
            };

            let receiver_utxo = ExtendedVirtualUtxo {
                vtxo: ark_core::VirtualUtxo {
                    txid: promised_txid,
                    index: 0,
                    tap_internal_key: ark_core::constants::x_h_point(),
                    witness_utxo: ark_core::WitnessUtxo {
                        value: recipient.amount,
                        ..shared_witness_utxo.clone()
                    },
                },
                vtxo_tree: recipient.vtxo_tree,
                redeem_tree: recipient.redeem_tree,
            };

            let change_utxo = change.map(|change| ExtendedVirtualUtxo {
                vtxo: ark_core::VirtualUtxo {
                    txid: promised_txid,
                    index: 0,
                    tap_internal_key: ark_core::constants::x_h_point(),
                    witness_utxo: ark_core::WitnessUtxo {
                        value: change.amount,
                        ..shared_witness_utxo.clone()
                    },
                },
                vtxo_tree: change.vtxo_tree,
                redeem_tree: change.redeem_tree,
            });

            to_forfeit.insert(
                (q.extended_vtxo.vtxo.txid, q.extended_vtxo.vtxo.index),
                ToForfeitEntry {
                    redeem_script_pubkey: elements::Script::from(
                        q.extended_vtxo.redeem_tree.script_pubkey.to_bytes(),
                    ),
                },
            );

            let forfeit_message = ForfeitMessage {
                vtxo_txid: q.extended_vtxo.vtxo.txid,
                vtxo_index: q.extended_vtxo.vtxo.index,
                promised_pool_txid: promised_txid,
            };

            responses.push((
                q.responder,
                SendRequestResponse {
                    pool_unsigned_tx: built.unsigned_tx.clone(),
                    forfeit_message,
                    receiver_utxo,
                    change_utxo,
                },
            ));
        }

        {
            let mut state = self.state.lock().unwrap();
            state.pending.insert(
                promised_txid,
                PendingPool {
                    unsigned_tx: built.unsigned_tx.clone(),
                    connectors: built.connectors.clone(),
                    to_forfeit,
                    collected: Vec::new(),
                },
            );
        }

        for (responder, response) in responses {
            let _ = responder.send(Ok(response));
        }
    }

    /// Records one sender's forfeit signature. Resolves with the broadcast-ready pool hex once
    /// every sender in this pool has signed; until then returns once the signature is recorded.
    pub async fn send(
        &self,
        message: ForfeitMessage,
        signature: schnorr::Signature,
        owner_pubkey: XOnlyPublicKey,
    ) -> Result<String, Error> {
        forfeit_message::verify_forfeit_message_signature(
            &self.secp,
            &owner_pubkey,
            &message,
            &signature,
        )
        .map_err(|e| Error::signature(e.to_string()))?;

        let (tx, rx) = oneshot::channel();

        let ready = {
            let mut state = self.state.lock().unwrap();
            let pending = state
                .pending
                .get_mut(&message.promised_pool_txid)
                .ok_or_else(|| Error::unknown_pending_pool(message.promised_pool_txid))?;

            let key = (message.vtxo_txid, message.vtxo_index);
            let entry = pending
                .to_forfeit
                .remove(&key)
                .ok_or_else(|| Error::ad_hoc("no matching toForfeit entry for this message"))?;

            pending.collected.push(CollectedSignature {
                message,
                signature,
                redeem_script_pubkey: entry.redeem_script_pubkey,
                responder: tx,
            });

            pending.to_forfeit.is_empty()
        };

        if ready {
            self.finalize_pool(message.promised_pool_txid).await;
        }

        rx.await
            .map_err(|_| Error::ad_hoc("pool was dropped before it resolved"))?
    }

    async fn finalize_pool(&self, promised_txid: Txid) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.pending.remove(&promised_txid)
        };

        let Some(pending) = pending else {
            return;
        };

        let result = self.persist_and_broadcast(&pending).await;

        match result {
            Ok(hex) => {
                tracing::info!(%promised_txid, "pool transaction ready to broadcast");
                for collected in pending.collected {
                    let _ = collected.responder.send(Ok(hex.clone()));
                }
            }
            Err(error) => {
                tracing::warn!(%promised_txid, %error, "failed to finalize pool transaction");
                for collected in pending.collected {
                    let _ = collected.responder.send(Err(error.clone_as_ad_hoc()));
                }
            }
        }
    }

    /// Persists the pool transaction and every collected forfeit entry, then hands the finalized
    /// transaction back as hex for the caller to broadcast.
    ///
    /// Persistence happens before the transaction is on chain anywhere, so a crash between the two
    /// leaves a pool transaction recorded as sent when it never was; see the module-level note.
    async fn persist_and_broadcast(&self, pending: &PendingPool) -> Result<String, Error> {
        let pset = elements::pset::PartiallySignedTransaction::from_tx(pending.unsigned_tx.clone());
        let pset = self.wallet.sign(pset)?;
        let tx = pset
            .extract_tx()
            .map_err(|e| Error::ad_hoc(format!("failed to extract finalized tx: {e}")))?;
        let hex = hex::encode(elements::encode::serialize(&tx));

        self.repository
            .set_pool_transaction(
                pending.unsigned_tx.txid(),
                hex.clone(),
                pending.connectors.clone(),
            )
            .await?;

        for collected in &pending.collected {
            self.repository
                .set_forfeit(
                    collected.redeem_script_pubkey.clone(),
                    collected.message,
                    collected.signature,
                )
                .await?;
        }

        Ok(hex)
    }
}

impl Error {
    /// Clones the error's displayed message into a fresh `AdHoc` for fan-out rejection, since
    /// `Error` doesn't derive `Clone` (several variants wrap non-`Clone` upstream error types).
    fn clone_as_ad_hoc(&self) -> Error {
        Error::ad_hoc(self.to_string())
    }
}
