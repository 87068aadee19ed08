mod support;

use ark_client::ChainSource;
use ark_client::InMemoryRepository;
use ark_client::PoolManager;
use ark_client::PoolManagerConfig;
use ark_client::PoolWatcher;
use ark_client::PoolWatcherConfig;
use ark_client::Unspent;
use bitcoin::secp256k1::Keypair;
use bitcoin::secp256k1::Secp256k1;
use std::sync::Arc;
use std::time::Duration;
use support::asset;
use support::lift_vtxo;
use support::FakeChainSource;
use support::FakeWallet;

fn manager_config(asp_pubkey: bitcoin::secp256k1::XOnlyPublicKey) -> PoolManagerConfig {
    PoolManagerConfig {
        asp_pubkey,
        native_asset: asset(),
        miner_fee: 0,
        claim_timeout: ark_core::constants::claim_timeout().unwrap(),
        redeem_timeout: ark_core::constants::redeem_timeout().unwrap(),
        interval: Duration::from_millis(20),
    }
}

/// Scenario 3: Alice transfers 10 000 units to Bob through the `PoolManager`, then also
/// broadcasts a redeem transaction for her original (now-forfeited) vUTXO. `watch_redeem` must
/// discover it, spend the next promised connector plus Alice's redeem output through the forfeit
/// leaf, and broadcast the forfeit transaction.
#[tokio::test]
async fn watcher_forfeits_a_cheating_redeem() {
    let wallet = Arc::new(FakeWallet::new());
    let repository = Arc::new(InMemoryRepository::default());
    let chain = Arc::new(FakeChainSource::new());
    let asp_pubkey = wallet.public_key_x_only();

    let secp = Secp256k1::new();
    let alice = Keypair::new(&secp, &mut rand::thread_rng());
    let bob = Keypair::new(&secp, &mut rand::thread_rng());
    let (alice_xonly, _) = alice.x_only_public_key();
    let (bob_xonly, _) = bob.x_only_public_key();

    let cfg = manager_config(asp_pubkey);
    let alice_vtxo = lift_vtxo(
        asp_pubkey,
        alice_xonly,
        100_000_000,
        cfg.claim_timeout,
        cfg.redeem_timeout,
    );
    let redeem_tree = alice_vtxo.redeem_tree.clone();

    let manager = Arc::new(PoolManager::new(wallet.clone(), repository.clone(), cfg));
    let response = manager
        .send_request(alice_vtxo, bob_xonly, Some(10_000))
        .await
        .unwrap();

    let digest = ark_core::hash_forfeit_message(&response.forfeit_message);
    let message = bitcoin::secp256k1::Message::from_digest(digest);
    let alice_sig = secp.sign_schnorr_with_aux_rand(&message, &alice, &[0u8; 32]);
    manager
        .send(response.forfeit_message, alice_sig, alice_xonly)
        .await
        .expect("alice's signature finalizes the pool");

    let stored_pool = repository
        .get_pool_transaction(response.forfeit_message.promised_pool_txid)
        .await
        .unwrap()
        .unwrap();
    let pool_tx_bytes = hex::decode(&stored_pool.hex).unwrap();
    let pool_tx: elements::Transaction = elements::encode::deserialize(&pool_tx_bytes).unwrap();
    chain.register_transaction(pool_tx.clone());

    // Alice cheats: she broadcasts a redeem transaction spending her original vUTXO's
    // `redeemLeaf`, paying herself at the redeem tree's own script pubkey.
    let redeem = ark_core::make_redeem_transaction(&support_extended_vtxo(
        &redeem_tree,
        response.forfeit_message.vtxo_txid,
        response.forfeit_message.vtxo_index,
    ))
    .unwrap();
    chain.register_transaction(redeem.unsigned_tx.clone());
    chain.register_unspent(
        &elements::Script::from(redeem_tree.script_pubkey.to_bytes()),
        Unspent {
            height: 100,
            tx_pos: redeem.redeem_output_index,
            txid: redeem.unsigned_tx.txid(),
        },
    );

    let watcher = PoolWatcher::new(
        wallet,
        repository.clone(),
        chain.clone(),
        PoolWatcherConfig {
            asp_pubkey,
            native_asset: asset(),
            redeem_timeout: ark_core::constants::redeem_timeout().unwrap(),
        },
    );

    let broadcast = watcher.watch_redeem(alice_xonly).await.unwrap();
    assert_eq!(broadcast.len(), 1);

    let forfeit_tx = chain.broadcasts.lock().unwrap().last().unwrap().clone();
    assert_eq!(
        forfeit_tx.input[0].previous_output.txid,
        response.forfeit_message.promised_pool_txid
    );
    assert_eq!(forfeit_tx.input[1].previous_output.txid, redeem.unsigned_tx.txid());
    assert_eq!(forfeit_tx.input[1].previous_output.vout, 0);

    let remaining = repository
        .get_pool_transaction(response.forfeit_message.promised_pool_txid)
        .await
        .unwrap()
        .unwrap();
    assert!(remaining.connectors.is_empty());
}

/// Scenario 6: with only one connector promised, a second forfeit against the same pool fails
/// with `InsufficientConnectors`.
#[tokio::test]
async fn second_forfeit_against_the_same_pool_runs_out_of_connectors() {
    let wallet = Arc::new(FakeWallet::new());
    let repository = Arc::new(InMemoryRepository::default());
    let chain = Arc::new(FakeChainSource::new());
    let asp_pubkey = wallet.public_key_x_only();

    let secp = Secp256k1::new();
    let alice = Keypair::new(&secp, &mut rand::thread_rng());
    let bob = Keypair::new(&secp, &mut rand::thread_rng());
    let (alice_xonly, _) = alice.x_only_public_key();
    let (bob_xonly, _) = bob.x_only_public_key();

    let cfg = manager_config(asp_pubkey);
    let alice_vtxo = lift_vtxo(
        asp_pubkey,
        alice_xonly,
        100_000_000,
        cfg.claim_timeout,
        cfg.redeem_timeout,
    );
    let redeem_tree = alice_vtxo.redeem_tree.clone();

    let manager = Arc::new(PoolManager::new(wallet.clone(), repository.clone(), cfg));
    let response = manager
        .send_request(alice_vtxo, bob_xonly, None)
        .await
        .unwrap();

    let digest = ark_core::hash_forfeit_message(&response.forfeit_message);
    let message = bitcoin::secp256k1::Message::from_digest(digest);
    let alice_sig = secp.sign_schnorr_with_aux_rand(&message, &alice, &[0u8; 32]);
    manager
        .send(response.forfeit_message, alice_sig, alice_xonly)
        .await
        .unwrap();

    let stored_pool = repository
        .get_pool_transaction(response.forfeit_message.promised_pool_txid)
        .await
        .unwrap()
        .unwrap();
    let pool_tx_bytes = hex::decode(&stored_pool.hex).unwrap();
    let pool_tx: elements::Transaction = elements::encode::deserialize(&pool_tx_bytes).unwrap();
    chain.register_transaction(pool_tx);

    let redeem = ark_core::make_redeem_transaction(&support_extended_vtxo(
        &redeem_tree,
        response.forfeit_message.vtxo_txid,
        response.forfeit_message.vtxo_index,
    ))
    .unwrap();
    chain.register_transaction(redeem.unsigned_tx.clone());
    chain.register_unspent(
        &elements::Script::from(redeem_tree.script_pubkey.to_bytes()),
        Unspent {
            height: 100,
            tx_pos: redeem.redeem_output_index,
            txid: redeem.unsigned_tx.txid(),
        },
    );

    let watcher = PoolWatcher::new(
        wallet,
        repository.clone(),
        chain.clone(),
        PoolWatcherConfig {
            asp_pubkey,
            native_asset: asset(),
            redeem_timeout: ark_core::constants::redeem_timeout().unwrap(),
        },
    );

    watcher.watch_redeem(alice_xonly).await.unwrap();

    // The same redeem output is still listed as unspent (a second, unrelated redeem claim would
    // register a fresh unspent under the same script in practice); re-running against a pool that
    // has no connectors left must fail.
    let result = watcher.watch_redeem(alice_xonly).await;
    assert!(result.is_err());
}

fn support_extended_vtxo(
    redeem_tree: &ark_script::taproot::RedeemTree,
    vtxo_txid: elements::Txid,
    vtxo_index: u32,
) -> ark_core::ExtendedVirtualUtxo {
    ark_core::ExtendedVirtualUtxo {
        vtxo: ark_core::VirtualUtxo {
            txid: vtxo_txid,
            index: vtxo_index,
            tap_internal_key: ark_core::constants::x_h_point(),
            witness_utxo: ark_core::WitnessUtxo::new(
                asset(),
                100_000_000,
                elements::Script::from(redeem_tree.script_pubkey.to_bytes()),
            ),
        },
        vtxo_tree: ark_core::VirtualUtxoTaprootTree {
            claim_leaf: redeem_tree.claim_leaf.clone(),
            redeem_leaf: redeem_tree.claim_leaf.clone(),
        },
        redeem_tree: redeem_tree.clone(),
    }
}
