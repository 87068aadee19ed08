//! `createLiftTransaction` (§4.3.1): batches one or more on-chain→vUTXO orders into a single
//! Elements transaction with one shared covenant output.

use crate::constants;
use crate::vtxo::RedeemTaprootTree;
use crate::wallet::UpdaterInput;
use crate::wallet::UpdaterOutput;
use crate::Error;
use ark_script::taproot;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::Sequence;
use elements::confidential;
use elements::AssetId;
use elements::TxIn;
use elements::TxOut;

/// One lift order: the on-chain coins it spends, optional plain on-chain change, and the
/// x-only public key that will own the resulting vUTXO.
#[derive(Debug, Clone)]
pub struct LiftArgs {
    pub coins: Vec<UpdaterInput>,
    pub change: Option<UpdaterOutput>,
    pub vtxo_public_key: XOnlyPublicKey,
}

/// Everything produced for one lift order: its redeem tree, the stakeholder amount it
/// contributes to the shared output, and the resolved vUTXO-tree leaves.
#[derive(Debug, Clone)]
pub struct LiftOrderResult {
    pub redeem_tree: RedeemTaprootTree,
    pub claim_leaf: taproot::Leaf,
    pub redeem_leaf: taproot::Leaf,
    pub stakeholder_amount: u64,
}

#[derive(Debug, Clone)]
pub struct LiftTransaction {
    pub unsigned_tx: elements::Transaction,
    pub orders: Vec<LiftOrderResult>,
}

pub fn create_lift_transaction(
    asp_pubkey: XOnlyPublicKey,
    orders: &[LiftArgs],
    native_asset: AssetId,
    miner_fee: u64,
    claim_timeout: Sequence,
    redeem_timeout: Sequence,
) -> Result<LiftTransaction, Error> {
    if orders.is_empty() {
        return Err(Error::validation("createLiftTransaction needs at least one order"));
    }

    let orders_count = orders.len() as u64;
    let total_fee = miner_fee.div_ceil(orders_count) * orders_count;
    let fee_share = total_fee / orders_count;

    let mut tx_ins = Vec::new();
    let mut change_outs = Vec::new();
    let mut redeem_trees = Vec::with_capacity(orders.len());
    let mut weighted_leaves = Vec::with_capacity(orders.len());

    for order in orders {
        for coin in &order.coins {
            tx_ins.push(TxIn {
                previous_output: coin.outpoint,
                ..Default::default()
            });
        }

        let inputs_sum: u64 = order.coins.iter().map(|c| c.value).sum();
        let change_amount = order.change.as_ref().map(|c| c.value).unwrap_or(0);

        let stakeholder_amount = inputs_sum
            .checked_sub(change_amount)
            .and_then(|v| v.checked_sub(fee_share))
            .ok_or_else(|| Error::validation("lift order cannot cover its fee share"))?;

        if stakeholder_amount == 0 {
            return Err(Error::validation(
                "lifted amount must exceed the order's fee share",
            ));
        }

        if let Some(change) = &order.change {
            change_outs.push(TxOut {
                asset: confidential::Asset::Explicit(change.asset),
                value: confidential::Value::Explicit(change.value),
                nonce: confidential::Nonce::Null,
                script_pubkey: change.script_pubkey.clone(),
                witness: Default::default(),
            });
        }

        let redeem_tree = taproot::build_redeem_tree(
            constants::x_h_point(),
            order.vtxo_public_key,
            asp_pubkey,
            redeem_timeout,
        )?;

        let redeem_leaf_script =
            ark_script::frozen_receiver::compile(order.vtxo_public_key, redeem_tree.witness_program());

        weighted_leaves.push(taproot::WeightedLeaf {
            weight: stakeholder_amount,
            script: redeem_leaf_script,
        });

        redeem_trees.push((redeem_tree, stakeholder_amount));
    }

    let asp_claim_leaf = ark_script::csv::compile(asp_pubkey, claim_timeout);

    let shared_tree = taproot::build_shared_coin_tree(
        constants::x_h_point(),
        weighted_leaves,
        asp_claim_leaf,
        1,
    )?;

    let shared_amount: u64 = redeem_trees.iter().map(|(_, amount)| amount).sum();

    let shared_output = TxOut {
        asset: confidential::Asset::Explicit(native_asset),
        value: confidential::Value::Explicit(shared_amount),
        nonce: confidential::Nonce::Null,
        script_pubkey: elements::Script::from(shared_tree.script_pubkey.to_bytes()),
        witness: Default::default(),
    };

    let fee_output = TxOut::new_fee(total_fee, native_asset);

    let mut tx_outs = vec![shared_output];
    tx_outs.extend(change_outs);
    tx_outs.push(fee_output);

    let unsigned_tx = elements::Transaction {
        version: 2,
        lock_time: elements::LockTime::ZERO,
        input: tx_ins,
        output: tx_outs,
    };

    let order_results = redeem_trees
        .into_iter()
        .zip(shared_tree.leaves)
        .map(|((redeem_tree, stakeholder_amount), redeem_leaf)| LiftOrderResult {
            redeem_tree,
            claim_leaf: shared_tree.asp_claim_leaf.clone(),
            redeem_leaf,
            stakeholder_amount,
        })
        .collect();

    tracing::debug!(orders = orders_count, "assembled lift transaction");

    Ok(LiftTransaction {
        unsigned_tx,
        orders: order_results,
    })
}
