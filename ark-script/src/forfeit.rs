//! `ForfeitScript(ownerPubKeyX, providerPubKeyX)` — the redeem tree's `forfeitLeaf`.
//!
//! Witness stack at spend: `[aspSig, userSig, outpointBytes, promisedTxIdReversed]`. The script
//! hashes `outpointBytes || promisedTxIdReversed`, checks both signatures over that hash via
//! `CHECKSIGFROMSTACKVERIFY`, then asserts that the forfeit transaction's connector input (a
//! fixed input index, not "this" input) really spends the promised pool transaction.
//!
//! `OP_INSPECTINPUTOUTPOINT` is assumed to push its three components bottom-to-top as
//! `[pegin-flag, vout, txid]`; only the `txid` component is used below.

use crate::Error;
use bitcoin::opcodes::all::OP_DROP;
use bitcoin::opcodes::all::OP_DUP;
use bitcoin::opcodes::all::OP_EQUAL;
use bitcoin::opcodes::all::OP_FROMALTSTACK;
use bitcoin::opcodes::all::OP_SHA256;
use bitcoin::opcodes::all::OP_TOALTSTACK;
use bitcoin::script::Instruction;
use bitcoin::ScriptBuf;
use bitcoin::XOnlyPublicKey;
use elements::opcodes::all::OP_CAT;
use elements::opcodes::all::OP_CHECKSIGFROMSTACKVERIFY;
use elements::opcodes::all::OP_INSPECTINPUTOUTPOINT;

/// Input index of the forfeit transaction's connector, the input this leaf's outpoint check is
/// pinned to. Matches `ark_core::constants::FORFEIT_TX_CONNECTOR_INDEX`; duplicated here rather
/// than imported since `ark-script` sits below `ark-core` in the dependency graph.
const CONNECTOR_INPUT_INDEX: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForfeitScript {
    pub owner_pubkey: XOnlyPublicKey,
    pub provider_pubkey: XOnlyPublicKey,
}

pub fn compile(owner_pubkey: XOnlyPublicKey, provider_pubkey: XOnlyPublicKey) -> ScriptBuf {
    ScriptBuf::builder()
        // [aspSig userSig outpointBytes promisedTxIdReversed]
        // Stash a copy of `promisedTxIdReversed` on the alt stack for the final outpoint check.
        .push_opcode(OP_DUP)
        .push_opcode(OP_TOALTSTACK)
        // Hash `outpointBytes || promisedTxIdReversed`.
        .push_opcode(OP_CAT)
        .push_opcode(OP_SHA256)
        // Stash a second copy of the hash for the provider's check.
        .push_opcode(OP_DUP)
        .push_opcode(OP_TOALTSTACK)
        // userSig over the hash, checked against the owner.
        .push_x_only_key(&owner_pubkey)
        .push_opcode(OP_CHECKSIGFROMSTACKVERIFY)
        // aspSig over the same hash, checked against the provider.
        .push_opcode(OP_FROMALTSTACK)
        .push_x_only_key(&provider_pubkey)
        .push_opcode(OP_CHECKSIGFROMSTACKVERIFY)
        // The connector input (fixed index, not `OP_PUSHCURRENTINPUTINDEX`) must spend the
        // promised pool transaction. Drain the flag and vout components `OP_INSPECTINPUTOUTPOINT`
        // pushes alongside the txid, then compare against the stashed `promisedTxIdReversed`.
        .push_int(CONNECTOR_INPUT_INDEX)
        .push_opcode(OP_INSPECTINPUTOUTPOINT)
        .push_opcode(OP_TOALTSTACK)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DROP)
        .push_opcode(OP_FROMALTSTACK)
        .push_opcode(OP_FROMALTSTACK)
        .push_opcode(OP_EQUAL)
        .into_script()
}

pub fn decompile(script: &ScriptBuf) -> Result<ForfeitScript, Error> {
    let instructions: Vec<_> = script
        .instructions()
        .collect::<Result<_, _>>()
        .map_err(|e| Error::decompile(format!("malformed script: {e}")))?;

    let pushes: Vec<&[u8]> = instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::PushBytes(b) if b.len() == 32 => Some(b.as_bytes()),
            _ => None,
        })
        .collect();

    let [owner_bytes, provider_bytes] = pushes.as_slice() else {
        return Err(Error::decompile(
            "expected exactly two 32-byte key pushes",
        ));
    };

    let owner_pubkey = XOnlyPublicKey::from_slice(owner_bytes)?;
    let provider_pubkey = XOnlyPublicKey::from_slice(provider_bytes)?;

    if compile(owner_pubkey, provider_pubkey) != *script {
        return Err(Error::decompile("non-canonical encoding"));
    }

    Ok(ForfeitScript {
        owner_pubkey,
        provider_pubkey,
    })
}

/// Witness stack elements for the `forfeitLeaf` path (excluding the trailing
/// `<script> <controlBlock>`, which the caller appends).
pub fn finalizer(
    outpoint_bytes: [u8; 36],
    promised_txid_reversed: [u8; 32],
    provider_sig: [u8; 64],
    owner_sig: [u8; 64],
) -> Vec<Vec<u8>> {
    vec![
        provider_sig.to_vec(),
        owner_sig.to_vec(),
        outpoint_bytes.to_vec(),
        promised_txid_reversed.to_vec(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_pubkey(n: u8) -> XOnlyPublicKey {
        let mut hex = "18845781f631c48f1c9709e23092067d06837f30aa0cd0544ac887fe91ddd166".to_string();
        hex.replace_range(0..2, &format!("{n:02x}"));
        XOnlyPublicKey::from_str(&hex).unwrap()
    }

    #[test]
    fn round_trips() {
        let owner = test_pubkey(0x18);
        let provider = test_pubkey(0x28);

        let script = compile(owner, provider);
        let decoded = decompile(&script).unwrap();

        assert_eq!(decoded.owner_pubkey, owner);
        assert_eq!(decoded.provider_pubkey, provider);
        assert_eq!(
            compile(decoded.owner_pubkey, decoded.provider_pubkey),
            script
        );
    }

    #[test]
    fn rejects_swapped_keys() {
        let owner = test_pubkey(0x18);
        let provider = test_pubkey(0x28);

        let script = compile(owner, provider);
        let decoded = decompile(&script).unwrap();

        assert_ne!(decoded.owner_pubkey, provider);
        assert_ne!(decoded.provider_pubkey, owner);
    }
}
