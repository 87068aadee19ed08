//! `FrozenReceiverScript(ownerPubKeyX, witnessProgram32)` — the vUTXO `redeemLeaf`.
//!
//! An introspection-based covenant: spending it forces input 0 to be forwarded in its entirety
//! (value and asset preserved) to a single SegWit v1 output whose witness program equals
//! `witnessProgram32`. Witness stack: `[outputIndexOrEmpty, ownerSig, <script>, <controlBlock>]`.
//!
//! Every Elements introspection opcode used here (`OP_INSPECTINPUT{ASSET,VALUE}`,
//! `OP_INSPECTOUTPUT{ASSET,VALUE,SCRIPTPUBKEY}`) pushes its `(tag, value)` pair tag-first, value
//! on top; pairing an input-side push against its output-side counterpart for `OP_EQUALVERIFY`
//! therefore needs an `OP_ROT` between the two inspect calls, not back-to-back `EQUALVERIFY`s.

use crate::Error;
use bitcoin::opcodes::all::OP_1;
use bitcoin::opcodes::all::OP_CHECKSIGVERIFY;
use bitcoin::opcodes::all::OP_DUP;
use bitcoin::opcodes::all::OP_EQUAL;
use bitcoin::opcodes::all::OP_EQUALVERIFY;
use bitcoin::opcodes::all::OP_ROLL;
use bitcoin::opcodes::all::OP_ROT;
use bitcoin::script::Instruction;
use bitcoin::ScriptBuf;
use bitcoin::XOnlyPublicKey;
use elements::opcodes::all::OP_INSPECTINPUTASSET;
use elements::opcodes::all::OP_INSPECTINPUTVALUE;
use elements::opcodes::all::OP_INSPECTOUTPUTASSET;
use elements::opcodes::all::OP_INSPECTOUTPUTSCRIPTPUBKEY;
use elements::opcodes::all::OP_INSPECTOUTPUTVALUE;
use elements::opcodes::all::OP_PUSHCURRENTINPUTINDEX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrozenReceiverScript {
    pub owner_pubkey: XOnlyPublicKey,
    pub witness_program: [u8; 32],
}

pub fn compile(owner_pubkey: XOnlyPublicKey, witness_program: [u8; 32]) -> ScriptBuf {
    ScriptBuf::builder()
        // Owner signs over the (default) sighash. Consumes `ownerSig`, leaves `outputIndex`.
        .push_x_only_key(&owner_pubkey)
        .push_opcode(OP_CHECKSIGVERIFY)
        // Three output-side checks follow (asset, value, scriptPubkey); each needs its own copy
        // of `outputIndex`.
        .push_opcode(OP_DUP)
        .push_opcode(OP_DUP)
        // 1. Input 0's asset must match the named output's asset.
        .push_opcode(OP_PUSHCURRENTINPUTINDEX)
        .push_opcode(OP_INSPECTINPUTASSET)
        .push_int(2)
        .push_opcode(OP_ROLL)
        .push_opcode(OP_INSPECTOUTPUTASSET)
        .push_opcode(OP_ROT)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_EQUALVERIFY)
        // 2. Input 0's value must match the named output's value.
        .push_opcode(OP_PUSHCURRENTINPUTINDEX)
        .push_opcode(OP_INSPECTINPUTVALUE)
        .push_int(2)
        .push_opcode(OP_ROLL)
        .push_opcode(OP_INSPECTOUTPUTVALUE)
        .push_opcode(OP_ROT)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_EQUALVERIFY)
        // 3. The output must be a v1 SegWit (Taproot) output paying exactly `witness_program`.
        .push_opcode(OP_INSPECTOUTPUTSCRIPTPUBKEY)
        .push_slice(witness_program)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_1)
        .push_opcode(OP_EQUAL)
        .into_script()
}

/// Strictly decompiles `script`. This does not attempt to recover an arbitrary script; it only
/// accepts the exact byte sequence produced by [`compile`] for some `(owner_pubkey,
/// witness_program)`.
pub fn decompile(script: &ScriptBuf) -> Result<FrozenReceiverScript, Error> {
    let instructions: Vec<_> = script
        .instructions()
        .collect::<Result<_, _>>()
        .map_err(|e| Error::decompile(format!("malformed script: {e}")))?;

    let owner_pubkey = match instructions.first() {
        Some(Instruction::PushBytes(bytes)) if bytes.len() == 32 => {
            XOnlyPublicKey::from_slice(bytes.as_bytes())?
        }
        _ => return Err(Error::decompile("expected leading 32-byte pubkey push")),
    };

    let witness_program: [u8; 32] = match instructions.last() {
        Some(Instruction::PushBytes(bytes)) if bytes.len() == 32 => {
            bytes.as_bytes().try_into().expect("checked len")
        }
        _ => return Err(Error::decompile("expected trailing 32-byte program push")),
    };

    if compile(owner_pubkey, witness_program) != *script {
        return Err(Error::decompile("non-canonical encoding"));
    }

    Ok(FrozenReceiverScript {
        owner_pubkey,
        witness_program,
    })
}

/// Witness stack elements contributed by the spender for the `redeemLeaf` path (excluding the
/// trailing `<script> <controlBlock>`, which the caller appends).
///
/// `output_index` is encoded as a minimal script number: empty bytes for index `0`.
pub fn finalizer(output_index: u32, owner_sig: bitcoin::taproot::Signature) -> Vec<Vec<u8>> {
    let index_push = if output_index == 0 {
        Vec::new()
    } else {
        bitcoin::script::scriptint_vec(i64::from(output_index))
    };

    vec![index_push, owner_sig.to_vec()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_pubkey() -> XOnlyPublicKey {
        XOnlyPublicKey::from_str(
            "18845781f631c48f1c9709e23092067d06837f30aa0cd0544ac887fe91ddd166",
        )
        .unwrap()
    }

    #[test]
    fn round_trips() {
        let pk = test_pubkey();
        let program = [7u8; 32];

        let script = compile(pk, program);
        let decoded = decompile(&script).unwrap();

        assert_eq!(decoded.owner_pubkey, pk);
        assert_eq!(decoded.witness_program, program);
        assert_eq!(compile(decoded.owner_pubkey, decoded.witness_program), script);
    }

    #[test]
    fn rejects_tampered_witness_program() {
        let pk = test_pubkey();
        let program = [7u8; 32];
        let mut bytes = compile(pk, program).into_bytes();
        let len = bytes.len();
        bytes[len - 1] ^= 0xff;

        let script = ScriptBuf::from_bytes(bytes);
        assert!(decompile(&script).is_err());
    }

    #[test]
    fn finalizer_index_zero_is_empty_push() {
        let sig = bitcoin::taproot::Signature {
            signature: bitcoin::secp256k1::schnorr::Signature::from_slice(&[1u8; 64]).unwrap(),
            sighash_type: bitcoin::sighash::TapSighashType::Default,
        };

        let stack = finalizer(0, sig);
        assert!(stack[0].is_empty());
    }
}
