//! `CheckSequenceVerifyScript(ownerPubKeyX, timeoutBIP68)`:
//! `<timeoutBIP68> CSV DROP <ownerPubKeyX> CHECKSIG`
//!
//! Used both for the ASP's claim leaf (30-day) and the user's redeem-claim leaf (15-day).

use crate::Error;
use bitcoin::opcodes::all::OP_CHECKSIG;
use bitcoin::opcodes::all::OP_CSV;
use bitcoin::opcodes::all::OP_DROP;
use bitcoin::script::Instruction;
use bitcoin::ScriptBuf;
use bitcoin::Sequence;
use bitcoin::XOnlyPublicKey;

/// The decompiled fields of a [`compile`]d CSV-claim script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvScript {
    pub owner_pubkey: XOnlyPublicKey,
    pub timeout: Sequence,
}

pub fn compile(owner_pubkey: XOnlyPublicKey, timeout: Sequence) -> ScriptBuf {
    ScriptBuf::builder()
        .push_int(timeout.to_consensus_u32() as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_x_only_key(&owner_pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Strictly decompiles `script`, rejecting anything that isn't byte-for-byte the canonical
/// `<timeout> CSV DROP <pubkey> CHECKSIG` sequence.
pub fn decompile(script: &ScriptBuf) -> Result<CsvScript, Error> {
    let instructions: Vec<_> = script
        .instructions()
        .collect::<Result<_, _>>()
        .map_err(|e| Error::decompile(format!("malformed script: {e}")))?;

    let [timeout_push, csv, drop, pubkey_push, checksig] = instructions.as_slice() else {
        return Err(Error::decompile(format!(
            "expected 5 instructions, got {}",
            instructions.len()
        )));
    };

    let timeout = match timeout_push {
        Instruction::PushBytes(bytes) => {
            read_script_int(bytes.as_bytes()).ok_or_else(|| Error::decompile("bad timeout push"))?
        }
        Instruction::Op(op) => {
            read_opcode_int(*op).ok_or_else(|| Error::decompile("bad timeout opcode"))?
        }
    };

    if !matches!(csv, Instruction::Op(op) if *op == OP_CSV) {
        return Err(Error::decompile("expected OP_CSV"));
    }
    if !matches!(drop, Instruction::Op(op) if *op == OP_DROP) {
        return Err(Error::decompile("expected OP_DROP"));
    }

    let owner_pubkey = match pubkey_push {
        Instruction::PushBytes(bytes) if bytes.len() == 32 => {
            XOnlyPublicKey::from_slice(bytes.as_bytes())?
        }
        _ => return Err(Error::decompile("expected a 32-byte pubkey push")),
    };

    if !matches!(checksig, Instruction::Op(op) if *op == OP_CHECKSIG) {
        return Err(Error::decompile("expected OP_CHECKSIG"));
    }

    let timeout = Sequence::from_consensus(timeout as u32);

    // Reject anything whose canonical re-encoding doesn't match byte-for-byte.
    if compile(owner_pubkey, timeout) != *script {
        return Err(Error::decompile("non-canonical encoding"));
    }

    Ok(CsvScript {
        owner_pubkey,
        timeout,
    })
}

fn read_script_int(bytes: &[u8]) -> Option<i64> {
    if bytes.len() > 4 {
        return None;
    }
    let mut buf = [0u8; 4];
    buf[..bytes.len()].copy_from_slice(bytes);
    let negative = bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false);
    if negative {
        return None;
    }
    Some(i64::from(u32::from_le_bytes(buf)))
}

fn read_opcode_int(op: bitcoin::opcodes::Opcode) -> Option<i64> {
    let byte = op.to_u8();
    match byte {
        0x51..=0x60 => Some(i64::from(byte - 0x50)),
        0x00 => Some(0),
        _ => None,
    }
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
        let timeout = crate::bip68::from_seconds(1024).unwrap();

        let script = compile(pk, timeout);
        let decoded = decompile(&script).unwrap();

        assert_eq!(decoded.owner_pubkey, pk);
        assert_eq!(decoded.timeout, timeout);
        assert_eq!(compile(decoded.owner_pubkey, decoded.timeout), script);
    }

    #[test]
    fn rejects_tampered_key() {
        let pk = test_pubkey();
        let timeout = crate::bip68::from_seconds(1024).unwrap();
        let mut script = compile(pk, timeout).into_bytes();

        // Flip a byte inside the pushed pubkey.
        let len = script.len();
        script[len - 34] ^= 0xff;

        let script = ScriptBuf::from_bytes(script);
        assert!(decompile(&script).is_err());
    }
}
