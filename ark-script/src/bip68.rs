//! BIP-68 relative-locktime encoding for the time-based (512-second-interval) flavour used by
//! every leaf in this protocol.

use crate::Error;
use bitcoin::Sequence;

/// The BIP-68 flag selecting the time-based (rather than block-based) interpretation of the
/// low 16 bits.
const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Encodes `seconds` as a BIP-68 relative locktime [`Sequence`].
///
/// Defined only when `seconds` is an exact multiple of 512 and the resulting interval count fits
/// in 16 bits. Callers with an arbitrary duration (e.g. a day count that isn't a clean multiple
/// of 512 seconds) should round up with [`from_seconds_ceil`] first.
pub fn from_seconds(seconds: u32) -> Result<Sequence, Error> {
    if seconds % 512 != 0 {
        return Err(Error::bip68(format!(
            "{seconds} seconds is not a multiple of 512"
        )));
    }

    let intervals = seconds / 512;
    if intervals > 0xFFFF {
        return Err(Error::bip68(format!(
            "{seconds} seconds exceeds the maximum representable relative timelock"
        )));
    }

    Ok(Sequence::from_consensus(
        SEQUENCE_LOCKTIME_TYPE_FLAG | intervals,
    ))
}

/// Rounds `seconds` up to the nearest representable 512-second interval, then encodes it.
pub fn from_seconds_ceil(seconds: u32) -> Result<Sequence, Error> {
    let rounded = seconds.div_ceil(512) * 512;
    from_seconds(rounded)
}

/// Decodes a BIP-68 time-based [`Sequence`] back into seconds.
pub fn to_seconds(sequence: Sequence) -> Result<u32, Error> {
    let raw = sequence.to_consensus_u32();

    if raw & SEQUENCE_LOCKTIME_TYPE_FLAG == 0 {
        return Err(Error::bip68("sequence is not time-based"));
    }

    let intervals = raw & 0xFFFF;
    Ok(intervals * 512)
}
