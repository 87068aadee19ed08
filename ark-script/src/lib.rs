//! Leaf script codecs and taproot tree assembly for the Liquid-based pool covenant.
//!
//! This crate has no knowledge of the pool/forfeit protocol's data model or I/O — it only knows
//! how to compile, decompile, and finalize the three leaf script shapes, and how to assemble them
//! into the redeem tree and the shared-coin (pool) tree. See `ark-core` for everything above that
//! layer.

pub mod bip68;
pub mod csv;
pub mod error;
pub mod forfeit;
pub mod frozen_receiver;
pub mod taproot;

pub use error::Error;
pub use error::ErrorContext;
