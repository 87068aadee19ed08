use std::fmt;

/// The crate-wide error type. Each variant corresponds to one of the error kinds named in the
/// design (`ValidationError`, `SignatureError`, `InsufficientConnectors`, `ChainError`,
/// `CoinSelectionError`), plus a couple of escape hatches for lower-level failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed script, mismatched keys, invalid vUTXO tree, invalid BIP-68 encoding,
    /// confidential asset/value, amount out of range. Always fatal for the affected operation.
    #[error("validation: {0}")]
    Validation(String),

    /// A Schnorr signature over a forfeit message failed to verify.
    #[error("signature: {0}")]
    Signature(String),

    /// The watcher cannot forfeit because the promised pool has no connectors left.
    #[error("insufficient connectors for pool {pool_txid}")]
    InsufficientConnectors { pool_txid: elements::Txid },

    /// A chain-source RPC failure that isn't `missingtransaction` (which is retried by the
    /// caller instead of surfacing here).
    #[error("chain: {0}")]
    Chain(String),

    /// The wallet could not cover the amount required by the triggering request.
    #[error("coin selection: {0}")]
    CoinSelect(String),

    #[error("script: {0}")]
    Script(#[from] ark_script::Error),

    #[error("crypto: {0}")]
    Crypto(#[from] bitcoin::secp256k1::Error),

    #[error("transaction: {0}")]
    Transaction(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    AdHoc(String),
}

impl Error {
    pub fn validation(msg: impl fmt::Display) -> Self {
        Error::Validation(msg.to_string())
    }

    pub fn signature(msg: impl fmt::Display) -> Self {
        Error::Signature(msg.to_string())
    }

    pub fn insufficient_connectors(pool_txid: elements::Txid) -> Self {
        Error::InsufficientConnectors { pool_txid }
    }

    pub fn chain(msg: impl fmt::Display) -> Self {
        Error::Chain(msg.to_string())
    }

    pub fn coin_select(msg: impl fmt::Display) -> Self {
        Error::CoinSelect(msg.to_string())
    }

    pub fn transaction(msg: impl fmt::Display) -> Self {
        Error::Transaction(msg.to_string())
    }

    pub fn ad_hoc(msg: impl fmt::Display) -> Self {
        Error::AdHoc(msg.to_string())
    }
}

pub trait ErrorContext<T> {
    fn context(self, context: impl fmt::Display) -> Result<T, Error>;
    fn with_context<F, D>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> D,
        D: fmt::Display;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl fmt::Display) -> Result<T, Error> {
        self.map_err(|e| Error::Context {
            context: context.to_string(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F, D>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> D,
        D: fmt::Display,
    {
        self.map_err(|e| Error::Context {
            context: f().to_string(),
            source: Box::new(e.into()),
        })
    }
}
