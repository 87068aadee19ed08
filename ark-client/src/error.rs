use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("core: {0}")]
    Core(#[from] ark_core::Error),

    #[error("script: {0}")]
    Script(#[from] ark_script::Error),

    /// A `send()` call's forfeit-message signature failed to verify. Rejects only that caller;
    /// the pending pool is untouched.
    #[error("signature: {0}")]
    Signature(String),

    /// No pending pool is open for the promised txid a caller referenced.
    #[error("no pending pool for promised txid {0}")]
    UnknownPendingPool(elements::Txid),

    /// The watcher has no stored forfeit entry for a redeem script it observed on chain.
    #[error("missing forfeit entry for observed redeem script")]
    MissingForfeit,

    /// The watcher cannot forfeit because the promised pool has no connectors left.
    #[error("insufficient connectors for pool {0}")]
    InsufficientConnectors(elements::Txid),

    /// A chain-source RPC failure other than a transient `missingtransaction`, which is retried
    /// internally instead of surfacing here.
    #[error("chain: {0}")]
    Chain(String),

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
    pub fn signature(msg: impl fmt::Display) -> Self {
        Error::Signature(msg.to_string())
    }

    pub fn unknown_pending_pool(txid: elements::Txid) -> Self {
        Error::UnknownPendingPool(txid)
    }

    pub fn insufficient_connectors(txid: elements::Txid) -> Self {
        Error::InsufficientConnectors(txid)
    }

    pub fn chain(msg: impl fmt::Display) -> Self {
        Error::Chain(msg.to_string())
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
