use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("script decompile failed: {0}")]
    Decompile(String),
    #[error("invalid BIP-68 relative locktime: {0}")]
    Bip68(String),
    #[error("crypto: {0}")]
    Crypto(#[from] bitcoin::secp256k1::Error),
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
    pub fn decompile(msg: impl fmt::Display) -> Self {
        Error::Decompile(msg.to_string())
    }

    pub fn bip68(msg: impl fmt::Display) -> Self {
        Error::Bip68(msg.to_string())
    }

    pub fn ad_hoc(msg: impl fmt::Display) -> Self {
        Error::AdHoc(msg.to_string())
    }
}

/// Adds `.context(...)` to any `Result` whose error converts into [`Error`].
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
