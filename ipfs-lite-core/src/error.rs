use cid::Cid;

/// Boxed error from a datastore or exchange, propagated unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type shared by the block store, block service and DAG service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed CID, key, path or codec argument, or a node the codec cannot encode.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("block not found: {0}")]
    NotFound(Cid),
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
    #[error("cannot decode block {cid}: {message}")]
    Decode { cid: Cid, message: String },
    /// A path segment does not exist in the decoded node.
    #[error("no segment {segment:?} in path {path:?}")]
    Path { segment: String, path: String },
    /// Traversal reached a block it is already inside of.
    #[error("cyclic link to {0}")]
    CyclicLink(Cid),
    #[error("datastore error: {0}")]
    Datastore(#[source] BoxError),
    #[error("exchange error: {0}")]
    Exchange(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wraps any datastore error.
    pub fn datastore(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Datastore(Box::new(err))
    }

    /// Wraps any exchange error.
    pub fn exchange(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Exchange(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<cid::Error> for Error {
    fn from(err: cid::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
