use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] distorage_p2p::TransportError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
