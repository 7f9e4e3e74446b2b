//! Server error types

use thiserror::Error;

use crate::dispatch::SocketId;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("callback for {address} failed: {message}")]
    Callback { address: String, message: String },

    #[error("unknown socket: {0}")]
    UnknownSocket(SocketId),

    #[error("only one default socket is allowed, {0} is already the default")]
    DuplicateDefaultSocket(SocketId),

    #[error("server is {0}")]
    State(String),

    #[error("core protocol error: {0}")]
    Core(#[from] osckit_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] osckit_transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
