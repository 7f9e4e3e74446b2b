//! osckit server
//!
//! Address dispatch, a multi-socket UDP server and a client for Open Sound
//! Control.
//!
//! Callbacks are bound per socket, either to literal addresses or, with
//! [`ServerConfig::advanced_matching`], to address patterns such as
//! `/synth/*/freq`. Each callback gets a [`Request`] carrying the values, the
//! sender and a way to answer it.

pub mod callback;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod meta;
pub mod server;

pub use callback::{Callback, Replier, Request};
pub use client::{send_bundle, send_message, OscClient};
pub use config::ServerConfig;
pub use dispatch::{dispatch, CallbackEntry, CallbackGroup, DispatchTable, SocketId};
pub use error::{Result, ServerError};
pub use server::{OscServer, Route, ServerState};
