//! # agora-shared
//!
//! Types shared between the Agora server and its clients: typed
//! identifiers, the JSON wire protocol spoken over the WebSocket, media
//! classification, and configuration constants.

pub mod constants;
pub mod error;
pub mod media;
pub mod protocol;
pub mod types;
