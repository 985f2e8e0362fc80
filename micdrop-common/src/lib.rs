//! # Micdrop Common Library
//!
//! Shared code for the Micdrop karaoke party server:
//! - Domain model (Song, Party, PartyStatus)
//! - Wire types (client message protocol, broadcast snapshots)
//! - ISO-8601 duration parsing
//! - Common error type

pub mod duration;
pub mod error;
pub mod model;
pub mod wire;

pub use error::{Error, Result};
pub use model::{Party, PartyStatus, Song};
