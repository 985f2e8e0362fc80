//! Per-party session ownership
//!
//! Each live party is owned by exactly one actor task ([`actor`]); the
//! [`registry`] maps handles to running actors, spawning them on first
//! access and letting them remove themselves on expiry.

pub mod actor;
pub mod registry;

pub use actor::{OperatorAction, PartyClient};
pub use registry::PartyRegistry;
