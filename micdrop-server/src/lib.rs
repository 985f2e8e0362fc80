//! Micdrop Party Server library
//!
//! Runs durable karaoke party queues: guests submit songs over HTTP,
//! every connected screen receives the assembled queue over SSE, and
//! the rotation order keeps singers taking fair turns.
//!
//! Each party is owned by a single actor task ([`party::PartyActor`])
//! that serializes all reads and writes, persists to SQLite before
//! acknowledging, and broadcasts a fresh snapshot after every change.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod party;
pub mod queue;

pub use error::ApiError;
