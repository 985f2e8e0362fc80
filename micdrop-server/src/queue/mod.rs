//! Queue ordering
//!
//! Pure functions that turn a party's flat song list into the play
//! order shown to guests. [`fairness`] interleaves singers round-robin;
//! [`assembler`] layers the pinned current song, priority boosts and
//! manual slots on top and shapes the result per party status.

pub mod assembler;
pub mod fairness;

pub use assembler::{assemble, AssembledQueue};
pub use fairness::round_robin;
