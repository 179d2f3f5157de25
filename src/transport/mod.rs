//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Channel` trait, exposed only through constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod fanout;
mod memory;
mod stream;

pub use memory::memory_pair;
pub use stream::stream_channel;
