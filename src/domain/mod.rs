//! Domain layer public interface.
//!
//! This module defines the channel abstraction the client and server are
//! written against. It is independent of any concrete transport.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod channel;

pub use channel::{
    //
    Channel,
    ChannelPtr,
    Listener,
};
