//! Realtime layer for easel: per-client connections and the central hub.
//!
//! A [`Connection`] owns one WebSocket: a read pump that decodes frames
//! and forwards them to the hub, and a write pump that drains a bounded
//! outbound queue. The [`Hub`] is a single event-loop task that owns the
//! connection indexes and performs all fan-out; everything reaches it
//! through a bounded inbox with non-blocking sends, so a slow consumer
//! can stall nothing but itself.

#![allow(async_fn_in_trait)]

mod connection;
mod error;
mod hub;

pub use connection::{frame, Connection, ConnectionId, Frame, Liveness, SharedConnection};
pub use error::HubError;
pub use hub::{
    Exclusion, Hub, HubEvent, HubHandle, HubStats, InboundHandler, InboundMessage,
};
