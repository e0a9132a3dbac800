//! Error types for the realtime layer.

/// Errors that can occur on a connection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The connection is no longer live.
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue is full. The connection is considered dead and
    /// its disconnect has been scheduled.
    #[error("outbound queue full")]
    QueueFull,

    /// The hub inbox rejected an event (full or shut down).
    #[error("hub unavailable")]
    HubUnavailable,
}
