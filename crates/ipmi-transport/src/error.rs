use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Startup failure; fatal, unlike everything else in this crate.
    #[error("failed to bind RMCP listener: {0}")]
    Bind(#[source] std::io::Error),

    /// No datagram arrived within the configured receive timeout. The
    /// dispatch loop uses this as its idle tick.
    #[error("receive timed out")]
    Timeout,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
