use thiserror::Error;

/// BMC server errors.
///
/// Everything except [`Error::Transport`] bind failures is packet-scoped:
/// the dispatch loop logs it, notifies the observer, drops the packet, and
/// keeps serving.
#[derive(Debug, Error)]
pub enum Error {
    #[error("message error: {0}")]
    Message(#[from] ipmi_msg::IpmiMsgError),

    #[error("transport error: {0}")]
    Transport(#[from] ipmi_transport::TransportError),

    #[error("integrity check failed")]
    IntegrityMismatch,

    #[error("confidentiality layer malformed")]
    BadCiphertext,

    #[error("stale session sequence number {got} (floor {floor})")]
    StaleSequence { got: u32, floor: u32 },

    #[error("session is not in a state to accept this payload")]
    WrongState,
}
