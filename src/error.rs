//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Xoroute crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    /// The opcode byte of a datagram names no known operation.
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// The datagram is shorter than the fixed wire record.
    #[error("Message too short: {0} bytes")]
    TruncatedMessage(usize),
}
