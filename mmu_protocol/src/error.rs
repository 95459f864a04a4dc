use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame shorter than the fixed header region it claims to carry.
    #[error("frame too short: {got} bytes, need at least {need}")]
    FrameTooShort { got: usize, need: usize },
    /// Destination buffer cannot hold the serialized frame.
    #[error("output buffer too small: {got} bytes, need {need}")]
    BufferTooSmall { got: usize, need: usize },
    /// Payload would push the long-frame length field past u16.
    #[error("payload too long: {0} bytes")]
    PayloadTooLong(usize),
}
