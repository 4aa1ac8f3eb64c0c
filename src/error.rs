use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpMidiError {
    #[error("{parameter} must be between {min} and {max}, but was {value}")]
    OutOfRange {
        parameter: &'static str,
        min: i32,
        max: i32,
        value: i32,
    },
    #[error("Invalid argument `{parameter}`: {reason}")]
    InvalidArgument { parameter: &'static str, reason: &'static str },
    #[error("Receiver is already listening")]
    AlreadyListening,
    #[error("Receiver has been disposed")]
    Disposed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IpMidiError>;
