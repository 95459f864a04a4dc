use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor driver")]
    MissingMotors,
    #[error("missing sensor bank")]
    MissingSensors,
    #[error("missing status leds")]
    MissingLeds,
    #[error("missing storage")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
