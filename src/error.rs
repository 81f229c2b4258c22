use std::{error::Error, fmt, io};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, SteadyStateError>;

/// All errors that can occur while monitoring a training run.
#[derive(Debug)]
pub enum SteadyStateError {
    /// Invalid configuration, caught before any step executes.
    InvalidConfig(String),
    /// A required-samples estimate was requested without a parameter count.
    MissingParameterCount,
    /// No finite amount of samples reaches the target loss for this model size.
    UnreachableLoss { target_loss: f64, num_params: u64 },
    /// The required amount of samples does not fit in a `u64`.
    SampleCountOverflow { target_loss: f64, samples: f64 },
    /// A collective operation failed.
    Io(io::Error),
}

impl fmt::Display for SteadyStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::MissingParameterCount => f.write_str(
                "cannot calculate the number of samples without the number of model parameters",
            ),
            Self::UnreachableLoss {
                target_loss,
                num_params,
            } => write!(
                f,
                "target loss {target_loss} is unreachable for a model with {num_params} parameters"
            ),
            Self::SampleCountOverflow {
                target_loss,
                samples,
            } => write!(
                f,
                "target loss {target_loss} needs {samples:e} samples, more than can be counted"
            ),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for SteadyStateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SteadyStateError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SteadyStateError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<SteadyStateError> for io::Error {
    fn from(value: SteadyStateError) -> Self {
        match value {
            SteadyStateError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
