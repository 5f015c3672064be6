use crate::body::BodyId;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engine and its ingestion/reporting helpers.
#[derive(Debug)]
pub enum Error {
    /// Method name outside the six supported schemes
    UnknownMethod(String),
    /// Boundary policy name outside none/kill/box
    UnknownBoundary(String),
    /// Two world snapshots compared with different body counts
    BodyCountMismatch { left: usize, right: usize },
    /// A body present in one snapshot is missing from the other
    MissingBody(BodyId),
    /// Fixed-point iteration of an implicit scheme hit its cap
    ImplicitNotConverged { method: &'static str, iterations: usize },
    /// Shrink loop drove the step length below the configured floor
    StepSizeUnderflow { h: f64, h_min: f64 },
    /// A committed state contained NaN or infinity
    NonFiniteState { time: f64 },
    DuplicateBody(BodyId),
    InvalidBody { id: BodyId, reason: String },
    /// Random scenario parameters that cannot produce a world
    InvalidScenario(String),
    Parse(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownMethod(name) => write!(f, "Method: unknown method '{}'", name),
            Error::UnknownBoundary(name) => write!(f, "Boundary: unknown policy '{}'", name),
            Error::BodyCountMismatch { left, right } => {
                write!(f, "Solver: body number does not match ({} vs {})", left, right)
            }
            Error::MissingBody(id) => write!(f, "Solver: body {} missing from snapshot", id),
            Error::ImplicitNotConverged { method, iterations } => write!(
                f,
                "{}: fixed-point iteration did not converge after {} iterations",
                method, iterations
            ),
            Error::StepSizeUnderflow { h, h_min } => {
                write!(f, "Step size {} fell below minimum {}", h, h_min)
            }
            Error::NonFiniteState { time } => {
                write!(f, "Non-finite state detected at t = {}", time)
            }
            Error::DuplicateBody(id) => write!(f, "World: duplicate body id {}", id),
            Error::InvalidBody { id, reason } => write!(f, "World: body {} is invalid: {}", id, reason),
            Error::InvalidScenario(message) => write!(f, "Scenario: {}", message),
            Error::Parse(message) => write!(f, "Parse error: {}", message),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Csv(err) => write!(f, "CSV error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Csv(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
