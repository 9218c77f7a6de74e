/// Failure kinds of the simulation core.
///
/// The battery primitives and the aggregators never fail; everything else
/// reports one of these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Out-of-range input, rejected when a configuration is built.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A price or forecast value is absent for a required period.
    #[error("missing data: {0}")]
    MissingData(String),

    /// The LP solver reported a non-optimal outcome.
    #[error("solver: {0}")]
    Solver(String),

    /// Cooperative cancellation between checkpoints.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
