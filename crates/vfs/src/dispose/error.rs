//! Error types for teardown coordination.

use thiserror::Error;

/// Errors raised while coordinating resource teardown.
#[derive(Debug, Error)]
pub enum DisposeError {
    /// Operation attempted after teardown has begun or completed.
    #[error("Resource already disposed")]
    AlreadyDisposed,

    /// The resource-specific teardown hook failed.
    #[error("Teardown hook failed: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// One or more failures captured during a cascading teardown.
    ///
    /// A failing child never blocks teardown of its siblings; every failure
    /// is captured and raised once, bundled, from the call that triggered
    /// teardown.
    #[error("{0}")]
    Aggregate(AggregateDisposeError),
}

impl DisposeError {
    /// Wrap an arbitrary error as a hook failure.
    pub fn hook(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        DisposeError::Hook(Box::new(source))
    }

    /// Bundle captured errors into a single aggregate.
    ///
    /// # Arguments
    /// * `errors` - Failures captured during one teardown pass (non-empty)
    pub fn aggregate(errors: Vec<DisposeError>) -> Self {
        DisposeError::Aggregate(AggregateDisposeError { errors })
    }
}

/// Bundle of every error raised during one teardown pass.
#[derive(Debug)]
pub struct AggregateDisposeError {
    errors: Vec<DisposeError>,
}

impl AggregateDisposeError {
    /// The captured errors, in teardown order.
    pub fn errors(&self) -> &[DisposeError] {
        &self.errors
    }

    /// Number of captured errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when no errors were captured. Never the case for a raised
    /// aggregate.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for AggregateDisposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s) during teardown:", self.errors.len())?;
        for error in &self.errors {
            write!(f, " [{}]", error)?;
        }
        Ok(())
    }
}
