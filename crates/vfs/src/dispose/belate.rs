//! Belate tokens: caller-held handles deferring a pending teardown.

use std::sync::Arc;

use super::coordinator::CoordinatorInner;
use super::error::DisposeError;

/// A handle whose holder defers the owning coordinator's teardown.
///
/// While any token is outstanding, a requested teardown waits. Releasing the
/// last outstanding token after a pending dispose request runs the teardown
/// pass on the releasing thread. The release is single-use: dropping an
/// already-released token does nothing, and dropping an unreleased token
/// releases it (a leaked token must not wedge a pending teardown forever).
#[must_use = "dropping the token releases it immediately"]
pub struct BelateToken {
    inner: Option<Arc<CoordinatorInner>>,
}

impl BelateToken {
    pub(crate) fn new(inner: Arc<CoordinatorInner>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Release the token.
    ///
    /// # Errors
    /// When this release triggers the teardown pass, failures from that pass
    /// are raised here as an aggregate.
    pub fn release(mut self) -> Result<(), DisposeError> {
        match self.inner.take() {
            Some(inner) => inner.release_belate(),
            None => Ok(()),
        }
    }
}

impl Drop for BelateToken {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(e) = inner.release_belate() {
                tracing::warn!("Teardown triggered by dropped belate token failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for BelateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BelateToken")
            .field("released", &self.inner.is_none())
            .finish()
    }
}
