//! Coordinated teardown of dependent resources.
//!
//! Resources that own children register them with a [`DisposalCoordinator`];
//! disposing the coordinator cascades to every attached child exactly once,
//! aggregating individual failures. [`BelateToken`]s let callers hold off a
//! pending teardown until a critical section completes.

pub mod belate;
pub mod coordinator;
pub mod error;

pub use belate::BelateToken;
pub use coordinator::{ChildId, DisposalCoordinator, DisposeState};
pub use error::{AggregateDisposeError, DisposeError};

/// A resource that can be torn down through a coordinator cascade.
pub trait Disposable: Send + Sync {
    /// Tear the resource down.
    ///
    /// Implementations must tolerate repeated calls: the second and later
    /// calls return `Ok(())` without running teardown again.
    fn dispose(&self) -> Result<(), DisposeError>;
}
