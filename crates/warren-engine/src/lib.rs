//! warren-engine: the turn loop and save-file layer on top of
//! [`warren_kernel`].
//!
//! The kernel owns components, scheduling, behaviors, and events; this crate
//! owns the clock. A [`turn::TurnLoop`] holds a store and stash, runs rule
//! systems for the actors whose turn has arrived, and dispatches events each
//! tick. [`snapshot::TurnSnapshot`] saves and restores the whole engine with
//! a content hash for integrity and divergence checks.

pub mod snapshot;
pub mod turn;

pub use warren_kernel;

use thiserror::Error;

/// Errors from the engine layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Kernel(#[from] warren_kernel::KernelError),

    /// A save file's content hash did not verify.
    #[error("snapshot hash mismatch: expected {expected}, found {found}")]
    SnapshotHashMismatch { expected: String, found: String },
}

/// Install the process-wide tracing subscriber, honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Convenient glob import for engine users, including the kernel prelude.
pub mod prelude {
    pub use crate::snapshot::TurnSnapshot;
    pub use crate::turn::{TurnConfig, TurnContext, TurnLoop, TurnReport};
    pub use crate::{init_tracing, EngineError};
    pub use warren_kernel::prelude::*;
}
