use tern_runtime::Panic;
use thiserror::Error;

/// Why a [`crate::Scheduler::block_on`] run ended without a result.
#[derive(Debug, Error)]
pub enum VmError {
    /// The main activation exited with an unrecovered fault.
    #[error(transparent)]
    Panicked(Panic),

    #[error("{panic}\n\ngoroutine {id} [running]")]
    GoroutinePanicked { id: u64, panic: Panic },

    #[error("{0}")]
    Deadlock(String),

    #[error("block_on called while a scheduler is already running on this thread")]
    NestedRun,
}

impl VmError {
    /// The fault that ended the run, if any.
    pub fn panic(&self) -> Option<&Panic> {
        match self {
            Self::Panicked(p) | Self::GoroutinePanicked { panic: p, .. } => Some(p),
            Self::Deadlock(_) | Self::NestedRun => None,
        }
    }

    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::Deadlock(_))
    }
}
