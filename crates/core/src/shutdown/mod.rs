use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use crate::Result;

/// Cooperative cancellation flag shared by every long-running loop.
///
/// The flag only ever moves from `false` to `true`. Cloning the handle shares
/// the same underlying flag, so a clone can be moved into an interrupt handler
/// while this handle is polled by the loops.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

static GLOBAL: OnceLock<ShutdownSignal> = OnceLock::new();

impl ShutdownSignal {
    /// Creates an independent flag, initially not requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide signal.
    pub fn global() -> &'static ShutdownSignal {
        GLOBAL.get_or_init(ShutdownSignal::new)
    }

    /// Marks shutdown as requested. Repeated calls have no further effect.
    ///
    /// Safe to call from the interrupt handler thread: it neither allocates
    /// nor blocks.
    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns whether shutdown has been requested so far.
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Maps the operator's Ctrl+C onto [`ShutdownSignal::request_shutdown`].
    ///
    /// Only one handler can be installed per process; a second call fails
    /// with [`crate::LightControlError::Signal`].
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.request_shutdown())?;
        Ok(())
    }
}
