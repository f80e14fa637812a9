use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use crate::{Color, LightControlError, Result, ShutdownSignal};

use super::{ColorWriter, TargetId, TargetSink};

/// One color write observed by a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedColor {
    /// 1-based index of the lock acquisition the write happened under.
    pub batch: u64,
    pub id: TargetId,
    pub color: Color,
}

/// In-memory sink that records every write.
///
/// Can be told to fail a given batch or to raise a shutdown signal once a
/// number of writes has been seen, which makes it suitable for driving the
/// ramp deterministically.
#[derive(Debug, Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<AppliedColor>>,
    batches: AtomicU64,
    locked: AtomicBool,
    fail_on_batch: Option<u64>,
    shutdown_after: Option<(usize, ShutdownSignal)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `batch`-th lock acquisition (1-based) fail.
    pub fn fail_on_batch(mut self, batch: u64) -> Self {
        self.fail_on_batch = Some(batch);
        self
    }

    /// Requests shutdown on `signal` right after the `writes`-th write.
    pub fn request_shutdown_after(mut self, writes: usize, signal: ShutdownSignal) -> Self {
        self.shutdown_after = Some((writes, signal));
        self
    }

    pub fn applied(&self) -> Vec<AppliedColor> {
        self.lock_entries().map(|entries| entries.clone()).unwrap_or_default()
    }

    /// Number of successful lock acquisitions.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, Vec<AppliedColor>>> {
        self.applied
            .lock()
            .map_err(|_| LightControlError::sink("recording sink has been poisoned"))
    }
}

impl TargetSink for RecordingSink {
    type Writer<'a> = RecordingWriter<'a>;

    fn lock(&self) -> Result<RecordingWriter<'_>> {
        let attempt = self.batches.load(Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(attempt) {
            return Err(LightControlError::sink(format!(
                "lock refused for batch {attempt}"
            )));
        }
        let entries = self.lock_entries()?;
        self.batches.store(attempt, Ordering::SeqCst);
        self.locked.store(true, Ordering::SeqCst);
        Ok(RecordingWriter {
            sink: self,
            batch: attempt,
            entries,
        })
    }
}

/// Scoped writer of a [`RecordingSink`].
#[derive(Debug)]
pub struct RecordingWriter<'a> {
    sink: &'a RecordingSink,
    batch: u64,
    entries: MutexGuard<'a, Vec<AppliedColor>>,
}

impl ColorWriter for RecordingWriter<'_> {
    fn set_color(&mut self, id: TargetId, color: Color) -> Result<()> {
        self.entries.push(AppliedColor {
            batch: self.batch,
            id,
            color,
        });
        if let Some((writes, signal)) = &self.sink.shutdown_after {
            if self.entries.len() == *writes {
                signal.request_shutdown();
            }
        }
        Ok(())
    }
}

impl Drop for RecordingWriter<'_> {
    fn drop(&mut self) {
        self.sink.locked.store(false, Ordering::SeqCst);
    }
}
