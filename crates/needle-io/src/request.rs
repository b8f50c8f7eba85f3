//! Asynchronous completion protocol for pipelined needle writes and reads.
//!
//! The write path builds an [`AsyncRequest`], hands it to whatever worker
//! performs the I/O, and later blocks in [`AsyncRequest::wait_complete`].
//! The worker finishes the request exactly once, either with
//! [`complete`](AsyncRequest::complete) or, after staging results with
//! [`update_result`](AsyncRequest::update_result), with
//! [`submit`](AsyncRequest::submit).
//!
//! A second completion attempt is rejected with
//! [`CompletionError::AlreadyCompleted`] and logged at `error`; the first
//! result stays in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use needle_types::Needle;

use crate::StorageError;

/// Whether a request writes or reads its needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Write,
    Read,
}

/// Outcome fields of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestResult {
    pub offset: u64,
    pub size: u64,
    /// The write was skipped because the stored needle was identical.
    pub unchanged: bool,
    pub error: Option<Arc<StorageError>>,
}

impl RequestResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Misuse of the completion protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("request already completed")]
    AlreadyCompleted,
}

#[derive(Debug, Default)]
struct Slot {
    result: RequestResult,
    completed: bool,
}

/// Single-assignment future pairing a needle with its I/O result.
///
/// Any number of threads may wait; all of them observe the same result.
#[derive(Debug)]
pub struct AsyncRequest {
    needle: Needle,
    kind: RequestKind,
    actual_size: AtomicU64,
    slot: Mutex<Slot>,
    done: Condvar,
}

impl AsyncRequest {
    pub fn new(needle: Needle, kind: RequestKind) -> Self {
        Self {
            needle,
            kind,
            actual_size: AtomicU64::new(0),
            slot: Mutex::new(Slot::default()),
            done: Condvar::new(),
        }
    }

    pub fn write(needle: Needle) -> Self {
        Self::new(needle, RequestKind::Write)
    }

    pub fn read(needle: Needle) -> Self {
        Self::new(needle, RequestKind::Read)
    }

    pub fn needle(&self) -> &Needle {
        &self.needle
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn is_write(&self) -> bool {
        self.kind == RequestKind::Write
    }

    /// Size of the needle as laid out on disk, set by the worker.
    pub fn actual_size(&self) -> u64 {
        self.actual_size.load(Ordering::Acquire)
    }

    pub fn set_actual_size(&self, size: u64) {
        self.actual_size.store(size, Ordering::Release);
    }

    /// Blocks until the request completes, then returns its result.
    ///
    /// There is no timeout.
    pub fn wait_complete(&self) -> RequestResult {
        let mut slot = self.slot();
        while !slot.completed {
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot.result.clone()
    }

    /// Sets every result field and fires completion.
    pub fn complete(
        &self,
        offset: u64,
        size: u64,
        unchanged: bool,
        error: Option<StorageError>,
    ) -> Result<(), CompletionError> {
        let mut slot = self.open_slot("complete")?;
        slot.result = RequestResult {
            offset,
            size,
            unchanged,
            error: error.map(Arc::new),
        };
        slot.completed = true;
        drop(slot);
        self.done.notify_all();
        Ok(())
    }

    /// Stages result fields without firing completion.
    pub fn update_result(
        &self,
        offset: u64,
        size: u64,
        unchanged: bool,
        error: Option<StorageError>,
    ) -> Result<(), CompletionError> {
        let mut slot = self.open_slot("update_result")?;
        slot.result = RequestResult {
            offset,
            size,
            unchanged,
            error: error.map(Arc::new),
        };
        Ok(())
    }

    /// Fires completion with whatever results are currently staged.
    pub fn submit(&self) -> Result<(), CompletionError> {
        let mut slot = self.open_slot("submit")?;
        slot.completed = true;
        drop(slot);
        self.done.notify_all();
        Ok(())
    }

    /// True if the stored result carries no error.
    pub fn is_succeed(&self) -> bool {
        self.slot().result.is_success()
    }

    pub fn is_completed(&self) -> bool {
        self.slot().completed
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_slot(&self, op: &'static str) -> Result<MutexGuard<'_, Slot>, CompletionError> {
        let slot = self.slot();
        if slot.completed {
            tracing::error!(
                op,
                needle = %self.needle.id,
                kind = ?self.kind,
                "request already completed"
            );
            return Err(CompletionError::AlreadyCompleted);
        }
        Ok(slot)
    }
}
