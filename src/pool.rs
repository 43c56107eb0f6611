//! Thread pool and completion signalling for asynchronous enumeration.
//!
//! Directory enumeration advances requested against asynchronous handles are
//! submitted here; the calling thread gets `Pending` back immediately and
//! the host learns about completion through the event and completion-queue
//! mechanisms it supplied with the request.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::status::NtStatus;

/// Completion notice delivered to the host's completion queue, standing in
/// for an asynchronous procedure call on the submitting thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApcCompletion {
    /// Context value the host attached to the request.
    pub context: u64,
    /// Final status of the operation.
    pub status: NtStatus,
}

/// Host-supplied completion routine: a queue draining on the submitting
/// thread, plus the context value to echo back.
#[derive(Clone)]
pub struct ApcRoutine {
    pub queue: async_channel::Sender<ApcCompletion>,
    pub context: u64,
}

/// Everything the host asked to have signalled when an asynchronous
/// operation completes.
#[derive(Clone, Default)]
pub struct CompletionSignal {
    /// Signalled once when the operation completes.
    pub event: Option<Arc<Notify>>,
    /// Queued once when the operation completes.
    pub apc: Option<ApcRoutine>,
}

impl CompletionSignal {
    /// No completion signalling requested.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_event(event: Arc<Notify>) -> Self {
        Self { event: Some(event), apc: None }
    }

    pub fn with_apc(queue: async_channel::Sender<ApcCompletion>, context: u64) -> Self {
        Self { event: None, apc: Some(ApcRoutine { queue, context }) }
    }

    /// Fires every requested mechanism exactly once.
    pub fn signal(&self, status: NtStatus) {
        if let Some(event) = &self.event {
            event.notify_one();
        }
        if let Some(apc) = &self.apc {
            let _ = apc.queue.try_send(ApcCompletion { context: apc.context, status });
        }
    }
}

/// Wrapper around the runtime used to execute asynchronous enumeration
/// advances. Dropping the pool cancels work not yet started and lets
/// in-flight work finish.
pub struct ThreadPool {
    runtime: tokio::runtime::Runtime,
}

impl ThreadPool {
    /// Attempts to create a thread pool.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pathveer-worker")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    /// Submits a work item for execution on a pool thread.
    pub fn submit(&self, work: impl FnOnce() + Send + 'static) {
        self.runtime.spawn_blocking(work);
    }
}
