// EventDispatcher - Carries job results from worker threads to the interface thread
//
// Worker threads never touch the presenter. They finish their state updates,
// then push a JobEvent into this channel; the interface thread drains it in
// InterfaceCoordinator::dispatch_signals. The channel send/receive pair is the
// happens-before edge between the worker's writes and the interface's reads.

use crate::manager::JobEvent;
use tokio::sync::mpsc;

/// Receiving end, owned by the interface thread
///
/// # Example
/// ```ignore
/// let mut dispatcher = EventDispatcher::new();
/// let handle = dispatcher.clone_handle();
///
/// std::thread::spawn(move || {
///     handle.send(JobEvent::JobFinished { kind: JobKind::Refresh, result: Ok("done".into()) });
/// });
///
/// let event = dispatcher.next_blocking();
/// ```
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<JobEvent>,
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handle for worker threads
    pub fn clone_handle(&self) -> DispatchHandle {
        DispatchHandle { tx: self.tx.clone() }
    }

    /// Next pending event without blocking
    pub fn try_next(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until an event arrives.
    ///
    /// Must not be called from inside the tokio runtime. The dispatcher keeps
    /// its own sender alive, so this waits forever if no worker ever sends.
    pub fn next_blocking(&mut self) -> Option<JobEvent> {
        self.rx.blocking_recv()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending end, cloned into every worker thread
#[derive(Clone, Debug)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl DispatchHandle {
    /// Queue an event for the interface thread.
    ///
    /// A closed channel means the interface has shut down; the event is dropped.
    pub fn send(&self, event: JobEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("Interface is gone, dropping event {:?}", e.0);
        }
    }
}
