/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transfer lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEventKind {
    /// The transfer is about to start
    Started,
    /// Bytes were transferred
    Data,
    /// The transfer finished successfully
    Completed,
    /// The transfer failed
    Failed,
}

/// A progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Lifecycle stage
    pub kind: ProgressEventKind,
    /// Bytes transferred so far
    pub consumed_bytes: u64,
    /// Total bytes to transfer, when known
    pub total_bytes: Option<u64>,
    /// Bytes transferred since the previous event
    pub rw_bytes: u64,
}

impl ProgressEvent {
    pub(crate) fn new(
        kind: ProgressEventKind,
        consumed_bytes: u64,
        total_bytes: Option<u64>,
        rw_bytes: u64,
    ) -> Self {
        Self {
            kind,
            consumed_bytes,
            total_bytes,
            rw_bytes,
        }
    }
}

/// Observer of transfer progress.
///
/// Every transfer reports exactly one [`Started`](ProgressEventKind::Started) event followed by
/// any number of [`Data`](ProgressEventKind::Data) events and exactly one of
/// [`Completed`](ProgressEventKind::Completed) or [`Failed`](ProgressEventKind::Failed).
pub trait ProgressListener: Send + Sync + fmt::Debug {
    /// Called for every progress event, on the task driving the transfer
    fn on_event(&self, event: &ProgressEvent);
}

/// Shared, type erased progress listener
pub type SharedProgressListener = Arc<dyn ProgressListener>;

/// Adapter turning a closure into a [`ProgressListener`]
pub struct ProgressFn<F>(pub F);

impl<F> fmt::Debug for ProgressFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressFn").finish_non_exhaustive()
    }
}

impl<F> ProgressListener for ProgressFn<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

pub(crate) fn publish(listener: Option<&SharedProgressListener>, event: ProgressEvent) {
    if let Some(listener) = listener {
        listener.on_event(&event);
    }
}

/// Number of bytes a body adapter has forwarded so far
#[derive(Debug, Clone, Default)]
pub(crate) struct ByteTracker(Arc<AtomicU64>);

impl ByteTracker {
    pub(crate) fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::AcqRel) + n
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::{publish, ByteTracker, ProgressEvent, ProgressEventKind, ProgressFn, SharedProgressListener};

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: SharedProgressListener = Arc::new(ProgressFn(move |e: &ProgressEvent| {
            sink.lock().unwrap().push(e.kind);
        }));

        publish(
            Some(&listener),
            ProgressEvent::new(ProgressEventKind::Started, 0, Some(3), 0),
        );
        publish(None, ProgressEvent::new(ProgressEventKind::Data, 1, Some(3), 1));
        publish(
            Some(&listener),
            ProgressEvent::new(ProgressEventKind::Completed, 3, Some(3), 0),
        );
        assert_eq!(
            vec![ProgressEventKind::Started, ProgressEventKind::Completed],
            *seen.lock().unwrap()
        );
    }

    #[test]
    fn test_tracker() {
        let tracker = ByteTracker::default();
        assert_eq!(4, tracker.clone().add(4));
        assert_eq!(10, tracker.add(6));
        assert_eq!(10, tracker.get());
    }
}
