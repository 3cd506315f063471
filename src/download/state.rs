//! Transfer state and progress aggregation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Progress notification sent by transfer workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Bytes written since the previous event.
    Bytes(u64),
    /// A clip holds its full byte range.
    ClipDone(usize),
    /// The transfer restarted from byte zero.
    Restart,
}

/// Result of a successful track transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The destination already held the full resource; nothing was requested.
    AlreadyComplete,
    /// The destination was written, `bytes` of it fetched during this run.
    Downloaded { bytes: u64 },
}

impl Outcome {
    /// Bytes fetched over the network.
    pub fn transferred(&self) -> u64 {
        match self {
            Outcome::AlreadyComplete => 0,
            Outcome::Downloaded { bytes } => *bytes,
        }
    }
}

/// Sink for aggregate progress.
pub trait ProgressReporter: Send + Sync {
    fn set_length(&self, total: u64);
    fn set_position(&self, position: u64);
}

impl ProgressReporter for ProgressBar {
    fn set_length(&self, total: u64) {
        ProgressBar::set_length(self, total);
    }

    fn set_position(&self, position: u64) {
        ProgressBar::set_position(self, position);
    }
}

/// Reporter that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_length(&self, _total: u64) {}
    fn set_position(&self, _position: u64) {}
}

/// State of one track transfer.
///
/// Only the aggregator task writes the byte counter.
#[derive(Debug)]
pub struct TransferState {
    total: u64,
    downloaded: AtomicU64,
    clips_done: Vec<AtomicBool>,
}

impl TransferState {
    pub fn new(total: u64, clip_count: usize) -> Self {
        Self {
            total,
            downloaded: AtomicU64::new(0),
            clips_done: (0..clip_count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Expected size in bytes, 0 when unknown.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn is_clip_done(&self, index: usize) -> bool {
        self.clips_done
            .get(index)
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn completed_clips(&self) -> usize {
        self.clips_done
            .iter()
            .filter(|f| f.load(Ordering::SeqCst))
            .count()
    }

    fn apply(&self, event: ProgressEvent) -> u64 {
        match event {
            ProgressEvent::Bytes(n) => self.downloaded.fetch_add(n, Ordering::SeqCst) + n,
            ProgressEvent::ClipDone(index) => {
                if let Some(flag) = self.clips_done.get(index) {
                    flag.store(true, Ordering::SeqCst);
                }
                self.downloaded()
            }
            ProgressEvent::Restart => {
                self.downloaded.store(0, Ordering::SeqCst);
                0
            }
        }
    }
}

/// Sender half handed to workers.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Spawn the task that folds worker events into `state` and the reporter.
///
/// The task ends once every sender is dropped.
pub fn spawn_aggregator(
    state: Arc<TransferState>,
    reporter: Arc<dyn ProgressReporter>,
) -> (ProgressSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    if state.total() > 0 {
        reporter.set_length(state.total());
    }

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let position = state.apply(event);
            reporter.set_position(position);
        }
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        length: Mutex<Option<u64>>,
        positions: Mutex<Vec<u64>>,
    }

    impl ProgressReporter for Recorder {
        fn set_length(&self, total: u64) {
            *self.length.lock().unwrap() = Some(total);
        }

        fn set_position(&self, position: u64) {
            self.positions.lock().unwrap().push(position);
        }
    }

    #[tokio::test]
    async fn test_aggregator_accumulates() {
        let state = Arc::new(TransferState::new(100, 3));
        let recorder = Arc::new(Recorder::default());
        let (tx, handle) = spawn_aggregator(state.clone(), recorder.clone());

        let worker = tx.clone();
        tokio::spawn(async move {
            worker.send(ProgressEvent::Bytes(40)).unwrap();
            worker.send(ProgressEvent::ClipDone(2)).unwrap();
        })
        .await
        .unwrap();
        tx.send(ProgressEvent::Bytes(10)).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(state.downloaded(), 50);
        assert!(state.is_clip_done(2));
        assert!(!state.is_clip_done(0));
        assert!(!state.is_clip_done(7));
        assert_eq!(state.completed_clips(), 1);
        assert_eq!(*recorder.length.lock().unwrap(), Some(100));
        assert_eq!(recorder.positions.lock().unwrap().last(), Some(&50));
    }

    #[tokio::test]
    async fn test_restart_resets_counter() {
        let state = Arc::new(TransferState::new(0, 0));
        let (tx, handle) = spawn_aggregator(state.clone(), Arc::new(NoProgress));

        tx.send(ProgressEvent::Bytes(30)).unwrap();
        tx.send(ProgressEvent::Restart).unwrap();
        tx.send(ProgressEvent::Bytes(5)).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(state.downloaded(), 5);
    }

    #[test]
    fn test_outcome_transferred() {
        assert_eq!(Outcome::AlreadyComplete.transferred(), 0);
        assert_eq!(Outcome::Downloaded { bytes: 9 }.transferred(), 9);
    }
}
