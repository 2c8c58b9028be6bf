//! Run-wide cancellation signal.

use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cloneable handle shared by the caller (Ctrl-C, deadline) and the pipeline.
/// Once tripped it stays tripped.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Safe to call from any thread, including a signal handler.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives in `self`, so this is unreachable in practice
            std::future::pending::<()>().await;
        }
    }

    /// Trip the handle after `deadline` unless the run finishes first.
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if !handle.is_cancelled() {
                debug!("Run deadline of {:?} reached", deadline);
                handle.cancel();
            }
        })
    }
}

/// Items gathered by a stage, and whether cancellation cut it short
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<T> {
    pub items: Vec<T>,
    pub interrupted: bool,
}

impl<T> Partial<T> {
    pub fn interrupted() -> Self {
        Self { items: Vec::new(), interrupted: true }
    }
}

/// Drain `stream` until it ends or `cancel` trips. Items already yielded are
/// kept; futures still in flight inside the stream are dropped.
pub async fn collect_until_cancelled<S>(stream: S, cancel: &CancelHandle) -> Partial<S::Item>
where
    S: Stream,
{
    futures::pin_mut!(stream);
    let mut items = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Partial { items, interrupted: true },
            next = stream.next() => match next {
                Some(item) => items.push(item),
                None => return Partial { items, interrupted: false },
            },
        }
    }
}

/// Run `fut` unless `cancel` trips first.
pub async fn unless_cancelled<F: Future>(fut: F, cancel: &CancelHandle) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
