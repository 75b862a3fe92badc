//! Stop signalling and task ownership shared by every interface.
//!
//! An interface spawns its I/O tasks onto the node's runtime. Each task holds
//! a [`StopSignal`] and selects on [`StopSignal::stopped`] next to its I/O;
//! the interface keeps the join handles in its [`ShutdownToken`] so that
//! `stop()` can wait for the tasks to wind down.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Receiver half of an interface's stop signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested, immediately if it already was.
    pub async fn stopped(&mut self) {
        // the sender lives in the token; if it is gone the interface is gone
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Online flag, stop signal and background tasks of one interface.
pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    online: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            online: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.stop_tx.subscribe(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Keep a spawned task so [`join`](Self::join) can wait for it.
    pub async fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Request stop and mark the interface offline. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        self.set_online(false);
    }

    /// Wait for every tracked task. Panicked or cancelled tasks are ignored.
    pub async fn join(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_token_is_offline_and_running() {
        let token = ShutdownToken::new();
        assert!(!token.is_online());
        assert!(!token.is_stopped());
        assert!(!token.signal().is_stopped());
    }

    #[test]
    fn stop_goes_offline() {
        let token = ShutdownToken::new();
        token.set_online(true);
        token.stop();
        token.stop();
        assert!(!token.is_online());
        assert!(token.is_stopped());
    }

    #[tokio::test]
    async fn signal_taken_after_stop_resolves_immediately() {
        let token = ShutdownToken::new();
        token.stop();
        let mut signal = token.signal();
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("stopped() should resolve after stop");
    }

    #[tokio::test]
    async fn join_waits_for_tracked_tasks() {
        let token = ShutdownToken::new();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(4);
        for _ in 0..3 {
            let mut signal = token.signal();
            let done_tx = done_tx.clone();
            token
                .track(tokio::spawn(async move {
                    signal.stopped().await;
                    let _ = done_tx.send(()).await;
                }))
                .await;
        }
        drop(done_tx);

        token.stop();
        token.join().await;

        let mut finished = 0;
        while done_rx.recv().await.is_some() {
            finished += 1;
        }
        assert_eq!(finished, 3);
        assert!(token.tasks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn join_with_nothing_tracked() {
        let token = ShutdownToken::new();
        token.join().await;
    }
}
