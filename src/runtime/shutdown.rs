//! Cooperative shutdown signalling
//!
//! A single token is cloned into every polling loop. Loops finish their
//! current iteration and exit when it fires; nothing is aborted mid-step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Clone-friendly shutdown token
#[derive(Clone)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
            let _ = self.tx.send(true);
        }
    }

    /// Fast check used inside loop bodies
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        // Sender lives inside self, so changed() only errs after trigger
        let _ = rx.changed().await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
