//! Collapses bursts of input into a single settled value.
//!
//! Each call to [`Debouncer::emit`] replaces whatever value is pending and pushes the
//! deadline out to `now + delay`. The worker forwards the pending value once its
//! deadline passes without a newer call; everything in between is discarded.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;

#[derive(Debug)]
struct Pending<T> {
    value: T,
    issued_at: Instant,
    deadline: Instant,
}

#[derive(Debug)]
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<Pending<T>>,
    delay: Duration,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Starts the worker task. Settled values arrive on the returned receiver.
    pub fn spawn(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (input, raw_rx) = mpsc::unbounded_channel();
        let (output, settled_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(raw_rx, output));
        (Self { input, delay }, settled_rx)
    }

    pub fn emit(&self, value: T) {
        self.emit_after(value, self.delay);
    }

    pub fn emit_after(&self, value: T, delay: Duration) {
        let issued_at = Instant::now();
        let pending = Pending {
            value,
            issued_at,
            deadline: issued_at + delay,
        };
        if self.input.send(pending).is_err() {
            debug!("Debouncer worker has stopped; dropping input");
        }
    }
}

async fn run<T>(
    mut raw_rx: mpsc::UnboundedReceiver<Pending<T>>,
    output: mpsc::UnboundedSender<T>,
) {
    let mut pending: Option<Pending<T>> = None;

    loop {
        let next = match pending.as_ref().map(|p| p.deadline) {
            None => raw_rx.recv().await,
            Some(deadline) => match timeout_at(deadline, raw_rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    if let Some(settled) = pending.take() {
                        if output.send(settled.value).is_err() {
                            return;
                        }
                    }
                    continue;
                }
            },
        };

        match next {
            Some(p) => {
                // A late-polled worker can see the next call before the previous
                // deadline fires; a value whose deadline passed before that call settled.
                if let Some(settled) = pending.take().filter(|old| old.deadline <= p.issued_at) {
                    if output.send(settled.value).is_err() {
                        return;
                    }
                }
                pending = Some(p);
            }
            None => {
                // Input closed: the last value of the burst is still owed downstream.
                if let Some(last) = pending.take() {
                    sleep_until(last.deadline).await;
                    let _ = output.send(last.value);
                }
                return;
            }
        }
    }
}
