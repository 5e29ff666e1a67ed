//! Coalescing writer for values that change faster than they need saving.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put(String),
    Remove,
}

enum Command {
    Schedule(String),
    Discard,
    Flush(oneshot::Sender<()>),
}

/// Holds the latest scheduled value and hands it to the sink once no newer
/// value has arrived for one window. A single task owns the sink, so writes
/// reach it in order.
#[derive(Clone)]
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl DebouncedWriter {
    /// Must be called inside a tokio runtime.
    pub fn spawn<F>(window: Duration, sink: F) -> Self
    where
        F: Fn(WriteOp) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(window, rx, sink));
        Self { tx }
    }

    pub fn schedule(&self, value: String) {
        self.send(Command::Schedule(value));
    }

    /// Drops any pending value and asks the sink to remove what it holds.
    pub fn discard(&self) {
        self.send(Command::Discard);
    }

    /// Writes the pending value now and waits until the sink has run.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Command::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("debounced writer already stopped");
        }
    }
}

async fn run<F>(window: Duration, mut rx: mpsc::UnboundedReceiver<Command>, sink: F)
where
    F: Fn(WriteOp),
{
    let mut pending: Option<String> = None;
    loop {
        let command = if pending.is_some() {
            tokio::select! {
                biased;
                command = rx.recv() => command,
                _ = sleep(window) => {
                    if let Some(value) = pending.take() {
                        sink(WriteOp::Put(value));
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Schedule(value)) => pending = Some(value),
            Some(Command::Discard) => {
                pending = None;
                sink(WriteOp::Remove);
            }
            Some(Command::Flush(done)) => {
                if let Some(value) = pending.take() {
                    sink(WriteOp::Put(value));
                }
                let _ = done.send(());
            }
            None => {
                if let Some(value) = pending.take() {
                    sink(WriteOp::Put(value));
                }
                break;
            }
        }
    }
}
