//! Fire-and-forget link to the remote key/value store.
//!
//! The telemetry task pushes writes into an unbounded channel and never hears
//! back. A publisher on its own thread drains the channel into the store and
//! keeps the shared readiness flag current. Delivery is at most once: a write
//! the store rejects is logged by the publisher and lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::RemoteError;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteWrite {
    Float { path: String, value: f32 },
    /// Server-side "now" stored at `path`.
    Timestamp { path: String },
}

impl RemoteWrite {
    pub fn path(&self) -> &str {
        match self {
            RemoteWrite::Float { path, .. } | RemoteWrite::Timestamp { path } => path,
        }
    }
}

/// Client of the remote store.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Whether the client is connected and authenticated.
    fn is_ready(&self) -> bool;

    async fn apply(&mut self, write: &RemoteWrite) -> Result<(), RemoteError>;
}

/// Producer side, held by the telemetry task.
#[derive(Clone, Debug)]
pub struct TelemetryLink {
    writes: mpsc::UnboundedSender<RemoteWrite>,
    ready: Arc<AtomicBool>,
}

impl TelemetryLink {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_float(&self, path: String, value: f32) {
        self.send(RemoteWrite::Float { path, value });
    }

    pub fn set_timestamp(&self, path: String) {
        self.send(RemoteWrite::Timestamp { path });
    }

    fn send(&self, write: RemoteWrite) {
        if let Err(e) = self.writes.send(write) {
            log::debug!("publisher gone, dropping write to {}", e.0.path());
        }
    }
}

/// Consumer side: the background network pump.
pub struct Publisher<S> {
    store: S,
    writes: mpsc::UnboundedReceiver<RemoteWrite>,
    ready: Arc<AtomicBool>,
    pump_interval: Duration,
}

/// Creates a connected link/publisher pair around `store`.
pub fn channel<S: RemoteStore>(
    store: S,
    pump_interval: Duration,
) -> (TelemetryLink, Publisher<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ready = Arc::new(AtomicBool::new(store.is_ready()));

    (
        TelemetryLink {
            writes: tx,
            ready: ready.clone(),
        },
        Publisher {
            store,
            writes: rx,
            ready,
            pump_interval,
        },
    )
}

impl<S: RemoteStore> Publisher<S> {
    /// Runs until every `TelemetryLink` is dropped.
    pub async fn run(mut self) -> S {
        let mut pump = tokio::time::interval(self.pump_interval);
        pump.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = pump.tick() => self.refresh_readiness(),
                write = self.writes.recv() => match write {
                    Some(write) => self.deliver(write).await,
                    None => break,
                },
            }
        }

        log::info!("Firebase Task: telemetry link closed, publisher stopping.");
        self.store
    }

    fn refresh_readiness(&self) {
        let ready = self.store.is_ready();
        if self.ready.swap(ready, Ordering::AcqRel) != ready {
            log::info!("Firebase Task: remote store ready: {ready}");
        }
    }

    async fn deliver(&mut self, write: RemoteWrite) {
        if let Err(e) = self.store.apply(&write).await {
            log::warn!("Firebase Task: write to {} failed: {e}", write.path());
        }
    }
}

impl<S: RemoteStore + Send + 'static> Publisher<S> {
    /// Runs the publisher on a dedicated thread with a single-threaded runtime.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("network-pump".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("Firebase Task: could not start runtime: {e}");
                        return;
                    }
                };
                runtime.block_on(self.run());
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RecordingRemote;

    #[tokio::test]
    async fn test_writes_are_delivered_in_order() {
        let remote = RecordingRemote::new(true);
        let (link, publisher) = channel(remote.clone(), Duration::from_millis(5));

        link.set_float("/a/temperature_c".into(), 21.5);
        link.set_timestamp("/last_updated_timestamp".into());
        drop(link);

        publisher.run().await;
        assert_eq!(
            remote.writes(),
            vec![
                RemoteWrite::Float {
                    path: "/a/temperature_c".into(),
                    value: 21.5
                },
                RemoteWrite::Timestamp {
                    path: "/last_updated_timestamp".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_write_is_invisible_to_producer() {
        let remote = RecordingRemote::new(true);
        remote.reject_writes(true);
        let (link, publisher) = channel(remote.clone(), Duration::from_millis(5));

        link.set_float("/x".into(), 1.0);
        drop(link);

        publisher.run().await;
        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn test_readiness_follows_the_store() {
        let remote = RecordingRemote::new(false);
        let (link, publisher) = channel(remote.clone(), Duration::from_millis(1));
        assert!(!link.is_ready());

        remote.set_ready(true);
        let watch = async move {
            let mut ready = false;
            for _ in 0..200 {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if link.is_ready() {
                    ready = true;
                    break;
                }
            }
            ready
        };

        let (_, ready) = tokio::join!(publisher.run(), watch);
        assert!(ready);
    }

    #[test]
    fn test_send_after_publisher_dropped_is_silent() {
        let (link, publisher) = channel(RecordingRemote::new(true), Duration::from_millis(5));
        drop(publisher);
        link.set_float("/x".into(), 1.0);
    }
}
