use std::sync::mpsc::{channel, Receiver, Sender};

/// Fan-out point for full-state snapshots. Every publish clones the complete
/// snapshot to every live subscriber; disconnected subscribers are dropped on
/// the next publish. There is no delta protocol.
pub struct SnapshotHub<T: Clone> {
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone> SnapshotHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, snapshot: T) {
        self.subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Consumer-side holder of the latest snapshot. Applying a snapshot replaces
/// the previous value wholesale; the projection never merges.
pub struct Projection<T> {
    current: Option<T>,
}

impl<T> Projection<T> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn apply(&mut self, snapshot: T) {
        self.current = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&T> {
        self.current.as_ref()
    }
}

/// A hub bundled with the process's own subscription and projection. The
/// store side publishes after every mutation; read paths call `refresh` and
/// compute from whatever snapshot is currently visible.
pub struct Feed<T: Clone> {
    hub: SnapshotHub<T>,
    rx: Receiver<T>,
    projection: Projection<T>,
}

impl<T: Clone> Feed<T> {
    pub fn new() -> Self {
        let mut hub = SnapshotHub::new();
        let rx = hub.subscribe();
        Self {
            hub,
            rx,
            projection: Projection::new(),
        }
    }

    #[allow(dead_code)]
    pub fn subscribe(&mut self) -> Receiver<T> {
        self.hub.subscribe()
    }

    pub fn publish(&mut self, snapshot: T) {
        self.hub.publish(snapshot);
        self.refresh();
    }

    pub fn refresh(&mut self) {
        while let Ok(snapshot) = self.rx.try_recv() {
            self.projection.apply(snapshot);
        }
    }

    pub fn latest(&self) -> Option<&T> {
        self.projection.latest()
    }
}
