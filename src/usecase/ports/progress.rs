use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::entities::merge::ProgressUpdate;

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

struct ChannelObserver {
    sender: SyncSender<ProgressUpdate>,
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        // A receiver that went away just stops listening.
        let _ = self.sender.send(update.clone());
    }
}

#[derive(Default)]
pub struct ProgressReporter {
    observers: Mutex<Vec<Arc<dyn ProgressObserver>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: impl ProgressObserver + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Updates are delivered with a blocking send, so the receiver has to be
    /// drained while the merge runs.
    pub fn subscribe_channel(&self, capacity: usize) -> Receiver<ProgressUpdate> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        self.subscribe(ChannelObserver { sender });
        receiver
    }

    /// Replaces every subscriber with `callback`.
    pub fn set_progress_callback(&self, callback: impl ProgressObserver + 'static) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.clear();
        observers.push(Arc::new(callback));
    }

    pub fn clear(&self) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn notify(&self, current: usize, total: usize, message: impl Into<String>) {
        let observers: Vec<Arc<dyn ProgressObserver>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if observers.is_empty() {
            return;
        }

        let update = ProgressUpdate {
            current,
            total,
            message: message.into(),
        };
        for observer in observers {
            observer.on_progress(&update);
        }
    }
}
