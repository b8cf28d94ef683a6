use std::sync::{Arc, Mutex};

use records_core::{ChangeNotifier, ChangeSubject};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Fans store change signals out to subscribers without waiting on them.
#[derive(Debug, Clone, Default)]
pub struct ChangeBus {
    subscribers: Arc<Mutex<Vec<UnboundedSender<ChangeSubject>>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ChangeSubject> {
        let (tx, rx) = unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(e) => tracing::warn!("change bus lock poisoned, subscriber dropped: {e}"),
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl ChangeNotifier for ChangeBus {
    fn notify_change(&self, subject: ChangeSubject) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            tracing::warn!("change bus lock poisoned, {subject:?} not delivered");
            return;
        };
        // A failed send means the receiver is gone.
        subscribers.retain(|tx| tx.send(subject.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_live_subscriber_hears_the_change() {
        let bus = ChangeBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.notify_change(ChangeSubject::Patients);

        assert_eq!(first.try_recv().unwrap(), ChangeSubject::Patients);
        assert_eq!(second.try_recv().unwrap(), ChangeSubject::Patients);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = ChangeBus::new();
        let _kept = bus.subscribe();
        drop(bus.subscribe());

        bus.notify_change(ChangeSubject::Observations);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
