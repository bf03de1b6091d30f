//! Owner-scoped event fan-out.
//!
//! Each pipeline owner (playback controller, exporter) holds its own
//! [`EventHub`] and hands out [`Subscription`] receivers. The hub pushes
//! into every live channel and prunes dead ones on the next emit. There is
//! no process-wide listener registry: dropping the subscription is the whole
//! unsubscribe story.

use crossbeam::channel;

/// Receiving end of one owner's event stream.
pub struct Subscription<T> {
    receiver: channel::Receiver<T>,
}

impl<T> Subscription<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued since the last drain.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

pub(crate) struct EventHub<T> {
    senders: Vec<channel::Sender<T>>,
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> EventHub<T> {
    pub fn subscribe(&mut self) -> Subscription<T> {
        let (tx, rx) = channel::unbounded();
        self.senders.push(tx);
        Subscription { receiver: rx }
    }

    pub fn emit(&mut self, event: T) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_every_subscriber() {
        let mut hub = EventHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();
        hub.emit(1.5f64);
        assert_eq!(a.try_recv(), Some(1.5));
        assert_eq!(b.try_recv(), Some(1.5));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut hub = EventHub::default();
        let keep = hub.subscribe();
        {
            let _gone = hub.subscribe();
        }
        hub.emit(4u32);
        assert_eq!(hub.senders.len(), 1);
        assert_eq!(keep.drain(), vec![4]);
    }
}
