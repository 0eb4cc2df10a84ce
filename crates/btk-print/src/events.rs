// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Event fan-out
//
// Every subscriber gets its own unbounded queue, so a slow reader never
// loses events. Subscribers that dropped their receiver are pruned on the
// next emit.

use std::sync::Mutex;
use tokio::sync::mpsc;

/// Receiving end handed out by `subscribe`
pub type EventReceiver<E> = mpsc::UnboundedReceiver<E>;

/// A list of subscribers for events of type `E`
pub struct EventSubscribers<E> {
    senders: Mutex<Vec<mpsc::UnboundedSender<E>>>,
}

impl<E: Clone> EventSubscribers<E> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> EventReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, in subscription order
    pub fn emit(&self, event: E) {
        self.senders
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }
}

impl<E: Clone> Default for EventSubscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}
