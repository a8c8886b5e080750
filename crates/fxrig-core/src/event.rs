//! Control-to-audio parameter events.
//!
//! The control thread posts [`ParamEvent`]s through an [`EventSender`]; the
//! audio thread drains them at the start of each block with an
//! [`EventReceiver`]. The queue is bounded and lock-free: posting never
//! blocks, it fails with [`EventError::QueueFull`] instead, and draining
//! never allocates.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::param_desc::ParamKey;

/// A normalized target for one parameter of one module of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamEvent {
    /// Position of the target module in the chain.
    pub slot: usize,
    /// Parameter inside the module.
    pub key: ParamKey,
    /// Normalized target value.
    pub value: f32,
}

impl ParamEvent {
    /// Event for `slot`/`key`, applied at the start of the next block.
    pub const fn new(slot: usize, key: ParamKey, value: f32) -> Self {
        Self { slot, key, value }
    }
}

/// Errors raised when posting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The audio side has not drained the queue fast enough.
    #[error("event queue is full")]
    QueueFull,

    /// The receiving side was dropped.
    #[error("event queue is disconnected")]
    Disconnected,
}

/// Factory for the bounded event queue.
pub struct EventQueue;

impl EventQueue {
    /// Creates a queue holding at most `capacity` pending events.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (tx, rx) = bounded(capacity.max(1));
        (EventSender { tx }, EventReceiver { rx })
    }
}

/// Posting half of the event queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<ParamEvent>,
}

impl EventSender {
    /// Posts an event without blocking.
    pub fn post(&self, event: ParamEvent) -> Result<(), EventError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => EventError::QueueFull,
            TrySendError::Disconnected(_) => EventError::Disconnected,
        })
    }

    /// Number of events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Draining half of the event queue, owned by the audio thread.
#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<ParamEvent>,
}

impl EventReceiver {
    /// Moves pending events into `out`, in posting order, without growing it.
    ///
    /// At most `out.capacity() - out.len()` events are moved; the rest stay
    /// queued for the next call. Returns the number of events moved.
    pub fn drain_into(&self, out: &mut Vec<ParamEvent>) -> usize {
        let room = out.capacity() - out.len();
        let mut moved = 0;
        while moved < room {
            match self.rx.try_recv() {
                Ok(event) => {
                    out.push(event);
                    moved += 1;
                }
                Err(_) => break,
            }
        }
        moved
    }

    /// Number of events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_and_drain_in_order() {
        let (tx, rx) = EventQueue::bounded(8);
        for i in 0..3 {
            tx.post(ParamEvent::new(0, ParamKey::global(i), i as f32))
                .unwrap();
        }
        let mut out = Vec::with_capacity(8);
        assert_eq!(rx.drain_into(&mut out), 3);
        let indices: Vec<_> = out.iter().map(|e| e.key.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn event_carries_target_and_value_only() {
        let ev = ParamEvent::new(3, ParamKey::global(1), 0.25);
        assert_eq!(
            ev,
            ParamEvent {
                slot: 3,
                key: ParamKey::global(1),
                value: 0.25,
            }
        );
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (tx, _rx) = EventQueue::bounded(2);
        let ev = ParamEvent::new(0, ParamKey::global(0), 0.5);
        tx.post(ev).unwrap();
        tx.post(ev).unwrap();
        assert_eq!(tx.post(ev), Err(EventError::QueueFull));
    }

    #[test]
    fn disconnected_receiver() {
        let (tx, rx) = EventQueue::bounded(2);
        drop(rx);
        assert_eq!(
            tx.post(ParamEvent::new(0, ParamKey::global(0), 0.0)),
            Err(EventError::Disconnected)
        );
    }

    #[test]
    fn drain_respects_capacity() {
        let (tx, rx) = EventQueue::bounded(16);
        for _ in 0..10 {
            tx.post(ParamEvent::new(1, ParamKey::global(0), 1.0))
                .unwrap();
        }
        let mut out = Vec::with_capacity(4);
        let cap = out.capacity();
        let moved = rx.drain_into(&mut out);
        assert_eq!(moved, cap);
        assert_eq!(out.capacity(), cap);
        assert_eq!(rx.pending(), 10 - cap);
    }
}
