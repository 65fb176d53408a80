//! Lock-free intent queue from observers to the authority
//!
//! Connection handlers hold an `IntentSender` and submit without blocking; the
//! session drains everything pending at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::game::state::PlayerId;
use crate::net::protocol::PlayerIntent;

/// One intent as received from a player connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentMessage {
    pub player_id: PlayerId,
    /// Server tick the client last observed when it sent the intent
    pub tick: u64,
    pub intent: PlayerIntent,
}

pub struct IntentBuffer {
    sender: Sender<IntentMessage>,
    receiver: Receiver<IntentMessage>,
    capacity: usize,
}

impl IntentBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Sender handle for one connection
    pub fn sender(&self) -> IntentSender {
        IntentSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit an intent (non-blocking). False when the buffer is full.
    #[inline]
    pub fn try_submit(&self, player_id: PlayerId, tick: u64, intent: PlayerIntent) -> bool {
        self.sender
            .try_send(IntentMessage {
                player_id,
                tick,
                intent,
            })
            .is_ok()
    }

    /// Drain all pending intents in arrival order
    pub fn drain(&self) -> Vec<IntentMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct IntentSender {
    sender: Sender<IntentMessage>,
}

impl IntentSender {
    #[inline]
    pub fn try_send(&self, player_id: PlayerId, tick: u64, intent: PlayerIntent) -> Result<(), IntentBufferError> {
        self.sender
            .try_send(IntentMessage {
                player_id,
                tick,
                intent,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => IntentBufferError::Full,
                TrySendError::Disconnected(_) => IntentBufferError::Disconnected,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntentBufferError {
    /// Backpressure: the session has not drained yet
    #[error("intent buffer full")]
    Full,
    /// The session is gone
    #[error("intent buffer disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec2::Vec2;
    use uuid::Uuid;

    fn step(x: f32) -> PlayerIntent {
        PlayerIntent::Move {
            direction: Vec2::new(x, 0.0),
        }
    }

    #[test]
    fn test_drain_keeps_arrival_order() {
        let buffer = IntentBuffer::new(10);
        let player_id = Uuid::new_v4();

        assert!(buffer.try_submit(player_id, 1, step(1.0)));
        assert!(buffer.try_submit(player_id, 2, PlayerIntent::RequestFire { slot: 0 }));
        assert!(buffer.try_submit(player_id, 3, step(-1.0)));
        assert_eq!(buffer.pending_count(), 3);

        let intents = buffer.drain();
        assert_eq!(intents.iter().map(|m| m.tick).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(intents[1].intent, PlayerIntent::RequestFire { slot: 0 });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let buffer = IntentBuffer::new(2);
        let sender = buffer.sender();
        let player_id = Uuid::new_v4();

        assert!(sender.try_send(player_id, 0, step(1.0)).is_ok());
        assert!(sender.try_send(player_id, 0, step(1.0)).is_ok());
        assert_eq!(sender.try_send(player_id, 0, step(1.0)), Err(IntentBufferError::Full));

        buffer.drain();
        assert!(buffer.try_submit(player_id, 0, step(1.0)));
    }

    #[test]
    fn test_disconnected_after_drop() {
        let buffer = IntentBuffer::new(4);
        let sender = buffer.sender();
        drop(buffer);
        assert_eq!(
            sender.try_send(Uuid::new_v4(), 0, step(0.0)),
            Err(IntentBufferError::Disconnected)
        );
    }
}
