// Communication channels lock-free
// Single-producer single-consumer ring buffers between the control thread and
// the playback thread. Neither side ever blocks: a full queue rejects the push.

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

/// Capacity used by the playback thread for both directions
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity.max(1));
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity.max(1));
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_command_channel_fifo() {
        let (mut tx, mut rx) = create_command_channel(4);
        assert!(tx.try_push(Command::Start { bpm: 128.0 }).is_ok());
        assert!(tx.try_push(Command::Stop).is_ok());
        assert_eq!(rx.try_pop(), Some(Command::Start { bpm: 128.0 }));
        assert_eq!(rx.try_pop(), Some(Command::Stop));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_full_channel_rejects() {
        let (mut tx, _rx) = create_notification_channel(1);
        assert!(tx.try_push(Notification::Stopped).is_ok());
        assert!(tx.try_push(Notification::Stopped).is_err());
    }
}
