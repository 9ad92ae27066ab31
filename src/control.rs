//! Lock-free plumbing between the control thread and the audio thread.
//!
//! Parameter changes travel *to* a node through a [`Handle`] / [`Inbox`]
//! pair and are applied at the start of the node's next `read`. Events
//! (completions, metering) travel *back* through an [`EventQueue`] or a
//! [`MeterTap`] and are delivered when the control side polls.
//!
//! Nothing here blocks or allocates once constructed.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::{DspError, Result};

/// Default capacity of a node's message queue.
pub const DEFAULT_QUEUE_SIZE: usize = 64;

/// Sending half of a node's message queue.
///
/// Messages are buffered in a lock-free ring buffer and applied at the start
/// of the node's next `read`.
pub struct Handle<M: Send + 'static> {
    sender: Producer<M>,
}

impl<M: Send + 'static> Handle<M> {
    /// Send a message to the node.
    ///
    /// Returns `Err(msg)` with the message that couldn't be sent if the queue
    /// is full.
    pub fn send(&mut self, msg: M) -> core::result::Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(m)| m)
    }

    /// Like [`send`](Self::send) but reports a full queue as [`DspError::QueueFull`].
    pub(crate) fn try_send(&mut self, msg: M) -> Result<()> {
        self.send(msg).map_err(|_| DspError::QueueFull)
    }

    /// Free slots left in the queue.
    pub fn slots(&self) -> usize {
        self.sender.slots()
    }
}

/// Receiving half of a node's message queue, owned by the node.
pub struct Inbox<M: Send + 'static> {
    receiver: Consumer<M>,
}

impl<M: Send + 'static> Inbox<M> {
    /// Next pending message, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<M> {
        self.receiver.pop().ok()
    }

    /// Drain all pending messages, no allocation.
    pub fn drain(&mut self) -> impl Iterator<Item = M> + '_ {
        let receiver = &mut self.receiver;
        core::iter::from_fn(move || receiver.pop().ok())
    }
}

/// Create a message queue with room for `capacity` pending messages.
pub fn message_queue<M: Send + 'static>(capacity: usize) -> (Handle<M>, Inbox<M>) {
    let (sender, receiver) = RingBuffer::new(capacity.max(1));
    (Handle { sender }, Inbox { receiver })
}

/// Audio-side sender for events delivered to the control thread.
pub struct EventQueue<E: Send + 'static> {
    sender: Producer<E>,
}

impl<E: Send + 'static> EventQueue<E> {
    /// Publish an event. If the queue is full the event is handed back so the
    /// caller can decide what to drop.
    pub fn publish(&mut self, event: E) -> core::result::Result<(), E> {
        self.sender.push(event).map_err(|rtrb::PushError::Full(e)| e)
    }
}

/// Control-side receiver of an [`EventQueue`].
pub struct EventReceiver<E: Send + 'static> {
    receiver: Consumer<E>,
}

impl<E: Send + 'static> EventReceiver<E> {
    pub fn pop(&mut self) -> Option<E> {
        self.receiver.pop().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

pub fn event_queue<E: Send + 'static>(capacity: usize) -> (EventQueue<E>, EventReceiver<E>) {
    let (sender, receiver) = RingBuffer::new(capacity.max(1));
    (EventQueue { sender }, EventReceiver { receiver })
}

/// Coalescing single-slot channel for metering values.
///
/// Holds at most one unread reading. While the control side has not picked up
/// the previous reading, newer ones are dropped instead of queued, so a slow
/// UI can never stall or grow memory on the audio thread.
pub struct MeterTap<T: Send + 'static> {
    sender: Producer<T>,
    dropped: u64,
}

impl<T: Send + 'static> MeterTap<T> {
    /// Offer a reading; returns `false` if it was coalesced away.
    #[inline]
    pub fn offer(&mut self, reading: T) -> bool {
        if self.sender.push(reading).is_ok() {
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    /// Readings dropped because the previous one was still unread.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub struct MeterReceiver<T: Send + 'static> {
    receiver: Consumer<T>,
}

impl<T: Send + 'static> MeterReceiver<T> {
    /// Take the pending reading, if any.
    pub fn take(&mut self) -> Option<T> {
        self.receiver.pop().ok()
    }
}

pub fn meter_channel<T: Send + 'static>() -> (MeterTap<T>, MeterReceiver<T>) {
    let (sender, receiver) = RingBuffer::new(1);
    (MeterTap { sender, dropped: 0 }, MeterReceiver { receiver })
}
