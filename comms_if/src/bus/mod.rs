//! # Bus Module
//!
//! This module provides a minimal in-process publish/subscribe bus. Each topic is a bounded
//! channel with a single publisher and a single subscriber.
//!
//! Neither end ever blocks:
//!
//! - A `Publication` is fire-and-forget. If the subscriber is lagging and the channel is full, or
//!   the subscriber has gone away, the message is dropped and an error is returned which the
//!   caller is free to ignore.
//! - A `Subscription` is polled. Polling drains every message queued since the last poll and
//!   returns only the most recent one, which matches how cyclic modules consume state topics.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError, TrySendError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of messages a topic can hold before publications are dropped.
pub const DEFAULT_CAPACITY: usize = 16;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The sending end of a topic.
#[derive(Debug, Clone)]
pub struct Publication<T> {
    sender: SyncSender<T>,
}

/// The receiving end of a topic.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: Receiver<T>,

    /// Set to false once the publisher has been dropped and the queue drained.
    connected: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BusError {
    #[error("The topic is full, the message was dropped")]
    Full,

    #[error("The subscriber has disconnected, the message was dropped")]
    Disconnected,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a new topic with the default capacity.
pub fn channel<T>() -> (Publication<T>, Subscription<T>) {
    channel_with_capacity(DEFAULT_CAPACITY)
}

/// Create a new topic which can queue up to `capacity` messages.
///
/// A capacity of zero is raised to one, since a rendezvous channel would make every publication
/// from a non-blocking publisher fail.
pub fn channel_with_capacity<T>(capacity: usize) -> (Publication<T>, Subscription<T>) {
    let (sender, receiver) = sync_channel(capacity.max(1));

    (
        Publication { sender },
        Subscription {
            receiver,
            connected: true,
        },
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> Publication<T> {
    /// Publish a message without blocking.
    pub fn publish(&self, msg: T) -> Result<(), BusError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => BusError::Full,
            TrySendError::Disconnected(_) => BusError::Disconnected,
        })
    }
}

impl<T> Subscription<T> {
    /// Poll the topic for new data.
    ///
    /// Returns the most recent message published since the last poll, or `None` if nothing new
    /// has arrived. Older queued messages are discarded.
    pub fn poll(&mut self) -> Option<T> {
        let mut latest = None;

        loop {
            match self.receiver.try_recv() {
                Ok(msg) => latest = Some(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        warn!("Publisher disconnected from subscription");
                        self.connected = false;
                    }
                    break;
                }
            }
        }

        latest
    }

    /// Returns true until the publisher has been dropped and the queue drained.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
