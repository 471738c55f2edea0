//! Single-slot stage queues.
//!
//! Each staging buffer of a core exists exactly once and circulates
//! between one producing stage and one consuming stage:
//!
//! ```text
//!   producer: alloc -> fill -> enque ─┐
//!                 ▲                   ▼
//!   consumer:     └── free <- use <- deque
//! ```
//!
//! `alloc` blocks until the consumer has freed the slot, so a producer can
//! run ahead by at most one buffer. When either side goes away the other
//! side's next blocking call fails instead of blocking forever. A producer
//! that has finished its last step no longer needs the slot, so freeing
//! into a departed producer is not an error.

use crate::error::{Result, SpmmError};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

/// Create a queue holding `slot` as its one buffer.
pub fn stage_queue<B: Send>(name: &'static str, slot: B) -> (QueueProducer<B>, QueueConsumer<B>) {
    let (free_tx, free_rx) = sync_channel(1);
    let (filled_tx, filled_rx) = sync_channel(1);
    // Capacity 1 and an empty channel: this send cannot block or fail.
    let _ = free_tx.send(slot);
    (
        QueueProducer {
            name,
            free_rx,
            filled_tx,
        },
        QueueConsumer {
            name,
            filled_rx,
            free_tx,
        },
    )
}

/// Producing side of a stage queue.
pub struct QueueProducer<B> {
    name: &'static str,
    free_rx: Receiver<B>,
    filled_tx: SyncSender<B>,
}

impl<B> QueueProducer<B> {
    /// Take the slot, waiting for the consumer to free it.
    pub fn alloc(&self) -> Result<B> {
        self.free_rx
            .recv()
            .map_err(|_| SpmmError::Pipeline(format!("{}: consumer stage stopped", self.name)))
    }

    /// Hand a filled slot to the consumer.
    pub fn enque(&self, slot: B) -> Result<()> {
        self.filled_tx
            .send(slot)
            .map_err(|_| SpmmError::Pipeline(format!("{}: consumer stage stopped", self.name)))
    }
}

/// Consuming side of a stage queue.
pub struct QueueConsumer<B> {
    name: &'static str,
    filled_rx: Receiver<B>,
    free_tx: SyncSender<B>,
}

impl<B> QueueConsumer<B> {
    /// Wait for the next filled slot.
    pub fn deque(&self) -> Result<B> {
        self.filled_rx
            .recv()
            .map_err(|_| SpmmError::Pipeline(format!("{}: producer stage stopped", self.name)))
    }

    /// Return a consumed slot to the producer. If the producer has already
    /// exited the slot is dropped.
    pub fn free(&self, slot: B) -> Result<()> {
        // A producer blocked in `alloc` still holds the receiver, so a
        // failed send only means nobody will ask for the slot again.
        let _ = self.free_tx.send(slot);
        Ok(())
    }
}
