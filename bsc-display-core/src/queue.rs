//! Bounded frame queue
//!
//! Decouples the bus receive path from decoding when the receive context
//! must return quickly. The producer pushes whole transactions; the consumer
//! drains them into a [`Decoder`].

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use portable_atomic::{AtomicU32, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decoder::Decoder;
use crate::rx::RxTransaction;

/// Default number of queued transactions
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// What to drop when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OverflowPolicy {
    /// Reject the incoming transaction
    DropNewest,
    /// Evict the oldest queued transaction to make room
    #[default]
    DropOldest,
}

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest entry
    ReplacedOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Queue full, incoming transaction dropped
    Full,
}

/// Fixed-capacity queue of received transactions
pub struct FrameQueue<const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    channel: Channel<CriticalSectionRawMutex, RxTransaction, DEPTH>,
    policy: OverflowPolicy,
    dropped: AtomicU32,
}

impl<const DEPTH: usize> FrameQueue<DEPTH> {
    pub const fn new(policy: OverflowPolicy) -> Self {
        Self {
            channel: Channel::new(),
            policy,
            dropped: AtomicU32::new(0),
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Enqueue a transaction without blocking
    pub fn push(&self, transaction: RxTransaction) -> Result<PushOutcome, QueueError> {
        let transaction = match self.channel.try_send(transaction) {
            Ok(()) => return Ok(PushOutcome::Queued),
            Err(TrySendError::Full(t)) => t,
        };

        match self.policy {
            OverflowPolicy::DropNewest => {
                #[cfg(feature = "defmt")]
                defmt::warn!("frame queue full, dropping incoming frame");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Full)
            }
            OverflowPolicy::DropOldest => {
                // The consumer may have emptied the queue since try_send
                let evicted = self.channel.try_receive().is_ok();
                if evicted {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("frame queue full, dropping oldest frame");
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }

                match self.channel.try_send(transaction) {
                    Ok(()) if evicted => Ok(PushOutcome::ReplacedOldest),
                    Ok(()) => Ok(PushOutcome::Queued),
                    Err(TrySendError::Full(_)) => {
                        // Another producer refilled the slot
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        Err(QueueError::Full)
                    }
                }
            }
        }
    }

    /// Dequeue without blocking
    pub fn pop(&self) -> Option<RxTransaction> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next transaction
    pub async fn receive(&self) -> RxTransaction {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Transactions lost to overflow since creation
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Decode every queued transaction
    ///
    /// Returns the number of transactions taken off the queue. Frames the
    /// decoder rejects are counted in its stats.
    pub fn drain_into<const N: usize>(&self, decoder: &Decoder<'_, N>, now_ms: u64) -> usize {
        let mut drained = 0;
        while let Some(transaction) = self.pop() {
            let _ = decoder.decode(transaction.as_slice(), now_ms);
            drained += 1;
        }
        drained
    }
}
