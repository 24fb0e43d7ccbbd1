//! Bus receive adapter
//!
//! Collects the bytes of one bus write transaction into a bounded buffer and
//! hands the exact received length to the decoder, directly or through a
//! [`FrameQueue`].
//!
//! Bytes past the buffer limit are discarded (the first `limit` bytes are
//! kept) and the transaction is marked overflowed. Whether an overflowed
//! transaction is still decoded from its retained prefix is configurable.

use heapless::Vec;

use bsc_display_hal::BusTarget;
use bsc_display_protocol::Selector;

use crate::config::{ConfigError, TelemetryConfig};
use crate::decoder::{DecodeError, Decoder};
use crate::queue::{FrameQueue, PushOutcome, QueueError};

/// Largest transaction the adapter retains
pub const RX_BUFFER_SIZE: usize = 128;

/// One received bus transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxTransaction {
    bytes: Vec<u8, RX_BUFFER_SIZE>,
    dropped: usize,
}

impl RxTransaction {
    /// Retained bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// More bytes arrived than the buffer could hold
    pub fn overflowed(&self) -> bool {
        self.dropped > 0
    }

    /// Bytes discarded past the buffer limit
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Bytes the sender put on the bus
    pub fn received(&self) -> usize {
        self.bytes.len() + self.dropped
    }
}

/// Accumulates the bytes of the transaction in progress
#[derive(Debug, Clone)]
pub struct RxBuffer {
    current: RxTransaction,
    limit: usize,
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::new(RX_BUFFER_SIZE)
    }
}

impl RxBuffer {
    /// Buffer retaining at most `limit` bytes, clamped to [`RX_BUFFER_SIZE`]
    pub fn new(limit: usize) -> Self {
        Self {
            current: RxTransaction::default(),
            limit: limit.min(RX_BUFFER_SIZE),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append one byte; returns `false` if it was discarded
    pub fn push(&mut self, byte: u8) -> bool {
        if self.current.bytes.len() < self.limit && self.current.bytes.push(byte).is_ok() {
            return true;
        }
        self.current.dropped = self.current.dropped.saturating_add(1);
        false
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.push(*byte);
        }
    }

    /// End the transaction and start a new one
    pub fn finish(&mut self) -> RxTransaction {
        core::mem::take(&mut self.current)
    }

    /// Discard the transaction in progress
    pub fn reset(&mut self) {
        self.current = RxTransaction::default();
    }
}

/// Receive path failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError<E> {
    /// Bus peripheral error; the partial transaction was discarded
    Bus(E),
    /// Transaction exceeded the buffer and overflowed transactions are dropped
    Overflow { received: usize, limit: usize },
    /// Transaction received but the frame was rejected
    Decode(DecodeError),
    /// Transaction received but the frame queue had no room
    Queue(QueueError),
}

/// Receive counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    /// Completed transactions, overflowed ones included
    pub transactions: u32,
    /// Transactions that exceeded the buffer
    pub overflows: u32,
    /// Bytes discarded across all overflowed transactions
    pub overflow_bytes: u32,
    /// Overflowed transactions dropped without decoding
    pub overflow_drops: u32,
    pub bus_errors: u32,
}

/// Drives a [`BusTarget`] and forwards complete transactions
pub struct ReceiveAdapter<B: BusTarget> {
    bus: B,
    buffer: RxBuffer,
    decode_overflowed: bool,
    stats: RxStats,
}

impl<B: BusTarget> ReceiveAdapter<B> {
    /// Adapter for `bus`, rejecting a config that fails validation
    pub fn new(bus: B, config: &TelemetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bus,
            buffer: RxBuffer::new(config.rx_buffer_len),
            decode_overflowed: config.decode_overflowed,
            stats: RxStats::default(),
        })
    }

    /// Drain the current transaction from the bus
    pub fn receive(&mut self) -> Result<RxTransaction, RxError<B::Error>> {
        loop {
            match self.bus.read_byte() {
                Ok(Some(byte)) => {
                    self.buffer.push(byte);
                }
                Ok(None) => break,
                Err(e) => {
                    self.buffer.reset();
                    self.stats.bus_errors = self.stats.bus_errors.wrapping_add(1);
                    return Err(RxError::Bus(e));
                }
            }
        }

        let transaction = self.buffer.finish();
        self.stats.transactions = self.stats.transactions.wrapping_add(1);
        if transaction.overflowed() {
            self.stats.overflows = self.stats.overflows.wrapping_add(1);
            self.stats.overflow_bytes = self
                .stats
                .overflow_bytes
                .wrapping_add(transaction.dropped() as u32);
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "rx overflow: {} bytes received, {} kept",
                transaction.received(),
                transaction.len()
            );
        }
        Ok(transaction)
    }

    /// Receive one transaction and decode it into the store
    pub fn receive_and_decode<const N: usize>(
        &mut self,
        decoder: &Decoder<'_, N>,
        now_ms: u64,
    ) -> Result<Selector, RxError<B::Error>> {
        let transaction = self.accept()?;
        decoder
            .decode(transaction.as_slice(), now_ms)
            .map_err(RxError::Decode)
    }

    /// Receive one transaction and queue it for later decoding
    pub fn receive_into_queue<const DEPTH: usize>(
        &mut self,
        queue: &FrameQueue<DEPTH>,
    ) -> Result<PushOutcome, RxError<B::Error>> {
        let transaction = self.accept()?;
        queue.push(transaction).map_err(RxError::Queue)
    }

    /// Receive and apply the overflow policy
    fn accept(&mut self) -> Result<RxTransaction, RxError<B::Error>> {
        let transaction = self.receive()?;
        if transaction.overflowed() && !self.decode_overflowed {
            self.stats.overflow_drops = self.stats.overflow_drops.wrapping_add(1);
            return Err(RxError::Overflow {
                received: transaction.received(),
                limit: self.buffer.limit(),
            });
        }
        Ok(transaction)
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OverflowPolicy;
    use crate::signal::UpdateReady;
    use crate::store::TelemetryStore;
    use bsc_display_protocol::{ControllerField, FrameError, MAX_FRAME_SIZE};
    use std::collections::VecDeque;

    /// Bus delivering scripted transactions, `None` between them
    #[derive(Default)]
    struct ScriptedBus {
        script: VecDeque<Option<Result<u8, ()>>>,
    }

    impl ScriptedBus {
        fn transaction(mut self, bytes: &[u8]) -> Self {
            self.script.extend(bytes.iter().map(|b| Some(Ok(*b))));
            self.script.push_back(None);
            self
        }

        fn fault_after(mut self, bytes: &[u8]) -> Self {
            self.script.extend(bytes.iter().map(|b| Some(Ok(*b))));
            self.script.push_back(Some(Err(())));
            self
        }
    }

    impl BusTarget for ScriptedBus {
        type Error = ();

        fn read_byte(&mut self) -> Result<Option<u8>, ()> {
            match self.script.pop_front() {
                Some(Some(Ok(byte))) => Ok(Some(byte)),
                Some(Some(Err(()))) => Err(()),
                Some(None) | None => Ok(None),
            }
        }
    }

    fn config(decode_overflowed: bool) -> TelemetryConfig {
        TelemetryConfig {
            decode_overflowed,
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn test_buffer_clamps_limit() {
        assert_eq!(RxBuffer::new(4096).limit(), RX_BUFFER_SIZE);
        assert_eq!(RxBuffer::new(16).limit(), 16);
    }

    #[test]
    fn test_buffer_keeps_first_bytes() {
        let mut buffer = RxBuffer::new(4);
        buffer.extend(&[1, 2, 3, 4, 5, 6]);

        let t = buffer.finish();
        assert_eq!(t.as_slice(), &[1, 2, 3, 4]);
        assert!(t.overflowed());
        assert_eq!(t.dropped(), 2);
        assert_eq!(t.received(), 6);

        // Next transaction starts empty
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn test_exact_length_reaches_decoder() {
        let store = TelemetryStore::<8>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);
        let bus = ScriptedBus::default()
            .transaction(&[0x03, 0x04, 10, 0x00])
            .transaction(&[0x03, 0x04, 7]);
        let mut adapter = ReceiveAdapter::new(bus, &config(false)).unwrap();

        assert_eq!(
            adapter.receive_and_decode(&decoder, 0),
            Ok(Selector::Controller(ControllerField::DisplayTimeout))
        );
        assert!(ready.take_ready());

        assert_eq!(
            adapter.receive_and_decode(&decoder, 0),
            Err(RxError::Decode(DecodeError::Frame(FrameError::TooShort)))
        );
        assert_eq!(store.controller().display_timeout, 10);
        assert_eq!(adapter.stats().transactions, 2);
    }

    #[test]
    fn test_overflow_dropped_by_default() {
        let store = TelemetryStore::<8>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);

        let mut oversized = std::vec![0x02, 0x03, 42, 0x00];
        oversized.resize(200, 0xEE);
        let bus = ScriptedBus::default().transaction(&oversized);
        let mut adapter = ReceiveAdapter::new(bus, &config(false)).unwrap();

        assert_eq!(
            adapter.receive_and_decode(&decoder, 0),
            Err(RxError::Overflow {
                received: 200,
                limit: RX_BUFFER_SIZE
            })
        );
        assert_eq!(store.inverter().soc, 0);

        let stats = adapter.stats();
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.overflow_bytes, 72);
        assert_eq!(stats.overflow_drops, 1);
    }

    #[test]
    fn test_overflow_decoded_from_prefix_when_enabled() {
        let store = TelemetryStore::<8>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);

        let mut oversized = std::vec![0x02, 0x03, 42, 0x00];
        oversized.resize(200, 0xEE);
        let bus = ScriptedBus::default().transaction(&oversized);
        let mut adapter = ReceiveAdapter::new(bus, &config(true)).unwrap();

        assert!(adapter.receive_and_decode(&decoder, 0).is_ok());
        assert_eq!(store.inverter().soc, 42);
        assert_eq!(adapter.stats().overflows, 1);
        assert_eq!(adapter.stats().overflow_drops, 0);
    }

    #[test]
    fn test_bus_error_discards_partial_transaction() {
        let bus = ScriptedBus::default()
            .fault_after(&[0x01, 0x06])
            .transaction(&[0x02, 0x01, 0x10, 0x15]);
        let mut adapter = ReceiveAdapter::new(bus, &config(false)).unwrap();

        assert_eq!(adapter.receive(), Err(RxError::Bus(())));
        let next = adapter.receive().unwrap();
        assert_eq!(next.as_slice(), &[0x02, 0x01, 0x10, 0x15]);
        assert_eq!(adapter.stats().bus_errors, 1);
        assert_eq!(adapter.stats().transactions, 1);
    }

    #[test]
    fn test_receive_into_queue() {
        let queue = FrameQueue::<1>::new(OverflowPolicy::DropNewest);
        let bus = ScriptedBus::default()
            .transaction(&[0x02, 0x01, 0x10, 0x15])
            .transaction(&[0x02, 0x02, 0x10, 0x15]);
        let mut adapter = ReceiveAdapter::new(bus, &config(false)).unwrap();

        assert_eq!(adapter.receive_into_queue(&queue), Ok(PushOutcome::Queued));
        assert_eq!(
            adapter.receive_into_queue(&queue),
            Err(RxError::Queue(QueueError::Full))
        );
        assert_eq!(queue.pop().unwrap().as_slice(), &[0x02, 0x01, 0x10, 0x15]);
    }

    #[test]
    fn test_smaller_configured_limit() {
        let cfg = TelemetryConfig {
            rx_buffer_len: MAX_FRAME_SIZE,
            ..TelemetryConfig::default()
        };
        let bus = ScriptedBus::default().transaction(&[0; MAX_FRAME_SIZE + 1]);
        let mut adapter = ReceiveAdapter::new(bus, &cfg).unwrap();

        assert_eq!(
            adapter.receive_into_queue(&FrameQueue::<2>::new(OverflowPolicy::DropNewest)),
            Err(RxError::Overflow {
                received: MAX_FRAME_SIZE + 1,
                limit: MAX_FRAME_SIZE
            })
        );
    }

    #[test]
    fn test_rejects_buffer_too_small_for_frames() {
        for len in [0, 8, MAX_FRAME_SIZE - 1] {
            let cfg = TelemetryConfig {
                rx_buffer_len: len,
                ..TelemetryConfig::default()
            };
            assert_eq!(
                ReceiveAdapter::new(ScriptedBus::default(), &cfg).err(),
                Some(ConfigError::RxBufferLen(len))
            );
        }
    }
}
