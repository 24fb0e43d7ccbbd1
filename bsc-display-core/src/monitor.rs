//! Link monitor
//!
//! Classifies every device slot for the renderer, tracks whether the
//! controller is still completing refresh batches and paces the render loop.

use crate::config::TelemetryConfig;
use crate::snapshot::DeviceSnapshot;
use crate::view::TelemetryView;

/// Health of one device slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotStatus {
    /// No device reported in this slot
    Unpopulated,
    /// Device reported, but not within the stale threshold
    Stale,
    /// Device reports a nonzero error word
    Fault,
    Ok,
}

/// Staleness and batch liveness tracking
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    stale_after_ms: u32,
    batch_timeout_ms: u64,
    render_interval_ms: u64,
    /// Time of the last completed batch
    last_batch_ms: Option<u64>,
    /// Time of the last render tick
    last_render_ms: Option<u64>,
    batches: u32,
}

impl LinkMonitor {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            stale_after_ms: config.stale_after_ms,
            batch_timeout_ms: u64::from(config.batch_timeout_ms),
            render_interval_ms: u64::from(config.render_interval_ms),
            last_batch_ms: None,
            last_render_ms: None,
            batches: 0,
        }
    }

    /// Record a completed batch
    pub fn batch_received(&mut self, now_ms: u64) {
        self.last_batch_ms = Some(now_ms);
        self.batches = self.batches.wrapping_add(1);
    }

    /// Take the view's update-ready flag and record a batch if it was set
    ///
    /// Returns the taken flag so the renderer can refresh on it.
    pub fn poll<const N: usize>(&mut self, view: &TelemetryView<'_, N>, now_ms: u64) -> bool {
        let ready = view.take_ready();
        if ready {
            self.batch_received(now_ms);
        }
        ready
    }

    /// A batch completed within the timeout
    ///
    /// `false` until the first batch arrives.
    pub fn link_healthy(&self, now_ms: u64) -> bool {
        match self.last_batch_ms {
            Some(at) => now_ms.saturating_sub(at) <= self.batch_timeout_ms,
            None => false,
        }
    }

    /// Time since the last completed batch
    pub fn batch_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_batch_ms.map(|at| now_ms.saturating_sub(at))
    }

    /// A render interval has passed since the last tick
    ///
    /// Starts the next interval when it returns `true`. The first call always
    /// does.
    pub fn render_due(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_render_ms
            .map_or(true, |at| now_ms.saturating_sub(at) >= self.render_interval_ms);
        if due {
            self.last_render_ms = Some(now_ms);
        }
        due
    }

    /// Batches seen since creation
    pub fn batches(&self) -> u32 {
        self.batches
    }

    /// Classify one slot
    ///
    /// Staleness wins over faults: an old error word says nothing about the
    /// device now.
    pub fn classify(&self, device: &DeviceSnapshot, now_ms: u64) -> SlotStatus {
        if !device.is_populated() {
            return SlotStatus::Unpopulated;
        }

        // Record timestamps are wrapping 32-bit milliseconds
        let now = now_ms as u32;
        let fresh = device
            .last_update_ms
            .is_some_and(|at| now.wrapping_sub(at) <= self.stale_after_ms);
        if !fresh {
            return SlotStatus::Stale;
        }

        if device.has_error() {
            return SlotStatus::Fault;
        }

        SlotStatus::Ok
    }

    /// Classify every slot of a view
    pub fn check<const N: usize>(
        &self,
        view: &TelemetryView<'_, N>,
        now_ms: u64,
    ) -> [SlotStatus; N] {
        core::array::from_fn(|slot| {
            view.device(slot)
                .map_or(SlotStatus::Unpopulated, |device| self.classify(&device, now_ms))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::signal::UpdateReady;
    use crate::store::TelemetryStore;

    fn monitor() -> LinkMonitor {
        LinkMonitor::new(&TelemetryConfig {
            stale_after_ms: 1_000,
            batch_timeout_ms: 5_000,
            ..TelemetryConfig::default()
        })
    }

    #[test]
    fn test_link_down_until_first_batch() {
        let mut monitor = monitor();
        assert!(!monitor.link_healthy(0));
        assert_eq!(monitor.batch_age_ms(0), None);

        monitor.batch_received(100);
        assert!(monitor.link_healthy(100));
        assert!(monitor.link_healthy(5_100));
        assert!(!monitor.link_healthy(5_101));
        assert_eq!(monitor.batches(), 1);
    }

    #[test]
    fn test_poll_takes_ready_flag() {
        let store = TelemetryStore::<2>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);
        let view = TelemetryView::new(&store, &ready);
        let mut monitor = monitor();

        assert!(!monitor.poll(&view, 10));
        decoder.decode(&[0x03, 0x04, 5, 0x00], 20).unwrap();
        assert!(monitor.poll(&view, 25));
        assert!(!monitor.poll(&view, 30));

        assert_eq!(monitor.batch_age_ms(30), Some(5));
        assert!(monitor.link_healthy(30));
    }

    #[test]
    fn test_slot_classification() {
        let store = TelemetryStore::<4>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);
        let view = TelemetryView::new(&store, &ready);
        let monitor = monitor();

        // Slot 0 healthy, slot 1 faulted, slot 2 old, slot 3 empty
        decoder.decode(&[0x01, 0x06, 0x00, 0xAC, 0x0D], 2_000).unwrap();
        decoder.decode(&[0x01, 0x06, 0x01, 0xAC, 0x0D], 2_000).unwrap();
        decoder
            .decode(&[0x01, 0x0E, 0x01, 0x04, 0x00, 0x00, 0x00], 2_000)
            .unwrap();
        decoder.decode(&[0x01, 0x06, 0x02, 0xAC, 0x0D], 500).unwrap();

        assert_eq!(
            monitor.check(&view, 2_500),
            [
                SlotStatus::Ok,
                SlotStatus::Fault,
                SlotStatus::Stale,
                SlotStatus::Unpopulated
            ]
        );
    }

    #[test]
    fn test_staleness_across_timestamp_wrap() {
        let store = TelemetryStore::<1>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);
        let view = TelemetryView::new(&store, &ready);
        let monitor = monitor();

        let written_at = u64::from(u32::MAX) - 100;
        decoder
            .decode(&[0x01, 0x06, 0x00, 0xAC, 0x0D], written_at)
            .unwrap();

        // 500 ms later the low 32 bits have wrapped
        assert_eq!(monitor.check(&view, written_at + 500), [SlotStatus::Ok]);
        assert_eq!(
            monitor.check(&view, written_at + 1_001),
            [SlotStatus::Stale]
        );
    }

    #[test]
    fn test_render_pacing() {
        let mut monitor = LinkMonitor::new(&TelemetryConfig {
            render_interval_ms: 5,
            ..TelemetryConfig::default()
        });

        assert!(monitor.render_due(100));
        assert!(!monitor.render_due(101));
        assert!(!monitor.render_due(104));
        assert!(monitor.render_due(105));
        assert!(!monitor.render_due(109));
        assert!(monitor.render_due(112));
    }

    #[test]
    fn test_zero_max_cell_voltage_is_unpopulated() {
        let store = TelemetryStore::<1>::new();
        let ready = UpdateReady::new();
        let decoder = Decoder::new(&store, &ready);
        let view = TelemetryView::new(&store, &ready);

        decoder.decode(&[0x01, 0x06, 0x00, 0x00, 0x00], 0).unwrap();
        assert_eq!(monitor().check(&view, 0), [SlotStatus::Unpopulated]);
    }
}
