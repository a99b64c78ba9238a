/// Per-frame capture handler.
///
/// Invoked by the radio driver for every promiscuous frame, from a context
/// that must not block: no locks, no allocation, no logging. Frames below
/// the RSSI floor are dropped, otherwise the transmitter address (Address 2)
/// is read from the fixed MAC header offset and pushed to the sink.
use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::ScanConfig;

/// Offset of Address 2 in the 802.11 MAC header:
/// 2 (frame ctrl) + 2 (duration) + 6 (addr1)
pub const ADDR2_OFFSET: usize = 10;

/// Minimum frame length holding a complete Address 2 field.
pub const MIN_FRAME_LEN: usize = ADDR2_OFFSET + 6;

/// Frame class tag supplied by the driver alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCategory {
    Management,
    Control,
    Data,
    /// Driver-internal packets without an 802.11 MAC header
    Misc,
}

impl FrameCategory {
    /// Map the driver's packet type numbering (MGMT=0, CTRL=1, DATA=2, MISC=3).
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => FrameCategory::Management,
            1 => FrameCategory::Control,
            2 => FrameCategory::Data,
            _ => FrameCategory::Misc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameCategory::Management => "mgmt",
            FrameCategory::Control => "ctrl",
            FrameCategory::Data => "data",
            FrameCategory::Misc => "misc",
        }
    }
}

/// Label attached to every identifier handed to the counting sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Wifi,
}

/// Downstream consumer of observed device addresses.
///
/// Called from the driver's receive context, so implementations must not
/// block: queue with `try_send` or update atomics.
pub trait IdentifierSink {
    fn on_identifier_observed(&self, address: [u8; 6], source: SourceTag);
}

/// Handler the driver calls for each received frame.
pub trait FrameHandler: Sync {
    fn on_frame(&self, payload: &[u8], rssi: i8, category: FrameCategory);
}

/// True when a frame with `rssi` passes `threshold` (0 = no filtering).
#[inline]
pub fn passes_rssi(threshold: i8, rssi: i8) -> bool {
    threshold == 0 || rssi >= threshold
}

/// Read the transmitter address, `None` if the frame is too short.
#[inline]
pub fn source_address(frame: &[u8]) -> Option<[u8; 6]> {
    frame
        .get(ADDR2_OFFSET..MIN_FRAME_LEN)
        .and_then(|b| b.try_into().ok())
}

/// Frame counters. Relaxed atomics, monotonically increasing.
#[derive(Debug, Default)]
struct Counters {
    seen: AtomicU32,
    filtered: AtomicU32,
    malformed: AtomicU32,
    forwarded: AtomicU32,
}

/// Snapshot of the capture counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames delivered to the capture handler
    pub seen: u32,
    /// Dropped by the RSSI floor
    pub filtered: u32,
    /// Dropped as too short or without a MAC header
    pub malformed: u32,
    /// Addresses handed to the sink
    pub forwarded: u32,
}

/// The capture handler: RSSI filter, address extraction, sink forward.
pub struct Capture<'a, S> {
    config: &'a ScanConfig,
    sink: S,
    counters: Counters,
}

impl<'a, S: IdentifierSink> Capture<'a, S> {
    pub const fn new(config: &'a ScanConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            counters: Counters {
                seen: AtomicU32::new(0),
                filtered: AtomicU32::new(0),
                malformed: AtomicU32::new(0),
                forwarded: AtomicU32::new(0),
            },
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            seen: self.counters.seen.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
        }
    }
}

impl<S: IdentifierSink + Sync> FrameHandler for Capture<'_, S> {
    fn on_frame(&self, payload: &[u8], rssi: i8, category: FrameCategory) {
        self.counters.seen.fetch_add(1, Ordering::Relaxed);

        // rssi is negative
        if !passes_rssi(self.config.rssi_threshold(), rssi) {
            self.counters.filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let address = match category {
            FrameCategory::Misc => None,
            _ => source_address(payload),
        };
        match address {
            Some(address) => {
                self.sink.on_identifier_observed(address, SourceTag::Wifi);
                self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// No-op handler installed before teardown so the driver never calls into
/// state that is being released.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl FrameHandler for Discard {
    #[inline]
    fn on_frame(&self, _payload: &[u8], _rssi: i8, _category: FrameCategory) {}
}
