/// Shared capture configuration.
///
/// Read by the capture callback (driver context) and the hop timer, written
/// by control calls from any context. Each field is its own atomic: a reader
/// always sees a whole value, but there is no consistency across fields. A
/// change is picked up on the next frame or the next hop tick.
use core::sync::atomic::{AtomicI8, AtomicU16, AtomicU8, Ordering};

use crate::error::Error;
use crate::region::{self, Region, DEFAULT_CHANNELS, DEFAULT_REGION, MAX_CHANNELS, REGIONS};

/// Mask enabling every 2.4 GHz channel. Bits above the region's channel
/// count are never selected.
pub const CHANNELS_ALL: u16 = region::mask_for(MAX_CHANNELS);

/// RSSI threshold value that disables filtering.
pub const RSSI_FILTER_OFF: i8 = 0;

pub struct ScanConfig {
    /// Minimum RSSI (dBm) to forward a frame; 0 disables the filter
    rssi_threshold: AtomicI8,
    /// Bit `c - 1` set = channel `c` eligible for rotation
    channel_mask: AtomicU16,
    channel: AtomicU8,
    /// Channel count N of the active region plan
    channel_count: AtomicU8,
    /// Index into [`REGIONS`]
    region: AtomicU8,
}

/// Point-in-time copy of [`ScanConfig`] for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub rssi_threshold: i8,
    pub channel_mask: u16,
    pub channel: u8,
    pub channel_count: u8,
    pub region: &'static Region,
}

impl ScanConfig {
    /// Capture all channels, no RSSI filter, channel 1, default region.
    pub const fn new() -> Self {
        Self {
            rssi_threshold: AtomicI8::new(RSSI_FILTER_OFF),
            channel_mask: AtomicU16::new(CHANNELS_ALL),
            channel: AtomicU8::new(1),
            channel_count: AtomicU8::new(DEFAULT_CHANNELS),
            region: AtomicU8::new(DEFAULT_REGION as u8),
        }
    }

    /// Switch the region plan. The channel mask is left as is; a current
    /// channel beyond the new plan falls back to channel 1.
    pub fn set_region(&self, code: &str) -> Result<&'static Region, Error> {
        let idx = Region::index_of(code)?;
        let region = &REGIONS[idx];
        self.region.store(idx as u8, Ordering::Relaxed);
        self.set_channel_count(region.channels);
        log::info!("Region set to {} ({} channels)", region.code, region.channels);
        Ok(region)
    }

    pub fn region(&self) -> &'static Region {
        let idx = self.region.load(Ordering::Relaxed) as usize;
        REGIONS.get(idx).unwrap_or(&REGIONS[DEFAULT_REGION])
    }

    /// Channel count N currently used by rotation.
    pub fn channel_count(&self) -> u8 {
        self.channel_count.load(Ordering::Relaxed)
    }

    /// Adopt the channel count reported by the driver for the active region.
    /// Returns true when the current channel had to be reset to 1.
    pub fn set_channel_count(&self, count: u8) -> bool {
        let count = count.clamp(1, MAX_CHANNELS);
        self.channel_count.store(count, Ordering::Relaxed);
        if self.current_channel() > count {
            self.store_channel(1);
            true
        } else {
            false
        }
    }

    pub fn channel_mask(&self) -> u16 {
        self.channel_mask.load(Ordering::Relaxed)
    }

    /// Replace the eligible-channel bitmap. Zero is accepted.
    pub fn set_channel_mask(&self, mask: u16) {
        self.channel_mask.store(mask, Ordering::Relaxed);
    }

    pub fn rssi_threshold(&self) -> i8 {
        self.rssi_threshold.load(Ordering::Relaxed)
    }

    pub fn set_rssi_threshold(&self, threshold: i8) {
        self.rssi_threshold.store(threshold, Ordering::Relaxed);
    }

    pub fn current_channel(&self) -> u8 {
        self.channel.load(Ordering::Relaxed)
    }

    /// Set the active channel, `1..=N` for the current region.
    pub fn set_current_channel(&self, channel: u8) -> Result<(), Error> {
        let max = self.channel_count();
        if channel == 0 || channel > max {
            return Err(Error::InvalidChannel { channel, max });
        }
        self.store_channel(channel);
        Ok(())
    }

    pub(crate) fn store_channel(&self, channel: u8) {
        self.channel.store(channel, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            rssi_threshold: self.rssi_threshold(),
            channel_mask: self.channel_mask(),
            channel: self.current_channel(),
            channel_count: self.channel_count(),
            region: self.region(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}
