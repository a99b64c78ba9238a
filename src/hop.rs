/// Channel rotation driven by a periodic timer.
///
/// Each tick advances the current channel circularly over `1..=N`, skipping
/// channels whose mask bit is clear, and tunes the radio to the result at
/// HT20. The search is bounded by N probes: an empty mask (or one with only
/// bits above N) holds the current channel and skips the driver call.
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::config::ScanConfig;
use crate::error::Error;
use crate::radio::{Bandwidth, ChannelTuner, RadioError, RadioOp};
use crate::region::MAX_CHANNELS;
use crate::timer::TimerCallback;

/// Hop interval unit. `start(interval)` hops every `interval * 10` ms.
pub const HOP_INTERVAL_UNIT_MS: u32 = 10;

/// Default hop interval (500 ms dwell per channel).
pub const DEFAULT_HOP_INTERVAL: u16 = 50;

/// Timer period for a hop interval.
pub const fn hop_period_ms(interval: u16) -> u32 {
    interval as u32 * HOP_INTERVAL_UNIT_MS
}

/// Next eligible channel after `current`, or `None` if no channel in
/// `1..=count` has its bit set in `mask`.
pub fn next_channel(current: u8, mask: u16, count: u8) -> Option<u8> {
    let count = count.min(MAX_CHANNELS);
    let mut channel = current;
    for _ in 0..count {
        channel = (channel % count) + 1;
        if (mask >> (channel - 1)) & 1 == 1 {
            return Some(channel);
        }
    }
    None
}

/// Rotation state shared with the timer service.
pub struct ChannelHopper<'a, T> {
    config: &'a ScanConfig,
    tuner: T,
    /// Set on the first tick that found no eligible channel
    holding: AtomicBool,
    /// Latched tuning failure; ticks are no-ops until cleared
    faulted: AtomicBool,
    fault_code: AtomicI32,
}

impl<'a, T: ChannelTuner> ChannelHopper<'a, T> {
    pub const fn new(config: &'a ScanConfig, tuner: T) -> Self {
        Self {
            config,
            tuner,
            holding: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            fault_code: AtomicI32::new(0),
        }
    }

    pub fn config(&self) -> &'a ScanConfig {
        self.config
    }

    pub fn tuner(&self) -> &T {
        &self.tuner
    }

    /// One rotation step. Returns the channel the radio was tuned to.
    pub fn hop(&self) -> Result<u8, Error> {
        let count = self.config.channel_count();
        let mask = self.config.channel_mask();
        let current = self.config.current_channel();

        let channel = next_channel(current, mask, count).ok_or(Error::NoEligibleChannel)?;
        self.config.store_channel(channel);
        self.tuner
            .set_channel(channel, Bandwidth::Ht20)
            .map_err(Error::Radio)?;
        Ok(channel)
    }

    /// Tune the radio to the configured channel without advancing.
    pub fn tune_current(&self) -> Result<u8, RadioError> {
        let channel = self.config.current_channel();
        self.tuner.set_channel(channel, Bandwidth::Ht20)?;
        Ok(channel)
    }

    /// Tune to the configured channel if it is eligible, else to the next
    /// eligible one. `None` with an empty mask: nothing is tuned.
    pub fn tune_first_eligible(&self) -> Result<Option<u8>, RadioError> {
        let current = self.config.current_channel();
        let Some(channel) = next_channel(
            current.saturating_sub(1),
            self.config.channel_mask(),
            self.config.channel_count(),
        ) else {
            return Ok(None);
        };
        self.config.store_channel(channel);
        self.tuner.set_channel(channel, Bandwidth::Ht20)?;
        Ok(Some(channel))
    }

    /// Tuning failure latched by a timer tick.
    pub fn fault(&self) -> Option<RadioError> {
        if self.faulted.load(Ordering::Acquire) {
            Some(RadioError::new(
                RadioOp::SetChannel,
                self.fault_code.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }

    pub fn clear_fault(&self) {
        self.faulted.store(false, Ordering::Release);
        self.holding.store(false, Ordering::Relaxed);
    }
}

impl<T: ChannelTuner> TimerCallback for ChannelHopper<'_, T> {
    fn on_timer(&self) {
        if self.faulted.load(Ordering::Acquire) {
            return;
        }
        match self.hop() {
            Ok(channel) => {
                if self.holding.swap(false, Ordering::Relaxed) {
                    log::info!("Channel rotation resumed on channel {}", channel);
                }
            }
            Err(Error::NoEligibleChannel) => {
                if !self.holding.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "No eligible channel in mask {:#06x}, holding channel {}",
                        self.config.channel_mask(),
                        self.config.current_channel()
                    );
                }
            }
            Err(Error::Radio(e)) => {
                self.fault_code.store(e.code, Ordering::Relaxed);
                self.faulted.store(true, Ordering::Release);
                log::error!("Channel switch failed: {}", e);
            }
            Err(e) => log::error!("Channel rotation error: {}", e),
        }
    }
}
