/// Capture lifecycle: radio bring-up, hop timer, teardown.
///
/// `start`/`stop` are meant for a single control context. A caller that
/// drives them from several threads wraps the [`Sniffer`] in a mutex.
///
/// ```text
/// Uninitialized ──start──▶ Initializing ──ok──▶ Running
///                              │                  │
///                            error               stop
///                              ▼                  ▼
///                           Stopped ◀─────────────┘   (start again from Stopped)
/// ```
use crate::config::ScanConfig;
use crate::error::Error;
use crate::hop::{hop_period_ms, ChannelHopper};
use crate::radio::{BufferConfig, ChannelTuner, FrameCallback, FrameFilter, Radio, RadioError};
use crate::region::Region;
use crate::timer::TimerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Uninitialized => "uninitialized",
            CaptureState::Initializing => "initializing",
            CaptureState::Running => "running",
            CaptureState::Stopped => "stopped",
        }
    }
}

/// Lifecycle controller tying the radio, the hop timer and the shared
/// configuration together.
pub struct Sniffer<R, T: TimerService, C: 'static> {
    radio: R,
    timers: T,
    config: &'static ScanConfig,
    hopper: &'static ChannelHopper<'static, C>,
    hop_timer: Option<T::Handle>,
    radio_up: bool,
    capture_installed: bool,
    promiscuous: bool,
    state: CaptureState,
}

impl<R, T, C> Sniffer<R, T, C>
where
    R: Radio,
    T: TimerService,
    C: ChannelTuner + 'static,
{
    pub fn new(radio: R, timers: T, hopper: &'static ChannelHopper<'static, C>) -> Self {
        Self {
            radio,
            timers,
            config: hopper.config(),
            hopper,
            hop_timer: None,
            radio_up: false,
            capture_installed: false,
            promiscuous: false,
            state: CaptureState::Uninitialized,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CaptureState::Running
    }

    pub fn config(&self) -> &'static ScanConfig {
        self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Bring up promiscuous capture. `switch_interval` is the channel dwell
    /// time in units of 10 ms; 0 keeps the radio on the configured channel.
    pub fn start(&mut self, switch_interval: u16) -> Result<(), Error> {
        if matches!(
            self.state,
            CaptureState::Initializing | CaptureState::Running
        ) {
            log::warn!("Capture start ignored: already {}", self.state.as_str());
            return Err(Error::AlreadyRunning);
        }

        self.state = CaptureState::Initializing;
        match self.bring_up(switch_interval) {
            Ok(()) => {
                self.state = CaptureState::Running;
                log::info!(
                    "WiFi capture running: region {}, channel {}, mask {:#06x}, rssi {}",
                    self.config.region().code,
                    self.config.current_channel(),
                    self.config.channel_mask(),
                    self.config.rssi_threshold(),
                );
                Ok(())
            }
            Err(e) => {
                log::error!("WiFi capture init failed: {}", e);
                self.tear_down();
                self.state = CaptureState::Stopped;
                Err(Error::RadioInit(e))
            }
        }
    }

    fn bring_up(&mut self, switch_interval: u16) -> Result<(), RadioError> {
        // Set first so a partial init is still released by teardown
        self.radio_up = true;
        self.radio.init(&BufferConfig::SNIFFER)?;

        self.radio.set_country(self.config.region())?;
        let count = self.radio.region_channel_count()?;
        if count > 0 {
            self.config.set_channel_count(count);
        }

        self.radio.set_frame_filter(FrameFilter::CAPTURE)?;
        self.radio.register_frame_callback(FrameCallback::Capture)?;
        self.capture_installed = true;
        self.radio.set_promiscuous(true)?;
        self.promiscuous = true;

        self.hopper.clear_fault();
        if switch_interval > 0 {
            match self.hopper.tune_first_eligible()? {
                Some(channel) => log::debug!("Tuned to channel {}", channel),
                None => log::warn!(
                    "No eligible channel in mask {:#06x}, holding channel {}",
                    self.config.channel_mask(),
                    self.config.current_channel()
                ),
            }
            let period = hop_period_ms(switch_interval);
            let mut handle = self.timers.create_periodic(period, self.hopper)?;
            self.timers.start(&mut handle)?;
            self.hop_timer = Some(handle);
            log::info!("Channel rotation every {} ms", period);
        } else {
            // A pinned channel is an explicit choice and ignores the mask
            let channel = self.hopper.tune_current()?;
            log::info!("Channel rotation disabled, staying on channel {}", channel);
        }
        Ok(())
    }

    /// Stop capture. No-op unless running.
    pub fn stop(&mut self) {
        if self.state != CaptureState::Running {
            return;
        }
        self.tear_down();
        self.state = CaptureState::Stopped;
        log::info!("WiFi capture stopped");
    }

    /// Release everything `bring_up` acquired. Failures are logged and the
    /// teardown carries on.
    fn tear_down(&mut self) {
        if let Some(mut handle) = self.hop_timer.take() {
            if let Err(e) = self.timers.stop(&mut handle) {
                log::warn!("Hop timer stop failed: {}", e);
            }
        }
        if !self.radio_up {
            return;
        }
        // Swap in the no-op handler before anything is released
        if self.capture_installed {
            if let Err(e) = self.radio.register_frame_callback(FrameCallback::Discard) {
                log::warn!("Installing discard callback failed: {}", e);
            }
            self.capture_installed = false;
        }
        if self.promiscuous {
            if let Err(e) = self.radio.set_promiscuous(false) {
                log::warn!("Disabling promiscuous mode failed: {}", e);
            }
            self.promiscuous = false;
        }
        self.radio.deinit();
        self.radio_up = false;
    }

    /// Abort capture if the hop timer latched a tuning failure.
    pub fn check_hop_fault(&mut self) -> Option<RadioError> {
        if self.state != CaptureState::Running {
            return None;
        }
        let fault = self.hopper.fault()?;
        log::error!("Aborting capture after channel switch failure: {}", fault);
        self.stop();
        Some(fault)
    }

    /// Change the regulatory region; a running radio is reconfigured.
    ///
    /// On a running radio the new country and its channel count are
    /// applied to the driver before the config is touched, so an error
    /// leaves the previous region in effect. A current channel outside the
    /// new plan falls back to channel 1.
    pub fn set_region(&mut self, code: &str) -> Result<&'static Region, Error> {
        let region = Region::lookup(code)?;
        let mut driver_count = 0;
        if self.is_running() {
            let previous = self.config.region();
            self.radio.set_country(region).map_err(Error::Radio)?;
            driver_count = match self.radio.region_channel_count() {
                Ok(count) => count,
                Err(e) => {
                    if let Err(restore) = self.radio.set_country(previous) {
                        log::warn!("Restoring country {} failed: {}", previous.code, restore);
                    }
                    return Err(Error::Radio(e));
                }
            };
        }

        let before = self.config.current_channel();
        self.config.set_region(code)?;
        if driver_count > 0 {
            self.config.set_channel_count(driver_count);
        }

        let channel = self.config.current_channel();
        if channel != before {
            log::info!("Channel {} not legal in {}, moved to {}", before, region.code, channel);
            if self.is_running() {
                // Region is applied; a failed retune is left to the next hop
                if let Err(e) = self.hopper.tune_current() {
                    log::error!("Retune after region change failed: {}", e);
                }
            }
        }
        Ok(region)
    }

    pub fn set_channel_mask(&self, mask: u16) {
        self.config.set_channel_mask(mask);
        log::info!("Channel mask set to {:#06x}", mask);
    }

    pub fn set_rssi_threshold(&self, threshold: i8) {
        self.config.set_rssi_threshold(threshold);
        log::info!("RSSI threshold set to {}", threshold);
    }

    /// Move to `channel`; a running radio is tuned immediately. The mask is
    /// not consulted: an explicit channel is honored until the next hop.
    pub fn set_channel(&self, channel: u8) -> Result<(), Error> {
        self.config.set_current_channel(channel)?;
        if self.is_running() {
            self.hopper.tune_current().map_err(Error::Radio)?;
        }
        Ok(())
    }
}
