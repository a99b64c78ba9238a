/// Radio driver boundary.
///
/// The capture engine never talks to hardware directly. Platform crates
/// implement [`Radio`] for lifecycle control and [`ChannelTuner`] for the
/// channel switch issued from the hop timer. `Option<R>` implements both:
/// `None` behaves as a radio that accepts every call and delivers nothing,
/// so a build can run with capture disabled without touching the engine.
use core::fmt;

use crate::region::Region;

/// Which handler the driver routes received frames to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCallback {
    /// The capture handler (RSSI filter + address extraction)
    Capture,
    /// No-op handler, installed before teardown
    Discard,
}

/// Promiscuous frame filter mask. Bit values match the ESP-IDF driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFilter(pub u32);

impl FrameFilter {
    pub const MGMT: Self = Self(1 << 0);
    pub const CTRL: Self = Self(1 << 1);
    pub const DATA: Self = Self(1 << 2);
    pub const MISC: Self = Self(1 << 3);

    /// Management and data frames, the ones carrying a transmitter address
    pub const CAPTURE: Self = Self(Self::MGMT.0 | Self::DATA.0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for FrameFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Secondary channel selection for `set_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    /// 20 MHz, no secondary channel
    Ht20,
    Ht40Above,
    Ht40Below,
}

/// Driver buffer sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    pub static_rx: u8,
    pub dynamic_rx: u8,
    /// Block-ack window, twice the static RX count
    pub rx_ba_window: u8,
    pub static_tx: u8,
    pub dynamic_tx: u8,
    /// Must be non-zero
    pub cache_tx: u8,
}

impl BufferConfig {
    /// Receive-heavy sizing for sniffing. Nothing is transmitted, so the TX
    /// side is kept at the driver minimum.
    pub const SNIFFER: Self = Self {
        static_rx: 16,
        dynamic_rx: 64,
        rx_ba_window: 32,
        static_tx: 0,
        dynamic_tx: 4,
        cache_tx: 4,
    };
}

/// Driver call that failed, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOp {
    Init,
    SetCountry,
    GetCountry,
    SetFilter,
    SetCallback,
    SetPromiscuous,
    SetChannel,
    TimerCreate,
    TimerStart,
    TimerStop,
}

impl RadioOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioOp::Init => "init",
            RadioOp::SetCountry => "set_country",
            RadioOp::GetCountry => "get_country",
            RadioOp::SetFilter => "set_filter",
            RadioOp::SetCallback => "set_callback",
            RadioOp::SetPromiscuous => "set_promiscuous",
            RadioOp::SetChannel => "set_channel",
            RadioOp::TimerCreate => "timer_create",
            RadioOp::TimerStart => "timer_start",
            RadioOp::TimerStop => "timer_stop",
        }
    }
}

impl fmt::Display for RadioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed driver or timer call with the platform's error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed (code {code})")]
pub struct RadioError {
    pub op: RadioOp,
    pub code: i32,
}

impl RadioError {
    pub const fn new(op: RadioOp, code: i32) -> Self {
        Self { op, code }
    }
}

/// Lifecycle side of the radio driver. Called from the control context only.
pub trait Radio {
    /// Bring the driver up in a non-associating mode with the given buffers.
    fn init(&mut self, buffers: &BufferConfig) -> Result<(), RadioError>;

    /// Configure the regulatory domain.
    fn set_country(&mut self, region: &Region) -> Result<(), RadioError>;

    /// Channel count the driver applies for the configured country, or 0
    /// when the driver has no channel plan of its own.
    fn region_channel_count(&self) -> Result<u8, RadioError>;

    fn set_frame_filter(&mut self, filter: FrameFilter) -> Result<(), RadioError>;

    fn register_frame_callback(&mut self, callback: FrameCallback) -> Result<(), RadioError>;

    fn set_promiscuous(&mut self, enabled: bool) -> Result<(), RadioError>;

    /// Release driver resources. Never fails from the caller's view.
    fn deinit(&mut self);
}

/// Channel switching. Called from the hop timer context, so `&self`.
pub trait ChannelTuner: Sync {
    fn set_channel(&self, channel: u8, bandwidth: Bandwidth) -> Result<(), RadioError>;
}

/// Radio used when capture is disabled: every call succeeds, no frames
/// are ever delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRadio;

impl Radio for NullRadio {
    fn init(&mut self, _buffers: &BufferConfig) -> Result<(), RadioError> {
        log::info!("WiFi capture disabled, using null radio");
        Ok(())
    }

    fn set_country(&mut self, _region: &Region) -> Result<(), RadioError> {
        Ok(())
    }

    fn region_channel_count(&self) -> Result<u8, RadioError> {
        Ok(0)
    }

    fn set_frame_filter(&mut self, _filter: FrameFilter) -> Result<(), RadioError> {
        Ok(())
    }

    fn register_frame_callback(&mut self, _callback: FrameCallback) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_promiscuous(&mut self, _enabled: bool) -> Result<(), RadioError> {
        Ok(())
    }

    fn deinit(&mut self) {}
}

/// Tuner counterpart of [`NullRadio`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTuner;

impl ChannelTuner for NullTuner {
    fn set_channel(&self, _channel: u8, _bandwidth: Bandwidth) -> Result<(), RadioError> {
        Ok(())
    }
}

impl<R: Radio> Radio for Option<R> {
    fn init(&mut self, buffers: &BufferConfig) -> Result<(), RadioError> {
        match self {
            Some(radio) => radio.init(buffers),
            None => NullRadio.init(buffers),
        }
    }

    fn set_country(&mut self, region: &Region) -> Result<(), RadioError> {
        match self {
            Some(radio) => radio.set_country(region),
            None => NullRadio.set_country(region),
        }
    }

    fn region_channel_count(&self) -> Result<u8, RadioError> {
        match self {
            Some(radio) => radio.region_channel_count(),
            None => NullRadio.region_channel_count(),
        }
    }

    fn set_frame_filter(&mut self, filter: FrameFilter) -> Result<(), RadioError> {
        match self {
            Some(radio) => radio.set_frame_filter(filter),
            None => NullRadio.set_frame_filter(filter),
        }
    }

    fn register_frame_callback(&mut self, callback: FrameCallback) -> Result<(), RadioError> {
        match self {
            Some(radio) => radio.register_frame_callback(callback),
            None => NullRadio.register_frame_callback(callback),
        }
    }

    fn set_promiscuous(&mut self, enabled: bool) -> Result<(), RadioError> {
        match self {
            Some(radio) => radio.set_promiscuous(enabled),
            None => NullRadio.set_promiscuous(enabled),
        }
    }

    fn deinit(&mut self) {
        if let Some(radio) = self {
            radio.deinit();
        }
    }
}

impl<T: ChannelTuner> ChannelTuner for Option<T> {
    fn set_channel(&self, channel: u8, bandwidth: Bandwidth) -> Result<(), RadioError> {
        match self {
            Some(tuner) => tuner.set_channel(channel, bandwidth),
            None => NullTuner.set_channel(channel, bandwidth),
        }
    }
}
