/// JSON message protocol between the capture device and a host.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::region::RegionCode;

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for error descriptions in [`DeviceMessage::Error`]
pub type ErrorString = String<64>;

/// Messages sent from the device to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Capture status report
    #[serde(rename = "status")]
    Status {
        /// Lifecycle state: "uninitialized", "initializing", "running", "stopped"
        state: &'static str,
        region: &'static str,
        /// Current channel
        ch: u8,
        /// Eligible channel bitmap
        channels: u16,
        /// RSSI floor, 0 = off
        rssi: i8,
        /// Frames seen by the capture handler
        seen: u32,
        /// Frames dropped by the RSSI floor
        filtered: u32,
        /// Frames too short to carry a source address
        malformed: u32,
        /// Addresses handed to the counting sink
        forwarded: u32,
        /// Distinct addresses in the last reporting window
        unique: u32,
        /// Uptime in seconds
        uptime: u32,
        /// Free heap in bytes
        heap_free: u32,
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
    },
    /// A host command could not be applied
    #[serde(rename = "error")]
    Error {
        cmd: &'a str,
        error: &'a ErrorString,
    },
}

/// Commands sent from the host to the device.
///
/// Deserialized via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Start capture; `interval` is the channel dwell in 10 ms units, 0 = no hopping
    Start { interval: u16 },
    /// Stop capture
    Stop,
    /// Request current status
    GetStatus,
    /// Update RSSI floor (negative dBm, 0 = off)
    SetRssi { threshold: i8 },
    /// Replace the eligible channel bitmap (bit 0 = channel 1)
    SetChannels { mask: u16 },
    /// Switch regulatory region
    SetRegion { code: RegionCode },
    /// Move to a channel
    SetChannel { channel: u8 },
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Start { .. } => "start",
            HostCommand::Stop => "stop",
            HostCommand::GetStatus => "status",
            HostCommand::SetRssi { .. } => "set_rssi",
            HostCommand::SetChannels { .. } => "set_channels",
            HostCommand::SetRegion { .. } => "set_region",
            HostCommand::SetChannel { .. } => "set_channel",
        }
    }
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: String<16>,
    #[serde(default)]
    pub interval: Option<u16>,
    #[serde(default)]
    pub rssi: Option<i8>,
    #[serde(default)]
    pub mask: Option<u16>,
    #[serde(default)]
    pub region: Option<RegionCode>,
    #[serde(default)]
    pub channel: Option<u8>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 384;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = heapless::Vec<u8, MAX_MSG_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> DeviceMessage<'static> {
        DeviceMessage::Status {
            state: "running",
            region: "DE",
            ch: 6,
            channels: 0x1FFF,
            rssi: -80,
            seen: 1200,
            filtered: 300,
            malformed: 4,
            forwarded: 896,
            unique: 37,
            uptime: 120,
            heap_free: 48000,
            board: "test_board",
            version: "0.1.0",
        }
    }

    #[test]
    fn serialize_status_message() {
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serde_json_core::to_slice(&status(), &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.starts_with(r#"{"type":"status""#));
        assert!(json.contains(r#""state":"running""#));
        assert!(json.contains(r#""region":"DE""#));
        assert!(json.contains(r#""ch":6"#));
        assert!(json.contains(r#""channels":8191"#));
        assert!(json.contains(r#""rssi":-80"#));
        assert!(json.contains(r#""forwarded":896"#));
        assert!(json.contains(r#""board":"test_board""#));
    }

    #[test]
    fn status_with_extreme_values_fits_buffer() {
        let msg = DeviceMessage::Status {
            state: "uninitialized",
            region: "01",
            ch: 14,
            channels: u16::MAX,
            rssi: i8::MIN,
            seen: u32::MAX,
            filtered: u32::MAX,
            malformed: u32::MAX,
            forwarded: u32::MAX,
            unique: u32::MAX,
            uptime: u32::MAX,
            heap_free: u32::MAX,
            board: "m5stickc_plus2",
            version: VERSION,
        };
        let mut buf = [0u8; MAX_MSG_LEN];
        assert!(serde_json_core::to_slice(&msg, &mut buf).is_ok());
    }

    #[test]
    fn serialize_error_message() {
        let error = ErrorString::try_from("unsupported region 'ZZ'").unwrap();
        let msg = DeviceMessage::Error {
            cmd: "set_region",
            error: &error,
        };
        let mut buf = [0u8; 128];
        let len = serde_json_core::to_slice(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(
            json,
            r#"{"type":"error","cmd":"set_region","error":"unsupported region 'ZZ'"}"#
        );
    }

    #[test]
    fn command_names_are_wire_names() {
        assert_eq!(HostCommand::Start { interval: 0 }.name(), "start");
        assert_eq!(HostCommand::SetChannels { mask: 1 }.name(), "set_channels");
    }

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
