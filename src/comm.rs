/// Serial NDJSON transport helpers.
///
/// The device streams status messages as newline-delimited JSON on the
/// serial console and accepts commands on the same line.
use core::fmt::Write;

use crate::error::Error;
use crate::protocol::{
    DeviceMessage, ErrorString, HostCommand, MacString, MsgBuffer, RawCommand, MAX_MSG_LEN,
};
use crate::radio::{ChannelTuner, Radio};
use crate::sniffer::Sniffer;
use crate::timer::TimerService;

/// Serial baud rate
pub const SERIAL_BAUD: u32 = 115200;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Serialize into a fresh [`MsgBuffer`].
pub fn encode_message(msg: &DeviceMessage) -> Option<MsgBuffer> {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok()?;
    let len = serialize_message(msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

/// Deserialize a HostCommand from a JSON byte slice.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    // Strip trailing newline/whitespace
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    let cmd = match raw.cmd.as_str() {
        "start" => HostCommand::Start {
            interval: raw.interval.unwrap_or(crate::hop::DEFAULT_HOP_INTERVAL),
        },
        "stop" => HostCommand::Stop,
        "status" => HostCommand::GetStatus,
        "set_rssi" => HostCommand::SetRssi {
            threshold: raw.rssi?,
        },
        "set_channels" => HostCommand::SetChannels { mask: raw.mask? },
        "set_region" => HostCommand::SetRegion { code: raw.region? },
        "set_channel" => HostCommand::SetChannel {
            channel: raw.channel?,
        },
        _ => return None,
    };
    Some(cmd)
}

/// Apply a host command to the capture controller.
pub fn handle_command<R, T, C>(
    cmd: &HostCommand,
    sniffer: &mut Sniffer<R, T, C>,
) -> Result<(), Error>
where
    R: Radio,
    T: TimerService,
    C: ChannelTuner + 'static,
{
    match cmd {
        HostCommand::Start { interval } => {
            log::info!("Capture started by host command");
            sniffer.start(*interval)
        }
        HostCommand::Stop => {
            log::info!("Capture stopped by host command");
            sniffer.stop();
            Ok(())
        }
        // Status message is built by the caller with uptime/heap data
        HostCommand::GetStatus => Ok(()),
        HostCommand::SetRssi { threshold } => {
            sniffer.set_rssi_threshold(*threshold);
            Ok(())
        }
        HostCommand::SetChannels { mask } => {
            sniffer.set_channel_mask(*mask);
            Ok(())
        }
        HostCommand::SetRegion { code } => sniffer.set_region(code).map(|_| ()),
        HostCommand::SetChannel { channel } => sniffer.set_channel(*channel),
    }
}

/// Build the error reply for a failed command.
pub fn error_string(err: &Error) -> ErrorString {
    let mut s = ErrorString::new();
    // Truncated on overflow
    let _ = write!(s, "{}", err);
    s
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// Serial NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    overflowed: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            overflowed: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let overflowed = core::mem::replace(&mut self.overflowed, false);
            let len = core::mem::replace(&mut self.pos, 0);
            if len > 0 && !overflowed {
                Some(&self.buf[..len])
            } else {
                None
            }
        } else if self.overflowed {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: discard the rest of this line
            self.overflowed = true;
            self.pos = 0;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &data[..end]
}
