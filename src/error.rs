/// Error types for the capture engine.
///
/// Control-path calls (`start`, `set_region`, `set_channel`) return these
/// synchronously. The frame path never produces an error: malformed frames
/// are counted and dropped inside [`crate::capture::Capture`].
use crate::radio::RadioError;
use crate::region::RegionCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Region code not present in the region table.
    #[error("unsupported region '{0}'")]
    UnsupportedRegion(RegionCode),

    /// A driver call failed while bringing capture up. Capture is stopped.
    #[error("radio init failed: {0}")]
    RadioInit(RadioError),

    /// A driver call failed on a running radio.
    #[error("radio error: {0}")]
    Radio(RadioError),

    /// The channel mask has no bit set inside the region's channel range.
    #[error("no eligible channel in mask")]
    NoEligibleChannel,

    /// Channel number outside `1..=max` for the current region.
    #[error("channel {channel} outside 1..={max}")]
    InvalidChannel { channel: u8, max: u8 },

    /// `start` called while capture is initializing or running.
    #[error("capture already running")]
    AlreadyRunning,
}
