use std::time::Duration;

use crate::data_unit::ManagementParams;

/// Minimum spacing between two caption PES packets (ARIB TR-B14, Fascicle 2,
/// Section 4.2.2).
pub const MIN_PES_INTERVAL: Duration = Duration::from_millis(100);

/// Default queue depth between caption producers and the encoder task.
pub const DEFAULT_CHANNEL_SIZE: usize = 32;

/// Broadcast profile, selects the PES private data block layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SegmentMode {
    /// Fixed reception (full-seg): unused private data.
    #[default]
    #[cfg_attr(feature = "clap", value(name = "full"))]
    FullSeg,
    /// Mobile reception (one-seg): private data carries the CCIS block.
    #[cfg_attr(feature = "clap", value(name = "one"))]
    OneSeg,
}

impl std::fmt::Display for SegmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentMode::FullSeg => write!(f, "full-seg"),
            SegmentMode::OneSeg => write!(f, "one-seg"),
        }
    }
}

/// What to do about a data group CRC that would straddle two TS packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcBoundaryPolicy {
    /// Frame exactly what the caller submitted.
    #[default]
    Ignore,
    /// Append one NUL to the data unit body when the CRC would be split.
    PadDataUnit,
}

/// Configuration of one caption elementary stream.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub segment_mode: SegmentMode,

    /// Header fields of every caption management packet.
    pub management: ManagementParams,

    /// Spacing between PES packets. Values below [`MIN_PES_INTERVAL`] are
    /// raised to it.
    pub min_packet_interval: Duration,

    pub crc_boundary: CrcBoundaryPolicy,

    /// Queue depth of the encoder task.
    pub channel_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            segment_mode: SegmentMode::default(),
            management: ManagementParams::default(),
            min_packet_interval: MIN_PES_INTERVAL,
            crc_boundary: CrcBoundaryPolicy::default(),
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

impl EncoderConfig {
    pub fn with_segment_mode(mut self, mode: SegmentMode) -> Self {
        self.segment_mode = mode;
        self
    }

    pub fn with_management(mut self, management: ManagementParams) -> Self {
        self.management = management;
        self
    }

    pub fn with_min_packet_interval(mut self, interval: Duration) -> Self {
        self.min_packet_interval = interval;
        self
    }

    pub fn with_crc_boundary(mut self, policy: CrcBoundaryPolicy) -> Self {
        self.crc_boundary = policy;
        self
    }

    pub fn with_channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }
}
