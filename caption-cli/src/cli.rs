use std::time::Duration;

use arib_caption::{CrcBoundaryPolicy, EncoderConfig, ManagementParams, SegmentMode};
use clap::Parser;

/// Encode caption lines read from stdin into an ARIB STD-B24 / ABNT NBR 15606
/// caption PES stream.
#[derive(Parser, Debug)]
#[command(name = "arib-caption", version, about, long_about = None)]
pub struct Args {
    /// Broadcast profile of the output stream
    #[arg(
        short = 'm',
        long,
        value_enum,
        default_value = "full",
        env = "ARIB_CAPTION_SEGMENT_MODE"
    )]
    pub segment_mode: SegmentMode,

    /// Output file, or `-` for stdout
    #[arg(short, long, default_value = "-", env = "ARIB_CAPTION_OUTPUT")]
    pub output: String,

    /// Seconds between caption management heartbeats
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..),
        env = "ARIB_CAPTION_HEARTBEAT"
    )]
    pub heartbeat: u64,

    /// Minimum milliseconds between PES packets (never below 100)
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    /// ISO 639-2 language code announced in caption management
    #[arg(long, default_value = "por", value_parser = parse_language)]
    pub language: [u8; 3],

    /// Pad statements with a NUL when the data group CRC would be split
    /// across two TS packets
    #[arg(long)]
    pub pad_crc_boundary: bool,

    /// Do not start the stream with a new caption management
    #[arg(long)]
    pub no_new_management: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn encoder_config(&self) -> EncoderConfig {
        let management = ManagementParams {
            language_code: self.language,
            ..ManagementParams::default()
        };
        let crc_boundary = if self.pad_crc_boundary {
            CrcBoundaryPolicy::PadDataUnit
        } else {
            CrcBoundaryPolicy::Ignore
        };

        EncoderConfig::default()
            .with_segment_mode(self.segment_mode)
            .with_management(management)
            .with_min_packet_interval(Duration::from_millis(self.interval_ms))
            .with_crc_boundary(crc_boundary)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat)
    }
}

fn parse_language(s: &str) -> Result<[u8; 3], String> {
    let bytes = s.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_lowercase) {
        return Err(format!(
            "expected a three-letter lowercase ISO 639-2 code, got {s:?}"
        ));
    }
    Ok([bytes[0], bytes[1], bytes[2]])
}
