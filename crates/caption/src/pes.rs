//! Caption PES packetization (ISO 13818-1 2.4.3.6, ARIB STD-B37 2.2.3.6,
//! ABNT NBR 15608-3 Annex A).
//!
//! Every packet carries a fixed 35-byte header:
//!
//! ```text
//!  0..3   packet_start_code_prefix 00 00 01
//!  3      stream_id (private_stream_1)
//!  4..6   PES_packet_length = 29 + payload
//!  6..9   flags, PES_header_data_length = 23
//!  9..14  PTS
//! 14      PES extension flags
//! 15..31  PES_private_data (16 bytes)
//! 31      stuffing_byte
//! 32..35  data_identifier, private_stream_id, PES_data_packet_header_length
//! ```

use std::time::Duration;

use bytes_util::ChunkedBuffer;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::Result;
use crate::clock::{Pacer, PtsClock};
use crate::config::{MIN_PES_INTERVAL, SegmentMode};

/// Largest PES packet allowed for captions (ARIB TR-B14, Fascicle 2, 4.2.2).
pub const MAX_PES_PACKET_SIZE: usize = 32 * 1024;

/// Caption PES header size, fixed by ARIB STD-B37.
pub const PES_HEADER_SIZE: usize = 35;

/// Largest payload of a single caption PES packet.
pub const MAX_PES_PAYLOAD_SIZE: usize = MAX_PES_PACKET_SIZE - PES_HEADER_SIZE;

pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Private stream 1
pub const STREAM_ID_PRIVATE_1: u8 = 0xBD;

/// Header bytes counted by `PES_packet_length` (everything after it).
pub const PES_LENGTH_OVERHEAD: usize = PES_HEADER_SIZE - 6;

/// '10', not scrambled, normal priority, no data alignment, no copyright,
/// copy.
pub const PES_FLAGS_1: u8 = 0b1000_0000;

/// PTS_DTS_flags = '10' (PTS only).
pub const PTS_ONLY_FLAG: u8 = 0b1000_0000;
/// PES_extension_flag
pub const PES_EXTENSION_FLAG: u8 = 0b0000_0001;

/// PTS (5) + extension flags (1) + private data (16) + stuffing (1).
pub const PES_HEADER_DATA_LENGTH: u8 = 23;

/// PES_private_data_flag
pub const PES_PRIVATE_DATA_FLAG: u8 = 0b1000_0000;
/// The three reserved bits between the extension flags.
pub const PES_EXTENSION_RESERVED: u8 = 0b0000_1110;

pub const PES_PRIVATE_DATA_SIZE: usize = 16;

pub const STUFFING_BYTE: u8 = 0xFF;

/// Data_identifier for synchronized PES (captions).
pub const DATA_IDENTIFIER: u8 = 0x80;
pub const PRIVATE_STREAM_ID: u8 = 0xFF;
/// Reserved '1111' and PES_data_packet_header_length 0.
pub const PES_DATA_PACKET_HEADER: u8 = 0b1111_0000;

/// `'0010' | PTS[32..30] | marker`
const PTS_PREFIX: u8 = 0b0010_0001;
const MARKER_BIT: u8 = 0b0000_0001;

/// Caption conversion information code used in one-seg mode.
pub const CCIS_CODE: [u8; 4] = *b"CCIS";
/// Caption_conversion_type: mobile.
pub const CAPTION_CONVERSION_MOBILE: u8 = 0x04;
/// DRCS_conversion_type: mobile DRCS ('10'), then six reserved '1' bits.
pub const DRCS_CONVERSION_MOBILE: u8 = 0b1011_1111;

/// Encode a 33-bit PTS into its 5-byte field with marker bits.
///
/// Layout: `[0010 | ts32..30 | 1] [ts29..22] [ts21..15 | 1] [ts14..7] [ts6..0 | 1]`
pub fn encode_pts(pts: u64) -> [u8; 5] {
    [
        PTS_PREFIX | ((pts >> 29) as u8 & 0b0000_1110),
        (pts >> 22) as u8,
        MARKER_BIT | ((pts >> 14) as u8 & 0b1111_1110),
        (pts >> 7) as u8,
        MARKER_BIT | ((pts << 1) as u8 & 0b1111_1110),
    ]
}

/// PES_private_data for `mode`.
pub fn private_data(mode: SegmentMode) -> [u8; PES_PRIVATE_DATA_SIZE] {
    let mut data = [0xFF; PES_PRIVATE_DATA_SIZE];
    match mode {
        SegmentMode::FullSeg => {}
        SegmentMode::OneSeg => {
            data[0..4].copy_from_slice(&CCIS_CODE);
            data[4] = CAPTION_CONVERSION_MOBILE;
            data[5] = DRCS_CONVERSION_MOBILE;
        }
    }
    data
}

/// Build the 35-byte caption PES header for a payload of `payload_size`
/// bytes.
pub fn encode_pes_header(
    payload_size: usize,
    pts: u64,
    mode: SegmentMode,
) -> [u8; PES_HEADER_SIZE] {
    debug_assert!(payload_size <= MAX_PES_PAYLOAD_SIZE);

    let mut h = [0u8; PES_HEADER_SIZE];
    h[0..3].copy_from_slice(&PES_START_CODE);
    h[3] = STREAM_ID_PRIVATE_1;
    h[4..6].copy_from_slice(&((PES_LENGTH_OVERHEAD + payload_size) as u16).to_be_bytes());
    h[6] = PES_FLAGS_1;
    h[7] = PTS_ONLY_FLAG | PES_EXTENSION_FLAG;
    h[8] = PES_HEADER_DATA_LENGTH;
    h[9..14].copy_from_slice(&encode_pts(pts));
    h[14] = PES_PRIVATE_DATA_FLAG | PES_EXTENSION_RESERVED;
    h[15..31].copy_from_slice(&private_data(mode));
    h[31] = STUFFING_BYTE;
    h[32] = DATA_IDENTIFIER;
    h[33] = PRIVATE_STREAM_ID;
    h[34] = PES_DATA_PACKET_HEADER;
    h
}

/// Prepend the PES header to `payload`, which must fit one packet.
pub fn build_pes_packet(mut payload: ChunkedBuffer, pts: u64, mode: SegmentMode) -> ChunkedBuffer {
    let header = encode_pes_header(payload.total_size(), pts, mode);
    payload.prepend_slice(&header);
    payload
}

/// Totals of one [`PesPacketizer::emit`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub packets: usize,
    pub bytes: usize,
}

/// Turns data groups into paced, timestamped PES packets on one stream.
#[derive(Debug)]
pub struct PesPacketizer {
    mode: SegmentMode,
    clock: PtsClock,
    pacer: Pacer,
}

impl PesPacketizer {
    pub fn new(mode: SegmentMode) -> Self {
        Self::with_interval(mode, MIN_PES_INTERVAL)
    }

    /// `interval` is raised to [`MIN_PES_INTERVAL`] when shorter.
    pub fn with_interval(mode: SegmentMode, interval: Duration) -> Self {
        Self {
            mode,
            clock: PtsClock::new(),
            pacer: Pacer::new(interval.max(MIN_PES_INTERVAL)),
        }
    }

    pub fn segment_mode(&self) -> SegmentMode {
        self.mode
    }

    /// Write `payload` to `sink` as one or more PES packets of at most
    /// [`MAX_PES_PAYLOAD_SIZE`] payload bytes each. Every packet waits out the
    /// minimum interval since the previous one before its PTS is taken.
    pub async fn emit<W>(&mut self, mut payload: ChunkedBuffer, sink: &mut W) -> Result<EmitStats>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stats = EmitStats::default();
        loop {
            let piece = if payload.total_size() > MAX_PES_PAYLOAD_SIZE {
                payload.split_prefix(MAX_PES_PAYLOAD_SIZE)
            } else {
                std::mem::take(&mut payload)
            };

            stats.bytes += self.emit_single(piece, sink).await?;
            stats.packets += 1;

            if payload.is_empty() {
                break;
            }
        }
        Ok(stats)
    }

    async fn emit_single<W>(&mut self, payload: ChunkedBuffer, sink: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        self.pacer.wait().await;

        let payload_size = payload.total_size();
        let pts = self.clock.next_pts();
        let mut packet = build_pes_packet(payload, pts, self.mode);
        let size = packet.total_size();

        let written = write_packet(sink, &mut packet).await;
        // The interval counts from the write attempt, successful or not.
        self.pacer.mark();
        written?;

        debug!(pts, payload_size, size, "Emitted caption PES packet");
        Ok(size)
    }
}

async fn write_packet<W>(sink: &mut W, packet: &mut ChunkedBuffer) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all_buf(packet).await?;
    sink.flush().await
}
