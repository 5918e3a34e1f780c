//! Data unit and caption data framing (ARIB STD-B24 Volume 1, Part 3, Chapter 9).
//!
//! Layers, innermost first:
//!
//! ```text
//! data_unit        0x1F | data_unit_parameter | data_unit_size(24) | body
//! caption_statement TMD/flags | data_unit_loop_length(24) | data_unit...
//! caption_management TMD | languages... | data_unit_loop_length(24) | data_unit...
//! ```
//!
//! Each header is prepended onto the [`ChunkedBuffer`] holding everything
//! below it.

use bytes_util::ChunkedBuffer;

use crate::data_group::{DATA_GROUP_CRC_SIZE, DATA_GROUP_HEADER_SIZE, MAX_DATA_GROUP_SIZE};
use crate::pes::{MAX_PES_PAYLOAD_SIZE, PES_HEADER_SIZE};
use crate::{CaptionError, Result};

/// Largest value of a 24-bit length field.
pub const MAX_U24: usize = 0xFF_FFFF;

/// `unit_separator` opening every data unit.
pub const UNIT_SEPARATOR: u8 = 0x1F;

pub const DATA_UNIT_HEADER_SIZE: usize = 5;
pub const STATEMENT_HEADER_SIZE: usize = 4;
pub const MANAGEMENT_HEADER_SIZE: usize = 10;

/// TMD = free ('00') followed by six reserved '1' bits.
const TMD_FREE: u8 = 0b0011_1111;

/// Payload size of one MPEG-TS packet; used only for the CRC boundary rule.
pub const TS_PAYLOAD_SIZE: usize = 184;

/// Caption data type carried in `data_group_id`.
///
/// `NewManagement` is not transmitted as such: it is sent as
/// `OldManagement` after flipping the group A/B selector and bumping the
/// data group version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptionDataType {
    OldManagement,
    Statement1,
    Statement2,
    Statement3,
    Statement4,
    Statement5,
    Statement6,
    Statement7,
    Statement8,
    NewManagement,
}

impl CaptionDataType {
    /// Statement for language `number` (1..=8).
    pub fn statement(number: u8) -> Option<Self> {
        Some(match number {
            1 => Self::Statement1,
            2 => Self::Statement2,
            3 => Self::Statement3,
            4 => Self::Statement4,
            5 => Self::Statement5,
            6 => Self::Statement6,
            7 => Self::Statement7,
            8 => Self::Statement8,
            _ => return None,
        })
    }

    /// Value placed in the low bits of `data_group_id`.
    pub fn id(self) -> u8 {
        match self {
            Self::OldManagement | Self::NewManagement => 0x00,
            Self::Statement1 => 0x01,
            Self::Statement2 => 0x02,
            Self::Statement3 => 0x03,
            Self::Statement4 => 0x04,
            Self::Statement5 => 0x05,
            Self::Statement6 => 0x06,
            Self::Statement7 => 0x07,
            Self::Statement8 => 0x08,
        }
    }

    pub fn is_management(self) -> bool {
        matches!(self, Self::OldManagement | Self::NewManagement)
    }

    pub fn is_statement(self) -> bool {
        !self.is_management()
    }

    fn caption_header_size(self) -> usize {
        if self.is_management() {
            MANAGEMENT_HEADER_SIZE
        } else {
            STATEMENT_HEADER_SIZE
        }
    }
}

/// `data_unit_parameter` values (ARIB STD-B24 Table 9-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataUnitType {
    StatementBody = 0x20,
    Geometric = 0x28,
    SynthesizedSound = 0x2C,
    OneByteDrcs = 0x30,
    TwoByteDrcs = 0x31,
    ColorMap = 0x34,
    Bitmap = 0x35,
}

impl From<DataUnitType> for u8 {
    fn from(value: DataUnitType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for DataUnitType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0x20 => Self::StatementBody,
            0x28 => Self::Geometric,
            0x2C => Self::SynthesizedSound,
            0x30 => Self::OneByteDrcs,
            0x31 => Self::TwoByteDrcs,
            0x34 => Self::ColorMap,
            0x35 => Self::Bitmap,
            other => return Err(other),
        })
    }
}

/// Fields of the single-language caption management header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementParams {
    /// ISO 639-2 language code, e.g. `b"por"`.
    pub language_code: [u8; 3],
    /// 3-bit language tag.
    pub language_tag: u8,
    /// 4-bit display mode (DMF).
    pub dmf: u8,
    /// 4-bit display format.
    pub format: u8,
    /// 2-bit character coding (TCS), 0 = 8-bit code.
    pub tcs: u8,
    /// Roll-up mode instead of non-roll-up.
    pub rollup: bool,
}

impl Default for ManagementParams {
    fn default() -> Self {
        Self {
            language_code: *b"por",
            language_tag: 0,
            // automatic display on reception and on playback, selectable
            dmf: 0b1010,
            // horizontal writing, 960x540
            format: 0b1000,
            tcs: 0b00,
            rollup: true,
        }
    }
}

impl ManagementParams {
    /// `language_tag(3) | '1' | DMF(4)`
    pub fn language_byte(&self) -> u8 {
        ((self.language_tag & 0b111) << 5) | 0b0001_0000 | (self.dmf & 0b1111)
    }

    /// `Format(4) | TCS(2) | rollup_mode(2)`
    pub fn format_byte(&self) -> u8 {
        ((self.format & 0b1111) << 4) | ((self.tcs & 0b11) << 2) | u8::from(self.rollup)
    }
}

fn write_u24(to: &mut [u8], value: usize) {
    debug_assert!(value <= MAX_U24);
    to[0] = (value >> 16) as u8;
    to[1] = (value >> 8) as u8;
    to[2] = value as u8;
}

/// Prepend the 5-byte data unit header to `buf`.
pub fn wrap_data_unit(du_type: DataUnitType, buf: &mut ChunkedBuffer) -> Result<()> {
    let size = buf.total_size();
    if size > MAX_U24 {
        return Err(CaptionError::DataUnitTooLarge {
            size,
            max: MAX_U24,
        });
    }

    let header = buf.prepend(DATA_UNIT_HEADER_SIZE);
    header[0] = UNIT_SEPARATOR;
    header[1] = du_type.into();
    write_u24(&mut header[2..5], size);
    Ok(())
}

/// Prepend the caption management header (10 bytes). `buf` holds the data
/// unit loop and may be empty.
pub fn frame_management(
    cd_type: CaptionDataType,
    params: &ManagementParams,
    buf: &mut ChunkedBuffer,
) -> Result<()> {
    if !cd_type.is_management() {
        return Err(CaptionError::NotManagement(cd_type));
    }
    let loop_length = buf.total_size();
    if loop_length > MAX_U24 {
        return Err(CaptionError::DataUnitTooLarge {
            size: loop_length,
            max: MAX_U24,
        });
    }

    let header = buf.prepend(MANAGEMENT_HEADER_SIZE);
    header[0] = TMD_FREE;
    // num_languages
    header[1] = 1;
    header[2] = params.language_byte();
    header[3..6].copy_from_slice(&params.language_code);
    header[6] = params.format_byte();
    write_u24(&mut header[7..10], loop_length);
    Ok(())
}

/// Prepend the caption statement header (4 bytes). The data unit loop must
/// not be empty.
pub fn frame_statement(cd_type: CaptionDataType, buf: &mut ChunkedBuffer) -> Result<()> {
    if !cd_type.is_statement() {
        return Err(CaptionError::NotStatement(cd_type));
    }
    let loop_length = buf.total_size();
    if loop_length == 0 {
        return Err(CaptionError::EmptyStatement);
    }
    if loop_length > MAX_U24 {
        return Err(CaptionError::DataUnitTooLarge {
            size: loop_length,
            max: MAX_U24,
        });
    }

    let header = buf.prepend(STATEMENT_HEADER_SIZE);
    header[0] = TMD_FREE;
    write_u24(&mut header[1..4], loop_length);
    Ok(())
}

/// Prepend the caption data header matching `cd_type`.
pub fn frame_caption_data(
    cd_type: CaptionDataType,
    params: &ManagementParams,
    buf: &mut ChunkedBuffer,
) -> Result<()> {
    if cd_type.is_management() {
        frame_management(cd_type, params, buf)
    } else {
        frame_statement(cd_type, buf)
    }
}

/// Wrap `buf` as one data unit and then as caption data of kind `cd_type`.
pub fn frame_data_unit(
    cd_type: CaptionDataType,
    du_type: DataUnitType,
    params: &ManagementParams,
    buf: &mut ChunkedBuffer,
) -> Result<()> {
    wrap_data_unit(du_type, buf)?;
    frame_caption_data(cd_type, params, buf)
}

/// Bytes of padding to append to a data unit body of `body_len` bytes so the
/// data group CRC is not split across two MPEG-TS packets.
///
/// The last PES packet of the group ends with the CRC. When that packet's
/// size is `1 (mod 184)`, the final TS packet would carry only the second
/// CRC byte; one extra body byte moves both bytes into the same TS packet.
pub fn crc_boundary_padding(cd_type: CaptionDataType, body_len: usize) -> usize {
    let caption_len = body_len + DATA_UNIT_HEADER_SIZE + cd_type.caption_header_size();

    let pieces = caption_len.div_ceil(MAX_DATA_GROUP_SIZE).max(1);
    let last_piece = caption_len - MAX_DATA_GROUP_SIZE * (pieces - 1);
    let group_len = DATA_GROUP_HEADER_SIZE + last_piece + DATA_GROUP_CRC_SIZE;

    let packets = group_len.div_ceil(MAX_PES_PAYLOAD_SIZE).max(1);
    let last_packet = PES_HEADER_SIZE + group_len - MAX_PES_PAYLOAD_SIZE * (packets - 1);

    usize::from(last_packet % TS_PAYLOAD_SIZE == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_unit_header() {
        let mut buf = ChunkedBuffer::from(&b"TEST"[..]);
        wrap_data_unit(DataUnitType::StatementBody, &mut buf).unwrap();
        assert_eq!(buf.to_vec(), b"\x1f\x20\x00\x00\x04TEST");
        assert_eq!(buf.chunk_count(), 2);
    }

    #[test]
    fn test_data_unit_too_large() {
        let mut buf = ChunkedBuffer::with_size(MAX_U24 + 1);
        let err = wrap_data_unit(DataUnitType::Bitmap, &mut buf).unwrap_err();
        assert!(matches!(err, CaptionError::DataUnitTooLarge { size, .. } if size == MAX_U24 + 1));
        // nothing was prepended
        assert_eq!(buf.chunk_count(), 1);
    }

    #[test]
    fn test_statement_header() {
        let mut buf = ChunkedBuffer::from(vec![0xAA; 300]);
        frame_statement(CaptionDataType::Statement1, &mut buf).unwrap();
        let bytes = buf.to_vec();
        assert_eq!(&bytes[..4], &[0x3F, 0x00, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 304);
    }

    #[test]
    fn test_statement_rejects_empty_and_management() {
        let mut buf = ChunkedBuffer::new();
        assert!(matches!(
            frame_statement(CaptionDataType::Statement2, &mut buf),
            Err(CaptionError::EmptyStatement)
        ));
        let mut buf = ChunkedBuffer::from(&[1u8][..]);
        assert!(matches!(
            frame_statement(CaptionDataType::OldManagement, &mut buf),
            Err(CaptionError::NotStatement(CaptionDataType::OldManagement))
        ));
    }

    #[test]
    fn test_management_header_defaults() {
        let mut buf = ChunkedBuffer::new();
        frame_management(
            CaptionDataType::OldManagement,
            &ManagementParams::default(),
            &mut buf,
        )
        .unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![0x3F, 0x01, 0x1A, b'p', b'o', b'r', 0x81, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_management_custom_params() {
        let params = ManagementParams {
            language_code: *b"jpn",
            language_tag: 1,
            dmf: 0b0000,
            format: 0b0010,
            tcs: 0b00,
            rollup: false,
        };
        let mut buf = ChunkedBuffer::from(&[0u8; 7][..]);
        frame_management(CaptionDataType::NewManagement, &params, &mut buf).unwrap();
        let bytes = buf.to_vec();
        assert_eq!(bytes[2], 0b0011_0000);
        assert_eq!(&bytes[3..6], b"jpn");
        assert_eq!(bytes[6], 0b0010_0000);
        assert_eq!(&bytes[7..10], &[0, 0, 7]);
    }

    #[test]
    fn test_management_rejects_statement_type() {
        let mut buf = ChunkedBuffer::new();
        assert!(matches!(
            frame_management(
                CaptionDataType::Statement3,
                &ManagementParams::default(),
                &mut buf
            ),
            Err(CaptionError::NotManagement(CaptionDataType::Statement3))
        ));
    }

    #[test]
    fn test_frame_data_unit_dispatch() {
        let mut buf = ChunkedBuffer::from(&b"hi"[..]);
        frame_data_unit(
            CaptionDataType::Statement1,
            DataUnitType::StatementBody,
            &ManagementParams::default(),
            &mut buf,
        )
        .unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![0x3F, 0, 0, 7, 0x1F, 0x20, 0, 0, 2, b'h', b'i']
        );
    }

    #[test]
    fn test_caption_data_type_ids() {
        assert_eq!(CaptionDataType::OldManagement.id(), 0);
        assert_eq!(CaptionDataType::NewManagement.id(), 0);
        for n in 1..=8u8 {
            let cd = CaptionDataType::statement(n).unwrap();
            assert_eq!(cd.id(), n);
            assert!(cd.is_statement());
        }
        assert!(CaptionDataType::statement(0).is_none());
        assert!(CaptionDataType::statement(9).is_none());
    }

    #[test]
    fn test_data_unit_type_values() {
        assert_eq!(u8::from(DataUnitType::StatementBody), 0x20);
        assert_eq!(u8::from(DataUnitType::SynthesizedSound), 0x2C);
        assert_eq!(DataUnitType::try_from(0x35), Ok(DataUnitType::Bitmap));
        assert_eq!(DataUnitType::try_from(0x21), Err(0x21));
    }

    #[test]
    fn test_crc_boundary_padding() {
        // statement overhead: 5 (unit) + 4 (statement) + 5 (group) + 2 (crc) + 35 (PES)
        // = 51, so a 134-byte body gives a 185-byte packet.
        assert_eq!(crc_boundary_padding(CaptionDataType::Statement1, 134), 1);
        assert_eq!(crc_boundary_padding(CaptionDataType::Statement1, 135), 0);
        assert_eq!(crc_boundary_padding(CaptionDataType::Statement1, 133), 0);
        assert_eq!(crc_boundary_padding(CaptionDataType::Statement1, 134 + 184), 1);
        // management overhead is 6 bytes more
        assert_eq!(crc_boundary_padding(CaptionDataType::OldManagement, 128), 1);
        assert_eq!(crc_boundary_padding(CaptionDataType::OldManagement, 134), 0);
    }
}
