//! Caption statement bodies in the 8-bit code (ARIB STD-B24 Volume 1, Part 3,
//! Chapter 7; ABNT NBR 15606-1 Table 13).
//!
//! Only the control codes a caption inserter needs are covered. Text bytes
//! are appended verbatim and must already be in the target code page.

use bytes::{BufMut, Bytes, BytesMut};

/// C0 null, ignored by decoders. Also used as padding.
pub const NUL: u8 = 0x00;
/// C0 clear screen.
pub const CS: u8 = 0x0C;
/// C0 active position set.
pub const APS: u8 = 0x1C;
/// C1 small size.
pub const SSZ: u8 = 0x88;
/// C1 middle size.
pub const MSZ: u8 = 0x89;
/// C1 normal size.
pub const NSZ: u8 = 0x8A;
/// C1 colour control.
pub const COL: u8 = 0x90;
/// C1 control sequence introducer.
pub const CSI: u8 = 0x9B;

/// Intermediate byte closing the parameters of a CSI sequence.
const CSI_INTERMEDIATE: u8 = 0x20;

/// Offset applied to APS row and column.
const APS_OFFSET: u8 = 0x40;

/// Final bytes of the CSI commands (ARIB STD-B24 Table 7-17).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CsiCommand {
    /// Set writing format
    Swf = 0x53,
    /// Set display format
    Sdf = 0x56,
    /// Character composition dot designation
    Ssm = 0x57,
    /// Set horizontal spacing
    Shs = 0x58,
    /// Set vertical spacing
    Svs = 0x59,
    /// Set display position
    Sdp = 0x5F,
    /// Raster colour command
    Rcs = 0x6E,
}

/// Foreground colour codes (C1 set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Foreground {
    Black = 0x80,
    Red = 0x81,
    Green = 0x82,
    Yellow = 0x83,
    Blue = 0x84,
    Magenta = 0x85,
    Cyan = 0x86,
    White = 0x87,
}

/// Builder for a statement body data unit.
#[derive(Debug, Clone, Default)]
pub struct StatementBody {
    buf: BytesMut,
}

impl StatementBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preamble used for a full-screen caption: clears the screen, sets up
    /// a 684x390 display area at (138, 100) with 36-dot characters, small
    /// white text on black, and positions the cursor at row 13.
    pub fn full_screen_caption(text: &[u8]) -> Self {
        Self::new()
            .clear_screen()
            .csi(CsiCommand::Swf, "7")
            .csi(CsiCommand::Sdp, "138;100")
            .csi(CsiCommand::Sdf, "684;390")
            .csi(CsiCommand::Ssm, "36;36")
            .csi(CsiCommand::Shs, "2")
            .csi(CsiCommand::Svs, "16")
            .csi(CsiCommand::Rcs, "8")
            .small_size()
            .foreground(Foreground::White)
            .colour(0x50)
            .position(13, 0)
            .text(text)
    }

    pub fn clear_screen(mut self) -> Self {
        self.buf.put_u8(CS);
        self
    }

    /// `CSI <params> 0x20 <final>`; `params` are ASCII digits separated by `;`.
    pub fn csi(mut self, command: CsiCommand, params: &str) -> Self {
        self.buf.put_u8(CSI);
        self.buf.put_slice(params.as_bytes());
        self.buf.put_u8(CSI_INTERMEDIATE);
        self.buf.put_u8(command as u8);
        self
    }

    pub fn small_size(mut self) -> Self {
        self.buf.put_u8(SSZ);
        self
    }

    pub fn middle_size(mut self) -> Self {
        self.buf.put_u8(MSZ);
        self
    }

    pub fn normal_size(mut self) -> Self {
        self.buf.put_u8(NSZ);
        self
    }

    pub fn foreground(mut self, colour: Foreground) -> Self {
        self.buf.put_u8(colour as u8);
        self
    }

    /// `COL` followed by a palette/colour parameter byte.
    pub fn colour(mut self, param: u8) -> Self {
        self.buf.put_u8(COL);
        self.buf.put_u8(param);
        self
    }

    /// Move the active position to `row`, `column`.
    pub fn position(mut self, row: u8, column: u8) -> Self {
        self.buf.put_u8(APS);
        self.buf.put_u8(APS_OFFSET | (row & 0x3F));
        self.buf.put_u8(APS_OFFSET | (column & 0x3F));
        self
    }

    pub fn text(mut self, text: &[u8]) -> Self {
        self.buf.put_slice(text);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csi_encoding() {
        let body = StatementBody::new().csi(CsiCommand::Sdp, "138;100").into_bytes();
        assert_eq!(&body[..], b"\x9b138;100\x20\x5f");
    }

    #[test]
    fn test_position_offsets() {
        let body = StatementBody::new().position(13, 0).into_bytes();
        assert_eq!(&body[..], &[0x1C, 0x4D, 0x40]);
    }

    #[test]
    fn test_full_screen_preamble() {
        let body = StatementBody::full_screen_caption(b"");
        assert_eq!(body.len(), 53);
        let bytes = body.into_bytes();
        assert_eq!(bytes[0], CS);
        assert_eq!(&bytes[1..5], b"\x9b7\x20\x53");
        assert_eq!(&bytes[46..53], &[0x88, 0x87, 0x90, 0x50, 0x1C, 0x4D, 0x40]);
    }

    #[test]
    fn test_full_screen_text_follows_preamble() {
        let bytes = StatementBody::full_screen_caption(b"ola").into_bytes();
        assert_eq!(bytes.len(), 56);
        assert_eq!(&bytes[53..], b"ola");
    }

    #[test]
    fn test_sizes_and_colours() {
        let bytes = StatementBody::new()
            .middle_size()
            .normal_size()
            .foreground(Foreground::Yellow)
            .into_bytes();
        assert_eq!(&bytes[..], &[0x89, 0x8A, 0x83]);
        assert!(StatementBody::new().is_empty());
    }
}
