//! Data group framing (ARIB STD-B24 Volume 1, Part 3, Section 9.2).
//!
//! ```text
//! data_group_id(6) | data_group_version(2) | data_group_link_number(8)
//! | last_data_group_link_number(8) | data_group_size(16) | data | CRC_16
//! ```
//!
//! Caption data larger than 65535 bytes is cut into linked groups that share
//! one header byte. Pieces are produced lazily so only one of them is alive
//! at a time on its way to the PES packetizer.

use bytes_util::ChunkedBuffer;
use tracing::debug;

use crate::crc16::Crc16Ext;
use crate::data_unit::CaptionDataType;
use crate::{CaptionError, Result};

/// Largest `data_group_size`.
pub const MAX_DATA_GROUP_SIZE: usize = 0xFFFF;

/// `last_data_group_link_number` is 8 bits wide.
pub const MAX_DATA_GROUP_LINKS: usize = 256;

/// Largest caption data that can be carried by one linked group sequence.
pub const MAX_LINKED_DATA_SIZE: usize = MAX_DATA_GROUP_SIZE * MAX_DATA_GROUP_LINKS;

pub const DATA_GROUP_HEADER_SIZE: usize = 5;
pub const DATA_GROUP_CRC_SIZE: usize = 2;

/// Added to `data_group_id` while group B is selected.
pub const GROUP_B_OFFSET: u8 = 0x20;

const VERSION_MASK: u8 = 0b11;

/// Group A/B selector and version counter shared by every group of a stream.
///
/// Only a [`CaptionDataType::NewManagement`] request changes it; every other
/// request just reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupState {
    pub group_b: bool,
    pub version: u8,
}

impl GroupState {
    fn advance(&mut self) {
        self.group_b = !self.group_b;
        self.version = (self.version + 1) & VERSION_MASK;
    }

    /// `data_group_id` for `cd_type` under the current selector.
    pub fn data_group_id(&self, cd_type: CaptionDataType) -> u8 {
        if self.group_b {
            cd_type.id() + GROUP_B_OFFSET
        } else {
            cd_type.id()
        }
    }

    /// First header byte: `data_group_id << 2 | version`.
    pub fn header_byte(&self, cd_type: CaptionDataType) -> u8 {
        (self.data_group_id(cd_type) << 2) | (self.version & VERSION_MASK)
    }
}

/// Frames caption data into CRC-protected data groups.
#[derive(Debug, Default)]
pub struct DataGroupFramer {
    state: GroupState,
}

impl DataGroupFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: GroupState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Start framing `payload` (already wrapped as caption data).
    ///
    /// A `NewManagement` request flips group A/B and bumps the version before
    /// the header is computed, then proceeds as `OldManagement`. Size checks
    /// happen first, so a rejected payload leaves the state untouched.
    pub fn frame(
        &mut self,
        cd_type: CaptionDataType,
        payload: ChunkedBuffer,
    ) -> Result<DataGroupPieces> {
        let size = payload.total_size();
        if size > MAX_LINKED_DATA_SIZE {
            return Err(CaptionError::GroupTooLarge {
                size,
                max: MAX_LINKED_DATA_SIZE,
            });
        }

        let cd_type = if cd_type == CaptionDataType::NewManagement {
            self.state.advance();
            debug!(
                group_b = self.state.group_b,
                version = self.state.version,
                "New caption management"
            );
            CaptionDataType::OldManagement
        } else {
            cd_type
        };

        let piece_count = size.div_ceil(MAX_DATA_GROUP_SIZE).max(1);
        Ok(DataGroupPieces {
            header: self.state.header_byte(cd_type),
            next_link: 0,
            last_link: (piece_count - 1) as u8,
            remaining: payload,
            done: false,
        })
    }
}

/// Lazily yields the framed pieces of one logical data group, each with its
/// own 5-byte header and CRC-16 trailer.
#[derive(Debug)]
pub struct DataGroupPieces {
    header: u8,
    next_link: u8,
    last_link: u8,
    remaining: ChunkedBuffer,
    done: bool,
}

impl DataGroupPieces {
    /// Header byte shared by every piece.
    pub fn header_byte(&self) -> u8 {
        self.header
    }

    pub fn last_link_number(&self) -> u8 {
        self.last_link
    }

    pub fn piece_count(&self) -> usize {
        self.last_link as usize + 1
    }
}

impl Iterator for DataGroupPieces {
    type Item = ChunkedBuffer;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = if self.remaining.total_size() > MAX_DATA_GROUP_SIZE {
            self.remaining.split_prefix(MAX_DATA_GROUP_SIZE)
        } else {
            self.done = true;
            std::mem::take(&mut self.remaining)
        };

        let link = self.next_link;
        self.next_link = self.next_link.wrapping_add(1);
        Some(seal(self.header, link, self.last_link, data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.done {
            0
        } else {
            self.piece_count() - self.next_link as usize
        };
        (left, Some(left))
    }
}

impl ExactSizeIterator for DataGroupPieces {}

/// Prepend the group header to one piece and append its CRC-16, computed over
/// header and data.
fn seal(header: u8, link_number: u8, last_link_number: u8, mut data: ChunkedBuffer) -> ChunkedBuffer {
    let size = data.total_size();
    debug_assert!(size <= MAX_DATA_GROUP_SIZE);

    let h = data.prepend(DATA_GROUP_HEADER_SIZE);
    h[0] = header;
    h[1] = link_number;
    h[2] = last_link_number;
    h[3..5].copy_from_slice(&(size as u16).to_be_bytes());

    let crc = data.crc16();
    data.append_slice(&crc.to_be_bytes());

    debug!(
        header,
        link_number, last_link_number, size, crc, "Framed data group"
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc16::validate_data_group_crc16;

    fn frame_all(
        framer: &mut DataGroupFramer,
        cd_type: CaptionDataType,
        size: usize,
    ) -> Vec<Vec<u8>> {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        framer
            .frame(cd_type, ChunkedBuffer::from(payload))
            .unwrap()
            .map(|piece| piece.to_vec())
            .collect()
    }

    fn declared_size(piece: &[u8]) -> usize {
        u16::from_be_bytes([piece[3], piece[4]]) as usize
    }

    #[test]
    fn test_single_group_layout() {
        let mut framer = DataGroupFramer::new();
        let pieces = frame_all(&mut framer, CaptionDataType::Statement1, 10);
        assert_eq!(pieces.len(), 1);
        let piece = &pieces[0];
        assert_eq!(piece.len(), 10 + 7);
        // data_group_id 0x01, version 0
        assert_eq!(&piece[..5], &[0x04, 0x00, 0x00, 0x00, 0x0A]);
        assert!(validate_data_group_crc16(piece));
    }

    #[test]
    fn test_piece_count_and_links() {
        for (size, expected) in [
            (1usize, 1usize),
            (65535, 1),
            (65536, 2),
            (2 * 65535, 2),
            (2 * 65535 + 1, 3),
        ] {
            let mut framer = DataGroupFramer::new();
            let pieces = frame_all(&mut framer, CaptionDataType::Statement2, size);
            assert_eq!(pieces.len(), expected, "size {size}");

            let mut total = 0;
            for (i, piece) in pieces.iter().enumerate() {
                assert_eq!(piece[0], 0x02 << 2);
                assert_eq!(piece[1] as usize, i);
                assert_eq!(piece[2] as usize, expected - 1);
                assert_eq!(declared_size(piece), piece.len() - 7);
                assert!(validate_data_group_crc16(piece));
                total += declared_size(piece);
            }
            assert_eq!(total, size);
        }
    }

    #[test]
    fn test_pieces_report_size_hint() {
        let mut framer = DataGroupFramer::new();
        let mut pieces = framer
            .frame(CaptionDataType::Statement1, ChunkedBuffer::with_size(65536))
            .unwrap();
        assert_eq!(pieces.piece_count(), 2);
        assert_eq!(pieces.len(), 2);
        pieces.next();
        assert_eq!(pieces.len(), 1);
        pieces.next();
        assert_eq!(pieces.len(), 0);
        assert!(pieces.next().is_none());
    }

    #[test]
    fn test_too_large_leaves_state_untouched() {
        let mut framer = DataGroupFramer::new();
        let err = framer
            .frame(
                CaptionDataType::NewManagement,
                ChunkedBuffer::with_size(MAX_LINKED_DATA_SIZE + 1),
            )
            .unwrap_err();
        assert!(matches!(err, CaptionError::GroupTooLarge { .. }));
        assert_eq!(framer.state(), GroupState::default());
    }

    #[test]
    fn test_new_management_toggles_once() {
        let mut framer = DataGroupFramer::new();
        let new = frame_all(&mut framer, CaptionDataType::NewManagement, 10);
        // group B management: id 0x20, version 1
        assert_eq!(new[0][0], (0x20 << 2) | 1);

        for _ in 0..3 {
            let old = frame_all(&mut framer, CaptionDataType::OldManagement, 10);
            assert_eq!(old[0][0], (0x20 << 2) | 1);
        }
        let statement = frame_all(&mut framer, CaptionDataType::Statement1, 10);
        assert_eq!(statement[0][0], (0x21 << 2) | 1);
    }

    #[test]
    fn test_version_wraps_and_group_alternates() {
        let mut framer = DataGroupFramer::new();
        let expected = [(true, 1u8), (false, 2), (true, 3), (false, 0), (true, 1)];
        for (group_b, version) in expected {
            frame_all(&mut framer, CaptionDataType::NewManagement, 1);
            assert_eq!(framer.state(), GroupState { group_b, version });
        }
    }
}
