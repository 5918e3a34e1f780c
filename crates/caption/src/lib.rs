//! # arib-caption
//!
//! Encoder for ARIB STD-B24 / ABNT NBR 15606 closed captions carried in
//! MPEG-2 PES packets.
//!
//! Caption bytes travel through four layers, innermost first:
//!
//! 1. data unit: separator, type and 24-bit length ([`data_unit`])
//! 2. caption data: management or statement header ([`data_unit`])
//! 3. data group: A/B selector, version, link numbers and CRC-16 ([`data_group`])
//! 4. PES packet: fixed 35-byte header with PTS, paced at 100 ms ([`pes`])
//!
//! Every layer prepends its header onto a [`ChunkedBuffer`], so the payload
//! is never copied while it is being wrapped.
//!
//! ## Usage
//!
//! ```no_run
//! use arib_caption::{CaptionDataType, CaptionEncoder, EncoderConfig, StatementBody};
//!
//! # async fn example() -> arib_caption::Result<()> {
//! let encoder = CaptionEncoder::new(EncoderConfig::default(), tokio::io::stdout());
//! let (handle, task) = encoder.spawn();
//!
//! handle.new_management().await?;
//! let body = StatementBody::full_screen_caption(b"Hello").into_bytes();
//! handle.statement(CaptionDataType::Statement1, body).await?;
//!
//! drop(handle);
//! let stats = task.await.map_err(std::io::Error::other)??;
//! println!("{} packets", stats.packets);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod crc16;
pub mod data_group;
pub mod data_unit;
pub mod encoder;
pub mod error;
pub mod pes;
pub mod statement;

pub use bytes_util::ChunkedBuffer;
pub use config::{CrcBoundaryPolicy, EncoderConfig, MIN_PES_INTERVAL, SegmentMode};
pub use crc16::{Crc16, Crc16Ext, crc16, crc16_chunks, validate_data_group_crc16};
pub use data_group::{DataGroupFramer, DataGroupPieces, GroupState};
pub use data_unit::{CaptionDataType, DataUnitType, ManagementParams};
pub use encoder::{CaptionEncoder, CaptionRequest, EncoderHandle, EncoderStats};
pub use error::CaptionError;
pub use pes::{EmitStats, PesPacketizer};
pub use statement::StatementBody;

pub type Result<T> = std::result::Result<T, CaptionError>;
