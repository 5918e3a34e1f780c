//! Caption stream encoder.
//!
//! [`CaptionEncoder`] owns everything that must stay consistent across
//! packets of one stream: the data group A/B selector and version, the PTS
//! reference, the pacing timestamp and the sink. Several producers share it
//! through [`EncoderHandle`]s; requests are queued on one channel and handled
//! strictly one after another, so packets never interleave.

use bytes::Bytes;
use bytes_util::ChunkedBuffer;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CrcBoundaryPolicy, EncoderConfig};
use crate::data_group::DataGroupFramer;
use crate::data_unit::{
    CaptionDataType, DATA_UNIT_HEADER_SIZE, DataUnitType, MAX_U24, crc_boundary_padding,
    frame_caption_data, wrap_data_unit,
};
use crate::pes::PesPacketizer;
use crate::statement::NUL;
use crate::{CaptionError, Result};

/// One unit of work for the encoder: a caption data type with an optional
/// data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    cd_type: CaptionDataType,
    data_unit: Option<(DataUnitType, Bytes)>,
}

impl CaptionRequest {
    /// Caption data carrying one data unit. Sizes are checked here, before the
    /// request reaches the encoder.
    pub fn data_unit(
        cd_type: CaptionDataType,
        du_type: DataUnitType,
        body: impl Into<Bytes>,
    ) -> Result<Self> {
        let body = body.into();
        let unit_size = body.len() + DATA_UNIT_HEADER_SIZE;
        if unit_size > MAX_U24 {
            return Err(CaptionError::DataUnitTooLarge {
                size: body.len(),
                max: MAX_U24 - DATA_UNIT_HEADER_SIZE,
            });
        }
        Ok(Self {
            cd_type,
            data_unit: Some((du_type, body)),
        })
    }

    /// Statement body for `cd_type`, which must be a statement type.
    pub fn statement(cd_type: CaptionDataType, body: impl Into<Bytes>) -> Result<Self> {
        if !cd_type.is_statement() {
            return Err(CaptionError::NotStatement(cd_type));
        }
        let body = body.into();
        if body.is_empty() {
            return Err(CaptionError::EmptyStatement);
        }
        Self::data_unit(cd_type, DataUnitType::StatementBody, body)
    }

    /// Caption management with an empty data unit loop, sent periodically so
    /// receivers keep the caption service alive.
    pub fn management() -> Self {
        Self {
            cd_type: CaptionDataType::OldManagement,
            data_unit: None,
        }
    }

    /// Caption management that starts a new data group version.
    pub fn new_management() -> Self {
        Self {
            cd_type: CaptionDataType::NewManagement,
            data_unit: None,
        }
    }

    pub fn cd_type(&self) -> CaptionDataType {
        self.cd_type
    }
}

/// Running totals of an encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    pub requests: u64,
    pub rejected: u64,
    pub data_groups: u64,
    pub packets: u64,
    pub bytes: u64,
}

/// Frames caption requests and writes them as PES packets to `W`.
pub struct CaptionEncoder<W> {
    config: EncoderConfig,
    framer: DataGroupFramer,
    packetizer: PesPacketizer,
    sink: W,
    stats: EncoderStats,
}

impl<W> CaptionEncoder<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(config: EncoderConfig, sink: W) -> Self {
        let packetizer =
            PesPacketizer::with_interval(config.segment_mode, config.min_packet_interval);
        Self {
            config,
            framer: DataGroupFramer::new(),
            packetizer,
            sink,
            stats: EncoderStats::default(),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Frame one request and write all of its packets.
    pub async fn encode(&mut self, request: CaptionRequest) -> Result<()> {
        let CaptionRequest { cd_type, data_unit } = request;

        let mut buf = match data_unit {
            Some((du_type, body)) => {
                let mut buf = ChunkedBuffer::from(body);
                if self.config.crc_boundary == CrcBoundaryPolicy::PadDataUnit {
                    let padding = crc_boundary_padding(cd_type, buf.total_size());
                    if padding > 0 {
                        debug!(padding, "Padding data unit to keep CRC in one TS packet");
                        buf.append(padding).fill(NUL);
                    }
                }
                wrap_data_unit(du_type, &mut buf)?;
                buf
            }
            None => ChunkedBuffer::new(),
        };
        frame_caption_data(cd_type, &self.config.management, &mut buf)?;

        let pieces = self.framer.frame(cd_type, buf)?;
        self.stats.requests += 1;
        for piece in pieces {
            let emitted = self.packetizer.emit(piece, &mut self.sink).await?;
            self.stats.data_groups += 1;
            self.stats.packets += emitted.packets as u64;
            self.stats.bytes += emitted.bytes as u64;
        }
        Ok(())
    }

    /// Serve requests until every handle is dropped. Framing errors reject
    /// the request and are logged; sink errors stop the encoder.
    pub async fn run(mut self, mut rx: mpsc::Receiver<CaptionRequest>) -> Result<EncoderStats> {
        info!(
            segment_mode = %self.config.segment_mode,
            interval_ms = self.config.min_packet_interval.as_millis() as u64,
            "Caption encoder started"
        );

        while let Some(request) = rx.recv().await {
            let cd_type = request.cd_type();
            match self.encode(request).await {
                Ok(()) => {}
                Err(e) if e.is_io() => {
                    error!(error = %e, "Caption sink failed, stopping encoder");
                    return Err(e);
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!(?cd_type, error = %e, "Rejected caption request");
                }
            }
        }

        self.sink.flush().await?;
        info!(
            requests = self.stats.requests,
            packets = self.stats.packets,
            bytes = self.stats.bytes,
            "Caption encoder finished"
        );
        Ok(self.stats)
    }
}

impl<W> CaptionEncoder<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Move the encoder onto its own task and return a handle for producers.
    pub fn spawn(self) -> (EncoderHandle, JoinHandle<Result<EncoderStats>>) {
        let (tx, rx) = mpsc::channel(self.config.channel_size.max(1));
        let task = tokio::spawn(self.run(rx));
        (EncoderHandle { tx }, task)
    }
}

/// Cloneable producer side of a spawned [`CaptionEncoder`].
#[derive(Debug, Clone)]
pub struct EncoderHandle {
    tx: mpsc::Sender<CaptionRequest>,
}

impl EncoderHandle {
    /// Queue a request, waiting for room when the encoder is behind.
    pub async fn submit(&self, request: CaptionRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CaptionError::EncoderClosed)
    }

    pub async fn statement(&self, cd_type: CaptionDataType, body: impl Into<Bytes>) -> Result<()> {
        self.submit(CaptionRequest::statement(cd_type, body)?).await
    }

    pub async fn management(&self) -> Result<()> {
        self.submit(CaptionRequest::management()).await
    }

    pub async fn new_management(&self) -> Result<()> {
        self.submit(CaptionRequest::new_management()).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
