//! The two producers feeding the encoder task: the management heartbeat and
//! the caption line reader.

use std::time::Duration;

use arib_caption::{CaptionDataType, CaptionError, EncoderHandle, StatementBody};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

/// Send an old-management packet every `period` until cancelled or until the
/// encoder goes away. Returns the number of heartbeats sent.
pub async fn heartbeat(handle: EncoderHandle, period: Duration, token: CancellationToken) -> u64 {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent = 0;
    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = handle.management().await {
                    debug!(error = %e, "Stopping heartbeat");
                    break;
                }
                sent += 1;
            }
        }
    }
    debug!(sent, "Heartbeat finished");
    sent
}

/// Submit one full-screen caption per line of `reader` to Statement1 until
/// EOF or cancellation. Returns the number of captions submitted.
pub async fn forward_lines<R>(
    reader: R,
    handle: &EncoderHandle,
    token: &CancellationToken,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;

    loop {
        let line = tokio::select! {
            biased;

            _ = token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("End of caption input");
            break;
        };

        match handle
            .statement(CaptionDataType::Statement1, caption_body(&line))
            .await
        {
            Ok(()) => sent += 1,
            Err(CaptionError::EncoderClosed) => {
                debug!("Encoder closed, dropping remaining input");
                break;
            }
            Err(e) => warn!(error = %e, "Skipping caption line"),
        }
    }
    Ok(sent)
}

/// Statement body for one input line. An empty line clears the screen.
pub fn caption_body(line: &str) -> Bytes {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return StatementBody::new().clear_screen().into_bytes();
    }
    StatementBody::full_screen_caption(&to_caption_text(line)).into_bytes()
}

/// Map `line` onto the printable ASCII subset of the caption code page.
/// Anything else becomes `?`.
pub fn to_caption_text(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| {
            if c == ' ' || c.is_ascii_graphic() {
                c as u8
            } else {
                debug!(character = ?c, "Replacing unsupported character");
                b'?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arib_caption::statement::CS;
    use arib_caption::{CaptionEncoder, EncoderConfig};
    use tokio::io::BufReader;

    #[test]
    fn test_to_caption_text() {
        assert_eq!(to_caption_text("Hello, world!"), b"Hello, world!");
        assert_eq!(to_caption_text("olá\tmundo"), b"ol??mundo");
    }

    #[test]
    fn test_caption_body() {
        assert_eq!(&caption_body("")[..], &[CS]);
        assert_eq!(&caption_body("\r")[..], &[CS]);

        let body = caption_body("Hi\r");
        assert_eq!(body.len(), 53 + 2);
        assert_eq!(&body[53..], b"Hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_lines_until_eof() {
        let (handle, task) = CaptionEncoder::new(EncoderConfig::default(), tokio::io::sink()).spawn();
        let token = CancellationToken::new();
        let input: &[u8] = b"first\n\nthird\n";

        let sent = forward_lines(BufReader::new(input), &handle, &token)
            .await
            .unwrap();
        assert_eq!(sent, 3);

        drop(handle);
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.packets, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_lines_stops_when_cancelled() {
        let (handle, task) = CaptionEncoder::new(EncoderConfig::default(), tokio::io::sink()).spawn();
        let token = CancellationToken::new();
        token.cancel();

        let input: &[u8] = b"never sent\n";
        let sent = forward_lines(BufReader::new(input), &handle, &token)
            .await
            .unwrap();
        assert_eq!(sent, 0);

        drop(handle);
        assert_eq!(task.await.unwrap().unwrap().requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_period_and_cancel() {
        let (handle, task) = CaptionEncoder::new(EncoderConfig::default(), tokio::io::sink()).spawn();
        let token = CancellationToken::new();
        let beats = tokio::spawn(heartbeat(
            handle.clone(),
            Duration::from_secs(1),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        token.cancel();
        assert_eq!(beats.await.unwrap(), 3);

        drop(handle);
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_when_encoder_gone() {
        let (handle, task) = CaptionEncoder::new(EncoderConfig::default(), tokio::io::sink()).spawn();
        task.abort();
        let _ = task.await;

        let sent = heartbeat(handle, Duration::from_secs(1), CancellationToken::new()).await;
        assert_eq!(sent, 0);
    }
}
