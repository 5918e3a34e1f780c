use tokio::io::{AsyncWrite, BufWriter};
use tracing::debug;

use crate::error::Result;

/// Byte sink handed to the encoder task.
pub type CaptionSink = Box<dyn AsyncWrite + Unpin + Send>;

/// Open `target` for the caption stream; `-` selects stdout.
pub async fn open_output(target: &str) -> Result<CaptionSink> {
    if target == "-" {
        debug!("Writing caption stream to stdout");
        return Ok(Box::new(tokio::io::stdout()));
    }

    let file = tokio::fs::File::create(target).await?;
    debug!(path = target, "Writing caption stream to file");
    Ok(Box::new(BufWriter::new(file)))
}
