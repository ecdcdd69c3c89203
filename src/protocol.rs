//! AMI block framing and decoding

use crate::{
    constants::{BLOCK_TERMINATOR, MAX_BLOCK_SIZE},
    error::{AmiError, AmiResult},
    event::AmiEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

/// Decode one raw block into an [`AmiEvent`].
///
/// Each line is split on its first colon and both halves are trimmed. Lines
/// without a colon (banner text, `--END COMMAND--` trailers, noise) are dropped.
pub fn decode(raw: &str) -> AmiEvent {
    let mut event = AmiEvent::new();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        event.set_field(key, value.trim());
    }
    event
}

/// Line-oriented reader that yields `\r\n\r\n`-terminated blocks.
pub struct BlockReader<R> {
    inner: R,
    max_block_size: usize,
}

impl<R: AsyncBufRead + Unpin> BlockReader<R> {
    /// Wrap a buffered reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_block_size: MAX_BLOCK_SIZE,
        }
    }

    #[cfg(test)]
    fn with_max_block_size(inner: R, max_block_size: usize) -> Self {
        Self {
            inner,
            max_block_size,
        }
    }

    /// Read a single line (used for the greeting banner).
    ///
    /// Returns an empty string at end of stream.
    pub async fn read_line(&mut self) -> AmiResult<String> {
        let mut buf = Vec::new();
        self.inner
            .read_until(b'\n', &mut buf)
            .await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read lines until the accumulated text ends with the block terminator.
    ///
    /// If the peer closes the stream first, whatever was accumulated is
    /// returned, possibly an empty string.
    pub async fn read_block(&mut self) -> AmiResult<String> {
        let mut content = String::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = self
                .inner
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                trace!("[RECV] EOF after {} bytes of partial block", content.len());
                break;
            }
            content.push_str(&String::from_utf8_lossy(&line));
            if content.ends_with(BLOCK_TERMINATOR) {
                break;
            }
            if content.len() > self.max_block_size {
                return Err(AmiError::protocol_error(format!(
                    "block exceeds {} bytes without terminator",
                    self.max_block_size
                )));
            }
        }
        Ok(content)
    }

    /// Read and decode the next block.
    ///
    /// End of stream is an error here: every caller is waiting for a reply.
    pub async fn read_event(&mut self) -> AmiResult<AmiEvent> {
        let raw = self
            .read_block()
            .await?;
        if raw.is_empty() {
            return Err(AmiError::ConnectionClosed);
        }
        trace!("[RECV] {:?}", raw.trim_end());
        Ok(decode(&raw))
    }
}
