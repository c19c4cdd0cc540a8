use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Splits an incoming byte stream into CRLF-terminated lines.
///
/// Only the two-byte sequence CRLF ends a line. A bare LF is kept as part
/// of the line content, so binary bodies pass through untouched.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    timeout: Option<Duration>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            timeout: None,
        }
    }

    /// Fail a read that has not produced a full line within `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Next line with its CRLF stripped, or `None` once the peer has closed.
    ///
    /// A partial line pending at end of stream is discarded.
    pub async fn next_line(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_crlf_line())
                .await
                .map_err(|_| anyhow::anyhow!("read timed out after {:?}", limit))?,
            None => self.read_crlf_line().await,
        }
    }

    async fn read_crlf_line(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        self.buf.clear();

        loop {
            let bytes_read = self.inner.read_until(b'\n', &mut self.buf).await?;
            if bytes_read == 0 {
                return Ok(None);
            }

            if self.buf.ends_with(b"\r\n") {
                self.buf.truncate(self.buf.len() - 2);
                return Ok(Some(std::mem::take(&mut self.buf)));
            }
        }
    }
}
