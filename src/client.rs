//! Minimal submission client: one message, one connection.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::smtp::reader::LineReader;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Normalise line endings to CRLF and double every leading `.`.
///
/// The result always ends in CRLF (unless empty) and is ready to be sent
/// between `DATA` and the lone `.`.
pub fn dot_stuff(message: &str) -> String {
    let normalized = message.replace("\r\n", "\n");
    if normalized.is_empty() {
        return String::new();
    }

    let content = normalized.strip_suffix('\n').unwrap_or(&normalized);
    let mut stuffed = String::with_capacity(normalized.len() + 16);

    for line in content.split('\n') {
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
        stuffed.push_str("\r\n");
    }

    stuffed
}

pub struct SubmitClient {
    reader: LineReader<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl SubmitClient {
    /// Connect and wait for the `220` greeting
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = tokio::time::timeout(IO_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow::anyhow!("connect timed out"))??;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            reader: LineReader::new(BufReader::new(reader)).with_timeout(Some(IO_TIMEOUT)),
            writer,
        };

        let greeting = client.read_reply().await?;
        if !greeting.starts_with("220") {
            anyhow::bail!("Did not receive 220 initial greeting: {}", greeting);
        }
        Ok(client)
    }

    async fn read_reply(&mut self) -> anyhow::Result<String> {
        let line = self
            .reader
            .next_line()
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed by server"))?;
        let reply = String::from_utf8_lossy(&line).into_owned();
        tracing::debug!("S: {}", reply);
        Ok(reply)
    }

    /// Send one line and require a reply starting with `expected`
    pub async fn command(&mut self, line: &str, expected: u16) -> anyhow::Result<String> {
        tracing::debug!("C: {}", line);
        self.writer.write_all(format!("{}\r\n", line).as_bytes()).await?;

        let reply = self.read_reply().await?;
        if !reply.starts_with(&expected.to_string()) {
            anyhow::bail!("SMTP error (expected {}): {}", expected, reply);
        }
        Ok(reply)
    }

    /// Run a full `EHLO` .. `.` transaction for `message`
    pub async fn send_mail(
        &mut self,
        helo: &str,
        from: &str,
        recipients: &[&str],
        message: &str,
    ) -> anyhow::Result<()> {
        self.command(&format!("EHLO {}", helo), 250).await?;
        self.command(&format!("MAIL FROM:<{}>", from), 250).await?;
        for recipient in recipients {
            self.command(&format!("RCPT TO:<{}>", recipient), 250).await?;
        }
        self.command("DATA", 354).await?;

        self.writer.write_all(dot_stuff(message).as_bytes()).await?;
        self.command(".", 250).await?;
        Ok(())
    }

    pub async fn quit(mut self) -> anyhow::Result<()> {
        self.command("QUIT", 221).await?;
        Ok(())
    }
}

/// Connect, submit `message` and quit
pub async fn submit<A: ToSocketAddrs>(
    addr: A,
    helo: &str,
    from: &str,
    recipients: &[&str],
    message: &str,
) -> anyhow::Result<()> {
    let mut client = SubmitClient::connect(addr).await?;
    client.send_mail(helo, from, recipients, message).await?;
    client.quit().await
}
