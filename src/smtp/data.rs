//! Body collection after a successful `DATA`.

use tokio::io::AsyncBufRead;

use super::reader::LineReader;
use super::session::{SmtpSession, Transaction};

/// A single line read while in DATA mode
#[derive(Debug, PartialEq, Eq)]
pub enum DataLine<'a> {
    /// The lone `.` ending the body
    End,
    /// Body content with one level of dot-stuffing removed
    Content(&'a [u8]),
}

impl<'a> DataLine<'a> {
    pub fn classify(line: &'a [u8]) -> Self {
        match line {
            b"." => DataLine::End,
            [b'.', rest @ ..] if !rest.is_empty() => DataLine::Content(rest),
            _ => DataLine::Content(line),
        }
    }
}

/// Collect body lines into `session` until the terminator.
///
/// Returns the finished transaction, or `None` when the peer went away
/// first, in which case the partial body is dropped.
pub async fn receive_data<R>(
    reader: &mut LineReader<R>,
    session: &mut SmtpSession,
) -> anyhow::Result<Option<Transaction>>
where
    R: AsyncBufRead + Unpin,
{
    tracing::info!("Entering DATA mode");

    while let Some(line) = reader.next_line().await? {
        match DataLine::classify(&line) {
            DataLine::End => {
                tracing::info!("DATA termination received, {} bytes", session.body().len());
                return Ok(Some(session.finish_data()));
            }
            DataLine::Content(content) => session.append_body_line(content),
        }
    }

    tracing::debug!("Peer closed during DATA, discarding {} bytes", session.body().len());
    Ok(None)
}
