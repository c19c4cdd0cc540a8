pub mod data;
pub mod reader;
pub mod reply;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    net::{TcpListener, TcpStream},
};

use crate::config::Config;
use crate::storage::MailSpool;
use reader::LineReader;
use reply::Reply;
use session::{Action, SmtpSession};

/// Accept connections forever, one task per connection.
///
/// Accept errors are logged and the loop keeps going.
pub async fn serve(listener: TcpListener, spool: Arc<MailSpool>, config: Arc<Config>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                spawn_session(stream, addr, Arc::clone(&spool), Arc::clone(&config));
            }
            Err(err) => {
                tracing::error!("Error accepting connection: {:?}", err);
            }
        }
    }
}

/// Run a session on its own task, and report how it ended from a
/// supervising task so that a panic stays inside this connection.
fn spawn_session(stream: TcpStream, addr: SocketAddr, spool: Arc<MailSpool>, config: Arc<Config>) {
    tokio::spawn(async move {
        let worker = tokio::spawn(handle_connection(stream, spool, config));

        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!("Error handling connection from {}: {:#}", addr, err);
            }
            Err(err) if err.is_panic() => {
                tracing::error!("Session with {} panicked", addr);
            }
            Err(err) => {
                tracing::error!("Session with {} was cancelled: {}", addr, err);
            }
        }
    });
}

/// Serve one TCP connection. The stream is closed on return, whatever the outcome.
pub async fn handle_connection(
    mut stream: TcpStream,
    spool: Arc<MailSpool>,
    config: Arc<Config>,
) -> anyhow::Result<()> {
    let addr = stream.peer_addr()?;
    tracing::info!("New connection from {}", addr);

    let (reader, writer) = stream.split();
    let result = run_session(reader, writer, &spool, &config).await;

    tracing::info!("Closing connection with {}", addr);
    result
}

/// Drive the whole dialogue over any reader/writer pair.
///
/// Returns `Ok` on `QUIT` or when the peer closes; I/O errors end the
/// session without a final reply.
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    spool: &MailSpool,
    config: &Config,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = LineReader::new(BufReader::new(reader)).with_timeout(config.read_timeout());
    let mut writer = BufWriter::new(writer);

    send(&mut writer, &Reply::greeting(&config.banner)).await?;

    let mut session = SmtpSession::new();

    while let Some(line) = lines.next_line().await? {
        let line = String::from_utf8_lossy(&line);
        tracing::debug!("C: {}", line);

        match session.handle_command(&line) {
            Action::Reply(reply) => {
                send(&mut writer, &reply).await?;
            }
            Action::StartData(reply) => {
                send(&mut writer, &reply).await?;

                match data::receive_data(&mut lines, &mut session).await? {
                    Some(transaction) => {
                        spool.deliver(&transaction).await;
                        send(&mut writer, &Reply::accepted()).await?;
                    }
                    None => return Ok(()),
                }
            }
            Action::Quit(reply) => {
                send(&mut writer, &reply).await?;
                return Ok(());
            }
        }
    }

    Ok(())
}

async fn send<W>(writer: &mut W, reply: &Reply) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.to_line().as_bytes()).await?;
    writer.flush().await?;
    tracing::debug!("S: {} {}", reply.code, reply.text);
    Ok(())
}
