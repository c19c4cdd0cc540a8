use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use smtp_spool::{serve, Config, MailSpool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load configuration from JSON file
    let config = Arc::new(Config::load()?);

    let spool = Arc::new(MailSpool::new(&config.spool_dir));
    spool.ensure_dir().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.smtp_port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("SMTP server listening on port {}", config.smtp_port);
    tracing::info!("Spooling mail to {}", spool.dir().display());

    serve(listener, spool, config).await;
    Ok(())
}
