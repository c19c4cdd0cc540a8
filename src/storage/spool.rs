use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::inbox::InboxMessage;
use crate::smtp::session::Transaction;

const EXTENSION: &str = "eml";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// On-disk spool receiving one file per (recipient, delivery)
#[derive(Debug, Clone)]
pub struct MailSpool {
    dir: PathBuf,
}

impl MailSpool {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the spool directory if it is missing.
    ///
    /// Failure is only logged: the server still starts and each later save
    /// fails on its own.
    pub async fn ensure_dir(&self) {
        if tokio::fs::metadata(&self.dir).await.is_ok() {
            return;
        }

        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => tracing::info!("Created mail spool directory: {}", self.dir.display()),
            Err(err) => tracing::error!(
                "Error creating mail spool directory {}: {}",
                self.dir.display(),
                err
            ),
        }
    }

    /// Write `body` byte-for-byte to a fresh file for `recipient`.
    ///
    /// Files are named `<recipient>_<YYYYMMDD-HHMMSS>.eml`. Should that name
    /// already be taken, a `-1`, `-2`, ... counter is added to the timestamp.
    pub async fn save(&self, recipient: &str, body: &[u8]) -> anyhow::Result<PathBuf> {
        self.save_stamped(recipient, body, &timestamp()).await
    }

    async fn save_stamped(
        &self,
        recipient: &str,
        body: &[u8],
        stamp: &str,
    ) -> anyhow::Result<PathBuf> {
        let stem = format!("{}_{}", sanitize(recipient), stamp);

        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{}.{}", stem, EXTENSION),
                n => format!("{}-{}.{}", stem, n, EXTENSION),
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(body).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("could not open {}", path.display())))
                }
            }
        }
    }

    /// Store the body once per recipient, in recipient order.
    ///
    /// Failures are logged and skipped; the client is acknowledged either way.
    pub async fn deliver(&self, transaction: &Transaction) -> Vec<PathBuf> {
        let mut stored = Vec::with_capacity(transaction.to.len());

        for recipient in &transaction.to {
            match self.save(recipient, &transaction.body).await {
                Ok(path) => {
                    tracing::info!(
                        "Saved email from {} for {} to {}",
                        transaction.from,
                        recipient,
                        path.display()
                    );
                    stored.push(path);
                }
                Err(err) => {
                    tracing::warn!("Could not save email for {}: {:#}", recipient, err);
                }
            }
        }

        stored
    }

    /// Stored artifacts for `address`, oldest first.
    ///
    /// `bob@example.com` and `<bob@example.com>` name the same mailbox.
    pub async fn inbox(&self, address: &str) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(SpoolName::parse);

            if let Some(name) = name.filter(|name| name.is_for(address)) {
                found.push((name, path));
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Header summaries of everything in the inbox of `address`.
    ///
    /// Unreadable files are logged and skipped.
    pub async fn messages(&self, address: &str) -> anyhow::Result<Vec<InboxMessage>> {
        let mut messages = Vec::new();

        for path in self.inbox(address).await? {
            let id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            match tokio::fs::read(&path).await {
                Ok(raw) => messages.push(InboxMessage::parse(id, &raw)),
                Err(err) => tracing::warn!("Error reading {}: {}", path.display(), err),
            }
        }

        Ok(messages)
    }
}

/// The parts of a spool file name, `<recipient>_<YYYYMMDD-HHMMSS>[-<n>].eml`.
///
/// Orders by recipient, then timestamp, then clash counter, which is
/// delivery order for a single mailbox.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpoolName {
    pub recipient: String,
    pub timestamp: String,
    pub counter: u32,
}

impl SpoolName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", EXTENSION))?;
        let (recipient, tail) = stem.rsplit_once('_')?;

        let timestamp = tail.get(..TIMESTAMP_LEN)?;
        NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;

        let counter = match tail.get(TIMESTAMP_LEN..)? {
            "" => 0,
            rest => rest.strip_prefix('-')?.parse::<u32>().ok()?,
        };

        Some(Self {
            recipient: recipient.to_string(),
            timestamp: timestamp.to_string(),
            counter,
        })
    }

    /// Whether this file was stored for `address`, with or without angle brackets
    pub fn is_for(&self, address: &str) -> bool {
        let bare = address.trim().trim_start_matches('<').trim_end_matches('>');
        let key = sanitize(bare);
        self.recipient == key || self.recipient == format!("_{}_", key)
    }
}

/// Replace characters that are unsafe in a file name with `_`
pub fn sanitize(address: &str) -> String {
    address
        .chars()
        .map(|c| match c {
            '@' | '<' | '>' | '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
