//! Append-only audit log of transaction outcomes.
//!
//! One line per record, written under a lock and flushed to disk before the
//! append is acknowledged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{clients::AuditSink, error::AppError, models::transaction::AuditRecord};

pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (or create) the log file for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: an identifier would break the one-line format
    pub async fn append(&self, record: &AuditRecord) -> Result<(), AppError> {
        record.validate()?;
        let mut line = record.to_log_line();
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        tracing::info!(
            transaction_id = %record.transaction_id,
            status = %record.status,
            "Logged transaction"
        );
        Ok(())
    }
}

#[async_trait]
impl AuditSink for AuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), AppError> {
        self.append(&record).await
    }
}
