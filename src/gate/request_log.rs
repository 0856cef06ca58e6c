use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Append-only file with one line per request.
#[derive(Debug)]
pub struct RequestLog {
    file: Option<Mutex<File>>,
}

impl RequestLog {
    /// Open (or create) the log at `path`. An empty path disables it.
    pub async fn open(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(Self::disabled());
        }

        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create log directory for {path}"))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open request log: {path}"))?;

        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { file: None }
    }

    #[must_use]
    pub fn format_line(at: DateTime<Local>, user: Option<&str>, path: &str) -> String {
        format!(
            "{} - User: {} - Path: {}\n",
            at.format("%Y-%m-%d %H:%M:%S%.6f"),
            user.unwrap_or("Anonymous"),
            path
        )
    }

    pub async fn record(&self, user: Option<&str>, path: &str) {
        let Some(file) = &self.file else {
            return;
        };

        let line = Self::format_line(Local::now(), user, path);
        let mut file = file.lock().await;
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to write request log line");
            return;
        }
        if let Err(e) = file.flush().await {
            warn!(error = %e, "Failed to flush request log");
        }
    }
}
