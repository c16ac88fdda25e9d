//! Directory-based advisory lock with stale-lock recovery.
//!
//! The lock is a marker directory created atomically with `create_dir`, plus a
//! `timestamp` file inside it holding the acquisition time in Unix millis. A
//! marker whose timestamp is missing, unparseable, or older than the stale
//! window is treated as abandoned.
//!
//! ```text
//! Unlocked ──acquire──▶ Held ──(age > stale_after)──▶ Stale
//!    ▲                   │                              │
//!    └─────release───────┘◀────────acquire (recover)────┘
//! ```
//!
//! A fresh lock held by someone else is retried a bounded number of times;
//! after that the caller proceeds best-effort with a `contended` guard, which
//! never removes the other holder's marker.

use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use reflex_core::{ReflexError, Result};

const TIMESTAMP_FILE: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held { acquired_at: DateTime<Utc> },
    Stale { acquired_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone)]
pub struct AdvisoryLock {
    dir: PathBuf,
    stale_after: Duration,
    contention_retries: u32,
    retry_delay: Duration,
}

impl AdvisoryLock {
    pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            dir: dir.into(),
            stale_after,
            contention_retries: 0,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Retry a fresh lock `retries` times, `delay` apart, before giving up on it.
    pub fn with_contention(mut self, retries: u32, delay: Duration) -> Self {
        self.contention_retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Current state of the marker, without changing it.
    pub async fn inspect(&self) -> LockState {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return LockState::Unlocked,
        }
        match self.read_timestamp().await {
            Some(acquired_at) if !self.is_expired(acquired_at) => LockState::Held { acquired_at },
            acquired_at => LockState::Stale { acquired_at },
        }
    }

    /// Take the lock, recovering a stale marker if there is one.
    pub async fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.dir.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ReflexError::Lock(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        for attempt in 0..=self.contention_retries {
            match tokio::fs::create_dir(&self.dir).await {
                Ok(()) => {
                    self.write_timestamp().await?;
                    debug!(path = %self.dir.display(), "advisory lock acquired");
                    return Ok(self.guard(false, false));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(ReflexError::Lock(format!(
                        "failed to create {}: {}",
                        self.dir.display(),
                        e
                    )));
                }
            }

            match self.inspect().await {
                LockState::Stale { acquired_at } => {
                    warn!(
                        path = %self.dir.display(),
                        acquired_at = ?acquired_at,
                        "recovering stale advisory lock"
                    );
                    self.write_timestamp().await?;
                    return Ok(self.guard(true, false));
                }
                // Released between our create_dir and inspect; try again.
                LockState::Unlocked => continue,
                LockState::Held { acquired_at } => {
                    debug!(attempt, acquired_at = %acquired_at, "advisory lock is held");
                    if attempt < self.contention_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!(
            path = %self.dir.display(),
            retries = self.contention_retries,
            "advisory lock still held, proceeding without it"
        );
        Ok(self.guard(false, true))
    }

    fn guard(&self, recovered_stale: bool, contended: bool) -> LockGuard {
        LockGuard {
            dir: self.dir.clone(),
            recovered_stale,
            contended,
            released: false,
        }
    }

    fn is_expired(&self, acquired_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(acquired_at);
        age.to_std().map(|age| age > self.stale_after).unwrap_or(false)
    }

    async fn read_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = tokio::fs::read_to_string(self.dir.join(TIMESTAMP_FILE))
            .await
            .ok()?;
        let millis = raw.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    async fn write_timestamp(&self) -> Result<()> {
        let now = Utc::now().timestamp_millis().to_string();
        tokio::fs::write(self.dir.join(TIMESTAMP_FILE), now)
            .await
            .map_err(|e| ReflexError::Lock(format!("failed to stamp {}: {}", self.dir.display(), e)))
    }
}

/// Proof of (best-effort) lock ownership. Call [`LockGuard::release`] when done;
/// dropping an unreleased owned guard removes the marker synchronously.
#[derive(Debug)]
pub struct LockGuard {
    dir: PathBuf,
    recovered_stale: bool,
    contended: bool,
    released: bool,
}

impl LockGuard {
    /// The previous holder's marker was stale and has been taken over.
    pub fn recovered_stale(&self) -> bool {
        self.recovered_stale
    }

    /// The lock was still held by someone else; this guard owns nothing.
    pub fn contended(&self) -> bool {
        self.contended
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        if self.contended {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(path = %self.dir.display(), "advisory lock released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReflexError::Lock(format!(
                "failed to release {}: {}",
                self.dir.display(),
                e
            ))),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released && !self.contended {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}
