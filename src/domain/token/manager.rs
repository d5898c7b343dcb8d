//! Single-use, time-limited download tokens for premium modules.
//!
//! Tokens live only in memory. A restart drops every outstanding token, which simply
//! forces clients to verify their license again. Growth is bounded twice: a background
//! sweep drops expired entries, and the map refuses to grow past its capacity by evicting
//! the entry closest to expiry.

use crate::crypto::generate_token;
use crate::domain::error::TokenError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lifetime of a freshly issued token.
pub const DOWNLOAD_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Default upper bound on simultaneously live tokens.
pub const DEFAULT_TOKEN_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct TokenEntry {
    module_filename: String,
    expires_at: Instant,
}

/// A token handed back to the client after license verification.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Owns the ephemeral token map. Shared between handlers as `Arc<DownloadTokenManager>`.
pub struct DownloadTokenManager {
    tokens: Mutex<HashMap<String, TokenEntry>>,
    ttl: Duration,
    capacity: usize,
    /// Stops the background sweep task.
    shutdown: Arc<Notify>,
}

impl DownloadTokenManager {
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(DOWNLOAD_TOKEN_TTL, capacity)
    }

    pub fn with_ttl(ttl: Duration, capacity: usize) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a token bound to `module_filename`.
    ///
    /// Every call creates an independent token, even for the same file.
    pub async fn issue(&self, module_filename: &str) -> IssuedToken {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;

        if tokens.len() >= self.capacity {
            let purged = purge_expired(&mut tokens, now);
            if purged > 0 {
                debug!(purged, "dropped expired download tokens at capacity");
            }
        }
        if tokens.len() >= self.capacity {
            let oldest = tokens
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(token, _)| token.clone());
            if let Some(oldest) = oldest {
                tokens.remove(&oldest);
                warn!(capacity = self.capacity, "download token map full; evicted the oldest token");
            }
        }

        let token = loop {
            let candidate = generate_token();
            if !tokens.contains_key(&candidate) {
                break candidate;
            }
        };

        tokens.insert(
            token.clone(),
            TokenEntry {
                module_filename: module_filename.to_string(),
                expires_at: now + self.ttl,
            },
        );
        debug!(module = %module_filename, live = tokens.len(), "issued download token");

        IssuedToken {
            token,
            expires_in: self.ttl,
        }
    }

    /// Checks `token` against `module_filename` and consumes it.
    ///
    /// The entry is removed under the lock before it is inspected, so concurrent callers
    /// presenting the same token cannot both succeed. A mismatched or expired token is
    /// gone afterwards as well.
    pub async fn validate_and_consume(
        &self,
        token: &str,
        module_filename: &str,
    ) -> Result<(), TokenError> {
        let entry = self
            .tokens
            .lock()
            .await
            .remove(token)
            .ok_or(TokenError::NotFound)?;

        if entry.module_filename != module_filename {
            return Err(TokenError::Mismatch);
        }
        if Instant::now() > entry.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    /// Removes every expired token. Returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let mut tokens = self.tokens.lock().await;
        purge_expired(&mut tokens, Instant::now())
    }

    pub async fn live_count(&self) -> usize {
        self.tokens.lock().await.len()
    }

    /// Starts the periodic expiry sweep. Runs until [`DownloadTokenManager::shutdown`].
    pub fn start_sweep_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep_expired().await;
                        if removed > 0 {
                            debug!(removed, "swept expired download tokens");
                        }
                    }
                    _ = shutdown.notified() => {
                        info!("download token sweep shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl Default for DownloadTokenManager {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_CAPACITY)
    }
}

fn purge_expired(tokens: &mut HashMap<String, TokenEntry>, now: Instant) -> usize {
    let before = tokens.len();
    tokens.retain(|_, entry| entry.expires_at >= now);
    before - tokens.len()
}
