use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

/// Window for the analysis relay limit.
const ANALYSIS_WINDOW_SECS: u64 = 3600;

/// In-memory fixed-window limiter (single instance only)
#[derive(Clone, Default)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns Ok(remaining) or Err(retry_after) when limited.
    pub async fn check_with_limits(&self, key: &str, max_requests: u32, window_secs: u64) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start) > window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= max_requests {
            let retry_after = window.saturating_sub(now.duration_since(entry.window_start));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(max_requests - entry.count)
    }

    /// Drops entries whose window has long expired (call from a background task)
    pub async fn cleanup(&self) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(ANALYSIS_WINDOW_SECS * 2);

        entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

pub fn spawn_rate_limit_cleanup_worker(limiter: RateLimitState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(ANALYSIS_WINDOW_SECS));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}

/// Per-IP hourly limit on the analysis relay, which spends upstream API quota.
pub async fn rate_limit_analysis(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = addr.ip().to_string();
    let key = format!("analysis:{}", ip);
    let max = state.config.analysis_rate_limit_per_hour;

    match state
        .rate_limiter
        .check_with_limits(&key, max, ANALYSIS_WINDOW_SECS)
        .await
    {
        Ok(remaining) => {
            tracing::debug!(ip = %ip, remaining = remaining, "Analysis rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            let secs: u64 = retry_after.as_secs();
            tracing::warn!(
                ip = %ip,
                retry_after_secs = secs,
                "Analysis rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}
