//! HTTP client for the Garmin Connect API.
//!
//! This module provides:
//! - Paged activity listing
//! - GPX export download per activity
//! - Automatic retry with exponential backoff on 429 and transport errors
//! - A rate limiter shared by concurrent requests: after a 429 every request
//!   waits out the same backoff
//! - Status code classification into [`DownloaderError`] categories

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::directory::ActivityDirectory;
use crate::error::{DownloaderError, Result};
use crate::session::Session;
use crate::Activity;

pub const DEFAULT_BASE_URL: &str = "https://connectapi.garmin.com";
const ACTIVITY_SEARCH_PATH: &str = "/activitylist-service/activities/search/activities";
const GPX_EXPORT_PATH: &str = "/download-service/export/gpx/activity";
const USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Client tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Activities requested per page when listing
    pub page_size: u32,
    pub timeout: Duration,
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 100,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// The list endpoint answers with an array, but a single object has been
/// seen for accounts with exactly one activity.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActivityListResponse {
    Many(Vec<Activity>),
    One(Box<Activity>),
}

impl From<ActivityListResponse> for Vec<Activity> {
    fn from(response: ActivityListResponse) -> Self {
        match response {
            ActivityListResponse::Many(activities) => activities,
            ActivityListResponse::One(activity) => vec![*activity],
        }
    }
}

/// Pauses all requests of a client after 429 responses.
///
/// The pause grows with the number of consecutive 429s, whichever request
/// received them, and resets on the first non-429 answer.
struct RateLimiter {
    base_delay: Duration,
    consecutive_429s: AtomicU32,
    paused_until: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            consecutive_429s: AtomicU32::new(0),
            paused_until: Mutex::new(None),
        }
    }

    /// Wait until the shared pause, if any, is over.
    async fn wait(&self) {
        let paused_until = *self.paused_until.lock().await;
        if let Some(until) = paused_until {
            let now = Instant::now();
            if until > now {
                debug!("[RateLimiter] Waiting {:?}", until - now);
                tokio::time::sleep(until - now).await;
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    /// Register a 429 and extend the shared pause. Returns the backoff.
    async fn record_429(&self) -> (u32, Duration) {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        let backoff = self.backoff(count);
        let until = Instant::now() + backoff;

        let mut paused_until = self.paused_until.lock().await;
        if paused_until.map_or(true, |current| current < until) {
            *paused_until = Some(until);
        }
        (count, backoff)
    }

    fn backoff(&self, consecutive: u32) -> Duration {
        // 1x, 2x, 4x, 8x base delay
        self.base_delay * (1 << consecutive.saturating_sub(1).min(3))
    }
}

/// Garmin Connect API client.
pub struct GarminClient {
    client: Client,
    auth_header: String,
    config: ClientConfig,
    rate_limiter: RateLimiter,
}

impl GarminClient {
    /// Create a client authenticated by `session`.
    pub fn new(session: &Session, config: ClientConfig) -> Result<Self> {
        Self::with_auth_header(session.authorization_header(), config)
    }

    /// Create a client with a pre-formatted `Authorization` header value.
    pub fn with_auth_header(auth_header: String, config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| DownloaderError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            auth_header,
            rate_limiter: RateLimiter::new(config.retry_base_delay),
            config,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.rate_limiter.backoff(attempt + 1)
    }

    /// GET with retry on 429 and transport errors; non-success statuses are classified.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut retries = 0;

        loop {
            self.rate_limiter.wait().await;

            let response = self
                .client
                .get(url)
                .header("Authorization", &self.auth_header)
                .query(query)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let (count, backoff) = self.rate_limiter.record_429().await;
                        if retries >= self.config.max_retries {
                            return Err(DownloaderError::RateLimited);
                        }
                        retries += 1;
                        warn!(
                            "[GarminClient] 429 for {} (consecutive: {}), retry {} after {:?}",
                            url, count, retries, backoff
                        );
                        continue;
                    }

                    self.rate_limiter.record_success();

                    if !status.is_success() {
                        warn!("[GarminClient] HTTP {} for {}", status, url);
                        return Err(DownloaderError::from_status(status.as_u16()));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if retries >= self.config.max_retries {
                        return Err(DownloaderError::Connection {
                            message: e.to_string(),
                        });
                    }
                    let backoff = self.backoff(retries);
                    retries += 1;
                    warn!(
                        "[GarminClient] Error for {}: {}, retry {} after {:?}",
                        url, e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn body(resp: reqwest::Response) -> Result<Vec<u8>> {
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| DownloaderError::Connection {
                message: format!("Failed to read response body: {}", e),
            })
    }

    /// Fetch one page of the activity list.
    pub async fn fetch_page(&self, start: u32, limit: u32) -> Result<Vec<Activity>> {
        let url = format!("{}{}", self.config.base_url, ACTIVITY_SEARCH_PATH);
        debug!("[GarminClient] Fetching activities {}..{}", start, start + limit);

        let resp = self
            .get(
                &url,
                &[("start", start.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        let body = Self::body(resp).await?;
        let page: ActivityListResponse = serde_json::from_slice(&body)?;
        Ok(page.into())
    }
}

impl ActivityDirectory for GarminClient {
    async fn list_activities(&self) -> Result<Vec<Activity>> {
        let start_time = Instant::now();
        let page_size = self.config.page_size.max(1);
        let mut activities = Vec::new();
        let mut seen = HashSet::new();
        let mut start = 0;

        loop {
            let page = self.fetch_page(start, page_size).await?;
            let fetched = page.len();
            let before = activities.len();
            activities.extend(page.into_iter().filter(|a| seen.insert(a.id)));

            if fetched < page_size as usize {
                break;
            }
            // A server that ignores `start` keeps answering with the same page
            if activities.len() == before {
                warn!(
                    "[GarminClient] Page at {} repeated known activities, stopping",
                    start
                );
                break;
            }
            start += page_size;
        }

        info!(
            "[GarminClient] Fetched {} activities in {:.2}s",
            activities.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(activities)
    }

    async fn download_gpx(&self, activity_id: u64) -> Result<Vec<u8>> {
        let url = format!("{}{}/{}", self.config.base_url, GPX_EXPORT_PATH, activity_id);
        debug!("[GarminClient] Downloading GPX for activity {}", activity_id);

        let resp = self.get(&url, &[]).await?;
        Self::body(resp).await
    }
}
