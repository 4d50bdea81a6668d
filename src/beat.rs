use std::fmt;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::middleware::auth::PUBLISH_KEY_HEADER;

#[derive(Debug)]
pub enum BeatError {
    InvalidUrl(String),
    Http(reqwest::Error),
    ServerError { status: u16, body: String },
}

impl fmt::Display for BeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeatError::InvalidUrl(url) => write!(f, "invalid server URL: {url}"),
            BeatError::Http(e) => write!(f, "HTTP error: {e}"),
            BeatError::ServerError { status, body } => {
                write!(f, "server returned {status}: {body}")
            }
        }
    }
}

impl std::error::Error for BeatError {}

impl From<reqwest::Error> for BeatError {
    fn from(e: reqwest::Error) -> Self {
        BeatError::Http(e)
    }
}

/// What the server reports back for one published status.
#[derive(Debug, Clone, Deserialize)]
pub struct Published {
    pub event_id: String,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Deserialize)]
struct Envelope {
    data: Published,
}

pub struct BeatClient {
    client: Client,
    base_url: String,
    publish_key: String,
}

impl BeatClient {
    pub fn new(base_url: impl Into<String>, publish_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            publish_key: publish_key.into(),
        }
    }

    /// `{base}/api/v1/rooms/{room}/status` with `room` percent-encoded.
    pub fn status_url(&self, room: &str) -> Result<Url, BeatError> {
        let invalid = || BeatError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["api", "v1", "rooms", room, "status"]);
        Ok(url)
    }

    pub async fn publish_status(&self, room: &str, status: &str) -> Result<Published, BeatError> {
        let url = self.status_url(room)?;
        let resp = self
            .client
            .post(url)
            .header(PUBLISH_KEY_HEADER, &self.publish_key)
            .json(&json!({ "status": status }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BeatError::ServerError { status, body });
        }

        Ok(resp.json::<Envelope>().await?.data)
    }
}

#[derive(Debug, Clone)]
pub struct BeatSchedule {
    pub room: String,
    pub status: String,
    pub interval: Duration,
    /// Stop after this many successful posts. `None` runs until interrupted.
    pub count: Option<u64>,
}

/// Post `schedule.status` every `schedule.interval`. A failed post is logged
/// and retried with exponential backoff capped at the interval; returns the
/// number of successful posts.
pub async fn run(client: &BeatClient, schedule: &BeatSchedule) -> u64 {
    let mut sent = 0u64;
    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let max_delay = schedule.interval.max(Duration::from_secs(1));

    loop {
        if schedule.count.is_some_and(|limit| sent >= limit) {
            return sent;
        }
        ticker.tick().await;

        let mut delay = Duration::from_millis(250).min(max_delay);
        loop {
            match client.publish_status(&schedule.room, &schedule.status).await {
                Ok(published) => {
                    sent += 1;
                    tracing::info!(
                        room = %schedule.room,
                        event_id = %published.event_id,
                        delivered = published.delivered,
                        failed = published.failed,
                        "published status {:?}",
                        schedule.status
                    );
                    break;
                }
                // Rejections will not heal by retrying.
                Err(BeatError::ServerError { status, body }) if (400..500).contains(&status) => {
                    tracing::error!("status rejected ({status}): {body}");
                    return sent;
                }
                Err(e @ BeatError::InvalidUrl(_)) => {
                    tracing::error!("{e}");
                    return sent;
                }
                Err(e) => {
                    tracing::warn!("failed to publish status: {e}, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }
}
