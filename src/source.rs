//! The per-feed trip update source.
//!
//! One [`TripUpdateSource`] exists per configured feed. An external poll loop
//! calls [`TripUpdateSource::poll_updates`] on its own cadence; the source
//! fetches the feed, decodes it, classifies the batch as a full replacement
//! or an incremental amendment, and hands back the trip updates in feed
//! order. Transport and decode failures are absorbed into the returned
//! [`PollOutcome`] so a flaky feed never destabilizes the poller.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SourceConfig};
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::gtfs_rt::{FeedHeader, TripUpdate, feed_header::Incrementality};
use crate::parser::parse_feed;

/// Whether a batch replaces all prior knowledge or only amends it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatasetMode {
    /// The batch is the complete current state; anything not in it is
    /// implicitly cleared.
    #[default]
    Full,
    /// The batch amends previously known state without clearing the rest.
    Incremental,
}

/// One successfully decoded fetch, ready for the schedule applier.
#[derive(Debug, Clone, PartialEq)]
pub struct TripUpdateBatch {
    /// Attribution tag of the originating feed; may be empty.
    pub feed_id: String,
    pub dataset_mode: DatasetMode,
    /// Feed header timestamp, when the feed publishes one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Trip updates in feed order. May be empty: a feed with no
    /// trip-carrying entities is still a valid batch.
    pub updates: Vec<TripUpdate>,
}

/// Outcome of one poll.
///
/// A failed poll is "no result", which is distinct from a successful batch
/// with zero updates. Failures carry no data because the bytes (if any)
/// could not be trusted; they have already been logged when this value is
/// constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Batch(TripUpdateBatch),
    /// The endpoint was unreachable, timed out, or returned a non-2xx status.
    FetchFailed,
    /// Bytes were obtained but do not decode as a feed envelope.
    DecodeFailed,
}

impl PollOutcome {
    /// Dataset mode as seen by the schedule applier.
    ///
    /// Failed polls report [`DatasetMode::Full`]: classification resets
    /// before the header is ever inspected, so a poll that dies early is
    /// indistinguishable from a full-replacement fetch.
    pub fn dataset_mode(&self) -> DatasetMode {
        match self {
            PollOutcome::Batch(batch) => batch.dataset_mode,
            PollOutcome::FetchFailed | PollOutcome::DecodeFailed => DatasetMode::Full,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, PollOutcome::Batch(_))
    }

    pub fn into_batch(self) -> Option<TripUpdateBatch> {
        match self {
            PollOutcome::Batch(batch) => Some(batch),
            PollOutcome::FetchFailed | PollOutcome::DecodeFailed => None,
        }
    }
}

/// A configured GTFS-RT trip update feed.
pub struct TripUpdateSource {
    feed_id: String,
    url: String,
    client: Box<dyn HttpClient>,
}

impl TripUpdateSource {
    pub fn new(config: &SourceConfig, client: Box<dyn HttpClient>) -> Self {
        Self {
            feed_id: config.feed_id().to_string(),
            url: config.url().to_string(),
            client,
        }
    }

    /// Builds a source from a structured configuration document, using a
    /// plain HTTP client wrapped per the document's API key settings.
    ///
    /// # Errors
    ///
    /// Configuration errors are fatal to this source and surface here;
    /// nothing that happens during later polls does.
    pub fn from_config(value: &Value) -> Result<Self, ConfigError> {
        let config = SourceConfig::from_value(value)?;
        let client = config.build_client(BasicClient::new())?;
        Ok(Self::new(&config, client))
    }

    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches and decodes the feed once.
    ///
    /// Never returns an error: transport and decode failures become
    /// [`PollOutcome::FetchFailed`] / [`PollOutcome::DecodeFailed`] and the
    /// source remains usable for the next scheduled poll.
    #[tracing::instrument(skip(self), fields(feed_id = %self.feed_id, url = %self.url))]
    pub async fn poll_updates(&self) -> PollOutcome {
        let bytes = match fetch_bytes(self.client.as_ref(), &self.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to fetch trip update feed");
                return PollOutcome::FetchFailed;
            }
        };

        debug!(bytes = bytes.len(), "feed bytes received, decoding");

        let feed = match parse_feed(&bytes) {
            Ok(feed) => feed,
            Err(e) => {
                warn!(error = %e, "failed to decode trip update feed");
                return PollOutcome::DecodeFailed;
            }
        };

        let dataset_mode = classify(feed.header.as_ref());
        let timestamp = header_timestamp(feed.header.as_ref());

        let mut updates = Vec::with_capacity(feed.entity.len());
        for entity in feed.entity {
            if let Some(update) = entity.trip_update {
                updates.push(update);
            }
        }

        info!(
            updates = updates.len(),
            ?dataset_mode,
            "trip update batch decoded"
        );

        PollOutcome::Batch(TripUpdateBatch {
            feed_id: self.feed_id.clone(),
            dataset_mode,
            timestamp,
            updates,
        })
    }
}

impl fmt::Display for TripUpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TripUpdateSource({})", self.url)
    }
}

/// A batch is incremental only when the header is present and explicitly
/// marked DIFFERENTIAL. No header, an unset field, or an explicit
/// FULL_DATASET marking all mean a full replacement.
fn classify(header: Option<&FeedHeader>) -> DatasetMode {
    match header.and_then(|h| h.incrementality) {
        Some(i) if i == Incrementality::Differential as i32 => DatasetMode::Incremental,
        _ => DatasetMode::Full,
    }
}

fn header_timestamp(header: Option<&FeedHeader>) -> Option<DateTime<Utc>> {
    header
        .and_then(|h| h.timestamp)
        .and_then(|t| Utc.timestamp_opt(t as i64, 0).single())
}
