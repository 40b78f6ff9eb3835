//! Client for the Sunlight Foundation Congress API.
//!
//! Only the `votes` endpoint is used. Every request carries the API key in
//! the `X-APIKEY` header and is bounded by the configured timeout. Nothing
//! is retried.

pub mod vote;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub use vote::{Ballot, Vote, VOTE_FIELDS, Voter};

use vote::VoteResults;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-APIKEY";

#[derive(Error, Debug)]
pub enum SunlightError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(StatusCode),

    #[error("No results for roll id {0}")]
    VoteNotFound(String),

    #[error("{count} votes found for roll id {roll_id}")]
    AmbiguousRoll { roll_id: String, count: u64 },

    #[error("Response claimed one result but carried none")]
    MissingResult,
}

/// Thin async client over the Congress API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SunlightClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SunlightClient {
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built (TLS backend
    /// initialization).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SunlightError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from the application configuration.
    ///
    /// # Errors
    ///
    /// See [`SunlightClient::new`].
    pub fn from_config(config: &Config) -> Result<Self, SunlightError> {
        Self::new(
            config.sunlight_base_url.clone(),
            config.sunlight_api_key.clone(),
            config.sunlight_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the vote with the given roll id.
    ///
    /// # Errors
    ///
    /// - [`SunlightError::Http`] on transport or decoding failure
    /// - [`SunlightError::Status`] on a non-200 response
    /// - [`SunlightError::VoteNotFound`] when the API reports no match
    /// - [`SunlightError::AmbiguousRoll`] when it reports more than one
    pub async fn get_vote(&self, roll_id: &str) -> Result<Vote, SunlightError> {
        let url = format!("{}/votes", self.base_url);
        let fields = VOTE_FIELDS.join(",");
        debug!(roll_id, %url, "Fetching vote");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("roll_id", roll_id), ("fields", fields.as_str())])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SunlightError::Status(response.status()));
        }

        let envelope: VoteResults = response.json().await?;
        match envelope.count {
            0 => Err(SunlightError::VoteNotFound(roll_id.to_string())),
            1 => envelope
                .results
                .into_iter()
                .next()
                .ok_or(SunlightError::MissingResult),
            count => Err(SunlightError::AmbiguousRoll {
                roll_id: roll_id.to_string(),
                count,
            }),
        }
    }
}
