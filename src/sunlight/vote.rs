//! Roll-call vote records as returned by the `votes` endpoint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Fields requested from the API, in the order they are sent.
pub const VOTE_FIELDS: [&str; 9] = [
    "roll_id",
    "bill_id",
    "nomination_id",
    "roll_type",
    "question",
    "required",
    "result",
    "voted_at",
    "voters",
];

/// Outcome of a single roll-call vote.
///
/// At most one of `bill_id` and `nomination_id` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub roll_id: String,
    /// `None` when absent or not an RFC 3339 timestamp.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub voted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roll_type: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub required: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub bill_id: Option<String>,
    #[serde(default)]
    pub nomination_id: Option<String>,
    /// Keyed by bioguide id.
    #[serde(default)]
    pub voters: HashMap<String, Ballot>,
}

impl Vote {
    /// The bill or nomination the vote was about, if any.
    pub fn subject(&self) -> Option<&str> {
        self.bill_id
            .as_deref()
            .or(self.nomination_id.as_deref())
            .filter(|s| !s.is_empty())
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }))
}

/// One senator's ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// "Yea", "Nay", "Not Voting", "Present", ...
    pub vote: String,
    pub voter: Voter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub bioguide_id: String,
    pub state: String,
    #[serde(default)]
    pub party: String,
}

/// Envelope of the `votes` endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct VoteResults {
    #[serde(default)]
    pub results: Vec<Vote>,
    pub count: u64,
}
