//! Senate vs. popular breakdown of a roll-call vote.
//!
//! Each senator casts one senate vote and carries half of their state's
//! population as popular weight, so a state whose two senators split is
//! counted half on each side.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::census;
use crate::sunlight::Vote;

/// Counts for one vote option ("Yea", "Nay", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionTally {
    pub senators: u32,
    pub senate_percent: f64,
    pub popular_weight: f64,
    pub popular_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoteTally {
    /// Ordered by option name.
    pub options: BTreeMap<String, OptionTally>,
    pub senate_total: u32,
    pub popular_total: f64,
    /// Voters whose state has no census entry; they count toward the
    /// senate tally with zero popular weight.
    pub unknown_states: Vec<String>,
}

impl VoteTally {
    pub fn from_vote(vote: &Vote) -> Self {
        let mut tally = VoteTally::default();

        for ballot in vote.voters.values() {
            let weight = match census::population(&ballot.voter.state) {
                Ok(population) => population as f64 / 2.0,
                Err(e) => {
                    warn!(
                        roll_id = %vote.roll_id,
                        bioguide_id = %ballot.voter.bioguide_id,
                        error = %e,
                        "Voter state missing from census table"
                    );
                    tally.unknown_states.push(ballot.voter.state.clone());
                    0.0
                }
            };

            let option = tally.options.entry(ballot.vote.clone()).or_default();
            option.senators += 1;
            option.popular_weight += weight;
            tally.senate_total += 1;
            tally.popular_total += weight;
        }

        tally.unknown_states.sort();
        tally.unknown_states.dedup();

        for option in tally.options.values_mut() {
            option.senate_percent =
                percent(f64::from(option.senators), f64::from(tally.senate_total));
            option.popular_percent = percent(option.popular_weight, tally.popular_total);
        }

        tally
    }

    pub fn get(&self, option: &str) -> Option<&OptionTally> {
        self.options.get(option)
    }
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sunlight::{Ballot, Voter};

    fn ballot(id: &str, state: &str, vote: &str) -> (String, Ballot) {
        (
            id.to_string(),
            Ballot {
                vote: vote.to_string(),
                voter: Voter {
                    bioguide_id: id.to_string(),
                    state: state.to_string(),
                    party: "I".to_string(),
                },
            },
        )
    }

    fn vote(ballots: Vec<(String, Ballot)>) -> Vote {
        Vote {
            roll_id: "s1-2015".to_string(),
            voters: ballots.into_iter().collect(),
            ..Vote::default()
        }
    }

    #[test]
    fn test_split_delegation_halves_population() {
        let tally = VoteTally::from_vote(&vote(vec![
            ballot("A1", "CA", "Yea"),
            ballot("A2", "CA", "Nay"),
            ballot("B1", "WY", "Yea"),
        ]));

        let yea = tally.get("Yea").unwrap();
        let nay = tally.get("Nay").unwrap();
        assert_eq!(tally.senate_total, 3);
        assert_eq!(yea.senators, 2);
        assert_eq!(nay.senators, 1);
        assert_eq!(nay.popular_weight, 19_401_250.0);
        assert_eq!(yea.popular_weight, 19_401_250.0 + 292_076.5);
        assert!((yea.senate_percent + nay.senate_percent - 100.0).abs() < 1e-9);
        assert!((yea.popular_percent + nay.popular_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_options_ordered_by_name() {
        let tally = VoteTally::from_vote(&vote(vec![
            ballot("A1", "NY", "Yea"),
            ballot("A2", "NY", "Not Voting"),
            ballot("A3", "TX", "Nay"),
        ]));

        let names: Vec<&str> = tally.options.keys().map(String::as_str).collect();
        assert_eq!(names, ["Nay", "Not Voting", "Yea"]);
    }

    #[test]
    fn test_unknown_state_counts_without_weight() {
        let tally = VoteTally::from_vote(&vote(vec![
            ballot("A1", "XX", "Yea"),
            ballot("A2", "VT", "Yea"),
        ]));

        let yea = tally.get("Yea").unwrap();
        assert_eq!(yea.senators, 2);
        assert_eq!(yea.popular_weight, 313_281.0);
        assert_eq!(tally.unknown_states, ["XX"]);
    }

    #[test]
    fn test_empty_vote() {
        let tally = VoteTally::from_vote(&vote(vec![]));
        assert!(tally.options.is_empty());
        assert_eq!(tally.senate_total, 0);
        assert_eq!(tally.popular_total, 0.0);
    }
}
