//! State populations used to weight senate votes.
//!
//! Figures are the 2014 census estimates (NST-EST2014-01) for the 50 states,
//! the District of Columbia and Puerto Rico.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CensusError {
    #[error("State not found: {0}")]
    StateNotFound(String),
}

/// Sorted by state code so lookups can binary search.
const POPULATIONS: [(&str, u64); 52] = [
    ("AK", 736_732),
    ("AL", 4_849_377),
    ("AR", 2_966_369),
    ("AZ", 6_731_484),
    ("CA", 38_802_500),
    ("CO", 5_355_866),
    ("CT", 3_596_677),
    ("DC", 658_893),
    ("DE", 935_614),
    ("FL", 19_893_297),
    ("GA", 10_097_343),
    ("HI", 1_419_561),
    ("IA", 3_107_126),
    ("ID", 1_634_464),
    ("IL", 12_880_580),
    ("IN", 6_596_855),
    ("KS", 2_904_021),
    ("KY", 4_413_457),
    ("LA", 4_649_676),
    ("MA", 6_745_408),
    ("MD", 5_976_407),
    ("ME", 1_330_089),
    ("MI", 9_909_877),
    ("MN", 5_457_173),
    ("MO", 6_063_589),
    ("MS", 2_994_079),
    ("MT", 1_023_579),
    ("NC", 9_943_964),
    ("ND", 739_482),
    ("NE", 1_881_503),
    ("NH", 1_326_813),
    ("NJ", 8_938_175),
    ("NM", 2_085_572),
    ("NV", 2_839_099),
    ("NY", 19_746_227),
    ("OH", 11_594_163),
    ("OK", 3_878_051),
    ("OR", 3_970_239),
    ("PA", 12_787_209),
    ("PR", 3_548_397),
    ("RI", 1_055_173),
    ("SC", 4_832_482),
    ("SD", 853_175),
    ("TN", 6_549_352),
    ("TX", 26_956_958),
    ("UT", 2_942_902),
    ("VA", 8_326_289),
    ("VT", 626_562),
    ("WA", 7_061_530),
    ("WI", 5_757_564),
    ("WV", 1_850_326),
    ("WY", 584_153),
];

/// Population of the state with the given capitalized two-letter code.
///
/// # Errors
///
/// Returns [`CensusError::StateNotFound`] for unknown codes. Codes are
/// case-sensitive.
pub fn population(state: &str) -> Result<u64, CensusError> {
    POPULATIONS
        .binary_search_by(|(code, _)| (*code).cmp(state))
        .ok()
        .and_then(|idx| POPULATIONS.get(idx))
        .map(|(_, population)| *population)
        .ok_or_else(|| CensusError::StateNotFound(state.to_string()))
}

/// Every known state code, sorted.
pub fn all_states() -> Vec<&'static str> {
    POPULATIONS.iter().map(|(code, _)| *code).collect()
}
