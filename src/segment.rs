//! Quintile scores and the recency/frequency segment table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RfmError;

/// A quintile score, 1 (worst) to 5 (best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Score {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

impl Score {
    pub const ALL: [Score; 5] = [Score::One, Score::Two, Score::Three, Score::Four, Score::Five];

    pub fn new(value: u8) -> crate::Result<Self> {
        match value {
            1 => Ok(Score::One),
            2 => Ok(Score::Two),
            3 => Ok(Score::Three),
            4 => Ok(Score::Four),
            5 => Ok(Score::Five),
            other => Err(RfmError::InvalidScore(other)),
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Score for a 0-based bucket where bucket 0 holds the lowest values.
    pub(crate) fn ascending(bucket: usize) -> Self {
        Score::ALL[bucket.min(Score::ALL.len() - 1)]
    }

    /// Score for a 0-based bucket where bucket 0 holds the best (lowest) values.
    pub(crate) fn descending(bucket: usize) -> Self {
        Score::ALL[Score::ALL.len() - 1 - bucket.min(Score::ALL.len() - 1)]
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.value()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Marketing segment derived from recency and frequency scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Segment {
    Hibernating,
    AtRisk,
    CantLoose,
    AboutToSleep,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    pub const ALL: [Segment; 10] = [
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::CantLoose,
        Segment::AboutToSleep,
        Segment::NeedAttention,
        Segment::LoyalCustomers,
        Segment::Promising,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::Champions,
    ];

    /// Classify a customer by recency and frequency score.
    ///
    /// The monetary score plays no part in segmentation.
    pub fn classify(recency: Score, frequency: Score) -> Segment {
        use Score::*;

        match (recency, frequency) {
            (One | Two, One | Two) => Segment::Hibernating,
            (One | Two, Three | Four) => Segment::AtRisk,
            (One | Two, Five) => Segment::CantLoose,
            (Three, One | Two) => Segment::AboutToSleep,
            (Three, Three) => Segment::NeedAttention,
            (Three | Four, Four | Five) => Segment::LoyalCustomers,
            (Four, One) => Segment::Promising,
            (Five, One) => Segment::NewCustomers,
            (Four | Five, Two | Three) => Segment::PotentialLoyalists,
            (Five, Four | Five) => Segment::Champions,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Hibernating => "hibernating",
            Segment::AtRisk => "at_risk",
            Segment::CantLoose => "cant_loose",
            Segment::AboutToSleep => "about_to_sleep",
            Segment::NeedAttention => "need_attention",
            Segment::LoyalCustomers => "loyal_customers",
            Segment::Promising => "promising",
            Segment::NewCustomers => "new_customers",
            Segment::PotentialLoyalists => "potential_loyalists",
            Segment::Champions => "champions",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = RfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Segment::ALL
            .into_iter()
            .find(|segment| segment.as_str() == wanted)
            .ok_or_else(|| RfmError::InvalidConfig(format!("unknown segment '{}'", s)))
    }
}

impl TryFrom<String> for Segment {
    type Error = RfmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Two-character key of recency and frequency score, e.g. "54"
pub fn rf_code(recency: Score, frequency: Score) -> String {
    format!("{}{}", recency.value(), frequency.value())
}
