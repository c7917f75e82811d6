// Shared models for the line distribution services
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LineError;

// ============================================================================
// Sport Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SportType {
    Baseball,
    Football,
    Soccer,
}

impl SportType {
    pub const ALL: [SportType; 3] = [SportType::Baseball, SportType::Football, SportType::Soccer];

    pub fn as_str(&self) -> &'static str {
        match self {
            SportType::Baseball => "BASEBALL",
            SportType::Football => "FOOTBALL",
            SportType::Soccer => "SOCCER",
        }
    }
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SportType {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASEBALL" => Ok(SportType::Baseball),
            "FOOTBALL" => Ok(SportType::Football),
            "SOCCER" => Ok(SportType::Soccer),
            other => Err(LineError::invalid_argument(format!(
                "unknown sport type: {}",
                other
            ))),
        }
    }
}

/// Parse a comma separated sport list such as `"baseball,SOCCER"`.
///
/// Blank entries are ignored; duplicates collapse.
pub fn parse_sport_list(raw: &str) -> Result<Vec<SportType>, LineError> {
    let mut seen = BTreeSet::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        seen.insert(part.parse::<SportType>()?);
    }
    Ok(seen.into_iter().collect())
}

// ============================================================================
// Sport Lines
// ============================================================================

/// Latest known line for one sport. One logical row per [`SportType`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SportLine {
    #[serde(rename = "type")]
    pub sport_type: SportType,
    pub score: f64,
}

impl SportLine {
    /// Build a line, rejecting NaN and infinite scores.
    pub fn new(sport_type: SportType, score: f64) -> Result<Self, LineError> {
        if !score.is_finite() {
            return Err(LineError::invalid_argument(format!(
                "score for {} must be finite, got {}",
                sport_type, score
            )));
        }
        Ok(Self { sport_type, score })
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Identifier handed out when a consumer attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which sports a subscription wants to receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    All,
    Only(BTreeSet<SportType>),
}

impl Interest {
    /// Build an interest set from an explicit list; empty means "all".
    pub fn from_sports(sports: &[SportType]) -> Self {
        if sports.is_empty() {
            Interest::All
        } else {
            Interest::Only(sports.iter().copied().collect())
        }
    }

    pub fn wants(&self, sport_type: SportType) -> bool {
        match self {
            Interest::All => true,
            Interest::Only(set) => set.contains(&sport_type),
        }
    }

    /// Lines from `lines` this interest should receive, order preserved.
    pub fn filter(&self, lines: &[SportLine]) -> Vec<SportLine> {
        lines
            .iter()
            .filter(|line| self.wants(line.sport_type))
            .copied()
            .collect()
    }
}

// ============================================================================
// Outbound Representation
// ============================================================================

/// One sport as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSport {
    #[serde(rename = "type")]
    pub sport_type: String,
    pub line: f64,
}

/// Batch of lines delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinesUpdate {
    pub sports: Vec<WireSport>,
    pub ts: DateTime<Utc>,
}

impl LinesUpdate {
    pub fn from_lines(lines: &[SportLine]) -> Self {
        Self {
            sports: lines
                .iter()
                .map(|line| WireSport {
                    sport_type: line.sport_type.as_str().to_string(),
                    line: line.score,
                })
                .collect(),
            ts: Utc::now(),
        }
    }
}
