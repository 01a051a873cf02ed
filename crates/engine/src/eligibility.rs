//! Group selection: which recipients a group donation may reach.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RecipientSnapshot;

/// How a group donation picks its recipients.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum GroupCriterion {
    /// Every recipient.
    All,
    /// Recipients of the organization with this exact name.
    Organization(String),
    /// Recipients enrolled in the campaign with this exact name.
    Campaign(String),
}

impl GroupCriterion {
    /// Parses the raw `(mode, value)` pair sent by callers.
    ///
    /// `university` and `trip` are accepted as aliases of `organization` and
    /// `campaign`. An unknown mode selects everyone.
    pub fn from_parts(mode: &str, value: Option<&str>) -> Self {
        let value = value.unwrap_or_default().to_string();
        match mode.trim().to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "organization" | "university" => Self::Organization(value),
            "campaign" | "trip" => Self::Campaign(value),
            other => {
                tracing::warn!(mode = other, "unknown group mode, selecting all recipients");
                Self::All
            }
        }
    }

    /// The exact name this criterion filters on, if any.
    ///
    /// A blank name does not filter.
    pub fn filter_value(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Organization(name) | Self::Campaign(name) => {
                Some(name.as_str()).filter(|name| !name.trim().is_empty())
            }
        }
    }

    /// Stable key identifying the selected group, used for memoization.
    pub fn cache_key(&self) -> String {
        format!("eligible_recipients:{self}")
    }
}

impl fmt::Display for GroupCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Organization(name) => write!(f, "organization:{name}"),
            Self::Campaign(name) => write!(f, "campaign:{name}"),
        }
    }
}

/// A recipient of the pool, with the attributes group criteria match on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub snapshot: RecipientSnapshot,
    pub name: String,
    pub organization: Option<String>,
    pub campaign: Option<String>,
}

impl Candidate {
    fn matches(&self, criterion: &GroupCriterion) -> bool {
        let Some(wanted) = criterion.filter_value() else {
            return true;
        };
        let attribute = match criterion {
            GroupCriterion::All => return true,
            GroupCriterion::Organization(_) => self.organization.as_deref(),
            GroupCriterion::Campaign(_) => self.campaign.as_deref(),
        };
        attribute == Some(wanted)
    }
}

/// Filters `pool` down to the recipients a group donation may reach.
///
/// A recipient qualifies when it matches `criterion` and has a goal it has
/// not reached yet. Input order is preserved, so applying the selector twice
/// returns the same list.
pub fn select(criterion: &GroupCriterion, pool: &[Candidate]) -> Vec<Candidate> {
    if criterion != &GroupCriterion::All && criterion.filter_value().is_none() {
        tracing::warn!(%criterion, "group criterion without a value, not filtering by group");
    }

    pool.iter()
        .filter(|candidate| candidate.matches(criterion))
        .filter(|candidate| candidate.snapshot.is_under_goal())
        .cloned()
        .collect()
}
