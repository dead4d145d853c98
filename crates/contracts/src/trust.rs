//! Trust belief contract types.

use serde::{Deserialize, Serialize};

pub const BELIEF_MIN: f64 = -1.0;
pub const BELIEF_MAX: f64 = 1.0;

/// Belief about the teammate: competence (skill/reliability) and
/// willingness (cooperativeness), each clamped to [-1, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TrustBelief {
    pub competence: f64,
    pub willingness: f64,
}

impl TrustBelief {
    pub fn new(competence: f64, willingness: f64) -> Self {
        Self {
            competence,
            willingness,
        }
        .clamped()
    }

    pub fn get(&self, field: BeliefField) -> f64 {
        match field {
            BeliefField::Competence => self.competence,
            BeliefField::Willingness => self.willingness,
        }
    }

    pub fn set(&mut self, field: BeliefField, value: f64) {
        let value = clamp_belief(value);
        match field {
            BeliefField::Competence => self.competence = value,
            BeliefField::Willingness => self.willingness = value,
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            competence: clamp_belief(self.competence),
            willingness: clamp_belief(self.willingness),
        }
    }
}

fn clamp_belief(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(BELIEF_MIN, BELIEF_MAX)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BeliefField {
    Competence,
    Willingness,
}

/// How beliefs are sourced for a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    #[default]
    Learned,
    AlwaysTrust,
    NeverTrust,
    RandomTrust,
}

impl TrustMode {
    pub fn is_learned(self) -> bool {
        matches!(self, Self::Learned)
    }
}

/// Coarse distance between the agent and the teammate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Close,
    Medium,
    Far,
}

impl Distance {
    /// Extra ticks granted to the teammate for covering this distance.
    pub fn bonus_ticks(self) -> u64 {
        match self {
            Self::Close => 0,
            Self::Medium => 10,
            Self::Far => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Medium => "medium",
            Self::Far => "far",
        }
    }
}

/// One row of the append-only trust time series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustHistoryRecord {
    pub tick: u64,
    pub teammate: String,
    pub willingness: f64,
    pub competence: f64,
}
