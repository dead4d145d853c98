//! Belief update engine: saturation-damped nudges to the teammate belief, plus
//! the dynamic thresholds and wait timeouts derived from it.
//!
//! A nudge of nominal size `d` on field `f` moves the belief by
//! `clamp(d × (1 − α·f²), [-1, 1])` with `α = 0.4`, so the same event shifts a
//! neutral belief more than one that is already near an extreme.

use contracts::{BeliefField, Distance, TrustBelief, TrustMode};
use tracing::info;

use crate::rng::SplitMix64;

pub const SATURATION_ALPHA: f64 = 0.4;
pub const BASE_THRESHOLD_TICKS: u64 = 60;
pub const BASE_TIMEOUT_TICKS: f64 = 100.0;
pub const TIMEOUT_WILLINGNESS_WEIGHT: f64 = 30.0;

/// Competence above which the teammate is granted extra completion time.
const COMPETENT_BONUS_FLOOR: f64 = 0.1;
const LOW_WILLINGNESS: f64 = -0.5;
const HIGH_COMPETENCE: f64 = 0.6;

// ---------------------------------------------------------------------------
// Pure arithmetic
// ---------------------------------------------------------------------------

/// Effective change for a nominal delta on `field`, given the current belief.
pub fn damped_delta(belief: &TrustBelief, raw_delta: f64, field: BeliefField) -> f64 {
    let current = belief.get(field);
    let discount = 1.0 - SATURATION_ALPHA * current * current;
    (raw_delta * discount).clamp(-1.0, 1.0)
}

/// Cooperative tasks whose completion time is judged against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointTask {
    Remove,
    Rescue,
}

/// Ticks the teammate may take to complete a joint task before it counts
/// against their competence.
pub fn threshold(belief: &TrustBelief, task: JointTask, distance: Option<Distance>) -> u64 {
    let mut ticks = BASE_THRESHOLD_TICKS;
    if let Some(distance) = distance {
        ticks += distance.bonus_ticks();
    }
    if belief.competence > COMPETENT_BONUS_FLOOR {
        ticks += match task {
            JointTask::Remove => 10,
            JointTask::Rescue => 5,
        };
    }
    ticks
}

/// Ticks to wait for the teammate before acting unilaterally.
pub fn timeout(belief: &TrustBelief, fixed_offset: u64, distance: Option<Distance>) -> f64 {
    let mut ticks = BASE_TIMEOUT_TICKS + TIMEOUT_WILLINGNESS_WEIGHT * belief.willingness;
    if let Some(distance) = distance {
        ticks += distance.bonus_ticks() as f64;
    }
    ticks + fixed_offset as f64
}

/// Whether the teammate should be asked at all. An unwilling teammate is only
/// asked when their competence outweighs the unwillingness.
pub fn decide_ask_or_act_alone(willingness: f64, competence: f64) -> bool {
    let low_willingness = willingness < LOW_WILLINGNESS;
    let high_competence = competence > HIGH_COMPETENCE;

    if low_willingness && high_competence {
        willingness.abs() <= competence.abs()
    } else {
        !low_willingness
    }
}

// ---------------------------------------------------------------------------
// BeliefPolicy
// ---------------------------------------------------------------------------

/// Where the belief comes from: learned from the teammate's behaviour, or
/// pinned to a baseline for comparison runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeliefPolicy {
    Learned,
    Fixed(TrustBelief),
}

impl BeliefPolicy {
    /// Random-trust draws both components once from the session seed.
    pub fn from_mode(mode: TrustMode, seed: u64) -> Self {
        match mode {
            TrustMode::Learned => Self::Learned,
            TrustMode::AlwaysTrust => Self::Fixed(TrustBelief::new(1.0, 1.0)),
            TrustMode::NeverTrust => Self::Fixed(TrustBelief::new(-1.0, -1.0)),
            TrustMode::RandomTrust => {
                let mut rng = SplitMix64::new(seed);
                let competence = rng.next_signed_unit();
                let willingness = rng.next_signed_unit();
                Self::Fixed(TrustBelief::new(competence, willingness))
            }
        }
    }

    pub fn is_learned(&self) -> bool {
        matches!(self, Self::Learned)
    }
}

// ---------------------------------------------------------------------------
// BeliefEngine
// ---------------------------------------------------------------------------

/// The live belief about the teammate for this session.
#[derive(Debug, Clone)]
pub struct BeliefEngine {
    policy: BeliefPolicy,
    belief: TrustBelief,
}

impl BeliefEngine {
    /// `initial` is ignored under a fixed policy.
    pub fn new(policy: BeliefPolicy, initial: TrustBelief) -> Self {
        let belief = match policy {
            BeliefPolicy::Learned => initial.clamped(),
            BeliefPolicy::Fixed(fixed) => fixed,
        };
        Self { policy, belief }
    }

    pub fn policy(&self) -> BeliefPolicy {
        self.policy
    }

    pub fn belief(&self) -> TrustBelief {
        self.belief
    }

    pub fn competence(&self) -> f64 {
        self.belief.competence
    }

    pub fn willingness(&self) -> f64 {
        self.belief.willingness
    }

    /// Apply a signed nominal delta. Returns the change actually applied,
    /// which is zero under a fixed policy.
    pub fn nudge(&mut self, field: BeliefField, raw_delta: f64, reason: &str) -> f64 {
        if !self.policy.is_learned() {
            return 0.0;
        }
        let before = self.belief.get(field);
        let effective = damped_delta(&self.belief, raw_delta, field);
        self.belief.set(field, before + effective);
        let applied = self.belief.get(field) - before;
        info!(
            field = ?field,
            raw_delta,
            applied,
            value = self.belief.get(field),
            reason,
            "belief updated"
        );
        applied
    }

    pub fn threshold(&self, task: JointTask, distance: Option<Distance>) -> u64 {
        threshold(&self.belief, task, distance)
    }

    pub fn timeout(&self, fixed_offset: u64, distance: Option<Distance>) -> f64 {
        timeout(&self.belief, fixed_offset, distance)
    }

    pub fn should_ask(&self) -> bool {
        decide_ask_or_act_alone(self.belief.willingness, self.belief.competence)
    }
}
