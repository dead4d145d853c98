//! Decision core of the rescue teammate: a phase-driven task controller fed by
//! a trust belief model over the human teammate.
//!
//! Each host tick runs: decode inbound messages → update ledger and beliefs →
//! drive the phase controller until it yields an action or waits → persist the
//! belief if it changed.

pub mod agent;
pub mod belief;
mod controller;
pub mod ledger;
pub mod message;
pub mod negotiation;
pub mod rng;
pub mod store;
pub mod world;

pub use agent::{AgentState, RescueAgent};
pub use belief::{BeliefEngine, BeliefPolicy, JointTask};
pub use ledger::{Ledger, Observation};
pub use message::{area_index, area_name, Outbox, ReplyToken, TeammateMessage};
pub use negotiation::{Negotiation, NegotiationStatus, Poll, PromptFeatures, Resolution, Topic};
pub use store::{BeliefKeeper, BeliefStore, MemoryBeliefStore, StoreError};
pub use world::{Router, WorldView};
