//! Ask / wait / resolve protocol for decisions the teammate gets a say in:
//! how to clear a blocked entrance and how to rescue a discovered victim.
//!
//! A negotiation never blocks the host. Waiting is a sequence of idle ticks
//! bounded by the belief-derived timeout; once it fires the agent resolves on
//! its own.

use std::fmt::Write as _;

use contracts::{Distance, ObstacleKind, Severity};
use serde::Serialize;

use crate::message::ReplyToken;

/// What is being negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum Topic {
    Obstacle {
        kind: ObstacleKind,
        room: String,
    },
    Victim {
        victim: String,
        severity: Severity,
        room: String,
    },
}

/// Decision-relevant context included in every prompt.
#[derive(Debug, Clone)]
pub struct PromptFeatures<'a> {
    pub rescued: Vec<&'a str>,
    pub searched: Vec<&'a str>,
    pub distance: Distance,
}

impl Topic {
    pub fn options(&self) -> &'static [ReplyToken] {
        match self {
            Self::Obstacle {
                kind: ObstacleKind::Rock | ObstacleKind::Tree,
                ..
            } => &[ReplyToken::Remove, ReplyToken::Continue],
            Self::Obstacle {
                kind: ObstacleKind::Stones,
                ..
            } => &[
                ReplyToken::RemoveTogether,
                ReplyToken::RemoveAlone,
                ReplyToken::Continue,
            ],
            Self::Victim {
                severity: Severity::Mild,
                ..
            } => &[
                ReplyToken::RescueTogether,
                ReplyToken::RescueAlone,
                ReplyToken::Continue,
            ],
            Self::Victim {
                severity: Severity::Critical,
                ..
            } => &[ReplyToken::Rescue, ReplyToken::Continue],
        }
    }

    /// Extra ticks added to the wait timeout, reflecting how long the task
    /// itself takes.
    pub fn timeout_offset(&self) -> u64 {
        match self {
            Self::Obstacle {
                kind: ObstacleKind::Rock,
                ..
            } => 50,
            Self::Obstacle {
                kind: ObstacleKind::Stones,
                ..
            } => 30,
            Self::Obstacle {
                kind: ObstacleKind::Tree,
                ..
            }
            | Self::Victim { .. } => 0,
        }
    }

    pub fn room(&self) -> &str {
        match self {
            Self::Obstacle { room, .. } | Self::Victim { room, .. } => room,
        }
    }

    pub fn prompt(&self, features: &PromptFeatures<'_>) -> String {
        let quoted = self
            .options()
            .iter()
            .map(|token| format!("\"{}\"", token.as_str()))
            .collect::<Vec<_>>();
        let choices = match quoted.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{first} or {second}"),
            [rest @ .., last] => format!("{}, or {last}", rest.join(", ")),
        };

        let mut prompt = match self {
            Self::Obstacle { kind, room } => {
                format!("Found {} blocking {room}. Please decide whether to {choices} searching.", kind.as_str())
            }
            Self::Victim { victim, room, .. } => {
                format!("Found {victim} in {room}. Please decide whether to {choices} searching.")
            }
        };
        prompt.push_str("\n\nImportant features to consider are:");
        let _ = write!(prompt, "\n safe - victims rescued: {:?}", features.rescued);
        let _ = write!(
            prompt,
            "\n explore - areas searched: area {}",
            features
                .searched
                .iter()
                .map(|room| room.trim_start_matches("area "))
                .collect::<Vec<_>>()
                .join(", ")
        );
        match self {
            Self::Obstacle {
                kind: ObstacleKind::Rock,
                ..
            } => prompt.push_str("\n clock - removal time: 5 seconds"),
            Self::Obstacle {
                kind: ObstacleKind::Tree,
                ..
            } => prompt.push_str("\n clock - removal time: 10 seconds"),
            Self::Obstacle {
                kind: ObstacleKind::Stones,
                ..
            } => prompt.push_str(
                "\n clock - removal time together: 3 seconds\n clock - removal time alone: 20 seconds",
            ),
            Self::Victim {
                severity: Severity::Mild,
                ..
            } => prompt.push_str("\n clock - extra time when rescuing alone: 15 seconds"),
            Self::Victim { .. } => {}
        }
        let _ = write!(prompt, "\n afstand - distance between us: {}", features.distance.as_str());
        prompt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", content = "token", rename_all = "snake_case")]
pub enum Resolution {
    Reply(ReplyToken),
    TimedOut,
    /// The agent chose not to ask.
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NegotiationStatus {
    AskPending,
    WaitingForReply { since: u64 },
    Resolved(Resolution),
}

/// Outcome of checking a negotiation on the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    AskNeeded,
    Waiting,
    Resolved(Resolution),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Negotiation {
    topic: Topic,
    status: NegotiationStatus,
}

impl Negotiation {
    pub fn open(topic: Topic) -> Self {
        Self {
            topic,
            status: NegotiationStatus::AskPending,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn status(&self) -> NegotiationStatus {
        self.status
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.status, NegotiationStatus::WaitingForReply { .. })
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self.status {
            NegotiationStatus::Resolved(resolution) => Some(resolution),
            _ => None,
        }
    }

    /// The prompt went out at `now`; start the wait clock.
    pub fn mark_asked(&mut self, now: u64) {
        if self.status == NegotiationStatus::AskPending {
            self.status = NegotiationStatus::WaitingForReply { since: now };
        }
    }

    /// Accept a reply only while waiting and only if the token answers this
    /// question. Returns whether it was accepted.
    pub fn offer_reply(&mut self, token: ReplyToken) -> bool {
        if !self.is_waiting() || !self.topic.options().contains(&token) {
            return false;
        }
        self.status = NegotiationStatus::Resolved(Resolution::Reply(token));
        true
    }

    /// Settle without the teammate: either the agent skipped asking, or the
    /// teammate's own request already implies the answer.
    pub fn resolve(&mut self, resolution: Resolution) {
        if self.resolution().is_none() {
            self.status = NegotiationStatus::Resolved(resolution);
        }
    }

    /// Times out once strictly more than `timeout` ticks have passed since the
    /// prompt.
    pub fn poll(&mut self, now: u64, timeout: f64) -> Poll {
        match self.status {
            NegotiationStatus::AskPending => Poll::AskNeeded,
            NegotiationStatus::WaitingForReply { since } => {
                if now.saturating_sub(since) as f64 > timeout {
                    self.status = NegotiationStatus::Resolved(Resolution::TimedOut);
                    Poll::Resolved(Resolution::TimedOut)
                } else {
                    Poll::Waiting
                }
            }
            NegotiationStatus::Resolved(resolution) => Poll::Resolved(resolution),
        }
    }
}
