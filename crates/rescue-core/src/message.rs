//! Channel boundary: free-text teammate messages are decoded once into
//! [`TeammateMessage`], and outbound status lines are queued through
//! [`Outbox`], which releases at most one per tick.

use std::collections::VecDeque;

use contracts::{OutboundMessage, SCORE_MESSAGE_PREFIX};
use serde::Serialize;

/// Bare reply tokens the teammate may send in answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyToken {
    Continue,
    Remove,
    RemoveAlone,
    RemoveTogether,
    Rescue,
    RescueTogether,
    RescueAlone,
}

impl ReplyToken {
    pub fn parse(raw: &str) -> Option<Self> {
        let token = match raw.trim() {
            "Continue" => Self::Continue,
            "Remove" => Self::Remove,
            "Remove alone" => Self::RemoveAlone,
            "Remove together" => Self::RemoveTogether,
            "Rescue" => Self::Rescue,
            "Rescue together" => Self::RescueTogether,
            "Rescue alone" => Self::RescueAlone,
            _ => return None,
        };
        Some(token)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "Continue",
            Self::Remove => "Remove",
            Self::RemoveAlone => "Remove alone",
            Self::RemoveTogether => "Remove together",
            Self::Rescue => "Rescue",
            Self::RescueTogether => "Rescue together",
            Self::RescueAlone => "Rescue alone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeammateMessage {
    SearchReported { area: String },
    VictimFound { victim: String, area: String },
    VictimCollected { victim: String, area: String },
    ObstacleHelpRequested { area: String },
    Reply(ReplyToken),
    Unrecognized,
}

impl TeammateMessage {
    pub fn decode(content: &str) -> Self {
        let content = content.trim();
        if let Some(token) = ReplyToken::parse(content) {
            return Self::Reply(token);
        }
        let Some((prefix, rest)) = content.split_once(':') else {
            return Self::Unrecognized;
        };
        let Some(area) = area_index(rest).map(area_name) else {
            return Self::Unrecognized;
        };
        match prefix.trim() {
            "Search" => Self::SearchReported { area },
            "Remove" => Self::ObstacleHelpRequested { area },
            "Found" => match victim_words(rest) {
                Some(victim) => Self::VictimFound { victim, area },
                None => Self::Unrecognized,
            },
            "Collect" => match victim_words(rest) {
                Some(victim) => Self::VictimCollected { victim, area },
                None => Self::Unrecognized,
            },
            _ => Self::Unrecognized,
        }
    }
}

/// Area number carried in the last whitespace token, if any.
pub fn area_index(text: &str) -> Option<u32> {
    text.split_whitespace()
        .last()
        .and_then(|token| token.trim_end_matches('.').parse::<u32>().ok())
        .filter(|index| *index > 0)
}

pub fn area_name(index: u32) -> String {
    format!("area {index}")
}

/// `"<victim words> in area <n>"` → victim words.
fn victim_words(rest: &str) -> Option<String> {
    let mut words: Vec<&str> = rest.split_whitespace().collect();
    words.pop();
    if words.last() == Some(&"area") {
        words.pop();
    }
    if words.last() == Some(&"in") {
        words.pop();
    }
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// FIFO of outbound status lines. A line equal to the last one composed, or
/// to one still queued, is dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: String,
    queue: VecDeque<String>,
    last_composed: Option<String>,
}

impl Outbox {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            queue: VecDeque::new(),
            last_composed: None,
        }
    }

    /// Returns whether the line was queued.
    pub fn compose(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.last_composed.as_deref() == Some(content.as_str())
            || self.queue.iter().any(|queued| *queued == content)
        {
            return false;
        }
        self.last_composed = Some(content.clone());
        self.queue.push_back(content);
        true
    }

    /// The score broadcast plus at most one queued status line.
    pub fn drain_tick(&mut self, score: i64) -> Vec<OutboundMessage> {
        let mut out = vec![OutboundMessage {
            from_id: self.sender.clone(),
            content: format!("{SCORE_MESSAGE_PREFIX} {score}."),
        }];
        if let Some(content) = self.queue.pop_front() {
            out.push(OutboundMessage {
                from_id: self.sender.clone(),
                content,
            });
        }
        out
    }

    /// Allow previously composed lines to be sent again.
    pub fn forget_history(&mut self) {
        self.last_composed = None;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
