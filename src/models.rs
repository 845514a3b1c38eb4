//! Core data models for the tipster bot

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Maximum number of messages kept per user.
pub const MAX_RECENT_MESSAGES: usize = 5;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" => Ok(Language::Es),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

/// Persisted per-user conversational state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[default]
    None,
    Betting,
    Leaderboard,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::None => "none",
            Topic::Betting => "betting",
            Topic::Leaderboard => "leaderboard",
            Topic::General => "general",
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Topic::None),
            "betting" => Ok(Topic::Betting),
            "leaderboard" => Ok(Topic::Leaderboard),
            "general" => Ok(Topic::General),
            other => Err(format!("unknown topic '{}'", other)),
        }
    }
}

/// Phrase categories of the response catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReplyCategory {
    Welcome,
    TipsPositive,
    TipsNeutral,
    Leaderboard,
    Error,
}

impl ReplyCategory {
    pub const ALL: [ReplyCategory; 5] = [
        ReplyCategory::Welcome,
        ReplyCategory::TipsPositive,
        ReplyCategory::TipsNeutral,
        ReplyCategory::Leaderboard,
        ReplyCategory::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyCategory::Welcome => "welcome",
            ReplyCategory::TipsPositive => "tips_positive",
            ReplyCategory::TipsNeutral => "tips_neutral",
            ReplyCategory::Leaderboard => "leaderboard",
            ReplyCategory::Error => "error",
        }
    }

    /// `tips_{sentiment}`
    pub fn tips_for(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Positive => ReplyCategory::TipsPositive,
            Sentiment::Neutral => ReplyCategory::TipsNeutral,
        }
    }
}

//
// ================= User Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserContext {
    /// Oldest first, never longer than [`MAX_RECENT_MESSAGES`].
    recent_messages: VecDeque<String>,
    pub last_sentiment: Sentiment,
    pub last_topic: Topic,
}

impl UserContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a context from persisted parts, keeping only the newest messages.
    pub fn from_parts(
        messages: impl IntoIterator<Item = String>,
        last_sentiment: Sentiment,
        last_topic: Topic,
    ) -> Self {
        let mut context = Self {
            recent_messages: VecDeque::new(),
            last_sentiment,
            last_topic,
        };
        for message in messages {
            context.push_message(message);
        }
        context
    }

    /// Push a message, evicting the oldest on overflow.
    pub fn push_message(&mut self, message: String) {
        self.recent_messages.push_back(message);
        while self.recent_messages.len() > MAX_RECENT_MESSAGES {
            self.recent_messages.pop_front();
        }
    }

    pub fn recent_messages(&self) -> impl DoubleEndedIterator<Item = &String> {
        self.recent_messages.iter()
    }

    /// The newest `count` messages, oldest first.
    pub fn last_messages(&self, count: usize) -> Vec<String> {
        let skip = self.recent_messages.len().saturating_sub(count);
        self.recent_messages.iter().skip(skip).cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.recent_messages.len()
    }
}

//
// ================= Routing =================
//

/// Which router branch fired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BettingKeyword,
    WinnerQuestion,
    BettingContinuation,
    General,
}

/// Transient routing decision, produced and consumed within one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyDecision {
    pub intent: Intent,
    /// Catalog category wrapping the generated text, if any.
    pub category: Option<ReplyCategory>,
    /// Template the generated text is formatted into. `None` means raw output.
    pub template: Option<String>,
    pub use_generation: bool,
    /// Message handed to the generation prompt builder.
    pub generation_input: String,
    pub topic: Topic,
}

//
// ================= Leaderboard =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub score: u64,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
