//! Cache-guarded provider feeds
//!
//! [`SportsFeed`] and [`TipGenerator`] put the [`ExternalDataCache`] in front
//! of the data and generation providers, each with its own fallback:
//! sports data degrades to [`EventsSnapshot::Unavailable`], generation to a
//! locally synthesized tip.

use crate::cache::ExternalDataCache;
use crate::error::TipsterError;
use crate::models::UserContext;
use crate::providers::{DataProvider, GenerationProvider, TipSynthesizer, UpcomingEvents};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Messages of context included in a tip prompt.
pub const PROMPT_CONTEXT_MESSAGES: usize = 3;

/// Cached sports payload, or the marker callers treat as "no data".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum EventsSnapshot {
    Available(UpcomingEvents),
    Unavailable,
}

impl EventsSnapshot {
    pub fn is_available(&self) -> bool {
        matches!(self, EventsSnapshot::Available(_))
    }
}

#[derive(Clone)]
pub struct SportsFeed {
    cache: ExternalDataCache,
    provider: Arc<dyn DataProvider>,
    league_id: String,
    ttl: Duration,
}

impl SportsFeed {
    pub fn new(
        cache: ExternalDataCache,
        provider: Arc<dyn DataProvider>,
        league_id: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            provider,
            league_id: league_id.into(),
            ttl,
        }
    }

    pub fn cache_key(&self) -> String {
        format!("sports_data:{}", self.league_id)
    }

    pub async fn upcoming_events(&self) -> EventsSnapshot {
        let key = self.cache_key();
        self.cache
            .get_or_fetch(
                &key,
                self.ttl,
                || self.fetch(),
                || EventsSnapshot::Unavailable,
            )
            .await
    }

    /// Refetch regardless of the cached entry's age.
    pub async fn refresh(&self) -> EventsSnapshot {
        let key = self.cache_key();
        self.cache
            .refresh(&key, self.ttl, || self.fetch(), || EventsSnapshot::Unavailable)
            .await
    }

    async fn fetch(&self) -> crate::Result<EventsSnapshot> {
        let events = self.provider.fetch_upcoming_events(&self.league_id).await?;
        Ok(EventsSnapshot::Available(events))
    }
}

#[derive(Clone)]
pub struct TipGenerator {
    cache: ExternalDataCache,
    provider: Arc<dyn GenerationProvider>,
    synthesizer: Arc<dyn TipSynthesizer>,
    ttl: Duration,
}

impl TipGenerator {
    pub fn new(
        cache: ExternalDataCache,
        provider: Arc<dyn GenerationProvider>,
        synthesizer: Arc<dyn TipSynthesizer>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            provider,
            synthesizer,
            ttl,
        }
    }

    /// Generate a tip for `message`, seeded with the user's recent chat.
    /// Always returns non-empty text.
    pub async fn betting_tip(&self, message: &str, context: &UserContext) -> String {
        let prompt = build_tip_prompt(message, context);
        self.generate(&prompt).await
    }

    pub async fn generate(&self, prompt: &str) -> String {
        let key = generation_key(prompt);
        self.cache
            .get_or_fetch(
                &key,
                self.ttl,
                || async {
                    let text = self.provider.generate_text(prompt).await?;
                    let text = text.trim();
                    if text.is_empty() {
                        return Err(TipsterError::InvalidResponse(
                            "generation returned no text".to_string(),
                        ));
                    }
                    Ok(text.to_string())
                },
                || self.synthesizer.synthesize(prompt),
            )
            .await
    }
}

pub fn build_tip_prompt(message: &str, context: &UserContext) -> String {
    let recent = context.last_messages(PROMPT_CONTEXT_MESSAGES);
    format!(
        "Recent chat: {:?}\nUser says: {}\nPredict a betting tip:",
        recent, message
    )
}

/// `generation:{sha256(prompt)}`
pub fn generation_key(prompt: &str) -> String {
    format!("generation:{}", hex::encode(Sha256::digest(prompt.as_bytes())))
}
