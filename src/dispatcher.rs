//! Gateway entry points
//!
//! Every inbound message goes: classify → context update → reply → leaderboard.
//! Each entry point always returns a reply; failures end in the localized
//! `error` phrase.

use crate::cache::ExternalDataCache;
use crate::catalog::{render, ResponseCatalog, VariantPolicy};
use crate::classifier::{classify_message, KeywordClassifier, TextClassifier};
use crate::conversation::ConversationStore;
use crate::error::TipsterError;
use crate::feeds::{EventsSnapshot, SportsFeed, TipGenerator};
use crate::leaderboard::{format_leaderboard, LeaderboardStore};
use crate::models::{Language, ReplyCategory, Sentiment, Topic};
use crate::providers::sportsdb::DEFAULT_LEAGUE_ID;
use crate::providers::{DataProvider, GenerationProvider, PooledSynthesizer, TipSynthesizer};
use crate::router::IntentRouter;
use crate::storage::Backends;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Number of users shown by the leaderboard command.
pub const LEADERBOARD_SIZE: usize = 3;

/// Reply used when even the `error` phrase cannot be looked up.
pub const LAST_RESORT_REPLY: &str = "Algo salió mal, intenta de nuevo.";

const UPDATES_AVAILABLE: &str = "Tendencias deportivas: Aquí tienes las últimas actualizaciones...";
const UPDATES_UNAVAILABLE: &str = "No hay datos deportivos ahora.";

/// Message as delivered by the messaging gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
    /// Command name without the slash, e.g. `tips`.
    #[serde(default)]
    pub command: Option<String>,
}

/// Outcome of one scheduled refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshReport {
    pub data_available: bool,
    pub event_count: usize,
    pub purged_entries: u64,
    /// Broadcast text for the gateway.
    pub message: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    classifier: Arc<dyn TextClassifier>,
    catalog: Arc<ResponseCatalog>,
    conversations: ConversationStore,
    leaderboard: LeaderboardStore,
    router: IntentRouter,
    tips: TipGenerator,
    sports: SportsFeed,
    cache: ExternalDataCache,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn leaderboard(&self) -> &LeaderboardStore {
        &self.leaderboard
    }

    pub fn sports(&self) -> &SportsFeed {
        &self.sports
    }

    /// Route a gateway message to the matching entry point.
    pub async fn handle(&self, message: &InboundMessage) -> String {
        let command = message
            .command
            .as_deref()
            .map(|c| c.trim_start_matches('/').to_lowercase());

        match command.as_deref() {
            Some("start") => self.on_start(&message.user_id, &message.text).await,
            Some("tips") => self.on_tips_command(&message.user_id, &message.text).await,
            Some("leaderboard") => self.on_leaderboard_command(&message.user_id, &message.text).await,
            _ => self.on_free_text(&message.user_id, &message.text).await,
        }
    }

    /// `/start`: fresh context and a welcome phrase picked by sentiment.
    pub async fn on_start(&self, user_id: &str, text: &str) -> String {
        self.dispatch("start", user_id, text, |language, sentiment| async move {
            self.conversations.reset(user_id, sentiment).await;
            let reply = self.catalog.select(
                language,
                ReplyCategory::Welcome,
                VariantPolicy::BySentiment,
                sentiment,
            )?;
            Ok(reply.to_string())
        })
        .await
    }

    /// `/tips`: a templated betting tip for the message.
    pub async fn on_tips_command(&self, user_id: &str, text: &str) -> String {
        self.dispatch("tips", user_id, text, |language, sentiment| async move {
            let context = self.conversations.append(user_id, text, sentiment).await;
            self.conversations.set_topic(user_id, Topic::Betting).await;

            let template = self
                .catalog
                .select(
                    language,
                    ReplyCategory::tips_for(sentiment),
                    VariantPolicy::First,
                    sentiment,
                )?
                .to_string();

            let tip = self.tips.betting_tip(text, &context).await;
            Ok(render(&template, &tip))
        })
        .await
    }

    /// `/leaderboard`: the top users by activity.
    pub async fn on_leaderboard_command(&self, user_id: &str, text: &str) -> String {
        self.dispatch("leaderboard", user_id, text, |language, sentiment| async move {
            self.conversations.append(user_id, text, sentiment).await;
            self.conversations.set_topic(user_id, Topic::Leaderboard).await;

            let template = self
                .catalog
                .select(language, ReplyCategory::Leaderboard, VariantPolicy::First, sentiment)?
                .to_string();

            let top = self.leaderboard.top_k(LEADERBOARD_SIZE).await;
            Ok(render(&template, &format_leaderboard(&top)))
        })
        .await
    }

    /// Any non-command text, routed by intent.
    pub async fn on_free_text(&self, user_id: &str, text: &str) -> String {
        let text = text.to_lowercase();
        let text = text.as_str();

        self.dispatch("free_text", user_id, text, |language, sentiment| async move {
            self.conversations.append(user_id, text, sentiment).await;
            self.router.route(user_id, text, language, sentiment).await
        })
        .await
    }

    /// Localized error reply. Falls back to Spanish, then to a constant.
    pub fn on_error(&self, language: Language, err: &TipsterError) -> String {
        error!(language = %language, error = %err, "Request failed");

        [language, Language::Es]
            .into_iter()
            .find_map(|lang| {
                self.catalog
                    .select(lang, ReplyCategory::Error, VariantPolicy::First, Sentiment::Neutral)
                    .ok()
            })
            .unwrap_or(LAST_RESORT_REPLY)
            .to_string()
    }

    /// Scheduled entry point: refetch sports data and sweep expired entries.
    pub async fn refresh(&self) -> RefreshReport {
        let snapshot = self.sports.refresh().await;
        let purged_entries = self.cache.purge_expired().await;

        let (data_available, event_count, message) = match &snapshot {
            EventsSnapshot::Available(upcoming) => (true, upcoming.events.len(), UPDATES_AVAILABLE),
            EventsSnapshot::Unavailable => (false, 0, UPDATES_UNAVAILABLE),
        };

        info!(data_available, event_count, purged_entries, "Broadcasting update: {}", message);

        RefreshReport {
            data_available,
            event_count,
            purged_entries,
            message: message.to_string(),
        }
    }

    async fn dispatch<'a, F, Fut>(&'a self, entry: &'static str, user_id: &'a str, text: &'a str, handler: F) -> String
    where
        F: FnOnce(Language, Sentiment) -> Fut,
        Fut: Future<Output = Result<String>> + 'a,
    {
        let span = info_span!("dispatch", request_id = %Uuid::new_v4(), user_id, entry);

        async move {
            let (language, sentiment) = classify_message(self.classifier.as_ref(), text);
            info!(language = %language, sentiment = %sentiment, "Message received");

            match handler(language, sentiment).await {
                Ok(reply) => {
                    self.leaderboard.record_activity(user_id).await;
                    reply
                }
                Err(err) => self.on_error(language, &err),
            }
        }
        .instrument(span)
        .await
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Builder for [`Dispatcher`].
///
/// Both providers are required; everything else has a default.
pub struct DispatcherBuilder {
    classifier: Arc<dyn TextClassifier>,
    catalog: Arc<ResponseCatalog>,
    backends: Backends,
    data_provider: Option<Arc<dyn DataProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    synthesizer: Arc<dyn TipSynthesizer>,
    league_id: String,
    sports_ttl: Duration,
    generation_ttl: Duration,
    fetch_timeout: Duration,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier),
            catalog: Arc::new(ResponseCatalog::builtin().clone()),
            backends: Backends::in_memory(),
            data_provider: None,
            generation_provider: None,
            synthesizer: Arc::new(PooledSynthesizer),
            league_id: DEFAULT_LEAGUE_ID.to_string(),
            sports_ttl: Duration::from_secs(3600),
            generation_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

impl DispatcherBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn catalog(mut self, catalog: ResponseCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    pub fn data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn TipSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn league_id(mut self, league_id: impl Into<String>) -> Self {
        self.league_id = league_id.into();
        self
    }

    pub fn sports_ttl(mut self, ttl: Duration) -> Self {
        self.sports_ttl = ttl;
        self
    }

    pub fn generation_ttl(mut self, ttl: Duration) -> Self {
        self.generation_ttl = ttl;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let data_provider = self
            .data_provider
            .ok_or_else(|| TipsterError::Config("data provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| TipsterError::Config("generation provider is required".to_string()))?;

        let cache = ExternalDataCache::new(self.backends.kv.clone(), self.fetch_timeout);
        let conversations = ConversationStore::new(self.backends.contexts.clone());
        let leaderboard = LeaderboardStore::new(self.backends.scores.clone());

        let tips = TipGenerator::new(
            cache.clone(),
            generation_provider,
            self.synthesizer,
            self.generation_ttl,
        );
        let sports = SportsFeed::new(cache.clone(), data_provider, self.league_id, self.sports_ttl);
        let router = IntentRouter::new(conversations.clone(), tips.clone(), self.catalog.clone());

        Ok(Dispatcher {
            classifier: self.classifier,
            catalog: self.catalog,
            conversations,
            leaderboard,
            router,
            tips,
            sports,
            cache,
        })
    }
}
