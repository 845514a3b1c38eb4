//! Per-user conversation context
//!
//! Bounded recent history, last sentiment and last topic for every user.
//! [`ConversationStore`] never fails: an unreachable backend degrades to an
//! ephemeral default context for the request at hand.

use crate::models::{Sentiment, Topic, UserContext};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Persistence capability behind the conversation store.
#[async_trait::async_trait]
pub trait ContextBackend: Send + Sync {
    /// Load the context, materializing the default one for unseen users.
    async fn get(&self, user_id: &str) -> Result<UserContext>;
    /// Push a message (oldest evicted past capacity) and record its sentiment.
    async fn append(&self, user_id: &str, message: &str, sentiment: Sentiment) -> Result<UserContext>;
    async fn set_topic(&self, user_id: &str, topic: Topic) -> Result<()>;
    /// Replace the context with an empty one carrying `sentiment`.
    async fn reset(&self, user_id: &str, sentiment: Sentiment) -> Result<()>;
}

/// In-memory context backend
pub struct InMemoryContextBackend {
    contexts: Arc<RwLock<HashMap<String, UserContext>>>,
}

impl InMemoryContextBackend {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryContextBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContextBackend for InMemoryContextBackend {
    async fn get(&self, user_id: &str) -> Result<UserContext> {
        {
            let locked = self.contexts.read().await;
            if let Some(context) = locked.get(user_id) {
                return Ok(context.clone());
            }
        }

        let mut locked = self.contexts.write().await;
        let context = locked
            .entry(user_id.to_string())
            .or_insert_with(UserContext::new)
            .clone();

        Ok(context)
    }

    async fn append(&self, user_id: &str, message: &str, sentiment: Sentiment) -> Result<UserContext> {
        let mut locked = self.contexts.write().await;
        let context = locked
            .entry(user_id.to_string())
            .or_insert_with(UserContext::new);

        context.push_message(message.to_string());
        context.last_sentiment = sentiment;

        Ok(context.clone())
    }

    async fn set_topic(&self, user_id: &str, topic: Topic) -> Result<()> {
        let mut locked = self.contexts.write().await;
        locked
            .entry(user_id.to_string())
            .or_insert_with(UserContext::new)
            .last_topic = topic;
        Ok(())
    }

    async fn reset(&self, user_id: &str, sentiment: Sentiment) -> Result<()> {
        let mut context = UserContext::new();
        context.last_sentiment = sentiment;

        let mut locked = self.contexts.write().await;
        locked.insert(user_id.to_string(), context);
        Ok(())
    }
}

/// Infallible facade over a [`ContextBackend`].
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn ContextBackend>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn ContextBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryContextBackend::new()))
    }

    pub async fn get(&self, user_id: &str) -> UserContext {
        match self.backend.get(user_id).await {
            Ok(context) => context,
            Err(error) => {
                warn!(user_id, error = %error, "Context load failed, using ephemeral default");
                UserContext::new()
            }
        }
    }

    /// Append a message and return the context as it stands afterwards.
    pub async fn append(&self, user_id: &str, message: &str, sentiment: Sentiment) -> UserContext {
        match self.backend.append(user_id, message, sentiment).await {
            Ok(context) => context,
            Err(error) => {
                warn!(user_id, error = %error, "Context append failed, continuing with ephemeral context");
                let mut context = UserContext::new();
                context.push_message(message.to_string());
                context.last_sentiment = sentiment;
                context
            }
        }
    }

    pub async fn set_topic(&self, user_id: &str, topic: Topic) {
        if let Err(error) = self.backend.set_topic(user_id, topic).await {
            warn!(user_id, topic = %topic, error = %error, "Topic update dropped");
        }
    }

    pub async fn reset(&self, user_id: &str, sentiment: Sentiment) {
        if let Err(error) = self.backend.reset(user_id, sentiment).await {
            warn!(user_id, error = %error, "Context reset dropped");
        }
    }
}
