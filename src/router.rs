//! Intent router
//!
//! Decides, per message, which reply pipeline runs. Priority order, first
//! match wins:
//! 1. betting keyword            → templated tip, topic `betting`
//! 2. "who ... win" question     → templated winner tip, topic `betting`
//! 3. previous topic was betting → raw generated continuation, topic `betting`
//! 4. anything else              → raw generated peer reply, topic `general`

use crate::catalog::{render, ResponseCatalog, VariantPolicy};
use crate::classifier::{has_betting_keyword, is_winner_question};
use crate::conversation::ConversationStore;
use crate::feeds::TipGenerator;
use crate::models::{Intent, Language, ReplyCategory, ReplyDecision, Sentiment, Topic, UserContext};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct IntentRouter {
    conversations: ConversationStore,
    tips: TipGenerator,
    catalog: Arc<ResponseCatalog>,
}

impl IntentRouter {
    pub fn new(conversations: ConversationStore, tips: TipGenerator, catalog: Arc<ResponseCatalog>) -> Self {
        Self {
            conversations,
            tips,
            catalog,
        }
    }

    /// Produce the reply for an already classified message. The message is
    /// expected to be appended to the user's context beforehand.
    ///
    /// Fails only on a catalog gap for the tips template.
    pub async fn route(
        &self,
        user_id: &str,
        raw_text: &str,
        language: Language,
        sentiment: Sentiment,
    ) -> Result<String> {
        let context = self.conversations.get(user_id).await;
        let decision = self.decide(raw_text, &context, language, sentiment)?;

        debug!(
            user_id,
            intent = ?decision.intent,
            topic = %decision.topic,
            "Routing decision"
        );

        self.conversations.set_topic(user_id, decision.topic).await;

        let generated = if decision.use_generation {
            self.tips.betting_tip(&decision.generation_input, &context).await
        } else {
            String::new()
        };

        Ok(match &decision.template {
            Some(template) => render(template, &generated),
            None => generated,
        })
    }

    /// Pure branch selection over the text and the stored context.
    pub fn decide(
        &self,
        text: &str,
        context: &UserContext,
        language: Language,
        sentiment: Sentiment,
    ) -> Result<ReplyDecision> {
        if has_betting_keyword(text) {
            return self.tip_decision(Intent::BettingKeyword, text.to_string(), language, sentiment);
        }

        if is_winner_question(text) {
            return self.tip_decision(
                Intent::WinnerQuestion,
                format!("Predict a winner for: {}", text),
                language,
                sentiment,
            );
        }

        if context.last_topic == Topic::Betting {
            return Ok(ReplyDecision {
                intent: Intent::BettingContinuation,
                category: None,
                template: None,
                use_generation: true,
                generation_input: format!("Continue the conversation naturally about betting: {}", text),
                topic: Topic::Betting,
            });
        }

        Ok(ReplyDecision {
            intent: Intent::General,
            category: None,
            template: None,
            use_generation: true,
            generation_input: format!("Respond naturally like a sports fan buddy: {}", text),
            topic: Topic::General,
        })
    }

    fn tip_decision(
        &self,
        intent: Intent,
        generation_input: String,
        language: Language,
        sentiment: Sentiment,
    ) -> Result<ReplyDecision> {
        let category = ReplyCategory::tips_for(sentiment);
        let template = self
            .catalog
            .select(language, category, VariantPolicy::First, sentiment)?
            .to_string();

        Ok(ReplyDecision {
            intent,
            category: Some(category),
            template: Some(template),
            use_generation: true,
            generation_input,
            topic: Topic::Betting,
        })
    }
}
