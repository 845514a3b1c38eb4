//! Message classification
//!
//! Two layers:
//! - Text classifiers: language and coarse sentiment, consumed through the
//!   [`TextClassifier`] contract. [`KeywordClassifier`] is the built-in one.
//! - Intent matching: cheap case-insensitive containment checks that the
//!   router uses to spot betting requests and winner questions.

use crate::error::TipsterError;
use crate::models::{Language, Sentiment};
use crate::Result;
use tracing::warn;

/// Static keyword lists
const BETTING_KEYWORDS: &[&str] = &[
    // English stems
    "predic", "tip", "bet",
    // Spanish stems
    "apuest", "pronóstic",
];

const WHO_TOKENS: &[&str] = &["who", "quién", "quien"];
const WIN_TOKENS: &[&str] = &["win", "gana"];

const SPANISH_MARKERS: &[&str] = &[
    "el", "la", "los", "las", "que", "de", "y", "es", "por", "para", "con", "una", "un",
    "hola", "quién", "quien", "ganará", "partido", "apuesta", "gracias", "cómo", "como",
    "qué", "hoy", "mañana", "pero", "muy", "bien",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "is", "are", "who", "will", "what", "hello", "hi", "you", "your", "bet", "match",
    "can", "win", "tonight", "today", "and", "please", "thanks", "how", "that", "this",
    "sounds", "good", "there",
];

const POSITIVE_WORDS: &[&str] = &[
    // English
    "good", "great", "awesome", "love", "excellent", "amazing", "happy", "nice", "best",
    "cool", "confident", "sure", "fantastic", "thanks",
    // Spanish
    "bueno", "buena", "genial", "excelente", "increíble", "gracias", "feliz", "mejor",
    "vamos", "seguro", "crack",
];

const NEGATIVE_WORDS: &[&str] = &[
    // English
    "bad", "terrible", "hate", "awful", "worst", "sad", "boring", "wrong",
    // Spanish
    "malo", "mala", "odio", "peor", "triste", "horrible", "aburrido",
];

/// Language and sentiment detection contract.
pub trait TextClassifier: Send + Sync {
    fn detect_language(&self, text: &str) -> Result<Language>;
    fn classify_sentiment(&self, text: &str) -> Result<Sentiment>;
}

/// Classify a message once, applying the recovery policy:
/// language falls back to `es`, sentiment to `neutral`.
pub fn classify_message(classifier: &dyn TextClassifier, text: &str) -> (Language, Sentiment) {
    let language = classifier.detect_language(text).unwrap_or_else(|e| {
        warn!(error = %e, "Language detection failed, defaulting to es");
        Language::Es
    });

    let sentiment = classifier.classify_sentiment(text).unwrap_or_else(|e| {
        warn!(error = %e, "Sentiment classification failed, defaulting to neutral");
        Sentiment::Neutral
    });

    (language, sentiment)
}

/// Marker-word classifier for Spanish/English chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl TextClassifier for KeywordClassifier {
    fn detect_language(&self, text: &str) -> Result<Language> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(TipsterError::ClassificationFailure(
                "no words to detect language from".to_string(),
            ));
        }

        let accent_hits = text
            .chars()
            .filter(|c| matches!(c, 'ñ' | 'á' | 'é' | 'í' | 'ó' | 'ú' | '¿' | '¡'))
            .count();

        let es_score = count_hits(&tokens, SPANISH_MARKERS) + accent_hits;
        let en_score = count_hits(&tokens, ENGLISH_MARKERS);

        if es_score == 0 && en_score == 0 {
            return Err(TipsterError::ClassificationFailure(
                "no language markers found".to_string(),
            ));
        }

        if en_score > es_score {
            Ok(Language::En)
        } else {
            Ok(Language::Es)
        }
    }

    fn classify_sentiment(&self, text: &str) -> Result<Sentiment> {
        let tokens = tokenize(text);

        let polarity = count_hits(&tokens, POSITIVE_WORDS) as i64
            - count_hits(&tokens, NEGATIVE_WORDS) as i64;

        Ok(if polarity > 0 {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        })
    }
}

/// Betting-intent stems (`predic`, `tip`, `bet`, ...).
pub fn has_betting_keyword(text: &str) -> bool {
    let text = text.to_lowercase();
    BETTING_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// "who ... win" style questions.
pub fn is_winner_question(text: &str) -> bool {
    let text = text.to_lowercase();
    WHO_TOKENS.iter().any(|kw| text.contains(kw)) && WIN_TOKENS.iter().any(|kw| text.contains(kw))
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn count_hits(tokens: &[String], words: &[&str]) -> usize {
    tokens
        .iter()
        .filter(|t| words.contains(&t.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenClassifier;

    impl TextClassifier for BrokenClassifier {
        fn detect_language(&self, _text: &str) -> Result<Language> {
            Err(TipsterError::ClassificationFailure("offline".into()))
        }

        fn classify_sentiment(&self, _text: &str) -> Result<Sentiment> {
            Err(TipsterError::ClassificationFailure("offline".into()))
        }
    }

    #[test]
    fn test_language_detection() {
        let classifier = KeywordClassifier;
        let cases = vec![
            ("Can you predict the match?", Language::En),
            ("who will win tonight", Language::En),
            ("¿Quién ganará el partido de hoy?", Language::Es),
            ("hola, qué tal", Language::Es),
        ];

        for (text, expected) in cases {
            assert_eq!(classifier.detect_language(text).unwrap(), expected, "{}", text);
        }
    }

    #[test]
    fn test_language_failure_defaults_to_spanish() {
        let (language, sentiment) = classify_message(&KeywordClassifier, "1234 !!");
        assert_eq!(language, Language::Es);
        assert_eq!(sentiment, Sentiment::Neutral);

        let (language, sentiment) = classify_message(&BrokenClassifier, "great match");
        assert_eq!(language, Language::Es);
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_buckets() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier.classify_sentiment("that sounds good actually").unwrap(),
            Sentiment::Positive
        );
        assert_eq!(
            classifier.classify_sentiment("good but terrible defense, bad form").unwrap(),
            Sentiment::Neutral
        );
        assert_eq!(classifier.classify_sentiment("").unwrap(), Sentiment::Neutral);
    }

    #[test]
    fn test_intent_keywords() {
        assert!(has_betting_keyword("Can you PREDICT the match?"));
        assert!(has_betting_keyword("any tips for today"));
        assert!(has_betting_keyword("dame una apuesta segura"));
        assert!(!has_betting_keyword("hello there"));

        assert!(is_winner_question("Who will WIN tonight"));
        assert!(is_winner_question("quién gana hoy"));
        assert!(!is_winner_question("who are you"));
        assert!(!is_winner_question("will they win"));
    }
}
