//! Response catalog
//!
//! Immutable table of localized phrase variants keyed by (language, category).
//! Lookup is pure; picking a variant is the caller's job via [`VariantPolicy`].

use crate::error::TipsterError;
use crate::models::{Language, ReplyCategory, Sentiment};
use crate::Result;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;

/// Minimum number of phrasings a category must carry.
pub const MIN_VARIANTS: usize = 2;

type PhraseTable = HashMap<String, HashMap<String, Vec<String>>>;

lazy_static! {
    static ref BUILTIN: ResponseCatalog = ResponseCatalog::from_table(builtin_table());
}

#[derive(Debug, Clone)]
pub struct ResponseCatalog {
    table: PhraseTable,
}

impl ResponseCatalog {
    /// Shared built-in Spanish/English table.
    pub fn builtin() -> &'static ResponseCatalog {
        &*BUILTIN
    }

    fn from_table(table: PhraseTable) -> Self {
        Self { table }
    }

    /// Parse a `{lang: {category: [variants..]}}` JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: PhraseTable = serde_json::from_str(raw)?;

        for (language, categories) in &table {
            for (category, variants) in categories {
                if variants.len() < MIN_VARIANTS {
                    return Err(TipsterError::Config(format!(
                        "category {}/{} has {} variant(s), need at least {}",
                        language,
                        category,
                        variants.len(),
                        MIN_VARIANTS
                    )));
                }
            }
        }

        Ok(Self::from_table(table))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// All variants for a (language, category) pair.
    pub fn lookup(&self, language: &str, category: &str) -> Result<&[String]> {
        self.table
            .get(language)
            .and_then(|categories| categories.get(category))
            .map(|variants| variants.as_slice())
            .ok_or_else(|| TipsterError::NotFound(format!("{}/{}", language, category)))
    }

    pub fn phrases(&self, language: Language, category: ReplyCategory) -> Result<&[String]> {
        self.lookup(language.as_str(), category.as_str())
    }

    /// Look up and pick one variant in a single step.
    pub fn select(
        &self,
        language: Language,
        category: ReplyCategory,
        policy: VariantPolicy,
        sentiment: Sentiment,
    ) -> Result<&str> {
        let variants = self.phrases(language, category)?;
        policy.pick(variants, sentiment).ok_or_else(|| {
            TipsterError::NotFound(format!("{}/{} has no variants", language, category.as_str()))
        })
    }
}

/// Rule for choosing among phrase variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantPolicy {
    /// Always the first variant.
    First,
    /// Positive sentiment takes variant 0, anything else variant 1.
    BySentiment,
}

impl VariantPolicy {
    pub fn pick<'a>(&self, variants: &'a [String], sentiment: Sentiment) -> Option<&'a str> {
        let index = match self {
            VariantPolicy::First => 0,
            VariantPolicy::BySentiment => match sentiment {
                Sentiment::Positive => 0,
                Sentiment::Neutral => 1,
            },
        };

        variants
            .get(index)
            .or_else(|| variants.first())
            .map(|s| s.as_str())
    }
}

/// Substitute the `{}` placeholder of a template. When the template closes
/// the placeholder with a period, one trailing period of `value` is dropped.
pub fn render(template: &str, value: &str) -> String {
    let value = match template.find("{}") {
        Some(at) if template[at + 2..].starts_with('.') => value.strip_suffix('.').unwrap_or(value),
        _ => value,
    };
    template.replacen("{}", value, 1)
}

fn builtin_table() -> PhraseTable {
    let entries: &[(&str, &[(&str, &[&str])])] = &[
        (
            "es",
            &[
                (
                    "welcome",
                    &[
                        "¡Bienvenido a TipsterX! Usa /tips para predicciones o /leaderboard para ver los rankings.",
                        "¡Qué bueno verte, crack! Prueba /tips para unas predicciones o /leaderboard para el top.",
                    ],
                ),
                (
                    "tips_positive",
                    &[
                        "¡Apostando fuerte! Aquí tienes: {}.",
                        "¡Se ve clarito! Mi predicción: {}.",
                    ],
                ),
                (
                    "tips_neutral",
                    &[
                        "Hmm, está complicado, pero diría que {}.",
                        "Analicé todo y creo que {}.",
                    ],
                ),
                (
                    "leaderboard",
                    &["Top 3 usuarios: {}", "Los mejores están aquí: {}"],
                ),
                (
                    "error",
                    &[
                        "Algo salió mal, intenta de nuevo.",
                        "Ups, fallé. Dame otra chance.",
                    ],
                ),
            ],
        ),
        (
            "en",
            &[
                (
                    "welcome",
                    &[
                        "Welcome to TipsterX! Use /tips for predictions or /leaderboard for rankings.",
                        "Hey, good to see you! Try /tips for predictions or /leaderboard for the top ranks.",
                    ],
                ),
                (
                    "tips_positive",
                    &[
                        "Big bet incoming! Here’s my take: {}.",
                        "Looks clear to me! Prediction: {}.",
                    ],
                ),
                (
                    "tips_neutral",
                    &[
                        "Tough call, but I’d say {}.",
                        "I crunched the numbers, here’s my guess: {}.",
                    ],
                ),
                (
                    "leaderboard",
                    &["Top 3 users: {}", "Here’s the best of the best: {}"],
                ),
                (
                    "error",
                    &[
                        "Something went wrong, try again.",
                        "Oops, messed up. Let’s try that again.",
                    ],
                ),
            ],
        ),
    ];

    entries
        .iter()
        .map(|(language, categories)| {
            let categories = categories
                .iter()
                .map(|(category, variants)| {
                    (
                        category.to_string(),
                        variants.iter().map(|v| v.to_string()).collect(),
                    )
                })
                .collect();
            (language.to_string(), categories)
        })
        .collect()
}
