//! Free-text job matching through an external classifier.
//!
//! The classifier answers with a JSON object
//! `{"category": .., "keywords": [..], "reasoning": ..}`, possibly wrapped in
//! a markdown code fence. Its answer is only ever used as search parameters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{MarketplaceError, Result};
use crate::marketplace::Marketplace;
use crate::models::{Category, Provider};

/// Category the classifier picks when nothing fits.
pub const GENERAL_CATEGORY: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub keywords: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub suggestion: Suggestion,
    pub providers: Vec<Provider>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Raw answer for `description`, choosing among `categories`.
    async fn classify(&self, description: &str, categories: &[String]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    category: Option<String>,
    keywords: Option<Vec<String>>,
    reasoning: Option<String>,
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.trim_start().starts_with('{') => inner.trim(),
        _ => body.trim(),
    }
}

pub fn parse_suggestion(raw: &str) -> Result<Suggestion> {
    let json = strip_code_fence(raw);
    let parsed: RawSuggestion = serde_json::from_str(json)
        .map_err(|e| MarketplaceError::Collaborator(format!("unparsable response: {e}")))?;

    let category = parsed.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let keywords: Option<Vec<String>> = parsed.keywords.map(|k| {
        k.into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect()
    });
    let reasoning = parsed.reasoning.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

    match (category, keywords, reasoning) {
        (Some(category), Some(keywords), Some(reasoning)) => Ok(Suggestion {
            category,
            keywords,
            reasoning,
        }),
        _ => Err(MarketplaceError::Collaborator(
            "response was not in the expected format".to_string(),
        )),
    }
}

/// Classifies `description` and searches providers with the suggestion.
pub async fn smart_match(
    market: &Marketplace,
    classifier: &dyn Classifier,
    description: &str,
) -> Result<MatchResult> {
    let description = description.trim();
    if description.is_empty() {
        return Err(MarketplaceError::validation(
            "Please describe the service you need.",
        ));
    }

    let categories: Vec<String> = market
        .categories()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();

    let raw = classifier
        .classify(description, &categories)
        .await
        .map_err(|e| match e {
            MarketplaceError::Collaborator(_) => e,
            other => MarketplaceError::Collaborator(other.to_string()),
        });
    let suggestion = match raw.and_then(|raw| parse_suggestion(&raw)) {
        Ok(suggestion) => suggestion,
        Err(e) => {
            warn!("smart match failed: {e}");
            return Err(e);
        }
    };

    let category = (suggestion.category != GENERAL_CATEGORY).then_some(suggestion.category.as_str());
    let query = suggestion.keywords.join(" ");
    let providers = market.list_providers(category, Some(&query)).await?;

    Ok(MatchResult {
        suggestion,
        providers,
    })
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .map(str::to_lowercase)
}

/// In-process classifier that scores categories by shared words with their
/// name, subcategories and description.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    categories: Vec<Category>,
}

impl KeywordClassifier {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    fn suggest(&self, description: &str, allowed: &[String]) -> Suggestion {
        let words: Vec<String> = tokens(description).collect();

        let mut best: Option<(&Category, Vec<String>)> = None;
        for category in self.categories.iter().filter(|c| allowed.contains(&c.name)) {
            let vocabulary: BTreeSet<String> = std::iter::once(category.name.as_str())
                .chain(category.subcategories.iter().map(String::as_str))
                .chain(std::iter::once(category.description.as_str()))
                .flat_map(tokens)
                .collect();
            let hits: Vec<String> = words
                .iter()
                .filter(|w| vocabulary.iter().any(|v| v.starts_with(w.as_str()) || w.starts_with(v.as_str())))
                .cloned()
                .collect();
            if hits.is_empty() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, b)| hits.len() > b.len()) {
                best = Some((category, hits));
            }
        }

        match best {
            Some((category, mut hits)) => {
                hits.dedup();
                hits.truncate(3);
                Suggestion {
                    reasoning: format!(
                        "Your request mentions {}, which is {} work.",
                        hits.join(", "),
                        category.name
                    ),
                    category: category.name.clone(),
                    keywords: hits.into_iter().take(1).collect(),
                }
            }
            None => Suggestion {
                category: GENERAL_CATEGORY.to_string(),
                keywords: words.into_iter().take(1).collect(),
                reasoning: "Your request does not clearly fit one category, so I searched everything."
                    .to_string(),
            },
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, description: &str, categories: &[String]) -> Result<String> {
        let suggestion = self.suggest(description, categories);
        serde_json::to_string(&suggestion).map_err(|e| MarketplaceError::Collaborator(e.to_string()))
    }
}
