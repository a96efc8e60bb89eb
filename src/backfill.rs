//! Organic backfill from external search.
//!
//! Runs only when the sponsored list falls short of the result budget. One
//! web search plus one model call extract the missing number of real
//! establishments from the search results. The whole step is best-effort:
//! any failure — search, model, or parse — degrades to an empty list and
//! the pipeline proceeds with whatever sponsored entries it has.

use std::collections::HashSet;
use std::sync::Arc;

use crate::format::normalize_website;
use crate::intent::{strip_code_fences, StructuredIntent};
use crate::llm::{ChatModel, ChatTurn, TurnRole};
use crate::models::{Recommendation, Tier};
use crate::websearch::WebSearch;

pub struct ExternalBackfill {
    search: Arc<dyn WebSearch>,
    model: Arc<dyn ChatModel>,
}

impl ExternalBackfill {
    pub fn new(search: Arc<dyn WebSearch>, model: Arc<dyn ChatModel>) -> Self {
        Self { search, model }
    }

    /// Up to `budget - already_have.len()` organic recommendations, deduped
    /// (by normalized website) against the sponsored batch and within
    /// themselves. Empty on any failure.
    ///
    /// Precondition: the caller only invokes this with a complete intent.
    pub async fn backfill(
        &self,
        intent: &StructuredIntent,
        already_have: &[Recommendation],
        budget: usize,
    ) -> Vec<Recommendation> {
        let needed = budget.saturating_sub(already_have.len());
        if needed == 0 {
            return Vec::new();
        }

        let (Some(topic), Some(location)) = (&intent.topic, &intent.location) else {
            return Vec::new();
        };

        let query = format!("official website {} {}", topic, location);
        let results = match self.search.search(&query).await {
            Ok(blob) if !blob.trim().is_empty() => blob,
            Ok(_) => {
                tracing::warn!("backfill search returned no results for {:?}", query);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("backfill search failed: {:#}", e);
                return Vec::new();
            }
        };

        let system = format!(
            "You extract establishments from web search results. From the \
             results below, pick exactly {needed} distinct real establishments \
             matching \"{topic}\" in \"{location}\". Respond with a JSON array \
             and nothing else: [{{\"name\": string, \"website\": string or \
             null}}]. Prefer the official website; if none appears, use a \
             well-known listing page for the establishment; use null if \
             neither is in the results.\n\nSearch results:\n\n{results}"
        );
        let turns = [ChatTurn {
            role: TurnRole::User,
            content: format!("Extract {} establishments.", needed),
        }];

        let raw = match self.model.complete(&system, &turns).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("backfill extraction call failed: {:#}", e);
                return Vec::new();
            }
        };

        let mut seen: HashSet<String> = already_have
            .iter()
            .map(|r| normalize_website(&r.website))
            .collect();

        let mut candidates = parse_candidates(&raw, topic, location);
        candidates.retain(|c| seen.insert(normalize_website(&c.website)));
        candidates.truncate(needed);
        candidates
    }
}

/// Parse the model's JSON array of `{name, website}` candidates.
///
/// Unparseable output yields an empty list. Entries without a name are
/// dropped; entries without a website get a synthesized search-engine
/// query URL instead of being dropped.
fn parse_candidates(raw: &str, topic: &str, location: &str) -> Vec<Recommendation> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value = match serde_json::from_str(cleaned.trim()) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }

            let website = item
                .get("website")
                .and_then(|w| w.as_str())
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback_search_url(name, topic, location));

            Some(Recommendation {
                name: name.to_string(),
                website,
                tier: Tier::Organic,
            })
        })
        .collect()
}

/// Placeholder URL for a candidate the model could not source a site for.
fn fallback_search_url(name: &str, topic: &str, location: &str) -> String {
    let query = format!("{} {} {}", name, topic, location).replace(' ', "+");
    format!("https://www.google.com/search?q={}", query)
}
