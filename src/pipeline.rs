//! Trigger detection and the background recommendation pipeline.
//!
//! Every inbound human message flows through [`TriggerCoordinator::handle_inbound`]:
//! it is persisted and broadcast immediately, and only then — if it carries
//! the trigger marker — does the coordinator spawn the pipeline as an
//! independent task. The receive loop never waits on the pipeline, so a
//! room keeps exchanging messages while recommendations are computed, and
//! concurrent triggers run (and may finish) independently.
//!
//! The spawned task produces exactly one terminal bot message per trigger.
//! Every exit path funnels through [`TriggerCoordinator::emit_terminal`]:
//! a formatted recommendation batch, the clarification request when the
//! inferred intent is incomplete, or the generic apology when anything
//! fails unrecoverably. No error from the pipeline escapes the task.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backfill::ExternalBackfill;
use crate::broadcast::RoomBroadcaster;
use crate::config::RecommendConfig;
use crate::format::{self, APOLOGY_MESSAGE, CLARIFICATION_MESSAGE};
use crate::intent::IntentExtractor;
use crate::models::{ChatMessage, Recommendation, SenderKind, Tier};
use crate::rank::rank_providers;
use crate::retriever::Retriever;
use crate::store::ChatStore;

pub struct TriggerCoordinator {
    store: Arc<dyn ChatStore>,
    broadcaster: Arc<RoomBroadcaster>,
    retriever: Arc<Retriever>,
    extractor: Arc<IntentExtractor>,
    backfill: Arc<ExternalBackfill>,
    settings: RecommendConfig,
}

impl TriggerCoordinator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        broadcaster: Arc<RoomBroadcaster>,
        retriever: Arc<Retriever>,
        extractor: Arc<IntentExtractor>,
        backfill: Arc<ExternalBackfill>,
        settings: RecommendConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            retriever,
            extractor,
            backfill,
            settings,
        }
    }

    /// Persist and fan out an inbound human message, then start the
    /// background pipeline if the message carries the trigger marker.
    ///
    /// The human message is always visible to the room before the eventual
    /// bot response: persistence and broadcast complete before the task is
    /// spawned, and the task itself is never awaited here.
    pub async fn handle_inbound(
        self: &Arc<Self>,
        room_id: i64,
        sender_identity: Option<&str>,
        body: &str,
    ) -> Result<ChatMessage> {
        let message = self
            .store
            .append_message(room_id, body, SenderKind::User, sender_identity)
            .await?;
        self.broadcaster.broadcast(room_id, &frame(&message)).await;

        if contains_trigger(body, &self.settings.trigger_marker) {
            tracing::info!(room_id, "trigger marker detected, starting pipeline");
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                coordinator.run(room_id).await;
            });
        }

        Ok(message)
    }

    /// The background task body: compute a result, then emit the single
    /// terminal message. Failures are absorbed here and become the apology.
    async fn run(&self, room_id: i64) {
        let text = match self.recommendation_text(room_id).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(room_id, "recommendation pipeline failed: {:#}", e);
                APOLOGY_MESSAGE.to_string()
            }
        };

        self.emit_terminal(room_id, &text).await;
    }

    /// History → retrieval → intent → ranking → backfill → formatting.
    async fn recommendation_text(&self, room_id: i64) -> Result<String> {
        let history = self
            .store
            .recent_messages(room_id, self.settings.history_window)
            .await?;

        // Mine uploaded reference material for preference signals, keyed on
        // the most recent human message. Best-effort: empty on any failure.
        let query = history
            .iter()
            .rev()
            .find(|m| m.sender == SenderKind::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let context: Vec<String> = if query.is_empty() {
            Vec::new()
        } else {
            self.retriever
                .retrieve(&query, self.settings.retrieve_k)
                .await
                .into_iter()
                .map(|c| c.text)
                .collect()
        };

        let intent = self.extractor.extract(&history, &context).await;
        let (Some(topic), Some(location)) = (intent.topic.clone(), intent.location.clone()) else {
            tracing::info!(room_id, "intent incomplete, asking for clarification");
            return Ok(CLARIFICATION_MESSAGE.to_string());
        };

        let providers = self.store.find_providers(&topic, &location).await?;
        let ranked = rank_providers(providers);

        let mut seen = HashSet::new();
        let mut batch: Vec<Recommendation> = ranked
            .into_iter()
            .map(|p| Recommendation {
                name: p.name,
                website: p.website,
                tier: Tier::Sponsored,
            })
            .filter(|r| seen.insert(format::normalize_website(&r.website)))
            .take(self.settings.result_budget)
            .collect();

        if batch.len() < self.settings.result_budget {
            let organic = self
                .backfill
                .backfill(&intent, &batch, self.settings.result_budget)
                .await;
            batch.extend(organic);
        }

        if batch.is_empty() {
            // Nothing sponsored and backfill came back empty-handed.
            return Ok(APOLOGY_MESSAGE.to_string());
        }

        Ok(format::format_recommendations(&topic, &location, &batch))
    }

    /// Persist and broadcast the terminal bot message. If persistence
    /// fails the frame is still delivered so the room is never left
    /// waiting on a response that already completed.
    async fn emit_terminal(&self, room_id: i64, text: &str) {
        let message = match self
            .store
            .append_message(room_id, text, SenderKind::Bot, None)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(room_id, "failed to persist terminal message: {:#}", e);
                ChatMessage {
                    id: 0,
                    room_id,
                    content: text.to_string(),
                    sender: SenderKind::Bot,
                    timestamp: chrono::Utc::now(),
                    sender_identity: None,
                }
            }
        };

        self.broadcaster.broadcast(room_id, &frame(&message)).await;
    }
}

/// Serialize a message into its outbound wire frame.
pub fn frame(message: &ChatMessage) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

/// Whole-word, case-insensitive containment check for the trigger marker.
///
/// "Whole word" means the characters adjacent to the match (if any) are
/// not alphanumeric, so `@recme!` and `hey @recme` trigger while
/// `@recmenow` and `x@recme` do not.
pub fn contains_trigger(body: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }

    let body = body.to_lowercase();
    let marker = marker.to_lowercase();

    let mut search_from = 0;
    while let Some(pos) = body[search_from..].find(&marker) {
        let start = search_from + pos;
        let end = start + marker.len();

        let before_ok = body[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = body[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if before_ok && after_ok {
            return true;
        }
        // Rescan from the next character boundary; markers may start with
        // a multibyte character.
        search_from = start + body[start..].chars().next().map_or(1, char::len_utf8);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_plain() {
        assert!(contains_trigger("@recme", "@recme"));
        assert!(contains_trigger("hey @recme, any ideas?", "@recme"));
    }

    #[test]
    fn test_trigger_case_insensitive() {
        assert!(contains_trigger("hey @RecMe", "@recme"));
        assert!(contains_trigger("@RECME", "@recme"));
    }

    #[test]
    fn test_trigger_requires_word_boundary() {
        assert!(!contains_trigger("@recmenow", "@recme"));
        assert!(!contains_trigger("x@recme", "@recme"));
        assert!(contains_trigger("(@recme)", "@recme"));
        assert!(contains_trigger("@recme!", "@recme"));
    }

    #[test]
    fn test_trigger_absent() {
        assert!(!contains_trigger("just chatting about dinner", "@recme"));
        assert!(!contains_trigger("", "@recme"));
    }

    #[test]
    fn test_trigger_later_occurrence_counts() {
        // First occurrence is glued to a word; the second stands alone.
        assert!(contains_trigger("x@recme ok @recme", "@recme"));
    }

    #[test]
    fn test_trigger_multibyte_marker() {
        assert!(contains_trigger("hola ñrec", "ñrec"));
        assert!(contains_trigger("¡ñrec!", "ñrec"));
        // A rejected match followed by a standalone one, both multibyte.
        assert!(contains_trigger("añrec ñrec", "ñrec"));
        assert!(!contains_trigger("xñrec", "ñrec"));
        assert!(!contains_trigger("ñrecado", "ñrec"));
    }
}
