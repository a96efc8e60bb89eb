//! Intent extraction from chat history.
//!
//! One chat-completion call turns a bounded window of conversation (plus
//! optional retrieved reference chunks) into a structured
//! `{topic, location}` query. The model's output is untrusted: it is
//! fence-stripped, parsed as strict JSON, and anything that doesn't parse
//! cleanly collapses to "unknown" rather than an error. Absence is the
//! only representation of unknown — empty strings never survive parsing.

use std::sync::Arc;

use crate::llm::{ChatModel, ChatTurn, TurnRole};
use crate::models::{ChatMessage, SenderKind};

const EXTRACTION_PROMPT: &str = "You are an intent extraction engine for a \
recommendation assistant. From the conversation, infer what kind of \
establishment the participants are looking for and where. Respond with a \
single JSON object and nothing else, in exactly this shape: \
{\"topic\": string or null, \"location\": string or null}. Use null for \
anything the conversation does not establish. Do not guess.";

/// The structured query inferred from conversation history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredIntent {
    pub topic: Option<String>,
    pub location: Option<String>,
}

impl StructuredIntent {
    /// Both fields present — ranking and backfill may proceed.
    pub fn is_complete(&self) -> bool {
        self.topic.is_some() && self.location.is_some()
    }
}

/// Tagged result of parsing model output. Malformed output is a value,
/// not an error path.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Parsed(StructuredIntent),
    Unparseable,
}

impl IntentOutcome {
    /// The intent to act on; `Unparseable` falls back to all-unknown.
    pub fn into_intent(self) -> StructuredIntent {
        match self {
            IntentOutcome::Parsed(intent) => intent,
            IntentOutcome::Unparseable => StructuredIntent::default(),
        }
    }
}

pub struct IntentExtractor {
    model: Arc<dyn ChatModel>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Infer the intent behind `history`. Retrieved `context` chunks, when
    /// present, are appended as auxiliary material the model may use to
    /// fill in unstated preferences.
    ///
    /// Never fails: a model error or malformed output yields all-unknown.
    pub async fn extract(&self, history: &[ChatMessage], context: &[String]) -> StructuredIntent {
        let mut turns: Vec<ChatTurn> = history
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| ChatTurn {
                role: match m.sender {
                    SenderKind::User => TurnRole::User,
                    SenderKind::Bot => TurnRole::Assistant,
                },
                content: m.content.clone(),
            })
            .collect();

        let mut system = EXTRACTION_PROMPT.to_string();
        if !context.is_empty() {
            system.push_str(
                "\n\nBackground material from the participants' uploaded documents. \
                 It may reveal unstated preferences:\n\n",
            );
            system.push_str(&context.join("\n\n---\n\n"));
        }

        if turns.is_empty() {
            turns.push(ChatTurn {
                role: TurnRole::User,
                content: "(no conversation yet)".to_string(),
            });
        }

        let raw = match self.model.complete(&system, &turns).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("intent extraction call failed: {:#}", e);
                return StructuredIntent::default();
            }
        };

        parse_intent(&raw).into_intent()
    }
}

/// Parse raw model output into an [`IntentOutcome`].
///
/// Markdown code fences are stripped first. A field that is missing,
/// non-string, or blank becomes `None`; output that is not a JSON object
/// at all is `Unparseable`.
pub fn parse_intent(raw: &str) -> IntentOutcome {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value = match serde_json::from_str(cleaned.trim()) {
        Ok(v) => v,
        Err(_) => return IntentOutcome::Unparseable,
    };

    if !value.is_object() {
        return IntentOutcome::Unparseable;
    }

    IntentOutcome::Parsed(StructuredIntent {
        topic: string_field(&value, "topic"),
        location: string_field(&value, "location"),
    })
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Remove a wrapping markdown code fence (```json ... ``` or ``` ... ```),
/// if present. Non-fenced input passes through untouched.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line.
    match body.find('\n') {
        Some(pos) => body[pos + 1..].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_fields() {
        let outcome = parse_intent(r#"{"topic": "Italian food", "location": "Chicago"}"#);
        let intent = outcome.into_intent();
        assert_eq!(intent.topic.as_deref(), Some("Italian food"));
        assert_eq!(intent.location.as_deref(), Some("Chicago"));
        assert!(intent.is_complete());
    }

    #[test]
    fn test_parse_null_fields() {
        let outcome = parse_intent(r#"{"topic": null, "location": null}"#);
        let intent = outcome.into_intent();
        assert_eq!(intent, StructuredIntent::default());
        assert!(!intent.is_complete());
    }

    #[test]
    fn test_parse_strips_fences() {
        let raw = "```json\n{\"topic\": \"sushi\", \"location\": \"Osaka\"}\n```";
        let intent = parse_intent(raw).into_intent();
        assert_eq!(intent.topic.as_deref(), Some("sushi"));
        assert_eq!(intent.location.as_deref(), Some("Osaka"));
    }

    #[test]
    fn test_parse_garbage_is_unparseable() {
        assert_eq!(parse_intent("sure, here you go!"), IntentOutcome::Unparseable);
        assert_eq!(parse_intent("[1, 2, 3]"), IntentOutcome::Unparseable);
        assert_eq!(
            parse_intent("sure, here you go!").into_intent(),
            StructuredIntent::default()
        );
    }

    #[test]
    fn test_parse_non_string_field_is_absent() {
        let intent = parse_intent(r#"{"topic": 42, "location": "Chicago"}"#).into_intent();
        assert_eq!(intent.topic, None);
        assert_eq!(intent.location.as_deref(), Some("Chicago"));
    }

    #[test]
    fn test_parse_blank_string_is_absent() {
        let intent = parse_intent(r#"{"topic": "  ", "location": ""}"#).into_intent();
        assert_eq!(intent.topic, None);
        assert_eq!(intent.location, None);
    }

    #[test]
    fn test_strip_fences_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_without_language_tag() {
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_unbalanced_fence_passthrough() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "```json\n{\"a\": 1}");
    }
}
