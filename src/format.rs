//! Rendering of the terminal bot messages.
//!
//! Pure string work — no I/O, deterministic for a given input, which keeps
//! the presentation contract testable without any collaborator. Also owns
//! the fixed clarification and apology texts so every terminal message the
//! pipeline can emit lives in one place.

use crate::models::{Recommendation, Tier};

/// Terminal message when the inferred intent is missing a field.
pub const CLARIFICATION_MESSAGE: &str = "I'd love to help with a recommendation! \
Could you tell me a bit more — what kind of place are you looking for, and in \
which city or area?";

/// Terminal message when the pipeline fails unrecoverably.
pub const APOLOGY_MESSAGE: &str = "Sorry — I couldn't put together \
recommendations just now. Please try again in a moment.";

/// Ensure a website value carries a scheme; bare domains get `http://`.
pub fn normalize_website(website: &str) -> String {
    let trimmed = website.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Render the recommendation batch into the user-facing message.
///
/// Sponsored entries come first under "Top Recommended" in rank order,
/// then organic entries under "Other Recommended" in arrival order.
/// An empty tier renders no section at all.
pub fn format_recommendations(topic: &str, location: &str, batch: &[Recommendation]) -> String {
    let mut out = format!("Here's what I found for {} in {}:", topic, location);

    let sponsored: Vec<&Recommendation> =
        batch.iter().filter(|r| r.tier == Tier::Sponsored).collect();
    let organic: Vec<&Recommendation> =
        batch.iter().filter(|r| r.tier == Tier::Organic).collect();

    if !sponsored.is_empty() {
        out.push_str("\n\n**Top Recommended**");
        for (i, rec) in sponsored.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} — {}",
                i + 1,
                rec.name,
                normalize_website(&rec.website)
            ));
        }
    }

    if !organic.is_empty() {
        out.push_str("\n\n**Other Recommended**");
        for (i, rec) in organic.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} — {}",
                i + 1,
                rec.name,
                normalize_website(&rec.website)
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, website: &str, tier: Tier) -> Recommendation {
        Recommendation {
            name: name.to_string(),
            website: website.to_string(),
            tier,
        }
    }

    #[test]
    fn test_normalize_adds_default_scheme() {
        assert_eq!(normalize_website("example.com"), "http://example.com");
        assert_eq!(normalize_website("  example.com "), "http://example.com");
    }

    #[test]
    fn test_normalize_keeps_existing_scheme() {
        assert_eq!(normalize_website("https://example.com"), "https://example.com");
        assert_eq!(normalize_website("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_sponsored_only_renders_single_section() {
        let batch = vec![
            rec("A", "a.com", Tier::Sponsored),
            rec("B", "b.com", Tier::Sponsored),
        ];
        let message = format_recommendations("Italian food", "Chicago", &batch);
        assert!(message.contains("Italian food"));
        assert!(message.contains("Chicago"));
        assert!(message.contains("Top Recommended"));
        assert!(!message.contains("Other Recommended"));
        assert!(message.contains("1. A — http://a.com"));
        assert!(message.contains("2. B — http://b.com"));
    }

    #[test]
    fn test_organic_only_renders_single_section() {
        let batch = vec![rec("C", "https://c.com", Tier::Organic)];
        let message = format_recommendations("sushi", "Osaka", &batch);
        assert!(!message.contains("Top Recommended"));
        assert!(message.contains("Other Recommended"));
        assert!(message.contains("1. C — https://c.com"));
    }

    #[test]
    fn test_sponsored_section_precedes_organic() {
        let batch = vec![
            rec("S", "s.com", Tier::Sponsored),
            rec("O", "o.com", Tier::Organic),
        ];
        let message = format_recommendations("pizza", "Chicago", &batch);
        let top = message.find("Top Recommended").unwrap();
        let other = message.find("Other Recommended").unwrap();
        assert!(top < other);
    }

    #[test]
    fn test_deterministic() {
        let batch = vec![rec("A", "a.com", Tier::Sponsored)];
        assert_eq!(
            format_recommendations("tacos", "Austin", &batch),
            format_recommendations("tacos", "Austin", &batch)
        );
    }
}
