//! Bid ordering of matched providers.
//!
//! Storage hands back an unordered match set; presentation order is decided
//! here: strictly descending by bid amount, ties broken by provider id
//! ascending so repeated runs over the same match set are identical.
//! A provider's budget cap is informational and plays no part.

use crate::models::ProviderRecord;

/// Order a match set by bid descending, id ascending on ties.
pub fn rank_providers(mut providers: Vec<ProviderRecord>) -> Vec<ProviderRecord> {
    providers.sort_by(|a, b| {
        b.bid_amount
            .partial_cmp(&a.bid_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: i64, bid: f64) -> ProviderRecord {
        ProviderRecord {
            id,
            name: format!("p{}", id),
            website: format!("p{}.example.com", id),
            topic: "Italian".to_string(),
            location: "Chicago".to_string(),
            bid_amount: bid,
            max_budget: 100.0,
        }
    }

    #[test]
    fn test_rank_descending_by_bid() {
        let ranked = rank_providers(vec![provider(1, 5.0), provider(2, 10.0), provider(3, 7.5)]);
        let ids: Vec<i64> = ranked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_rank_ties_break_by_id_ascending() {
        let ranked = rank_providers(vec![provider(9, 5.0), provider(2, 5.0), provider(4, 5.0)]);
        let ids: Vec<i64> = ranked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4, 9]);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let input = vec![provider(3, 1.0), provider(1, 2.0), provider(2, 2.0)];
        let once = rank_providers(input.clone());
        let twice = rank_providers(once.clone());
        let once_ids: Vec<i64> = once.iter().map(|p| p.id).collect();
        let twice_ids: Vec<i64> = twice.iter().map(|p| p.id).collect();
        assert_eq!(once_ids, twice_ids);
    }

    #[test]
    fn test_budget_cap_ignored() {
        let mut cheap = provider(1, 10.0);
        cheap.max_budget = 0.0;
        let ranked = rank_providers(vec![provider(2, 5.0), cheap]);
        assert_eq!(ranked[0].id, 1);
    }
}
