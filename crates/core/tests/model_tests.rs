// ═══════════════════════════════════════════════════════════════════
// Model Tests: Token, HistoryItem, pair keys, denylists, settings
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use std::collections::HashSet;

use tokenomics_arena_core::models::denylist::{Denylist, TemporaryDenylist};
use tokenomics_arena_core::models::history::{BackupData, HistoryItem};
use tokenomics_arena_core::models::pair::{pair_key, total_possible_pairs, ComparedPairs};
use tokenomics_arena_core::models::portfolio::AggregationParams;
use tokenomics_arena_core::models::selection::SelectionStrategy;
use tokenomics_arena_core::models::settings::{SelectionConfig, Settings};
use tokenomics_arena_core::models::state::ArenaState;
use tokenomics_arena_core::models::token::{default_tokens, Token};

fn token(id: &str) -> Token {
    Token::new(id, id.to_uppercase(), id.to_uppercase(), "/placeholder.svg", 1.0)
}

// ═══════════════════════════════════════════════════════════════════
// Token
// ═══════════════════════════════════════════════════════════════════

mod token_model {
    use super::*;

    #[test]
    fn equality_is_by_id_only() {
        let a = Token::new("bitcoin", "Bitcoin", "BTC", "a.png", 100.0);
        let b = Token::new("bitcoin", "Bitcoin (edited)", "XBT", "b.png", 200.0);
        assert_eq!(a, b);
        assert_ne!(a, token("ethereum"));
    }

    #[test]
    fn hash_is_by_id_only() {
        let mut set = HashSet::new();
        set.insert(Token::new("bitcoin", "Bitcoin", "BTC", "a.png", 100.0));
        set.insert(Token::new("bitcoin", "Other", "BTC", "b.png", 1.0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn display_shows_name_and_symbol() {
        let t = Token::new("bitcoin", "Bitcoin", "BTC", "a.png", 100.0);
        assert_eq!(t.to_string(), "Bitcoin (BTC)");
    }

    #[test]
    fn market_cap_uses_camel_case_on_the_wire() {
        let t = token("x").with_market_cap(1_000.0);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["marketCap"], 1_000.0);
    }

    #[test]
    fn market_cap_is_optional_when_reading() {
        let json = r#"{"id":"x","name":"X","symbol":"X","logo":"x.png","price":2.5}"#;
        let t: Token = serde_json::from_str(json).unwrap();
        assert_eq!(t.market_cap, None);
        assert_eq!(t.price, 2.5);
    }

    #[test]
    fn default_catalog_is_bundled() {
        let tokens = default_tokens();
        assert_eq!(tokens.len(), 24);
        assert_eq!(tokens[0].id, "bitcoin");
        assert_eq!(tokens[0].symbol, "BTC");

        let ids: HashSet<&str> = tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), tokens.len(), "default ids must be unique");
    }

    #[test]
    fn default_catalog_contains_priority_tokens() {
        let tokens = default_tokens();
        for id in SelectionConfig::default().priority_tokens {
            assert!(tokens.iter().any(|t| t.id == id), "missing priority token {id}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// HistoryItem
// ═══════════════════════════════════════════════════════════════════

mod history_item {
    use super::*;

    #[test]
    fn allocation_to_b_is_complement() {
        let item = HistoryItem::new(token("a"), token("b"), 70.0);
        assert!((item.allocation_to_b() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn share_of_either_side() {
        let item = HistoryItem::new(token("a"), token("b"), 65.0);
        assert_eq!(item.share_of("a"), Some(65.0));
        assert_eq!(item.share_of("b"), Some(35.0));
        assert_eq!(item.share_of("c"), None);
        assert!(item.involves("b"));
        assert!(!item.involves("c"));
    }

    #[test]
    fn new_records_get_unique_ids() {
        let a = HistoryItem::new(token("a"), token("b"), 50.0);
        let b = HistoryItem::new(token("a"), token("b"), 50.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_names_match_backup_format() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let item = HistoryItem::new_at(token("a"), token("b"), 80.0, ts).with_note("solid team");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["crypto1"]["id"], "a");
        assert_eq!(json["crypto2"]["id"], "b");
        assert_eq!(json["crypto1AllocationPercent"], 80.0);
        assert_eq!(json["explanation"], "solid team");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn explanation_is_optional_when_reading() {
        let json = serde_json::json!({
            "id": "h1",
            "timestamp": "2025-01-15T12:00:00Z",
            "crypto1": token("a"),
            "crypto2": token("b"),
            "crypto1AllocationPercent": 55.0
        });
        let item: HistoryItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.id, "h1");
        assert_eq!(item.note, None);
    }

    #[test]
    fn backup_data_shape() {
        let data = BackupData {
            history: vec![HistoryItem::new(token("a"), token("b"), 50.0)],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json["history"].is_array());
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Pairs
// ═══════════════════════════════════════════════════════════════════

mod pairs {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key("ethereum", "bitcoin"), pair_key("bitcoin", "ethereum"));
        assert_eq!(pair_key("ethereum", "bitcoin"), "bitcoin-ethereum");
    }

    #[test]
    fn total_possible_pairs_small_catalogs() {
        assert_eq!(total_possible_pairs(0), 0);
        assert_eq!(total_possible_pairs(1), 0);
        assert_eq!(total_possible_pairs(2), 1);
        assert_eq!(total_possible_pairs(24), 276);
    }

    #[test]
    fn compared_pairs_counts_and_tracks_latest() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let history = vec![
            HistoryItem::new_at(token("a"), token("b"), 60.0, t2),
            HistoryItem::new_at(token("b"), token("a"), 70.0, t1),
            HistoryItem::new_at(token("a"), token("c"), 50.0, t1),
        ];

        let compared = ComparedPairs::from_history(&history);
        assert_eq!(compared.len(), 2);
        assert!(compared.contains("b", "a"));
        assert!(!compared.contains("b", "c"));

        let ab = compared.get("a", "b").unwrap();
        assert_eq!(ab.times_compared, 2);
        assert_eq!(ab.last_compared, t2);
        assert_eq!(compared.last_compared("c", "b"), None);
    }

    #[test]
    fn compared_pairs_empty_history() {
        let compared = ComparedPairs::from_history(&[]);
        assert!(compared.is_empty());
    }

    #[test]
    fn dashed_ids_stay_distinct_pairs() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let history = vec![HistoryItem::new_at(token("a-b"), token("c"), 60.0, t)];

        // Both render as "a-b-c" but are different pairs
        assert_eq!(pair_key("a-b", "c"), pair_key("a", "b-c"));

        let compared = ComparedPairs::from_history(&history);
        assert!(compared.contains("c", "a-b"));
        assert!(!compared.contains("a", "b-c"));
        assert!(compared.get("b-c", "a").is_none());
    }

    #[test]
    fn count_within_ignores_tokens_outside_catalog() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let history = vec![
            HistoryItem::new_at(token("a"), token("b"), 60.0, t),
            HistoryItem::new_at(token("a"), token("gone"), 60.0, t),
            HistoryItem::new_at(token("b"), token("gone"), 60.0, t),
        ];
        let compared = ComparedPairs::from_history(&history);
        assert_eq!(compared.len(), 3);

        let ids: HashSet<&str> = ["a", "b", "c"].into();
        assert_eq!(compared.count_within(&ids), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Denylists
// ═══════════════════════════════════════════════════════════════════

mod denylists {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut list = Denylist::new();
        assert!(list.toggle("tether"));
        assert!(list.contains("tether"));
        assert!(!list.toggle("tether"));
        assert!(!list.contains("tether"));
        assert!(list.is_empty());
    }

    #[test]
    fn collects_from_ids() {
        let list: Denylist = ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn temp_ban_counts_down_and_expires() {
        let mut temp = TemporaryDenylist::new();
        temp.ban("doge", 3);
        assert_eq!(temp.remaining("doge"), Some(3));

        assert!(temp.tick().is_empty());
        assert_eq!(temp.remaining("doge"), Some(2));
        assert!(temp.tick().is_empty());
        assert_eq!(temp.expiring(), vec!["doge".to_string()]);
        assert_eq!(temp.tick(), vec!["doge".to_string()]);
        assert!(!temp.contains("doge"));
        assert!(temp.is_empty());
    }

    #[test]
    fn temp_ban_is_never_extended() {
        let mut temp = TemporaryDenylist::new();
        temp.ban("doge", 5);
        temp.tick();
        temp.ban("doge", 50);
        assert_eq!(temp.remaining("doge"), Some(4));
    }

    #[test]
    fn zero_length_ban_is_ignored() {
        let mut temp = TemporaryDenylist::new();
        temp.ban("doge", 0);
        assert!(temp.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let mut temp = TemporaryDenylist::new();
        temp.ban("a", 10);
        temp.ban("b", 10);
        assert!(temp.remove("a"));
        assert!(!temp.remove("a"));
        assert_eq!(temp.len(), 1);
        temp.clear();
        assert!(temp.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn aggregation_defaults() {
        let p = AggregationParams::default();
        assert_eq!(p.learning_rate, 0.9);
        assert_eq!(p.time_decay, 0.95);
        assert_eq!(p.convergence_threshold, 0.0001);
        assert_eq!(p.max_iterations, 100);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn selection_defaults() {
        let c = SelectionConfig::default();
        assert_eq!(c.consolidation_start, 30);
        assert_eq!(c.consolidation_end, 60);
        assert_eq!(c.consolidation_top_n, 10);
        assert_eq!(c.temp_ban_length, 50);
        assert_eq!(c.max_first_token_attempts, 3);
        assert_eq!(c.first_token_weights.unseen, 0.5);
        assert_eq!(c.strategy_weights.refine_preferred, 0.4);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn consolidation_window_bounds() {
        let c = SelectionConfig::default();
        assert!(!c.in_consolidation_window(29));
        assert!(c.in_consolidation_window(30));
        assert!(c.in_consolidation_window(59));
        assert!(!c.in_consolidation_window(60));
    }

    #[test]
    fn rejects_out_of_range_learning_rate() {
        let p = AggregationParams {
            learning_rate: 0.0,
            ..AggregationParams::default()
        };
        assert!(p.validate().is_err());

        let p = AggregationParams {
            learning_rate: 1.5,
            ..AggregationParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_zero_iterations() {
        let p = AggregationParams {
            max_iterations: 0,
            ..AggregationParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_first_token_weights_not_summing_to_one() {
        let mut c = SelectionConfig::default();
        c.first_token_weights.random = 0.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_inverted_window() {
        let c = SelectionConfig {
            consolidation_start: 60,
            consolidation_end: 30,
            ..SelectionConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn json_round_trip_and_partial_documents() {
        let settings = Settings::default();
        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);

        let partial = r#"{"selection":{"temp_ban_length":10}}"#;
        let parsed = Settings::from_json(partial).unwrap();
        assert_eq!(parsed.selection.temp_ban_length, 10);
        assert_eq!(parsed.selection.consolidation_top_n, 10);
        assert_eq!(parsed.aggregation, AggregationParams::default());
    }

    #[test]
    fn from_json_validates() {
        let bad = r#"{"aggregation":{"learning_rate":2.0,"time_decay":0.95,"convergence_threshold":0.0001,"max_iterations":100}}"#;
        assert!(Settings::from_json(bad).is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════
// State & Selection types
// ═══════════════════════════════════════════════════════════════════

mod state {
    use super::*;

    #[test]
    fn default_state_uses_bundled_catalog() {
        let state = ArenaState::default();
        assert_eq!(state.tokens.len(), 24);
        assert!(state.history.is_empty());
        assert!(state.denylist.is_empty());
        assert!(state.temp_denylist.is_empty());
    }

    #[test]
    fn with_tokens_starts_empty() {
        let state = ArenaState::with_tokens(vec![token("a"), token("b")]);
        assert_eq!(state.tokens.len(), 2);
        assert!(state.history.is_empty());
    }

    #[test]
    fn strategy_display() {
        assert_eq!(SelectionStrategy::Consolidation.to_string(), "Consolidation");
        assert_eq!(
            SelectionStrategy::LeastRecentlyCompared.to_string(),
            "LeastRecentlyCompared"
        );
    }
}
