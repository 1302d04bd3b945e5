//! Property-based tests for the intent classifier
//!
//! These tests verify invariants that hold for any input text:
//! - Classification is total and deterministic
//! - Confidence always comes from the matched rule
//! - An earlier rule's trigger wins wherever it sits in the text

use super::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Free text, including punctuation and non-ASCII letters
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.!?'éü-]{0,80}"
}

/// Text with no letters, so no rule can match
fn arb_letterless() -> impl Strategy<Value = String> {
    "[0-9 .,!?#-]{1,40}"
}

fn arb_session_id() -> impl Strategy<Value = String> {
    "[a-f0-9-]{1,36}"
}

/// Filler words that trigger nothing
fn arb_filler() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("zzz".to_string()),
        Just("qwx zug".to_string()),
        Just("42 7".to_string()),
    ]
}

fn rule_index(rule: &Rule) -> Option<usize> {
    RULES.iter().position(|candidate| std::ptr::eq(candidate, rule))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn classify_is_deterministic(text in arb_text(), session in arb_session_id()) {
        let first = classify(&text, &session);
        let second = classify(&text, &session);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn confidence_comes_from_a_rule(text in arb_text(), session in arb_session_id()) {
        let result = classify(&text, &session);
        let rule = matching_rule(&text);
        prop_assert_eq!(result.intent, rule.intent);
        prop_assert!((result.confidence - rule.confidence).abs() < f64::EPSILON);
        prop_assert!((0.6..=0.9).contains(&result.confidence));
        prop_assert!(!result.reply.is_empty());
    }

    #[test]
    fn matched_rule_is_the_first_match(text in arb_text()) {
        let lowered = text.to_lowercase();
        let rule = matching_rule(&text);
        if let Some(idx) = rule_index(rule) {
            prop_assert!(rule.matches(&lowered));
            prop_assert!(RULES[..idx].iter().all(|earlier| !earlier.matches(&lowered)));
        } else {
            prop_assert!(RULES.iter().all(|r| !r.matches(&lowered)));
        }
    }

    #[test]
    fn letterless_text_falls_back_and_echoes(text in arb_letterless(), session in arb_session_id()) {
        let result = classify(&text, &session);
        prop_assert_eq!(result.intent, Intent::Inquiry);
        prop_assert!((result.confidence - 0.6).abs() < f64::EPSILON);
        let echoed = format!("'{text}'");
        prop_assert!(result.reply.contains(&echoed));
    }

    #[test]
    fn cancellation_beats_refund_in_any_order(
        before in arb_filler(),
        between in arb_filler(),
        after in arb_filler(),
        refund_first in any::<bool>(),
        repeats in 1usize..4,
    ) {
        let refund = "refund ".repeat(repeats);
        let text = if refund_first {
            format!("{before} {refund}{between} cancel my booking {after}")
        } else {
            format!("{before} cancel my booking {between} {refund}{after}")
        };
        prop_assert_eq!(classify(&text, "session").intent, Intent::Cancellation);
    }

    #[test]
    fn case_does_not_change_the_result(text in arb_text()) {
        let upper = classify(&text.to_uppercase(), "s");
        let lower = classify(&text.to_lowercase(), "s");
        prop_assert_eq!(upper.intent, lower.intent);
        prop_assert!((upper.confidence - lower.confidence).abs() < f64::EPSILON);
    }
}
