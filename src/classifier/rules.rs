//! Ordered intent rule table
//!
//! Each rule fires when the lowercased text contains one of its phrases, or
//! when its keyword condition holds. Matching is plain substring search, so
//! a keyword also matches inside longer words ("ask" in "basket").
//!
//! Order matters. Exclusion lists keep broad rules from claiming text that
//! an earlier rule was meant to own; they only guard the keyword branch.

use super::Intent;

/// Keyword condition: one of `any_of`, plus one of `with_any_of` when that
/// list is non-empty, and none of `none_of`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordMatch {
    pub any_of: &'static [&'static str],
    pub with_any_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
}

impl KeywordMatch {
    pub const fn any(words: &'static [&'static str]) -> Self {
        Self {
            any_of: words,
            with_any_of: &[],
            none_of: &[],
        }
    }

    /// Require a second word to be present as well
    pub const fn with_any(mut self, words: &'static [&'static str]) -> Self {
        self.with_any_of = words;
        self
    }

    /// Fail the condition if any of these words is present
    pub const fn unless(mut self, words: &'static [&'static str]) -> Self {
        self.none_of = words;
        self
    }

    fn matches(&self, lowered: &str) -> bool {
        contains_any(lowered, self.any_of)
            && (self.with_any_of.is_empty() || contains_any(lowered, self.with_any_of))
            && !contains_any(lowered, self.none_of)
    }
}

/// One entry of the priority-ordered rule table
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub intent: Intent,
    pub phrases: &'static [&'static str],
    pub keywords: Option<KeywordMatch>,
    /// Fixed per rule, not derived from match strength
    pub confidence: f64,
    /// Reply template; may contain `{session}` and `{message}`
    pub reply: &'static str,
}

impl Rule {
    /// `lowered` must already be lowercase
    pub fn matches(&self, lowered: &str) -> bool {
        contains_any(lowered, self.phrases)
            || self.keywords.is_some_and(|keywords| keywords.matches(lowered))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Used when no rule in [`RULES`] matches
pub static FALLBACK: Rule = Rule {
    intent: Intent::Inquiry,
    phrases: &[],
    keywords: None,
    confidence: 0.6,
    reply: "I understand you said: '{message}'. Could you please provide more details so I can assist you better?",
};

pub static RULES: &[Rule] = &[
    // Specific actions
    Rule {
        intent: Intent::Cancellation,
        phrases: &["cancel booking", "cancel flight", "cancel my", "cancel reservation"],
        keywords: Some(
            KeywordMatch::any(&["cancel", "cancellation"])
                .with_any(&["booking", "flight", "reservation", "ticket"]),
        ),
        confidence: 0.9,
        reply: "I can assist you with canceling your booking. Please provide your booking reference number.",
    },
    Rule {
        intent: Intent::Refund,
        phrases: &["money back", "refund request", "want refund", "need refund"],
        keywords: Some(KeywordMatch::any(&["refund", "reimbursement", "compensation"])),
        confidence: 0.9,
        reply: "I can help you with refund requests. Please provide your booking details and reason for the refund.",
    },
    Rule {
        intent: Intent::CheckIn,
        phrases: &["check in", "check-in", "online check", "boarding pass"],
        keywords: None,
        confidence: 0.9,
        reply: "I can help with check-in procedures. You can check in online up to 24 hours before your flight.",
    },
    Rule {
        intent: Intent::Upgrade,
        phrases: &["business class", "first class", "premium seat"],
        keywords: Some(KeywordMatch::any(&["upgrade", "premium"])),
        confidence: 0.9,
        reply: "I can assist with seat upgrades. Let me check available options for your flight.",
    },
    Rule {
        intent: Intent::Reschedule,
        phrases: &[
            "reschedule",
            "change date",
            "change time",
            "different flight",
            "different time",
        ],
        keywords: None,
        confidence: 0.85,
        reply: "I can help you reschedule your flight. What new date and time would you prefer?",
    },
    // Feature inquiries
    Rule {
        intent: Intent::Seating,
        phrases: &[
            "window seat",
            "aisle seat",
            "seat selection",
            "select seat",
            "choose seat",
        ],
        keywords: Some(
            KeywordMatch::any(&["seat", "seating"])
                .unless(&["upgrade", "premium", "business", "first"]),
        ),
        confidence: 0.9,
        reply: "I can help you with seat selection. Would you like to choose your seats now?",
    },
    Rule {
        intent: Intent::Meals,
        phrases: &["meal options", "food options", "dietary restrictions", "special meal"],
        keywords: Some(KeywordMatch::any(&["meals", "food", "dining", "dietary"])),
        confidence: 0.85,
        reply: "I can help you with meal options and special dietary requirements for your flight.",
    },
    Rule {
        intent: Intent::Boarding,
        phrases: &["boarding time", "boarding start", "gate number", "what gate"],
        keywords: Some(KeywordMatch::any(&["boarding", "board", "gate"]).unless(&["check", "pass"])),
        confidence: 0.85,
        reply: "Boarding information will be displayed on airport screens and announced at the gate.",
    },
    Rule {
        intent: Intent::Amenities,
        phrases: &["wi-fi", "wifi", "entertainment", "amenities available"],
        keywords: Some(KeywordMatch::any(&[
            "amenities",
            "facilities",
            "services",
            "entertainment",
        ])),
        confidence: 0.8,
        reply: "Our flights offer various amenities including entertainment, Wi-Fi, and comfort features.",
    },
    // Programs and marketing
    Rule {
        intent: Intent::LoyaltyPrograms,
        phrases: &[
            "frequent flyer",
            "loyalty program",
            "join program",
            "membership benefits",
        ],
        keywords: Some(
            KeywordMatch::any(&["loyalty", "membership", "miles", "points"])
                .with_any(&["program", "join", "benefits"]),
        ),
        confidence: 0.85,
        reply: "I can help you with our loyalty program. Are you interested in joining or have questions about your membership?",
    },
    Rule {
        intent: Intent::Rewards,
        phrases: &["redeem miles", "earn points", "redeem points", "reward redemption"],
        keywords: Some(
            KeywordMatch::any(&["rewards", "redeem", "earn"])
                .with_any(&["miles", "points", "benefits"]),
        ),
        confidence: 0.8,
        reply: "Let me help you with reward redemption and earning opportunities.",
    },
    Rule {
        intent: Intent::Security,
        phrases: &[
            "prohibited items",
            "carry-on restrictions",
            "security procedures",
            "tsa",
            "screening",
        ],
        keywords: None,
        confidence: 0.85,
        reply: "I can help you understand security procedures and what items are allowed in carry-on and checked baggage.",
    },
    Rule {
        intent: Intent::Safety,
        phrases: &["safety measures", "safe to fly", "safety procedures"],
        keywords: Some(KeywordMatch::any(&["safety", "safe", "emergency", "health"])),
        confidence: 0.85,
        reply: "Safety is our top priority. I can provide information about our safety measures and procedures.",
    },
    Rule {
        intent: Intent::Promotions,
        phrases: &["special deals", "current promotions", "special offers"],
        keywords: Some(KeywordMatch::any(&["promotion", "promo", "deal"])),
        confidence: 0.85,
        reply: "Check out our current promotions and special offers for great deals on flights.",
    },
    Rule {
        intent: Intent::Offers,
        phrases: &[],
        keywords: Some(KeywordMatch::any(&["offers", "deals", "bargains", "sales"])),
        confidence: 0.8,
        reply: "I can show you our latest offers and deals. What type of travel are you planning?",
    },
    Rule {
        intent: Intent::Discounts,
        phrases: &["student discount", "get discount", "lower price", "save money"],
        keywords: Some(KeywordMatch::any(&["discount", "cheaper"])),
        confidence: 0.85,
        reply: "I can help you find discounted fares and ways to save on your booking.",
    },
    // Process and rules
    Rule {
        intent: Intent::Policies,
        phrases: &["cancellation policy", "refund policy", "baggage policy"],
        keywords: Some(
            KeywordMatch::any(&["policy", "policies", "rules", "terms"])
                .unless(&["how", "process", "procedure"]),
        ),
        confidence: 0.8,
        reply: "I can explain our policies regarding booking, cancellation, and travel requirements.",
    },
    Rule {
        intent: Intent::Procedures,
        phrases: &["how do i", "what is the process", "how to"],
        keywords: Some(KeywordMatch::any(&["procedure", "procedures", "process"])),
        confidence: 0.8,
        reply: "I can guide you through our procedures step by step. What process do you need help with?",
    },
    Rule {
        intent: Intent::Regulations,
        phrases: &["travel requirements", "visa requirements", "need visa"],
        keywords: Some(KeywordMatch::any(&[
            "regulation",
            "regulations",
            "requirements",
            "compliance",
        ])),
        confidence: 0.8,
        reply: "I can provide information about travel regulations and requirements for your destination.",
    },
    // Sentiment
    Rule {
        intent: Intent::Complaint,
        phrases: &["very unhappy", "not satisfied", "poor service"],
        keywords: Some(KeywordMatch::any(&[
            "complaint",
            "complain",
            "dissatisfied",
            "unhappy",
            "problem",
            "issue",
        ])),
        confidence: 0.85,
        reply: "I apologize for any inconvenience. Please describe the issue you're experiencing so I can help resolve it.",
    },
    Rule {
        intent: Intent::Feedback,
        phrases: &["leave feedback", "share feedback", "my review"],
        keywords: Some(KeywordMatch::any(&[
            "feedback",
            "review",
            "comment",
            "suggestion",
            "opinion",
        ])),
        confidence: 0.8,
        reply: "Thank you for wanting to share your feedback. Your input helps us improve our services.",
    },
    // Transactional catch-alls
    Rule {
        intent: Intent::Change,
        phrases: &["change booking", "modify booking", "update booking"],
        keywords: Some(
            KeywordMatch::any(&["change", "modify", "update", "alter"])
                .with_any(&["booking", "flight", "reservation"]),
        ),
        confidence: 0.85,
        reply: "I can help you change your booking. What modifications would you like to make?",
    },
    Rule {
        intent: Intent::Booking,
        phrases: &["book flight", "book a flight", "make reservation", "reserve seat"],
        // bare "flight" is enough
        keywords: Some(KeywordMatch::any(&[
            "book",
            "booking",
            "reserve",
            "reservation",
            "schedule",
            "flight",
        ])),
        confidence: 0.85,
        reply: "I can help you with booking flights. What destination are you looking for? (Session: {session}...)",
    },
    // Generic
    Rule {
        intent: Intent::Information,
        phrases: &["tell me about", "information about", "need information"],
        keywords: Some(KeywordMatch::any(&["information", "info", "details"])),
        confidence: 0.75,
        reply: "I'm happy to provide information. What specific details would you like to know?",
    },
    Rule {
        intent: Intent::Inquiry,
        phrases: &["i have a question", "what time", "how much", "when does"],
        keywords: Some(KeywordMatch::any(&["inquiry", "inquire", "question", "ask"])),
        confidence: 0.8,
        reply: "I'm here to answer your questions. What would you like to know?",
    },
    Rule {
        intent: Intent::Support,
        phrases: &[],
        keywords: Some(KeywordMatch::any(&["support", "help", "assist", "assistance"])),
        confidence: 0.85,
        reply: "I'm here to provide support. How can I assist you today?",
    },
    // Greeting
    Rule {
        intent: Intent::Support,
        phrases: &[],
        keywords: Some(KeywordMatch::any(&[
            "hello",
            "hi",
            "hey",
            "good morning",
            "good afternoon",
        ])),
        confidence: 0.9,
        reply: "Hello! Welcome to our airline customer service. How can I help you today? (Session: {session}...)",
    },
    // Farewell
    Rule {
        intent: Intent::Support,
        phrases: &[],
        keywords: Some(KeywordMatch::any(&["bye", "goodbye", "thank you", "thanks", "exit"])),
        confidence: 0.85,
        reply: "Thank you for choosing our airline. Have a great day and safe travels!",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_follows_priority_order() {
        let mut seen = Vec::new();
        for rule in RULES {
            if seen.last() != Some(&rule.intent) {
                seen.push(rule.intent);
            }
        }
        assert_eq!(seen, Intent::ALL.to_vec());
    }

    #[test]
    fn test_confidences_in_range() {
        for rule in RULES.iter().chain(std::iter::once(&FALLBACK)) {
            assert!(
                (0.6..=0.9).contains(&rule.confidence),
                "{} has confidence {}",
                rule.intent,
                rule.confidence
            );
        }
    }

    #[test]
    fn test_fallback_is_least_confident() {
        assert!(RULES.iter().all(|rule| rule.confidence > FALLBACK.confidence));
    }

    #[test]
    fn test_rule_lists_are_lowercase() {
        for rule in RULES {
            let keywords = rule.keywords.iter().flat_map(|k| {
                k.any_of
                    .iter()
                    .chain(k.with_any_of.iter())
                    .chain(k.none_of.iter())
            });
            for word in rule.phrases.iter().chain(keywords) {
                assert_eq!(*word, word.to_lowercase(), "{} rule", rule.intent);
            }
        }
    }

    #[test]
    fn test_exclusion_only_guards_keyword_branch() {
        let boarding = RULES
            .iter()
            .find(|rule| rule.intent == Intent::Boarding)
            .unwrap();
        assert!(boarding.matches("boarding time after check"));
        assert!(!boarding.matches("which gate after check"));
    }

    #[test]
    fn test_conjunction_needs_both_words() {
        let loyalty = RULES
            .iter()
            .find(|rule| rule.intent == Intent::LoyaltyPrograms)
            .unwrap();
        assert!(!loyalty.matches("how many miles do i have"));
        assert!(loyalty.matches("what miles benefits do i get"));
    }
}
