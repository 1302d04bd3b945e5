//! Keyword intent classifier
//!
//! Maps free text to one of the airline service intents by walking an
//! ordered rule table and returning the first rule that matches. Rule order
//! is priority: specific actions first, broad catch-alls last.

mod rules;

#[cfg(test)]
mod proptests;

#[allow(unused_imports)] // Public API re-exports
pub use rules::{KeywordMatch, Rule, FALLBACK, RULES};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of characters of the session id shown in replies
const SESSION_PREFIX_LEN: usize = 8;

/// Intent category attached to every bot reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Intent {
    Cancellation,
    Refund,
    #[serde(rename = "Check-in")]
    CheckIn,
    Upgrade,
    Reschedule,
    Seating,
    Meals,
    Boarding,
    Amenities,
    #[serde(rename = "Loyalty Programs")]
    LoyaltyPrograms,
    Rewards,
    Security,
    Safety,
    Promotions,
    Offers,
    Discounts,
    Policies,
    Procedures,
    Regulations,
    Complaint,
    Feedback,
    Change,
    Booking,
    Information,
    Inquiry,
    Support,
}

impl Intent {
    /// All intents in rule priority order
    pub const ALL: [Intent; 26] = [
        Intent::Cancellation,
        Intent::Refund,
        Intent::CheckIn,
        Intent::Upgrade,
        Intent::Reschedule,
        Intent::Seating,
        Intent::Meals,
        Intent::Boarding,
        Intent::Amenities,
        Intent::LoyaltyPrograms,
        Intent::Rewards,
        Intent::Security,
        Intent::Safety,
        Intent::Promotions,
        Intent::Offers,
        Intent::Discounts,
        Intent::Policies,
        Intent::Procedures,
        Intent::Regulations,
        Intent::Complaint,
        Intent::Feedback,
        Intent::Change,
        Intent::Booking,
        Intent::Information,
        Intent::Inquiry,
        Intent::Support,
    ];

    /// Label as stored and displayed
    pub fn label(self) -> &'static str {
        match self {
            Intent::Cancellation => "Cancellation",
            Intent::Refund => "Refund",
            Intent::CheckIn => "Check-in",
            Intent::Upgrade => "Upgrade",
            Intent::Reschedule => "Reschedule",
            Intent::Seating => "Seating",
            Intent::Meals => "Meals",
            Intent::Boarding => "Boarding",
            Intent::Amenities => "Amenities",
            Intent::LoyaltyPrograms => "Loyalty Programs",
            Intent::Rewards => "Rewards",
            Intent::Security => "Security",
            Intent::Safety => "Safety",
            Intent::Promotions => "Promotions",
            Intent::Offers => "Offers",
            Intent::Discounts => "Discounts",
            Intent::Policies => "Policies",
            Intent::Procedures => "Procedures",
            Intent::Regulations => "Regulations",
            Intent::Complaint => "Complaint",
            Intent::Feedback => "Feedback",
            Intent::Change => "Change",
            Intent::Booking => "Booking",
            Intent::Information => "Information",
            Intent::Inquiry => "Inquiry",
            Intent::Support => "Support",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for labels outside the fixed intent set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown intent label: {0}")]
pub struct UnknownIntent(pub String);

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.label() == s)
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// Result of classifying one user message
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
    pub reply: String,
}

/// Classify a message and render the canned reply.
///
/// Total: every input yields a classification, falling back to Inquiry.
/// Callers reject blank input before getting here.
pub fn classify(text: &str, session_id: &str) -> Classification {
    let rule = matching_rule(text);
    Classification {
        intent: rule.intent,
        confidence: rule.confidence,
        reply: render_reply(rule.reply, text, session_id),
    }
}

/// First rule in priority order that matches, or the fallback
pub fn matching_rule(text: &str) -> &'static Rule {
    let lowered = text.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .unwrap_or(&FALLBACK)
}

/// Fill `{session}` and `{message}` placeholders in a reply template
fn render_reply(template: &str, message: &str, session_id: &str) -> String {
    let mut reply = template.to_string();
    if reply.contains("{session}") {
        let prefix: String = session_id.chars().take(SESSION_PREFIX_LEN).collect();
        reply = reply.replace("{session}", &prefix);
    }
    if reply.contains("{message}") {
        reply = reply.replace("{message}", message);
    }
    reply
}
