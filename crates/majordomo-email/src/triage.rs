//! Triage classification of unread mail.
//!
//! Patterns from config are matched against the sender and subject. A
//! pattern that compiles as a regex is used as one; anything else matches
//! as a case-insensitive substring.

use regex::Regex;
use tracing::debug;

use majordomo_channels::MailSummary;
use majordomo_core::config::TriageConfig;

/// Category precedence: vip beats everything, junk beats the informational
/// buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageCategory {
    Vip,
    Junk,
    Newsletter,
    Receipt,
    /// Safe to mark read without surfacing.
    AutoRead,
    Normal,
}

impl TriageCategory {
    /// Folder the triage task files this category into, if any.
    pub fn target_folder(&self) -> Option<&'static str> {
        match self {
            TriageCategory::Junk => Some("Junk"),
            TriageCategory::Newsletter => Some("Newsletters"),
            TriageCategory::Receipt => Some("Receipts"),
            _ => None,
        }
    }
}

enum Pattern {
    Regex(Regex),
    Substring(String),
}

impl Pattern {
    fn compile(raw: &str) -> Self {
        // Only treat it as a regex when it uses regex syntax; a plain
        // address like "boss@example.com" must not have its dot match 'x'.
        let looks_like_regex = raw
            .chars()
            .any(|c| matches!(c, '^' | '$' | '*' | '+' | '[' | '(' | '|' | '\\'));
        if looks_like_regex {
            if let Ok(re) = Regex::new(&format!("(?i){raw}")) {
                return Pattern::Regex(re);
            }
            debug!(pattern = raw, "triage pattern is not valid regex, using substring match");
        }
        Pattern::Substring(raw.to_ascii_lowercase())
    }

    fn matches(&self, haystack: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(haystack),
            Pattern::Substring(s) => haystack.to_ascii_lowercase().contains(s),
        }
    }
}

pub struct TriageClassifier {
    vip: Vec<Pattern>,
    junk: Vec<Pattern>,
    newsletters: Vec<Pattern>,
    receipts: Vec<Pattern>,
    auto_read: Vec<Pattern>,
}

impl TriageClassifier {
    pub fn new(config: &TriageConfig) -> Self {
        let compile = |raw: &Vec<String>| raw.iter().map(|p| Pattern::compile(p)).collect();
        Self {
            vip: compile(&config.vip),
            junk: compile(&config.junk),
            newsletters: compile(&config.newsletters),
            receipts: compile(&config.receipts),
            auto_read: compile(&config.auto_read),
        }
    }

    pub fn classify(&self, mail: &MailSummary) -> TriageCategory {
        let haystack = format!("{} {}", mail.from, mail.subject);
        let hit = |patterns: &[Pattern]| patterns.iter().any(|p| p.matches(&haystack));

        if hit(&self.vip) {
            TriageCategory::Vip
        } else if hit(&self.junk) {
            TriageCategory::Junk
        } else if hit(&self.newsletters) {
            TriageCategory::Newsletter
        } else if hit(&self.receipts) {
            TriageCategory::Receipt
        } else if hit(&self.auto_read) {
            TriageCategory::AutoRead
        } else {
            TriageCategory::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(from: &str, subject: &str) -> MailSummary {
        MailSummary {
            id: "1".into(),
            from: from.into(),
            subject: subject.into(),
            snippet: String::new(),
            received_at: "2025-06-01T09:00:00Z".into(),
        }
    }

    fn classifier() -> TriageClassifier {
        TriageClassifier::new(&TriageConfig {
            vip: vec!["boss@example.com".into()],
            junk: vec![r"(?:win|free).*prize".into(), "casino".into()],
            newsletters: vec!["newsletter@".into(), r"^digest-.*@".into()],
            receipts: vec!["receipt".into(), "order confirmation".into()],
            auto_read: vec!["noreply@calendar".into()],
        })
    }

    #[test]
    fn vip_wins_over_other_categories() {
        let c = classifier();
        assert_eq!(
            c.classify(&mail("boss@example.com", "your receipt")),
            TriageCategory::Vip
        );
    }

    #[test]
    fn plain_patterns_match_as_substrings_not_regex() {
        let c = classifier();
        // The dot in the vip address must not match an arbitrary character.
        assert_eq!(
            c.classify(&mail("bossAexample.com", "hello")),
            TriageCategory::Normal
        );
        assert_eq!(
            c.classify(&mail("spam@casino-online.biz", "hi")),
            TriageCategory::Junk
        );
    }

    #[test]
    fn regex_patterns_apply_case_insensitively() {
        let c = classifier();
        assert_eq!(
            c.classify(&mail("promo@spam.biz", "WIN a big PRIZE now")),
            TriageCategory::Junk
        );
    }

    #[test]
    fn category_precedence_and_folders() {
        let c = classifier();
        assert_eq!(
            c.classify(&mail("newsletter@rustweekly.dev", "issue 500")),
            TriageCategory::Newsletter
        );
        assert_eq!(
            c.classify(&mail("shop@store.com", "Order confirmation #42")),
            TriageCategory::Receipt
        );
        assert_eq!(
            c.classify(&mail("noreply@calendar", "event starting")),
            TriageCategory::AutoRead
        );
        assert_eq!(TriageCategory::Junk.target_folder(), Some("Junk"));
        assert_eq!(TriageCategory::Vip.target_folder(), None);
    }

    #[test]
    fn unmatched_mail_is_normal() {
        let c = classifier();
        assert_eq!(
            c.classify(&mail("friend@home.net", "dinner?")),
            TriageCategory::Normal
        );
    }
}
