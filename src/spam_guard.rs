//! Anti-abuse gate for public inquiry submissions.
//!
//! A [`SpamGuard`] runs an ordered list of independent [`SpamCheck`]s against a
//! sanitized [`InquiryDraft`]. The first failing check wins. Each failure
//! carries a user-facing message and a separate internal reason; the internal
//! reason is only ever logged.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::sanitizer::InquiryDraft;

/// Minimum time a human needs to fill in the form.
pub const MIN_FILL_TIME_MS: i64 = 2_000;
/// Forms older than this are treated as replays.
pub const MAX_FORM_AGE_MS: i64 = 3_600_000;
/// More URL-like tokens than this is rejected.
pub const MAX_URLS: usize = 3;
/// Upper bound on the free-text message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5_000;

/// Terms that never appear in a genuine manufacturing inquiry.
pub const SPAM_KEYWORDS: &[&str] = &[
    "viagra",
    "cialis",
    "casino",
    "lottery",
    "bitcoin",
    "crypto",
    "investment opportunity",
    "click here",
    "buy now",
    "limited time",
    "act now",
    "free money",
    "make money fast",
    "work from home",
    "weight loss",
    "pills",
    "pharmacy",
    "replica",
    "rolex",
];

/// How a rejection should be treated at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Looks automated or malicious. The user message stays deliberately vague.
    Abuse,
    /// Honest mistake in the input. The user message says how to fix it.
    Validation,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::Abuse => "abuse",
            RejectionKind::Validation => "validation",
        }
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    /// Safe to show to the submitter.
    pub user_message: String,
    /// Server-side only.
    pub internal_reason: String,
}

impl Rejection {
    pub fn abuse(user_message: impl Into<String>, internal_reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Abuse,
            user_message: user_message.into(),
            internal_reason: internal_reason.into(),
        }
    }

    pub fn validation(user_message: impl Into<String>, internal_reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Validation,
            user_message: user_message.into(),
            internal_reason: internal_reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejection: {}", self.kind.as_str(), self.internal_reason)
    }
}

/// What a check gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub draft: &'a InquiryDraft,
    /// Server clock, epoch milliseconds.
    pub now_ms: i64,
}

/// One independent predicate in the gate.
pub trait SpamCheck: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection>;
}

pub struct Honeypot;

impl SpamCheck for Honeypot {
    fn name(&self) -> &'static str {
        "honeypot"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        if submission.draft.honeypot.is_empty() {
            return Ok(());
        }
        Err(Rejection::abuse(
            "Please try again later.",
            "honeypot field filled",
        ))
    }
}

pub struct TooFast;

impl SpamCheck for TooFast {
    fn name(&self) -> &'static str {
        "too_fast"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        let Some(started) = submission.draft.started_at_ms() else {
            return Ok(());
        };
        let elapsed = submission.now_ms.saturating_sub(started);
        if elapsed < MIN_FILL_TIME_MS {
            return Err(Rejection::abuse(
                "Please take your time filling the form.",
                format!("form submitted {}ms after render", elapsed),
            ));
        }
        Ok(())
    }
}

pub struct Expired;

impl SpamCheck for Expired {
    fn name(&self) -> &'static str {
        "expired"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        let Some(started) = submission.draft.started_at_ms() else {
            return Ok(());
        };
        let elapsed = submission.now_ms.saturating_sub(started);
        if elapsed > MAX_FORM_AGE_MS {
            return Err(Rejection::abuse(
                "Form expired. Please refresh and try again.",
                format!("form rendered {}ms ago", elapsed),
            ));
        }
        Ok(())
    }
}

pub struct RequiredFields;

impl SpamCheck for RequiredFields {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        let draft = submission.draft;
        if draft.email.is_empty() || !draft.email.contains('@') {
            return Err(Rejection::validation(
                "Please enter a valid email.",
                "email missing or without '@'",
            ));
        }
        if draft.product_type.is_empty() && draft.message.is_empty() {
            return Err(Rejection::validation(
                "Please add Product Type or a Message.",
                "neither product type nor message given",
            ));
        }
        Ok(())
    }
}

pub struct KeywordSpam;

impl SpamCheck for KeywordSpam {
    fn name(&self) -> &'static str {
        "keyword_spam"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        match find_spam_keyword(&submission.draft.searchable_text()) {
            Some(keyword) => Err(Rejection::abuse(
                "Your message contains prohibited content.",
                format!("spam keyword '{}'", keyword),
            )),
            None => Ok(()),
        }
    }
}

pub struct UrlDensity;

impl SpamCheck for UrlDensity {
    fn name(&self) -> &'static str {
        "url_density"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        let count = count_urls(&submission.draft.searchable_text());
        if count > MAX_URLS {
            return Err(Rejection::abuse(
                "Please limit URLs in your message.",
                format!("{} URL-like tokens", count),
            ));
        }
        Ok(())
    }
}

pub struct MessageLength;

impl SpamCheck for MessageLength {
    fn name(&self) -> &'static str {
        "message_length"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        let chars = submission.draft.message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(Rejection::validation(
                "Message is too long. Please keep it under 5000 characters.",
                format!("message has {} characters", chars),
            ));
        }
        Ok(())
    }
}

pub struct StrictEmail;

impl SpamCheck for StrictEmail {
    fn name(&self) -> &'static str {
        "strict_email"
    }

    fn check(&self, submission: &Submission<'_>) -> Result<(), Rejection> {
        if is_valid_email(&submission.draft.email) {
            return Ok(());
        }
        Err(Rejection::validation(
            "Please enter a valid email address.",
            "email does not match local@domain.tld",
        ))
    }
}

/// Ordered chain of checks with short-circuit on the first rejection.
pub struct SpamGuard {
    checks: Vec<Box<dyn SpamCheck>>,
}

impl Default for SpamGuard {
    fn default() -> Self {
        Self::new(vec![
            Box::new(Honeypot),
            Box::new(TooFast),
            Box::new(Expired),
            Box::new(RequiredFields),
            Box::new(KeywordSpam),
            Box::new(UrlDensity),
            Box::new(MessageLength),
            Box::new(StrictEmail),
        ])
    }
}

impl SpamGuard {
    pub fn new(checks: Vec<Box<dyn SpamCheck>>) -> Self {
        Self { checks }
    }

    /// Names of the configured checks, in evaluation order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn evaluate(&self, draft: &InquiryDraft, now_ms: i64) -> Result<(), Rejection> {
        let submission = Submission { draft, now_ms };
        for check in &self.checks {
            if let Err(rejection) = check.check(&submission) {
                tracing::debug!("Check '{}' rejected submission", check.name());
                return Err(rejection);
            }
        }
        Ok(())
    }
}

/// First block-listed term found in `text`, case-insensitively.
pub fn find_spam_keyword(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    SPAM_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

/// Counts `http://`, `https://` and `www.` occurrences, case-insensitively.
pub fn count_urls(text: &str) -> usize {
    static URL_TOKEN: OnceLock<Regex> = OnceLock::new();
    URL_TOKEN
        .get_or_init(|| Regex::new(r"(?i)(https?://|www\.)").expect("URL token pattern compiles"))
        .find_iter(text)
        .count()
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
        .is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn valid_draft() -> InquiryDraft {
        InquiryDraft {
            name: "Jane".into(),
            email: "jane@example.com".into(),
            message: "Looking for 300 merino cardigans".into(),
            ..Default::default()
        }
    }

    fn run(draft: &InquiryDraft) -> Result<(), Rejection> {
        SpamGuard::default().evaluate(draft, NOW)
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            SpamGuard::default().check_names(),
            vec![
                "honeypot",
                "too_fast",
                "expired",
                "required_fields",
                "keyword_spam",
                "url_density",
                "message_length",
                "strict_email"
            ]
        );
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(run(&valid_draft()).is_ok());
    }

    #[test]
    fn test_honeypot_is_vague() {
        let mut draft = valid_draft();
        draft.honeypot = "http://bot.example".into();
        let rejection = run(&draft).unwrap_err();

        assert_eq!(rejection.kind, RejectionKind::Abuse);
        assert_eq!(rejection.user_message, "Please try again later.");
        assert!(!rejection.user_message.to_lowercase().contains("honeypot"));
    }

    #[test]
    fn test_timing_boundaries() {
        let mut draft = valid_draft();

        draft.timestamp = (NOW - 1_999).to_string();
        assert!(run(&draft).is_err());

        draft.timestamp = (NOW - 2_000).to_string();
        assert!(run(&draft).is_ok());

        draft.timestamp = (NOW - 3_600_000).to_string();
        assert!(run(&draft).is_ok());

        draft.timestamp = (NOW - 3_600_001).to_string();
        let rejection = run(&draft).unwrap_err();
        assert!(rejection.user_message.contains("expired"));
    }

    #[test]
    fn test_expired_wins_over_invalid_fields() {
        let draft = InquiryDraft {
            email: "nope".into(),
            timestamp: (NOW - 4_000_000).to_string(),
            ..Default::default()
        };
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Abuse);
    }

    #[test]
    fn test_missing_product_and_message() {
        let draft = InquiryDraft {
            email: "a@b.com".into(),
            ..Default::default()
        };
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.user_message, "Please add Product Type or a Message.");
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let mut draft = valid_draft();
        draft.company = "Best CaSiNo Ltd".into();
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.user_message, "Your message contains prohibited content.");
        assert!(rejection.internal_reason.contains("casino"));
    }

    #[test]
    fn test_url_count_boundary() {
        let mut draft = valid_draft();
        draft.message = "see http://a.com https://b.com www.c.com".into();
        assert!(run(&draft).is_ok());

        draft.message.push_str(" HTTP://d.com");
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.user_message, "Please limit URLs in your message.");
    }

    #[test]
    fn test_count_urls_scheme_and_www_both_count() {
        assert_eq!(count_urls("https://www.example.com"), 2);
        assert_eq!(count_urls("no links here"), 0);
    }

    #[test]
    fn test_message_length_counts_chars() {
        let mut draft = valid_draft();
        draft.message = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(run(&draft).is_ok());

        draft.message.push('x');
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Validation);
    }

    #[test]
    fn test_strict_email() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@@b.com"));

        let mut draft = valid_draft();
        draft.email = "jane@localhost".into();
        let rejection = run(&draft).unwrap_err();
        assert_eq!(rejection.user_message, "Please enter a valid email address.");
    }

    #[test]
    fn test_custom_chain() {
        let guard = SpamGuard::new(vec![Box::new(StrictEmail)]);
        let draft = InquiryDraft {
            email: "x@y.z".into(),
            ..Default::default()
        };
        assert!(guard.evaluate(&draft, NOW).is_ok());
    }
}
