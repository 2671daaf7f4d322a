/// Acceptance scenarios for the public inquiry gate
use inquiry_crm_api::attachments::AttachmentSet;
use inquiry_crm_api::sanitizer::InquiryDraft;
use inquiry_crm_api::spam_guard::{RejectionKind, SpamGuard};
use std::collections::HashMap;

const NOW: i64 = 1_700_000_000_000;

fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn rendered_ago(ms: i64) -> String {
    (NOW - ms).to_string()
}

#[test]
fn test_scenario_invalid_email() {
    let draft = InquiryDraft::from_form(&form(&[
        ("email", "not-an-email"),
        ("message", "hello"),
    ]));
    let rejection = SpamGuard::default().evaluate(&draft, NOW).unwrap_err();

    assert_eq!(rejection.kind, RejectionKind::Validation);
    assert_eq!(rejection.user_message, "Please enter a valid email.");
}

#[test]
fn test_scenario_honeypot_is_generic() {
    let ts = rendered_ago(60_000);
    let draft = InquiryDraft::from_form(&form(&[
        ("name", "Jane"),
        ("email", "jane@example.com"),
        ("message", "Need 300 pieces"),
        ("_website", "http://bot.example"),
        ("_timestamp", &ts),
    ]));
    let rejection = SpamGuard::default().evaluate(&draft, NOW).unwrap_err();

    assert_eq!(rejection.kind, RejectionKind::Abuse);
    assert_eq!(rejection.user_message, "Please try again later.");
    assert!(!rejection.user_message.contains("honeypot"));
}

#[test]
fn test_scenario_genuine_inquiry_passes() {
    let ts = rendered_ago(45_000);
    let draft = InquiryDraft::from_form(&form(&[
        ("email", " a@b.com "),
        ("message", "Interested in cashmere sweaters, 500 units"),
        ("_timestamp", &ts),
    ]));
    assert!(SpamGuard::default().evaluate(&draft, NOW).is_ok());
}

#[test]
fn test_timing_edges() {
    let guard = SpamGuard::default();
    let draft_at = |elapsed: i64| {
        let ts = rendered_ago(elapsed);
        InquiryDraft::from_form(&form(&[
            ("email", "a@b.com"),
            ("productType", "Beanies"),
            ("_timestamp", &ts),
        ]))
    };

    assert!(guard.evaluate(&draft_at(1_999), NOW).is_err());
    assert!(guard.evaluate(&draft_at(2_000), NOW).is_ok());
    assert!(guard.evaluate(&draft_at(3_600_000), NOW).is_ok());
    assert!(guard.evaluate(&draft_at(3_600_001), NOW).is_err());
}

#[test]
fn test_unparseable_timestamp_is_ignored() {
    let draft = InquiryDraft::from_form(&form(&[
        ("email", "a@b.com"),
        ("productType", "Scarves"),
        ("_timestamp", "yesterday"),
    ]));
    assert!(SpamGuard::default().evaluate(&draft, NOW).is_ok());
}

#[test]
fn test_keyword_in_company_field() {
    let draft = InquiryDraft::from_form(&form(&[
        ("email", "a@b.com"),
        ("company", "Best CASINO Deals"),
        ("message", "hi"),
    ]));
    let rejection = SpamGuard::default().evaluate(&draft, NOW).unwrap_err();
    assert_eq!(rejection.user_message, "Your message contains prohibited content.");
}

#[test]
fn test_url_density() {
    let guard = SpamGuard::default();
    let three = InquiryDraft::from_form(&form(&[
        ("email", "a@b.com"),
        ("message", "see http://a.io and http://b.io and http://c.io"),
    ]));
    assert!(guard.evaluate(&three, NOW).is_ok());

    let four = InquiryDraft::from_form(&form(&[
        ("email", "a@b.com"),
        ("message", "http://a.io http://b.io http://c.io http://d.io"),
    ]));
    let rejection = guard.evaluate(&four, NOW).unwrap_err();
    assert_eq!(rejection.user_message, "Please limit URLs in your message.");
}

#[test]
fn test_six_attachments_reject_whole_submission() {
    let one = r#"{"filename":"x.png","contentType":"image/png","base64":"iVBORw==","size":4}"#;
    let raw = format!("[{}]", vec![one; 6].join(","));

    let rejection = AttachmentSet::from_json(&raw, "info@everknitting.com").unwrap_err();
    assert_eq!(rejection.kind, RejectionKind::Validation);
    assert!(rejection.user_message.contains("info@everknitting.com"));

    let raw = format!("[{}]", vec![one; 5].join(","));
    assert_eq!(
        AttachmentSet::from_json(&raw, "info@everknitting.com")
            .unwrap()
            .len(),
        5
    );
}
