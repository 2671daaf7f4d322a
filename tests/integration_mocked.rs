/// Integration tests with a mocked Resend API
/// Exercises the inquiry pipeline end to end without hitting the real provider
use inquiry_crm_api::config::{DeliveryConfig, MissingSetting};
use inquiry_crm_api::intake::{submit_inquiry, IntakeContext, IntakeOutcome, SUCCESS_MESSAGE};
use inquiry_crm_api::mailer::{MailTransport, OutboundEmail, ResendClient};
use inquiry_crm_api::sanitizer::InquiryDraft;
use inquiry_crm_api::spam_guard::SpamGuard;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_750_000_000_000;
const FALLBACK: &str = "info@everknitting.com";

/// Helper function to create delivery config pointing at the mock server
fn create_test_config(base_url: String) -> DeliveryConfig {
    DeliveryConfig {
        api_key: "re_test_key".to_string(),
        from: "Ever Knitting <inquiries@everknitting.com>".to_string(),
        to: "sales@everknitting.com".to_string(),
        base_url,
    }
}

fn context() -> IntakeContext<'static> {
    IntakeContext {
        now_ms: NOW,
        submitted_at: "2025-06-15T15:06:40Z".to_string(),
        fallback_contact: FALLBACK,
    }
}

fn valid_draft() -> InquiryDraft {
    InquiryDraft {
        email: "a@b.com".to_string(),
        message: "Interested in cashmere sweaters, 500 units".to_string(),
        timestamp: (NOW - 30_000).to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_accepted_inquiry_delivers_once_with_reply_to() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test_key"))
        .and(body_partial_json(json!({
            "reply_to": "a@b.com",
            "to": ["sales@everknitting.com"],
            "subject": "Start Your Project — New Inquiry"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_123" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = submit_inquiry(
        &SpamGuard::default(),
        valid_draft(),
        &context(),
        Ok(create_test_config(mock_server.uri())),
        ResendClient::new,
    )
    .await;

    assert!(report.state.ok);
    assert_eq!(report.state.message, SUCCESS_MESSAGE);
    assert_eq!(
        report.outcome,
        IntakeOutcome::Accepted {
            attachments: 0,
            message_id: "email_123".to_string()
        }
    );
}

#[tokio::test]
async fn test_attachments_are_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_partial_json(json!({
            "attachments": [{ "filename": "techpack.pdf", "content": "JVBERi0xLjQ=" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_456" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut draft = valid_draft();
    draft.company = "Acme Knits".to_string();
    draft.attachments = json!([{
        "filename": "techpack.pdf",
        "contentType": "application/pdf",
        "base64": "JVBERi0xLjQ=",
        "size": 8
    }])
    .to_string();

    let report = submit_inquiry(
        &SpamGuard::default(),
        draft,
        &context(),
        Ok(create_test_config(mock_server.uri())),
        ResendClient::new,
    )
    .await;

    assert!(report.state.ok);
    assert_eq!(
        report.state.message,
        "Sent with 1 attachment(s)! We'll reply in 12–24 hours."
    );
}

#[tokio::test]
async fn test_payload_too_large_gets_size_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({
            "statusCode": 413,
            "name": "payload_too_large",
            "message": "Request entity too large"
        })))
        .mount(&mock_server)
        .await;

    let report = submit_inquiry(
        &SpamGuard::default(),
        valid_draft(),
        &context(),
        Ok(create_test_config(mock_server.uri())),
        ResendClient::new,
    )
    .await;

    assert!(!report.state.ok);
    assert!(report.state.message.contains("smaller files"));
    assert!(report.state.message.contains(FALLBACK));
    match report.outcome {
        IntakeOutcome::DeliveryFailed {
            status,
            size_related,
            ..
        } => {
            assert_eq!(status, Some(413));
            assert!(size_related);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_generic_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "statusCode": 401,
            "name": "validation_error",
            "message": "API key is invalid"
        })))
        .mount(&mock_server)
        .await;

    let report = submit_inquiry(
        &SpamGuard::default(),
        valid_draft(),
        &context(),
        Ok(create_test_config(mock_server.uri())),
        ResendClient::new,
    )
    .await;

    assert!(!report.state.ok);
    assert!(report.state.message.contains("couldn't send"));
    assert!(!report.state.message.contains("API key"));
}

#[tokio::test]
async fn test_missing_config_makes_no_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let report = submit_inquiry(
        &SpamGuard::default(),
        valid_draft(),
        &context(),
        Err(MissingSetting("INQUIRY_TO")),
        ResendClient::new,
    )
    .await;

    assert!(!report.state.ok);
    assert!(report.state.message.contains(FALLBACK));
    assert_eq!(report.outcome, IntakeOutcome::ConfigMissing { setting: "INQUIRY_TO" });
}

#[tokio::test]
async fn test_invalid_email_never_reaches_provider() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut draft = valid_draft();
    draft.email = "not-an-email".to_string();
    draft.message = "hello".to_string();

    let report = submit_inquiry(
        &SpamGuard::default(),
        draft,
        &context(),
        Ok(create_test_config(mock_server.uri())),
        ResendClient::new,
    )
    .await;

    assert!(!report.state.ok);
    assert_eq!(report.state.message, "Please enter a valid email.");
}

#[tokio::test]
async fn test_resend_client_reports_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let client = ResendClient::new(&create_test_config(mock_server.uri())).unwrap();
    let email = OutboundEmail {
        from: "a@example.com".to_string(),
        to: vec!["b@example.com".to_string()],
        subject: "Test".to_string(),
        html: "<p>Test</p>".to_string(),
        reply_to: None,
        attachments: None,
    };

    let err = client.send(&email).await.unwrap_err();
    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "upstream exploded");
    assert!(!err.is_size_related());
}
