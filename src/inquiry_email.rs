//! Renders an [`Inquiry`] into the staff notification e-mail.
//!
//! Composition is pure: the same inquiry always yields byte-identical output.
//! The submission time is whatever the caller put on the inquiry.

use crate::models::Inquiry;

const NAVY: &str = "#2B3942";
const NAVY_DEEP: &str = "#1E2A33";
const CASHMERE: &str = "#EDE6D8";
const COPPER: &str = "#B87333";
const WOOL: &str = "#6F7477";

const SANS: &str = "ui-sans-serif,system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial";
const MONO: &str =
    "ui-monospace,SFMono-Regular,Menlo,Monaco,Consolas,'Liberation Mono','Courier New',monospace";

const SUBJECT_PREFIX: &str = "Start Your Project — ";
const TEAM_ADDRESS: &str = "info@everknitting.com";
/// `Re: Ever Knitting Inquiry`, percent-encoded for a mailto query.
const REPLY_SUBJECT: &str = "Re%3A%20Ever%20Knitting%20Inquiry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDocument {
    pub subject: String,
    pub html: String,
}

pub fn compose(inquiry: &Inquiry) -> NotificationDocument {
    NotificationDocument {
        subject: subject(inquiry),
        html: render_html(inquiry),
    }
}

/// `Start Your Project — <company | name | New Inquiry>` plus an attachment
/// count suffix when files are present.
pub fn subject(inquiry: &Inquiry) -> String {
    let label = [inquiry.company.trim(), inquiry.name.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("New Inquiry");

    let suffix = match inquiry.attachments.len() {
        0 => String::new(),
        1 => " (1 attachment)".to_string(),
        n => format!(" ({} attachments)", n),
    };

    format!("{}{}{}", SUBJECT_PREFIX, label, suffix)
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Stricter escaping for attribute values and hrefs.
pub fn escape_attr(input: &str) -> String {
    escape_html(input).replace('`', "&#096;")
}

fn display_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "-".to_string()
    } else {
        escape_html(trimmed)
    }
}

fn detail_rows(inquiry: &Inquiry) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Name", display_value(&inquiry.name)),
        ("Email", display_value(&inquiry.email)),
        ("Company / Brand", display_value(&inquiry.company)),
        ("Product Type", display_value(&inquiry.product_type)),
        ("Material", display_value(&inquiry.material)),
        ("Gauge", display_value(&inquiry.gauge)),
        ("Quantity", display_value(&inquiry.quantity)),
        (
            "Submitted At",
            display_value(inquiry.submitted_at.as_deref().unwrap_or_default()),
        ),
    ];

    if let Some(page) = inquiry.page_url.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        rows.push((
            "Page",
            format!(
                r#"<a href="{}" style="color:{};text-decoration:none;">{}</a>"#,
                escape_attr(page),
                COPPER,
                escape_html(page)
            ),
        ));
    }

    if !inquiry.attachments.is_empty() {
        let names: Vec<String> = inquiry
            .attachments
            .files()
            .iter()
            .map(|file| escape_html(&file.filename))
            .collect();
        rows.push(("Attachments", names.join("<br/>")));
    }

    rows
}

fn detail_row(label: &str, value_html: &str) -> String {
    format!(
        r#"<tr>
    <td style="padding:10px 12px;border-bottom:1px solid rgba(111,116,119,0.25);width:180px;vertical-align:top;">
      <div style="font-family:{sans};font-size:12px;color:{wool};">{label}</div>
    </td>
    <td style="padding:10px 12px;border-bottom:1px solid rgba(111,116,119,0.25);vertical-align:top;">
      <div style="font-family:{sans};font-size:13px;color:{cashmere};">{value}</div>
    </td>
  </tr>"#,
        sans = SANS,
        wool = WOOL,
        cashmere = CASHMERE,
        label = escape_html(label),
        value = value_html,
    )
}

fn chip(text: &str) -> String {
    format!(
        r#"<span style="display:inline-block;font-family:{};font-size:12px;color:{};border:1px solid rgba(111,116,119,0.45);background:rgba(237,230,216,0.04);padding:6px 10px;border-radius:999px;margin:0 8px 8px 0;">{}</span>"#,
        SANS,
        CASHMERE,
        escape_html(text)
    )
}

fn button(href: &str, text: &str, primary: bool) -> String {
    let (color, background) = if primary {
        (NAVY_DEEP, COPPER)
    } else {
        (CASHMERE, "rgba(237,230,216,0.06)")
    };
    format!(
        r#"<a href="{}" style="display:inline-block;font-family:{};font-size:13px;font-weight:700;color:{};background:{};padding:10px 14px;border-radius:14px;text-decoration:none;">{}</a>"#,
        escape_attr(href),
        SANS,
        color,
        background,
        escape_html(text)
    )
}

fn render_html(inquiry: &Inquiry) -> String {
    let rows: String = detail_rows(inquiry)
        .iter()
        .map(|(label, value)| detail_row(label, value))
        .collect();

    let message = display_value(&inquiry.message);

    let email = inquiry.email.trim();
    let reply_href = if email.is_empty() {
        "#".to_string()
    } else {
        format!("mailto:{}?subject={}", email, REPLY_SUBJECT)
    };

    let chips: String = ["Reply in 12–24h", "NDA Available", "OEM / ODM", "1.5gg–16gg"]
        .iter()
        .map(|c| chip(c))
        .collect();

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>New Inquiry — Ever Knitting</title>
</head>
<body style="margin:0;padding:0;background:{navy_deep};">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="border-collapse:collapse;background:{navy_deep};">
    <tr>
      <td align="center" style="padding:24px 12px;">
        <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="width:600px;max-width:600px;border-collapse:collapse;">
          <tr>
            <td style="padding:18px 20px;border-radius:18px 18px 0 0;background:{navy};font-family:{sans};">
              <div style="color:{cashmere};font-size:14px;opacity:0.85;">Ever Knitting Company Limited</div>
              <div style="color:{cashmere};font-size:20px;font-weight:700;line-height:1.2;margin-top:6px;">New Inquiry — Start Your Project</div>
            </td>
          </tr>
          <tr>
            <td style="height:4px;background:{copper};"></td>
          </tr>
          <tr>
            <td style="background:{navy};padding:20px;border-radius:0 0 18px 18px;">
              <div style="padding:0 0 14px 0;">{chips}</div>
              <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="border-collapse:collapse;background:rgba(237,230,216,0.04);border:1px solid rgba(111,116,119,0.35);border-radius:14px;">
                {rows}
              </table>
              <div style="font-family:{sans};color:{cashmere};font-size:14px;font-weight:700;margin:16px 0 8px 0;">Requirements / Message</div>
              <div style="background:rgba(237,230,216,0.04);border:1px solid rgba(111,116,119,0.35);border-radius:14px;padding:14px;">
                <div style="font-family:{mono};color:{cashmere};font-size:13px;line-height:1.6;white-space:pre-wrap;">{message}</div>
              </div>
              <div style="padding:18px 0 0 0;">
                {reply_button}
                {forward_button}
              </div>
              <div style="font-family:{sans};color:{wool};font-size:12px;line-height:1.6;border-top:1px solid rgba(111,116,119,0.35);margin-top:18px;padding-top:14px;">
                This message was generated from your website inquiry form.
              </div>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#,
        navy_deep = NAVY_DEEP,
        navy = NAVY,
        cashmere = CASHMERE,
        copper = COPPER,
        wool = WOOL,
        sans = SANS,
        mono = MONO,
        chips = chips,
        rows = rows,
        message = message,
        reply_button = button(&reply_href, "Reply to Buyer", true),
        forward_button = button(&format!("mailto:{}", TEAM_ADDRESS), "Forward to Team", false),
    )
}
