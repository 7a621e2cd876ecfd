//! HTML for the chat page.

use std::fmt::Write;

use health_chat_core::{format_appointment, Sender};

use crate::chat::ChatPage;

/// Escape text for use in HTML bodies and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_chat_page(page: &ChatPage) -> String {
    let patient = &page.patient;
    let mut html = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Health Chat</title>
</head>
<body>
<header>
<h1>Chat with your health assistant</h1>
<p>Patient: {name}</p>
<p>Doctor: Dr. {doctor}</p>
<p>Next appointment: {next}</p>
</header>
"#,
        name = escape_html(&patient.full_name()),
        doctor = escape_html(&patient.doctor_name),
        next = escape_html(&format_appointment(&patient.next_appointment)),
    );

    html.push_str("<section id=\"messages\">\n");
    for message in &page.messages {
        let who = match message.sender {
            Sender::Patient => "You",
            Sender::Bot => "Assistant",
        };
        let _ = writeln!(
            html,
            r#"<div class="message {class}"><strong>{who}:</strong> {text}</div>"#,
            class = message.sender.as_str(),
            text = escape_html(&message.text),
        );
    }
    html.push_str("</section>\n");

    if !page.summary.is_empty() {
        let _ = writeln!(
            html,
            "<section id=\"summary\">\n<h2>Conversation summary</h2>\n<p>{}</p>\n</section>",
            escape_html(&page.summary)
        );
    }

    if !page.appointment_requests.is_empty() {
        html.push_str("<section id=\"appointment-requests\">\n<h2>Pending appointment requests</h2>\n<ul>\n");
        for request in &page.appointment_requests {
            let _ = writeln!(
                html,
                "<li>{}</li>",
                escape_html(&format_appointment(&request.requested_time))
            );
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str(
        r#"<form method="post" action="/">
<input type="text" name="message" autocomplete="off" autofocus>
<button type="submit">Send</button>
</form>
</body>
</html>
"#,
    );

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::test_support::sample_new_patient;
    use chrono::{NaiveDate, TimeZone, Utc};
    use health_chat_core::{AppointmentChangeRequest, Message};

    fn page() -> ChatPage {
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        ChatPage {
            patient: sample_new_patient().with_id(1),
            messages: vec![
                Message {
                    id: 1,
                    patient_id: 1,
                    sender: Sender::Patient,
                    text: "<script>alert('hi')</script>".into(),
                    timestamp,
                },
                Message {
                    id: 2,
                    patient_id: 1,
                    sender: Sender::Bot,
                    text: "Hello & welcome".into(),
                    timestamp,
                },
            ],
            summary: "Patient said hello.".into(),
            appointment_requests: vec![AppointmentChangeRequest {
                id: 1,
                patient_id: 1,
                requested_time: NaiveDate::from_ymd_opt(2025, 3, 5)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap(),
                timestamp,
                reviewed: false,
            }],
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_page_escapes_messages() {
        let html = render_chat_page(&page());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;hi&#x27;)&lt;/script&gt;"));
        assert!(html.contains("Hello &amp; welcome"));
    }

    #[test]
    fn test_page_sections() {
        let html = render_chat_page(&page());
        assert!(html.contains("Patient: Jane Doe"));
        assert!(html.contains("Doctor: Dr. Smith"));
        assert!(html.contains("Patient said hello."));
        assert!(html.contains("<li>March 05, 2025 at 02:00 PM</li>"));
        assert!(html.contains(r#"name="message""#));

        let first = html.find("alert").unwrap();
        let second = html.find("welcome").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_sections_omitted() {
        let mut page = page();
        page.summary.clear();
        page.appointment_requests.clear();
        let html = render_chat_page(&page);
        assert!(!html.contains("id=\"summary\""));
        assert!(!html.contains("id=\"appointment-requests\""));
    }
}
