//! Raw message normalization.
//!
//! Turns RFC 822 / MIME payloads into a single bounded plain-text body:
//! text parts are collected in structural order, attachments skipped, HTML
//! converted, and the result truncated.

use std::sync::Arc;

use amendment_core::Email;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::config::{DEFAULT_MAX_BODY_CHARS, NormalizerConfig};
use crate::error::NormalizeError;
use crate::events::{EventLog, EventSink};
use crate::html::{html_to_text, looks_like_html};

pub const COMPONENT: &str = "normalizer";

/// Appended to bodies cut at the length limit.
pub const TRUNCATION_MARKER: &str = "...";

/// Cuts `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct TextNormalizer {
    max_body_chars: usize,
    log: EventLog,
}

impl TextNormalizer {
    pub fn new(max_body_chars: usize, sink: Arc<dyn EventSink>) -> Self {
        Self {
            max_body_chars,
            log: EventLog::new(sink, COMPONENT),
        }
    }

    pub fn from_config(config: &NormalizerConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::new(config.max_body_chars, sink)
    }

    pub fn max_body_chars(&self) -> usize {
        self.max_body_chars
    }

    /// Normalizes an already-decoded body: HTML is converted, line endings
    /// unified and the result truncated.
    pub fn normalize_text(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        let plain = if looks_like_html(&unified) {
            self.log.debug("converting HTML body to text");
            html_to_text(&unified)
        } else {
            unified
        };
        self.bound(plain)
    }

    /// Extracts and normalizes the body of a raw message.
    ///
    /// # Errors
    ///
    /// [`NormalizeError::Mail`] when the headers cannot be parsed.
    pub fn normalize_message(&self, raw: &[u8]) -> Result<String, NormalizeError> {
        let parsed = mailparse::parse_mail(raw)?;
        Ok(self.body_of(&parsed))
    }

    /// Decodes sender, subject (RFC 2047 aware) and body of a raw message.
    pub fn email_from_raw(&self, raw: &[u8]) -> Result<Email, NormalizeError> {
        let parsed = mailparse::parse_mail(raw)?;
        let from = parsed.headers.get_first_value("From").unwrap_or_default();
        let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
        let body = self.body_of(&parsed);
        Ok(Email::new(from.trim(), subject.trim(), body))
    }

    fn body_of(&self, parsed: &ParsedMail<'_>) -> String {
        let body = if parsed.subparts.is_empty() {
            let text = self.decode_part(parsed);
            if parsed.ctype.mimetype == "text/html" || looks_like_html(&text) {
                html_to_text(&text)
            } else {
                text
            }
        } else {
            let mut body = String::new();
            self.collect_parts(parsed, &mut body);
            body
        };
        let unified = body.replace("\r\n", "\n").replace('\r', "\n");
        self.bound(unified.trim_end().to_string())
    }

    fn collect_parts(&self, part: &ParsedMail<'_>, out: &mut String) {
        if matches!(
            part.get_content_disposition().disposition,
            DispositionType::Attachment
        ) {
            self.log.debug(format!("skipping attachment part ({})", part.ctype.mimetype));
            return;
        }
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.collect_parts(sub, out);
            }
            return;
        }
        let text = match part.ctype.mimetype.as_str() {
            "text/plain" => self.decode_part(part),
            "text/html" => html_to_text(&self.decode_part(part)),
            other => {
                self.log.debug(format!("skipping non-text part ({other})"));
                return;
            }
        };
        out.push_str(&text);
        out.push('\n');
    }

    fn decode_part(&self, part: &ParsedMail<'_>) -> String {
        match part.get_body() {
            Ok(text) => text,
            Err(err) => {
                self.log.warn(format!(
                    "charset decoding failed ({err}); falling back to lossy UTF-8"
                ));
                part.get_body_raw()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default()
            }
        }
    }

    fn bound(&self, text: String) -> String {
        let length = text.chars().count();
        if length > self.max_body_chars {
            self.log.info(format!(
                "truncating body from {length} to {} characters",
                self.max_body_chars
            ));
            truncate(&text, self.max_body_chars)
        } else {
            text
        }
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_CHARS, crate::events::tracing_sink())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, Severity};

    fn normalizer(max: usize) -> (TextNormalizer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (TextNormalizer::new(max, sink.clone()), sink)
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("héllo", 3), "hél...");
        assert_eq!(truncate("héllo", 5), "héllo");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_normalize_text_truncates_and_logs() {
        let (normalizer, sink) = normalizer(10);
        let body = normalizer.normalize_text(&"a".repeat(25));
        assert_eq!(body, format!("{}...", "a".repeat(10)));
        assert_eq!(sink.matching(COMPONENT, Severity::Info).len(), 1);
    }

    #[test]
    fn test_plain_message_body() {
        let (normalizer, _) = normalizer(1000);
        let raw = b"From: France <france@mun.org>\r\nSubject: Amendment\r\n\r\nSubmitter: France\r\nClause: 4\r\n";
        let email = normalizer.email_from_raw(raw).unwrap();
        assert_eq!(email.from, "France <france@mun.org>");
        assert_eq!(email.subject, "Amendment");
        assert_eq!(email.body, "Submitter: France\nClause: 4");
    }

    #[test]
    fn test_multipart_skips_attachments_and_converts_html() {
        let (normalizer, _) = normalizer(1000);
        let raw = concat!(
            "From: chile@mun.org\r\n",
            "Subject: =?UTF-8?B?RW5taWVuZGE=?=\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
            "\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Submitter: Chile\r\n",
            "--XYZ\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>Clause: <a href=\"http://x\">2.b</a></p>\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "Delegate: Nobody\r\n",
            "--XYZ--\r\n",
        );
        let email = normalizer.email_from_raw(raw.as_bytes()).unwrap();
        assert_eq!(email.subject, "Enmienda");
        assert!(email.body.contains("Submitter: Chile"));
        assert!(email.body.contains("Clause: 2.b"));
        assert!(!email.body.contains("Nobody"));
        assert!(!email.body.contains("http://x"));
    }

    #[test]
    fn test_html_only_message_is_converted() {
        let (normalizer, _) = normalizer(1000);
        let raw = b"Content-Type: text/html\r\n\r\n<div>Submitter: Peru</div><div>Clause: 1</div>";
        assert_eq!(
            normalizer.normalize_message(raw).unwrap(),
            "Submitter: Peru\n\nClause: 1"
        );
    }
}
