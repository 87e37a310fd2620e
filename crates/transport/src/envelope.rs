use postilion_core::{MessageContentType, OutboundMessage};
use uuid::Uuid;

/// Header injected from the message priority ordinal.
pub const PRIORITY_HEADER: &str = "X-Priority";

/// A "to" entry on an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeAddress {
    /// Display name. Empty for recipients copied from a message.
    pub name: String,
    /// Email address.
    pub address: String,
}

/// A regular data attachment on an envelope.
#[derive(Debug, Clone)]
pub struct DataAttachment {
    pub name: String,
    pub content: Vec<u8>,
}

/// An embedded attachment, addressable from body content through its
/// generated content id.
#[derive(Debug, Clone)]
pub struct EmbeddedAttachment {
    pub name: String,
    pub content: Vec<u8>,
    /// Generated content id; body references use `cid:<content_id>`.
    pub content_id: String,
}

/// Transport-ready representation of one outbound message.
///
/// Built once per dispatch call by [`Envelope::from_message`] and owned by
/// the dispatcher for the lifetime of that call. After construction the
/// only permitted mutation is [`Envelope::set_return_path`].
///
/// Headers form an ordered list; writing an existing key replaces its
/// value in place rather than appending a duplicate.
#[derive(Debug, Clone)]
pub struct Envelope {
    subject: String,
    from_address: String,
    from_name: String,
    charset: String,
    sender: String,
    bounce_address: String,
    to: Vec<EnvelopeAddress>,
    headers: Vec<(String, String)>,
    html_body: Option<String>,
    plain_body: Option<String>,
    attachments: Vec<DataAttachment>,
    embedded: Vec<EmbeddedAttachment>,
}

impl Envelope {
    /// Translate a message into a transport envelope.
    ///
    /// This is a pure transformation: no validation is performed here,
    /// malformed fields are passed through for the transport to reject.
    ///
    /// - An HTML message gets an HTML body, plus the plain body as an
    ///   alternative part when it is non-empty. A plain message gets a
    ///   plain body only.
    /// - The priority header is injected first, then caller headers are
    ///   copied verbatim; a caller-supplied priority header therefore
    ///   overwrites the injected one.
    /// - Inline attachments with a non-empty content id are embedded under
    ///   a generated content id, and every occurrence of the original id
    ///   token in body content is replaced by a `cid:` reference to the
    ///   generated one. Inline attachments without a content id are
    ///   neither attached nor substituted.
    pub fn from_message(message: &OutboundMessage) -> Self {
        let mut envelope = Self {
            subject: message.subject.clone(),
            from_address: message.from_address.clone(),
            from_name: message.from_name.clone(),
            charset: message.charset.clone(),
            sender: message.return_path.clone(),
            bounce_address: message.return_path.clone(),
            to: Vec::new(),
            headers: Vec::new(),
            html_body: None,
            plain_body: None,
            attachments: Vec::new(),
            embedded: Vec::new(),
        };

        match message.content_type {
            MessageContentType::Html => {
                envelope.html_body = Some(message.html_body.clone().unwrap_or_default());
                if let Some(plain) = &message.plain_body
                    && !plain.is_empty()
                {
                    envelope.plain_body = Some(plain.clone());
                }
            }
            MessageContentType::Plain => {
                envelope.plain_body = Some(message.plain_body.clone().unwrap_or_default());
            }
        }

        envelope.set_header(PRIORITY_HEADER, message.priority.ordinal().to_string());
        for (key, value) in &message.headers {
            envelope.set_header(key.clone(), value.clone());
        }

        for recipient in &message.recipients {
            envelope.to.push(EnvelopeAddress {
                name: String::new(),
                address: recipient.clone(),
            });
        }

        for attachment in message.attachments.iter().filter(|a| !a.inline) {
            envelope.attachments.push(DataAttachment {
                name: attachment.name.clone(),
                content: attachment.content.clone(),
            });
        }

        for attachment in message.attachments.iter().filter(|a| a.inline) {
            let Some(original_id) = attachment
                .content_id
                .as_deref()
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            let content_id = generate_content_id();
            envelope.replace_in_bodies(original_id, &format!("cid:{content_id}"));
            envelope.embedded.push(EmbeddedAttachment {
                name: attachment.name.clone(),
                content: attachment.content.clone(),
                content_id,
            });
        }

        envelope
    }

    /// Reassign the return path: both the sender and bounce-address fields
    /// are set from the given address.
    pub fn set_return_path(&mut self, address: &str) {
        self.sender = address.to_owned();
        self.bounce_address = address.to_owned();
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn bounce_address(&self) -> &str {
        &self.bounce_address
    }

    pub fn to(&self) -> &[EnvelopeAddress] {
        &self.to
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value by exact key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn html_body(&self) -> Option<&str> {
        self.html_body.as_deref()
    }

    pub fn plain_body(&self) -> Option<&str> {
        self.plain_body.as_deref()
    }

    pub fn attachments(&self) -> &[DataAttachment] {
        &self.attachments
    }

    pub fn embedded(&self) -> &[EmbeddedAttachment] {
        &self.embedded
    }

    fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.headers.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.headers.push((key, value));
        }
    }

    fn replace_in_bodies(&mut self, token: &str, replacement: &str) {
        if let Some(html) = &self.html_body {
            self.html_body = Some(html.replace(token, replacement));
        }
        if let Some(plain) = &self.plain_body {
            self.plain_body = Some(plain.replace(token, replacement));
        }
    }
}

fn generate_content_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use postilion_core::{MessageAttachment, MessagePriority};

    use super::*;

    fn base_message() -> OutboundMessage {
        OutboundMessage::new("sender@example.com", "Subject")
            .with_from_name("Sender")
            .with_return_path("bounce@example.com")
            .with_recipient("user@example.com")
    }

    #[test]
    fn html_message_gets_plain_alternative() {
        let message = base_message()
            .with_html_body("<p>Hi</p>")
            .with_plain_body("Hi");
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.html_body(), Some("<p>Hi</p>"));
        assert_eq!(envelope.plain_body(), Some("Hi"));
    }

    #[test]
    fn html_message_with_empty_plain_has_no_alternative() {
        let message = base_message().with_html_body("<p>Hi</p>").with_plain_body("");
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.html_body(), Some("<p>Hi</p>"));
        assert!(envelope.plain_body().is_none());
    }

    #[test]
    fn plain_message_sets_plain_body_only() {
        let message = base_message().with_plain_body("Hi");
        let envelope = Envelope::from_message(&message);
        assert!(envelope.html_body().is_none());
        assert_eq!(envelope.plain_body(), Some("Hi"));
    }

    #[test]
    fn priority_header_is_injected() {
        let message = base_message().with_priority(MessagePriority::Highest);
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.header(PRIORITY_HEADER), Some("1"));
    }

    #[test]
    fn caller_priority_header_wins() {
        let message = base_message()
            .with_priority(MessagePriority::Normal)
            .with_header(PRIORITY_HEADER, "5");
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.header(PRIORITY_HEADER), Some("5"));
        // Replaced in place, not appended.
        let priority_entries = envelope
            .headers()
            .iter()
            .filter(|(k, _)| k == PRIORITY_HEADER)
            .count();
        assert_eq!(priority_entries, 1);
    }

    #[test]
    fn caller_headers_copied_verbatim() {
        let message = base_message().with_header("X-Campaign", "launch");
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.header("X-Campaign"), Some("launch"));
    }

    #[test]
    fn recipients_become_to_entries_with_empty_name() {
        let message = base_message().with_recipient("second@example.com");
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.to().len(), 2);
        assert!(envelope.to().iter().all(|a| a.name.is_empty()));
        assert_eq!(envelope.to()[1].address, "second@example.com");
    }

    #[test]
    fn sender_and_bounce_come_from_return_path() {
        let envelope = Envelope::from_message(&base_message());
        assert_eq!(envelope.sender(), "bounce@example.com");
        assert_eq!(envelope.bounce_address(), "bounce@example.com");
    }

    #[test]
    fn set_return_path_updates_both_fields() {
        let mut envelope = Envelope::from_message(&base_message());
        envelope.set_return_path("postmaster@example.com");
        assert_eq!(envelope.sender(), "postmaster@example.com");
        assert_eq!(envelope.bounce_address(), "postmaster@example.com");
    }

    #[test]
    fn inline_attachment_is_embedded_and_substituted() {
        let message = base_message()
            .with_html_body(r#"<img src="logo"> logo"#)
            .with_attachment(MessageAttachment::inline("logo.png", vec![1, 2], "logo"));
        let envelope = Envelope::from_message(&message);

        assert_eq!(envelope.embedded().len(), 1);
        let generated = &envelope.embedded()[0].content_id;
        assert_ne!(generated, "logo");

        let html = envelope.html_body().unwrap();
        assert!(!html.contains("logo"));
        assert_eq!(html.matches(&format!("cid:{generated}")).count(), 2);
    }

    #[test]
    fn substitution_applies_to_plain_alternative_too() {
        let message = base_message()
            .with_html_body("see logo")
            .with_plain_body("see logo")
            .with_attachment(MessageAttachment::inline("logo.png", vec![1], "logo"));
        let envelope = Envelope::from_message(&message);
        let generated = envelope.embedded()[0].content_id.clone();
        assert_eq!(envelope.plain_body(), Some(format!("see cid:{generated}").as_str()));
    }

    #[test]
    fn inline_attachment_without_content_id_is_dropped() {
        let mut attachment = MessageAttachment::data("logo.png", vec![1]);
        attachment.inline = true;
        let message = base_message().with_html_body("logo").with_attachment(attachment);
        let envelope = Envelope::from_message(&message);

        assert!(envelope.attachments().is_empty());
        assert!(envelope.embedded().is_empty());
        assert_eq!(envelope.html_body(), Some("logo"));
    }

    #[test]
    fn inline_attachment_with_empty_content_id_is_dropped() {
        let message = base_message()
            .with_html_body("logo")
            .with_attachment(MessageAttachment::inline("logo.png", vec![1], ""));
        let envelope = Envelope::from_message(&message);

        assert!(envelope.embedded().is_empty());
        assert_eq!(envelope.html_body(), Some("logo"));
    }

    #[test]
    fn mixed_attachment_scenario() {
        let message = base_message()
            .with_recipient("second@example.com")
            .with_html_body(r#"<img src="logo">"#)
            .with_attachment(MessageAttachment::data("report.pdf", vec![1, 2, 3]))
            .with_attachment(MessageAttachment::inline("logo.png", vec![4, 5], "logo"));
        let envelope = Envelope::from_message(&message);

        assert_eq!(envelope.to().len(), 2);
        assert_eq!(envelope.attachments().len(), 1);
        assert_eq!(envelope.attachments()[0].name, "report.pdf");
        assert_eq!(envelope.embedded().len(), 1);

        let generated = &envelope.embedded()[0].content_id;
        let html = envelope.html_body().unwrap();
        assert!(!html.contains("\"logo\""));
        assert!(html.contains(&format!("cid:{generated}")));
    }

    #[test]
    fn generated_content_ids_are_unique() {
        let message = base_message()
            .with_html_body("a b")
            .with_attachment(MessageAttachment::inline("a.png", vec![1], "a"))
            .with_attachment(MessageAttachment::inline("b.png", vec![2], "b"));
        let envelope = Envelope::from_message(&message);
        assert_eq!(envelope.embedded().len(), 2);
        assert_ne!(envelope.embedded()[0].content_id, envelope.embedded()[1].content_id);
    }
}
