use async_trait::async_trait;
use lettre::address::Envelope as SmtpEnvelope;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info};

use postilion_core::{DispatchError, TransportError};

use crate::client::{TransportClient, TransportReceipt};
use crate::config::SmtpConfig;
use crate::envelope::Envelope;

/// SMTP transport client backed by `lettre`.
pub struct SmtpClient {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpClient")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpClient {
    /// Create a new `SmtpClient` from the given configuration.
    pub fn new(config: SmtpConfig) -> Result<Self, DispatchError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    /// Create a `SmtpClient` with a pre-built transport (for testing).
    pub fn with_transport(
        config: SmtpConfig,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    ) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl TransportClient for SmtpClient {
    async fn send(&self, envelope: &Envelope) -> Result<TransportReceipt, DispatchError> {
        debug!(subject = %envelope.subject(), "encoding SMTP message");
        let message = encode_envelope(envelope)?;
        let size = message.formatted().len();

        info!(
            recipients = envelope.to().len(),
            size, "sending email via SMTP"
        );
        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            DispatchError::Transport(map_smtp_error(&e))
        })?;

        Ok(TransportReceipt {
            message_id: None,
            size,
        })
    }

    async fn validate_connection(&self) -> Result<bool, DispatchError> {
        debug!("validating SMTP connection");
        let usable = self.transport.test_connection().await.map_err(|e| {
            error!(error = %e, "SMTP connection validation failed");
            DispatchError::Transport(TransportError::Connection(format!(
                "SMTP connection validation failed: {e}"
            )))
        })?;
        Ok(usable)
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

/// MIME content assembled for a message: either a lone part or a
/// multipart tree.
enum Content {
    Single(SinglePart),
    Multi(MultiPart),
}

/// Render a transport envelope into a `lettre` message.
///
/// Address parsing and MIME assembly happen here; failures are message
/// faults, not transport faults, and are never retried.
fn encode_envelope(envelope: &Envelope) -> Result<Message, DispatchError> {
    let mut builder = Message::builder()
        .from(mailbox(envelope.from_name(), envelope.from_address(), "from")?)
        .subject(envelope.subject());

    if !envelope.sender().is_empty() {
        builder = builder.sender(mailbox("", envelope.sender(), "sender")?);
    }

    let mut to_addresses = Vec::with_capacity(envelope.to().len());
    for entry in envelope.to() {
        let recipient = mailbox(&entry.name, &entry.address, "recipient")?;
        to_addresses.push(recipient.email.clone());
        builder = builder.to(recipient);
    }

    // The bounce address becomes the reverse path of the wire envelope.
    let reverse_path = if envelope.bounce_address().is_empty() {
        None
    } else {
        Some(parse_address(envelope.bounce_address(), "bounce")?)
    };
    let smtp_envelope = SmtpEnvelope::new(reverse_path, to_addresses)
        .map_err(|e| DispatchError::Message(format!("invalid envelope: {e}")))?;
    builder = builder.envelope(smtp_envelope);

    let charset = if envelope.charset().is_empty() {
        "utf-8"
    } else {
        envelope.charset()
    };
    let content = with_attachments(body_content(envelope, charset)?, envelope)?;

    let mut message = match content {
        Content::Single(part) => builder.singlepart(part),
        Content::Multi(multi) => builder.multipart(multi),
    }
    .map_err(|e| DispatchError::Message(format!("failed to build message: {e}")))?;

    let headers = message.headers_mut();
    for (key, value) in envelope.headers() {
        let name = HeaderName::new_from_ascii(key.clone())
            .map_err(|e| DispatchError::Message(format!("invalid header {key:?}: {e}")))?;
        headers.insert_raw(HeaderValue::new(name, value.clone()));
    }

    Ok(message)
}

/// Body parts for the envelope's content type, with embedded attachments
/// grouped into a related multipart around the primary body.
fn body_content(envelope: &Envelope, charset: &str) -> Result<Content, DispatchError> {
    let plain_type = format!("text/plain; charset={charset}");
    let html_type = format!("text/html; charset={charset}");

    match (envelope.html_body(), envelope.plain_body()) {
        (Some(html), Some(plain)) => {
            let alternative =
                MultiPart::alternative().singlepart(text_part(plain, &plain_type)?);
            Ok(match related_content(text_part(html, &html_type)?, envelope)? {
                Content::Single(part) => Content::Multi(alternative.singlepart(part)),
                Content::Multi(multi) => Content::Multi(alternative.multipart(multi)),
            })
        }
        (Some(html), None) => related_content(text_part(html, &html_type)?, envelope),
        (None, Some(plain)) => related_content(text_part(plain, &plain_type)?, envelope),
        (None, None) => related_content(text_part("", &plain_type)?, envelope),
    }
}

/// Wrap the primary body part with the envelope's embedded attachments.
fn related_content(part: SinglePart, envelope: &Envelope) -> Result<Content, DispatchError> {
    if envelope.embedded().is_empty() {
        return Ok(Content::Single(part));
    }
    let mut related = MultiPart::related().singlepart(part);
    for embedded in envelope.embedded() {
        related = related.singlepart(
            Attachment::new_inline(embedded.content_id.clone()).body(
                Body::new(embedded.content.clone()),
                content_type("application/octet-stream")?,
            ),
        );
    }
    Ok(Content::Multi(related))
}

/// Append regular data attachments in a mixed multipart.
fn with_attachments(content: Content, envelope: &Envelope) -> Result<Content, DispatchError> {
    if envelope.attachments().is_empty() {
        return Ok(content);
    }
    let mut mixed = match content {
        Content::Single(part) => MultiPart::mixed().singlepart(part),
        Content::Multi(multi) => MultiPart::mixed().multipart(multi),
    };
    for attachment in envelope.attachments() {
        mixed = mixed.singlepart(Attachment::new(attachment.name.clone()).body(
            Body::new(attachment.content.clone()),
            content_type("application/octet-stream")?,
        ));
    }
    Ok(Content::Multi(mixed))
}

fn text_part(content: &str, mime: &str) -> Result<SinglePart, DispatchError> {
    Ok(SinglePart::builder()
        .header(content_type(mime)?)
        .body(content.to_owned()))
}

fn content_type(value: &str) -> Result<ContentType, DispatchError> {
    ContentType::parse(value)
        .map_err(|e| DispatchError::Message(format!("invalid content type {value:?}: {e}")))
}

fn parse_address(address: &str, role: &str) -> Result<Address, DispatchError> {
    address
        .parse()
        .map_err(|e| DispatchError::Message(format!("invalid {role} address {address:?}: {e}")))
}

fn mailbox(name: &str, address: &str, role: &str) -> Result<Mailbox, DispatchError> {
    let name = (!name.is_empty()).then(|| name.to_owned());
    Ok(Mailbox::new(name, parse_address(address, role)?))
}

/// Build an async SMTP transport from the given configuration.
fn build_transport(
    config: &SmtpConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
    let builder = if config.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| DispatchError::Configuration(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Classify a `lettre` SMTP error as a transport fault.
fn map_smtp_error(error: &lettre::transport::smtp::Error) -> TransportError {
    let message = error.to_string();

    if error.is_transient() {
        TransportError::Rejected(format!("transient SMTP rejection: {message}"))
    } else if error.is_permanent() {
        TransportError::Rejected(format!("permanent SMTP rejection: {message}"))
    } else {
        // Covers TLS, connection, and response parsing errors.
        TransportError::Connection(format!("SMTP error: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use postilion_core::{MessageAttachment, OutboundMessage};

    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig::new("localhost").with_port(2525).with_tls(false)
    }

    fn base_message() -> OutboundMessage {
        OutboundMessage::new("sender@example.com", "Test Subject")
            .with_from_name("Sender")
            .with_return_path("bounce@example.com")
            .with_recipient("recipient@example.com")
            .with_plain_body("Hello, world!")
    }

    fn formatted(envelope: &Envelope) -> String {
        let message = encode_envelope(envelope).unwrap();
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn encode_plain_message() {
        let envelope = Envelope::from_message(&base_message());
        let message = encode_envelope(&envelope).unwrap();
        assert!(!message.formatted().is_empty());
    }

    #[test]
    fn encode_html_with_alternative_is_multipart() {
        let message = base_message().with_html_body("<p>Hello</p>");
        let envelope = Envelope::from_message(&message);
        let raw = formatted(&envelope);
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn priority_header_appears_in_output() {
        let envelope = Envelope::from_message(&base_message());
        let raw = formatted(&envelope);
        assert!(raw.contains("X-Priority: 3"));
    }

    #[test]
    fn caller_header_appears_in_output() {
        let message = base_message().with_header("X-Campaign", "launch");
        let envelope = Envelope::from_message(&message);
        let raw = formatted(&envelope);
        assert!(raw.contains("X-Campaign: launch"));
    }

    #[test]
    fn embedded_attachment_carries_generated_content_id() {
        let message = base_message()
            .with_html_body(r#"<img src="logo">"#)
            .with_attachment(MessageAttachment::inline("logo.png", vec![1, 2, 3], "logo"));
        let envelope = Envelope::from_message(&message);
        let content_id = envelope.embedded()[0].content_id.clone();

        let raw = formatted(&envelope);
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains(&content_id));
    }

    #[test]
    fn data_attachment_appears_in_mixed_multipart() {
        let message = base_message()
            .with_attachment(MessageAttachment::data("report.pdf", vec![1, 2, 3]));
        let envelope = Envelope::from_message(&message);
        let raw = formatted(&envelope);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("report.pdf"));
    }

    #[test]
    fn invalid_from_address_is_a_message_fault() {
        let mut message = base_message();
        message.from_address = "not-valid".to_owned();
        let envelope = Envelope::from_message(&message);
        let err = encode_envelope(&envelope).unwrap_err();
        assert!(matches!(err, DispatchError::Message(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_recipient_is_a_message_fault() {
        let message = base_message().with_recipient("not-valid");
        let envelope = Envelope::from_message(&message);
        let err = encode_envelope(&envelope).unwrap_err();
        assert!(matches!(err, DispatchError::Message(_)));
    }

    #[test]
    fn missing_recipients_is_a_message_fault() {
        let mut message = base_message();
        message.recipients.clear();
        let envelope = Envelope::from_message(&message);
        let err = encode_envelope(&envelope).unwrap_err();
        assert!(matches!(err, DispatchError::Message(_)));
    }

    #[test]
    fn encoded_size_is_stable_for_same_envelope() {
        let envelope = Envelope::from_message(&base_message());
        let first = encode_envelope(&envelope).unwrap().formatted().len();
        let second = encode_envelope(&envelope).unwrap().formatted().len();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn build_transport_without_tls() {
        assert!(build_transport(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn build_transport_with_credentials() {
        let config = test_config().with_credentials("user", "pass");
        assert!(build_transport(&config).is_ok());
    }

    #[tokio::test]
    async fn smtp_client_new() {
        let client = SmtpClient::new(test_config());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn smtp_client_name_and_debug() {
        let client = SmtpClient::new(test_config()).unwrap();
        assert_eq!(client.transport_name(), "smtp");
        let debug = format!("{client:?}");
        assert!(debug.contains("SmtpClient"));
        assert!(debug.contains("AsyncSmtpTransport"));
    }
}
