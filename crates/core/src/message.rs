use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Content type of an outbound message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContentType {
    /// Plain-text only message.
    Plain,
    /// HTML message, optionally with a plain-text alternative part.
    Html,
}

/// Delivery priority of an outbound message.
///
/// The ordinal follows the `X-Priority` header convention: `1` is the
/// highest priority, `5` the lowest, `3` is normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Highest,
    High,
    #[default]
    Normal,
    Low,
    Lowest,
}

impl MessagePriority {
    /// The numeric ordinal used for the priority header.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Highest => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
            Self::Lowest => 5,
        }
    }
}

/// A file attached to an outbound message.
///
/// Non-inline attachments are delivered as regular data attachments.
/// Inline attachments carry a `content_id` token that the envelope builder
/// substitutes with a generated content identifier; an inline attachment
/// without a content id is dropped during envelope construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Attachment file name.
    pub name: String,
    /// Raw attachment bytes.
    pub content: Vec<u8>,
    /// Whether the attachment is embedded inline in the body.
    pub inline: bool,
    /// Content identifier token referenced from the body. Only meaningful
    /// for inline attachments.
    pub content_id: Option<String>,
}

impl MessageAttachment {
    /// Create a regular (non-inline) data attachment.
    pub fn data(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            inline: false,
            content_id: None,
        }
    }

    /// Create an inline attachment embedded under the given content id.
    pub fn inline(name: impl Into<String>, content: Vec<u8>, content_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content,
            inline: true,
            content_id: Some(content_id.into()),
        }
    }
}

/// An outbound email message as handed to the dispatch pipeline.
///
/// The message is read-only to the pipeline: the dispatcher copies it into
/// a transport envelope and never mutates it. Recipients keep their
/// insertion order and may contain duplicates; header keys are unique.
///
/// A message with [`MessageContentType::Html`] is expected to carry an
/// `html_body`; the envelope builder passes the fields through without
/// validating that contract.
///
/// # Examples
///
/// ```
/// use postilion_core::{MessagePriority, OutboundMessage};
///
/// let message = OutboundMessage::new("noreply@example.com", "Welcome")
///     .with_recipient("user@example.com")
///     .with_plain_body("Hello!")
///     .with_priority(MessagePriority::High);
/// assert_eq!(message.recipients.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Subject line.
    pub subject: String,

    /// Sender address.
    pub from_address: String,

    /// Sender display name.
    #[serde(default)]
    pub from_name: String,

    /// Character set of the message bodies. Defaults to `utf-8`.
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Return-path / bounce address. The dispatcher overrides this with its
    /// configured value before every send.
    #[serde(default)]
    pub return_path: String,

    /// Body content type.
    #[serde(default = "default_content_type")]
    pub content_type: MessageContentType,

    /// Plain-text body, or the plain alternative when `content_type` is HTML.
    pub plain_body: Option<String>,

    /// HTML body. Expected to be set when `content_type` is HTML.
    pub html_body: Option<String>,

    /// Ordered recipient addresses. Duplicates are allowed.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Additional message headers, unique by key.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Attachments, inline and regular.
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,

    /// Delivery priority.
    #[serde(default)]
    pub priority: MessagePriority,
}

fn default_charset() -> String {
    "utf-8".to_owned()
}

fn default_content_type() -> MessageContentType {
    MessageContentType::Plain
}

impl OutboundMessage {
    /// Create a new plain-text message with the given sender and subject.
    pub fn new(from_address: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            from_address: from_address.into(),
            from_name: String::new(),
            charset: default_charset(),
            return_path: String::new(),
            content_type: MessageContentType::Plain,
            plain_body: None,
            html_body: None,
            recipients: Vec::new(),
            headers: BTreeMap::new(),
            attachments: Vec::new(),
            priority: MessagePriority::default(),
        }
    }

    /// Set the sender display name.
    #[must_use]
    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    /// Override the default character set.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the return-path / bounce address.
    #[must_use]
    pub fn with_return_path(mut self, address: impl Into<String>) -> Self {
        self.return_path = address.into();
        self
    }

    /// Set the plain-text body.
    #[must_use]
    pub fn with_plain_body(mut self, body: impl Into<String>) -> Self {
        self.plain_body = Some(body.into());
        self
    }

    /// Set the HTML body and switch the content type to HTML.
    #[must_use]
    pub fn with_html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self.content_type = MessageContentType::Html;
        self
    }

    /// Append a recipient address.
    #[must_use]
    pub fn with_recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    /// Set a message header. Writing an existing key replaces its value.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Append an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: MessageAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Set the delivery priority.
    #[must_use]
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }
}
