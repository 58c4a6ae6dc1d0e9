use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Where a message's picture comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    /// Local reference to an image the user attached.
    Preview {
        source: String,
        media_type: String,
        byte_len: usize,
    },
    /// `data:` URI returned by image synthesis.
    Generated { data_uri: String },
}

impl ImageRef {
    pub fn media_type(&self) -> Option<&str> {
        match self {
            ImageRef::Preview { media_type, .. } => Some(media_type.as_str()),
            ImageRef::Generated { data_uri } => data_uri
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .filter(|value| !value.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Pending,
    Text { text: String },
    Image { image: ImageRef },
    TextWithImage { text: String, image: ImageRef },
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        MessageBody::Text { text: text.into() }
    }

    /// Builds a terminal body; `None` when neither part is present.
    /// Empty text counts as absent.
    pub fn compose(text: Option<String>, image: Option<ImageRef>) -> Option<Self> {
        let text = text.filter(|value| !value.is_empty());
        match (text, image) {
            (Some(text), Some(image)) => Some(MessageBody::TextWithImage { text, image }),
            (Some(text), None) => Some(MessageBody::Text { text }),
            (None, Some(image)) => Some(MessageBody::Image { image }),
            (None, None) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MessageBody::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub body: MessageBody,
}

impl Message {
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text } | MessageBody::TextWithImage { text, .. } => {
                Some(text.as_str())
            }
            MessageBody::Pending | MessageBody::Image { .. } => None,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match &self.body {
            MessageBody::Image { image } | MessageBody::TextWithImage { image, .. } => Some(image),
            MessageBody::Pending | MessageBody::Text { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.body.is_pending()
    }
}
