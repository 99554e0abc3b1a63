//! Typed streaming messages.
//!
//! Inbound JSON frames decode into [`StreamMessage`]; anything with an unrecognised or
//! malformed shape becomes [`StreamMessage::Unknown`] instead of an error. Outbound
//! control messages are [`ClientMessage`]s, serialized with a `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One alternative inside a `Results` channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultsChannel {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

/// Inbound message, keyed by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StreamMessage {
    Welcome {
        #[serde(default)]
        request_id: Option<String>,
    },
    Connected {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    SettingsApplied,
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Warning {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    ConversationText {
        role: String,
        content: String,
    },
    TurnInfo {
        event: String,
        #[serde(default)]
        turn_index: Option<u64>,
        #[serde(default)]
        transcript: Option<String>,
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    Metadata {
        #[serde(default)]
        request_id: Option<String>,
    },
    Results {
        #[serde(default)]
        is_final: Option<bool>,
        #[serde(default)]
        speech_final: Option<bool>,
        #[serde(default)]
        channel: Option<ResultsChannel>,
    },
    AgentAudioDone,
    UserStartedSpeaking,
    AgentThinking {
        #[serde(default)]
        content: Option<String>,
    },
    AgentStartedSpeaking,
    Flushed {
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    Cleared {
        #[serde(default)]
        sequence_id: Option<u64>,
    },
    /// Anything not matching a known shape.
    #[serde(skip)]
    Unknown { kind: Option<String>, raw: Value },
}

impl StreamMessage {
    /// Decode a JSON value, never failing.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self::Unknown {
            kind: value.get("type").and_then(Value::as_str).map(str::to_string),
            raw: value.clone(),
        })
    }

    /// The discriminator, `None` only for untyped unknown messages.
    pub fn kind(&self) -> Option<&str> {
        Some(match self {
            Self::Welcome { .. } => "Welcome",
            Self::Connected { .. } => "Connected",
            Self::SettingsApplied => "SettingsApplied",
            Self::Error { .. } => "Error",
            Self::Warning { .. } => "Warning",
            Self::ConversationText { .. } => "ConversationText",
            Self::TurnInfo { .. } => "TurnInfo",
            Self::Metadata { .. } => "Metadata",
            Self::Results { .. } => "Results",
            Self::AgentAudioDone => "AgentAudioDone",
            Self::UserStartedSpeaking => "UserStartedSpeaking",
            Self::AgentThinking { .. } => "AgentThinking",
            Self::AgentStartedSpeaking => "AgentStartedSpeaking",
            Self::Flushed { .. } => "Flushed",
            Self::Cleared { .. } => "Cleared",
            Self::Unknown { kind, .. } => return kind.as_deref(),
        })
    }

    /// First alternative's transcript of a `Results` message.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Self::Results { channel: Some(channel), .. } => {
                channel.alternatives.first().map(|a| a.transcript.as_str())
            }
            Self::TurnInfo { transcript, .. } => transcript.as_deref(),
            _ => None,
        }
    }

    pub fn is_final_result(&self) -> bool {
        matches!(self, Self::Results { is_final: Some(true), .. })
    }
}

/// Outbound control message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Settings {
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<Value>,
    },
    InjectUserMessage {
        content: String,
    },
    Speak {
        text: String,
    },
    Flush,
    Clear,
    Close,
    KeepAlive,
    CloseStream,
}

impl ClientMessage {
    pub fn inject_user_message(content: impl Into<String>) -> Self {
        Self::InjectUserMessage { content: content.into() }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        Self::Speak { text: text.into() }
    }
}
