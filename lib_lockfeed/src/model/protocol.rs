//! Push channel wire protocol. Frames are JSON text with a `type` tag.

use serde::{Deserialize, Serialize};

use super::HotAccountRecord;

/// Channel name the dashboard subscribes to on every successful open.
pub const HOT_ACCOUNTS_CHANNEL: &str = "hot-accounts";

/// Client to server frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}

impl ClientMessage {
    /// The subscription sent on entry to `Open`.
    pub fn subscribe_hot_accounts() -> Self {
        ClientMessage::Subscribe {
            channel: HOT_ACCOUNTS_CHANNEL.to_string(),
        }
    }
}

/// Server to client frames. Unknown `type` values decode to `Unknown`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Connected {
        #[serde(default)]
        message: Option<String>,
    },
    HotAccountsUpdate {
        data: Vec<HotAccountRecord>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_matches_server_contract() {
        let frame = serde_json::to_string(&ClientMessage::subscribe_hot_accounts()).unwrap();
        assert_eq!(frame, r#"{"type":"subscribe","channel":"hot-accounts"}"#);
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"pong","seq":4}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn test_error_without_message_decodes() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Error { message: None });
    }
}
