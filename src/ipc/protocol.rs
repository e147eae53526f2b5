//! JSON-lines protocol between the CLI and a running relay.

use serde::{Deserialize, Serialize};

/// Commands sent by the CLI to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Enable translation
    Start,
    /// Disable translation; sessions in progress finish normally
    Stop,
    Status,
    /// Read one setting, or all of them when `key` is absent
    Get {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    Set {
        key: String,
        value: String,
    },
    Help,
    /// Stop the relay after queued playback finishes
    Shutdown,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok {
        message: String,
    },
    Status {
        translation_enabled: bool,
        queue_depth: usize,
        playing: bool,
        played: u64,
        failed: u64,
        active_sessions: Vec<String>,
        /// The one-line `key=value | ...` rendering
        summary: String,
    },
    Settings {
        entries: Vec<(String, String)>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::Ok {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_format_examples() {
        assert_eq!(Command::Start.to_json().unwrap(), r#"{"type":"start"}"#);
        assert_eq!(Command::Status.to_json().unwrap(), r#"{"type":"status"}"#);
        assert_eq!(
            Command::Get { key: None }.to_json().unwrap(),
            r#"{"type":"get"}"#
        );
        assert_eq!(
            Command::Set {
                key: "tts_voice".to_string(),
                value: "nova".to_string()
            }
            .to_json()
            .unwrap(),
            r#"{"type":"set","key":"tts_voice","value":"nova"}"#
        );
    }

    #[test]
    fn test_get_without_key_parses() {
        let cmd = Command::from_json(r#"{"type":"get"}"#).unwrap();
        assert_eq!(cmd, Command::Get { key: None });

        let cmd = Command::from_json(r#"{"type":"get","key":"model"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Get {
                key: Some("model".to_string())
            }
        );
    }

    #[test]
    fn test_all_commands_roundtrip() {
        let commands = vec![
            Command::Start,
            Command::Stop,
            Command::Status,
            Command::Get {
                key: Some("silence_ms".to_string()),
            },
            Command::Set {
                key: "silence_ms".to_string(),
                value: "900".to_string(),
            },
            Command::Help,
            Command::Shutdown,
        ];
        for cmd in commands {
            let json = cmd.to_json().unwrap();
            assert_eq!(Command::from_json(&json).unwrap(), cmd, "{json}");
        }
    }

    #[test]
    fn test_invalid_json_returns_error() {
        assert!(Command::from_json(r#"{"type": "toggle"}"#).is_err());
        assert!(Command::from_json(r#"{"type": "set", "key": "x"}"#).is_err());
        assert!(Command::from_json("not json at all").is_err());
    }

    #[test]
    fn test_response_settings_roundtrip() {
        let resp = Response::Settings {
            entries: vec![
                ("language_pairs".to_string(), "en:ro,ro:en".to_string()),
                ("tts_voice".to_string(), "alloy".to_string()),
            ],
        };
        let json = resp.to_json().unwrap();
        assert!(json.contains(r#""type":"settings""#));
        assert!(json.contains(r#"["tts_voice","alloy"]"#));
        assert_eq!(Response::from_json(&json).unwrap(), resp);
    }

    #[test]
    fn test_response_status_roundtrip() {
        let resp = Response::Status {
            translation_enabled: true,
            queue_depth: 2,
            playing: true,
            played: 7,
            failed: 1,
            active_sessions: vec!["alice:capturing".to_string()],
            summary: "translation=on | queue=2".to_string(),
        };
        let json = resp.to_json().unwrap();
        assert_eq!(Response::from_json(&json).unwrap(), resp);
    }

    #[test]
    fn test_response_error_keeps_message() {
        let json = Response::error("key not supported").to_json().unwrap();
        assert_eq!(json, r#"{"type":"error","message":"key not supported"}"#);
    }
}
