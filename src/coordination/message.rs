use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "start_test")]
    Start,
    #[serde(rename = "stop_test")]
    Stop,
}

/// Wire form: `{"Command":"start_test","TestID":"<id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    #[serde(rename = "Command")]
    pub command: Command,
    #[serde(rename = "TestID")]
    pub test_id: String,
}

impl CommandMessage {
    pub fn start(test_id: &str) -> Self {
        Self {
            command: Command::Start,
            test_id: test_id.to_string(),
        }
    }

    pub fn stop(test_id: &str) -> Self {
        Self {
            command: Command::Stop,
            test_id: test_id.to_string(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn encodes_exact_wire_form() {
        assert_eq!(
            CommandMessage::start("t1").encode().unwrap(),
            r#"{"Command":"start_test","TestID":"t1"}"#
        );
        assert_eq!(
            CommandMessage::stop("t1").encode().unwrap(),
            r#"{"Command":"stop_test","TestID":"t1"}"#
        );
    }

    #[test]
    fn decodes_controller_message() {
        let m = CommandMessage::decode(r#"{"TestID":"load-7","Command":"stop_test"}"#).unwrap();
        assert_eq!(m, CommandMessage::stop("load-7"));
    }

    #[test]
    fn unknown_command_is_a_decode_error() {
        let err = CommandMessage::decode(r#"{"Command":"pause","TestID":"t"}"#).unwrap_err();
        assert!(matches!(err, Error::ProtocolDecode(_)));
    }

    #[test]
    fn missing_field_is_a_decode_error() {
        assert!(CommandMessage::decode(r#"{"Command":"start_test"}"#).is_err());
        assert!(CommandMessage::decode("not json").is_err());
    }
}
