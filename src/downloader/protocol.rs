// Selection-action tokens exchanged with the chat UI
//
// Tokens ride inside callback payloads with a hard 64-byte platform
// limit, so the wire form is compact JSON with single-letter keys.
// Renditions whose token would not fit are excluded at catalog-build
// time; that is graceful degradation, not an error.

use serde_json::json;

use super::errors::ProtocolError;

/// Host UI payload limit in bytes.
pub const MAX_TOKEN_BYTES: usize = 64;

/// One user action, decoded from a pressed control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PickRendition { rendition_id: String },
    DownloadSafe,
    DownloadBest,
    DownloadAny,
    DownloadAudio,
    FetchThumbnail,
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Self::PickRendition { rendition_id } => {
                json!({ "a": "p", "f": rendition_id }).to_string()
            }
            Self::DownloadSafe => json!({ "a": "s" }).to_string(),
            Self::DownloadBest => json!({ "a": "b" }).to_string(),
            Self::DownloadAny => json!({ "a": "y" }).to_string(),
            Self::DownloadAudio => json!({ "a": "m" }).to_string(),
            Self::FetchThumbnail => json!({ "a": "t" }).to_string(),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| ProtocolError::Malformed)?;
        let kind = value["a"].as_str().ok_or(ProtocolError::Malformed)?;

        match kind {
            "p" => {
                let rendition_id = value["f"]
                    .as_str()
                    .ok_or(ProtocolError::Malformed)?
                    .to_string();
                Ok(Self::PickRendition { rendition_id })
            }
            "s" => Ok(Self::DownloadSafe),
            "b" => Ok(Self::DownloadBest),
            "y" => Ok(Self::DownloadAny),
            "m" => Ok(Self::DownloadAudio),
            "t" => Ok(Self::FetchThumbnail),
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }
}

/// Whether the encoded form stays within the platform payload limit.
pub fn fits_payload_limit(action: &Action) -> bool {
    action.encode().len() <= MAX_TOKEN_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_action() {
        let actions = [
            Action::PickRendition {
                rendition_id: "137".to_string(),
            },
            Action::DownloadSafe,
            Action::DownloadBest,
            Action::DownloadAny,
            Action::DownloadAudio,
            Action::FetchThumbnail,
        ];

        for action in actions {
            let encoded = action.encode();
            assert!(encoded.len() <= MAX_TOKEN_BYTES, "token too long: {encoded}");
            assert_eq!(Action::decode(&encoded).expect("decodes"), action);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert_eq!(Action::decode("{nope"), Err(ProtocolError::Malformed));
    }

    #[test]
    fn test_decode_rejects_unknown_action() {
        assert_eq!(
            Action::decode(r#"{"a":"z"}"#),
            Err(ProtocolError::UnknownAction("z".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_pick_without_id() {
        assert_eq!(Action::decode(r#"{"a":"p"}"#), Err(ProtocolError::Malformed));
    }

    #[test]
    fn test_oversized_rendition_id_detected() {
        let action = Action::PickRendition {
            rendition_id: "x".repeat(80),
        };
        assert!(!fits_payload_limit(&action));
    }
}
