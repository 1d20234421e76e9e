//! Upload form of a finished replay.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CodecResult;
use crate::legacy::{decode_actions, LegacyReplay, ReplayMeta};

/// Base64 payload, its content hash and the header as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayExport {
    pub data: String,
    pub hash: String,
    pub game_time_ms: u32,
    pub config: String,
}

impl ReplayExport {
    /// Export raw stream bytes with a header.
    pub fn new<C: Serialize>(bytes: &[u8], config: &C, game_time_ms: u32) -> CodecResult<Self> {
        let data = STANDARD.encode(bytes);
        Ok(Self {
            hash: content_hash(data.as_bytes()),
            data,
            game_time_ms,
            config: serde_json::to_string(config)?,
        })
    }

    pub fn from_legacy(replay: &LegacyReplay) -> CodecResult<Self> {
        Self::new(&replay.encode()?, &replay.meta, replay.game_time_ms())
    }

    /// Raw stream bytes.
    pub fn bytes(&self) -> CodecResult<Vec<u8>> {
        decode_blob(&self.data)
    }

    /// Whether `hash` still matches `data`.
    pub fn verify(&self) -> bool {
        content_hash(self.data.as_bytes()) == self.hash
    }
}

pub fn decode_blob(data: &str) -> CodecResult<Vec<u8>> {
    Ok(STANDARD.decode(data.trim())?)
}

/// Lowercase hex SHA-256.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stored replay file: header `c` and Base64 stream `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayInfo {
    pub c: ReplayMeta,
    pub d: String,
}

impl ReplayInfo {
    pub fn from_legacy(replay: &LegacyReplay) -> CodecResult<Self> {
        Ok(Self {
            c: replay.meta.clone(),
            d: STANDARD.encode(replay.encode()?),
        })
    }

    pub fn from_json(json: &str) -> CodecResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> CodecResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(&self) -> CodecResult<LegacyReplay> {
        let actions = decode_actions(&decode_blob(&self.d)?)?;
        Ok(LegacyReplay::new(self.c.clone(), actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use blockstack_types::{ActionKind, GameMode, ReplayAction};

    fn replay() -> LegacyReplay {
        LegacyReplay::new(
            ReplayMeta::new("abc123", GameMode::Sprint),
            vec![
                ReplayAction::new(0, ActionKind::MoveLeft),
                ReplayAction::new(120, ActionKind::HardDrop),
            ],
        )
    }

    #[test]
    fn export_decodes_to_the_same_actions() {
        let replay = replay();
        let export = ReplayExport::from_legacy(&replay).unwrap();
        assert!(export.verify());
        assert_eq!(export.game_time_ms, 120);
        assert_eq!(decode_actions(&export.bytes().unwrap()).unwrap(), replay.actions);

        let config: ReplayMeta = serde_json::from_str(&export.config).unwrap();
        assert_eq!(config, replay.meta);
    }

    #[test]
    fn tampered_data_fails_verification() {
        let mut export = ReplayExport::from_legacy(&replay()).unwrap();
        export.data.push_str("AA==");
        assert!(!export.verify());
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn replay_file_round_trips() {
        let info = ReplayInfo::from_legacy(&replay()).unwrap();
        let parsed = ReplayInfo::from_json(&info.to_json().unwrap()).unwrap();
        assert_eq!(parsed.decode().unwrap(), replay());
        assert!(matches!(
            decode_blob("not base64!"),
            Err(CodecError::Base64(_))
        ));
    }
}
