//! Queue message bodies for the two lanes.

use crate::Phase;
use serde::{Deserialize, Serialize};

/// A resource URL waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMessage {
    pub url: String,
    /// Falls back to the URL's path when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Free-form on the wire; the seeder writes [`Phase`] names, other
    /// producers may write anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl IngestMessage {
    pub fn known_phase(&self) -> Option<Phase> {
        self.phase.as_deref().and_then(Phase::from_name)
    }
}

/// An asset URL waiting to be mirrored.
///
/// Carries everything the sprite worker needs, so the parent document is
/// never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteMessage {
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<i64>,
    /// The default bucket is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bucket: Option<String>,
    pub target_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ingest_wire_format() {
        let message = IngestMessage {
            url: "https://pokeapi.co/api/v2/type/1/".to_string(),
            resource_type: Some("type".to_string()),
            phase: Some(Phase::Master.to_string()),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"url": "https://pokeapi.co/api/v2/type/1/", "resource_type": "type", "phase": "master"})
        );
    }

    #[test]
    fn test_ingest_accepts_foreign_phase() {
        let message: IngestMessage = serde_json::from_value(json!({
            "url": "https://pokeapi.co/api/v2/type/1/",
            "resource_type": "type",
            "phase": "backfill",
        }))
        .unwrap();
        assert_eq!(message.phase.as_deref(), Some("backfill"));
        assert_eq!(message.known_phase(), None);
    }

    #[test]
    fn test_sprite_optional_fields() {
        let message: SpriteMessage = serde_json::from_value(json!({
            "source_url": "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/items/potion.png",
            "target_path": "item/17/items/potion.png",
        }))
        .unwrap();
        assert_eq!(message.target_bucket, None);
        assert_eq!(message.resource_id, None);
    }
}
