use crate::error::{Error, ErrorKind};
use derive_more::Display;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// Which sprite pointer column an asset fills on a pokemon projection.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpriteRole {
    #[display("official-artwork")]
    OfficialArtwork,
    #[display("front-default")]
    FrontDefault,
}

/// The scalar fields of a pokemon, as taken from its upstream document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokemonBasics {
    pub id: i64,
    pub name: String,
    pub height: Option<i64>,
    pub weight: Option<i64>,
    pub base_experience: Option<i64>,
    pub is_default: bool,
}

impl PokemonBasics {
    /// Reads the basic fields from a `pokemon` document. Returns `None` when
    /// the document has no numeric `id` or no `name`.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        Some(Self {
            id: payload.get("id")?.as_i64()?,
            name: payload.get("name")?.as_str()?.to_string(),
            height: payload.get("height").and_then(serde_json::Value::as_i64),
            weight: payload.get("weight").and_then(serde_json::Value::as_i64),
            base_experience: payload.get("base_experience").and_then(serde_json::Value::as_i64),
            is_default: payload.get("is_default").and_then(serde_json::Value::as_bool).unwrap_or(true),
        })
    }
}

/// A denormalised pokemon row.
#[derive(Debug, Clone, PartialEq)]
pub struct PokemonProjection {
    pub basics: PokemonBasics,
    pub sprite_official_artwork_path: Option<String>,
    pub sprite_front_default_path: Option<String>,
    pub updated_at: UtcDateTime,
}

impl PokemonProjection {
    pub fn sprite_path(&self, role: SpriteRole) -> Option<&str> {
        match role {
            SpriteRole::OfficialArtwork => self.sprite_official_artwork_path.as_deref(),
            SpriteRole::FrontDefault => self.sprite_front_default_path.as_deref(),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProjectionRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) height: Option<i64>,
    pub(crate) weight: Option<i64>,
    pub(crate) base_experience: Option<i64>,
    pub(crate) is_default: bool,
    pub(crate) sprite_official_artwork_path: Option<String>,
    pub(crate) sprite_front_default_path: Option<String>,
    pub(crate) updated_at: i64,
}
impl TryFrom<ProjectionRow> for PokemonProjection {
    type Error = Error;
    fn try_from(row: ProjectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            basics: PokemonBasics {
                id: row.id,
                name: row.name,
                height: row.height,
                weight: row.weight,
                base_experience: row.base_experience,
                is_default: row.is_default,
            },
            sprite_official_artwork_path: row.sprite_official_artwork_path,
            sprite_front_default_path: row.sprite_front_default_path,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}
