use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Version of the stored payload layout. Bumped when the projection builder
/// needs to re-read rows written by an older pipeline.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A raw upstream JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResource {
    pub resource_type: String,
    pub resource_key: String,
    pub name: Option<String>,
    pub source_url: String,
    pub raw_payload: serde_json::Value,
    pub fetched_at: UtcDateTime,
    pub updated_at: UtcDateTime,
    pub schema_version: u32,
}

impl CachedResource {
    /// A freshly fetched document at the current schema version.
    pub fn fetched(
        resource_type: impl Into<String>,
        resource_key: impl Into<String>,
        name: Option<String>,
        source_url: impl Into<String>,
        raw_payload: serde_json::Value,
        fetched_at: UtcDateTime,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_key: resource_key.into(),
            name,
            source_url: source_url.into(),
            raw_payload,
            fetched_at,
            updated_at: fetched_at,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ResourceRow {
    pub(crate) resource_type: String,
    pub(crate) resource_key: String,
    pub(crate) name: Option<String>,
    pub(crate) source_url: String,
    pub(crate) raw_payload: String,
    pub(crate) fetched_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) schema_version: i64,
}
impl TryFrom<&CachedResource> for ResourceRow {
    type Error = Error;
    fn try_from(resource: &CachedResource) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_type: resource.resource_type.clone(),
            resource_key: resource.resource_key.clone(),
            name: resource.name.clone(),
            source_url: resource.source_url.clone(),
            raw_payload: serde_json::to_string(&resource.raw_payload)
                .or_raise(|| ErrorKind::InvalidData("raw payload"))?,
            fetched_at: resource.fetched_at.unix_timestamp(),
            updated_at: resource.updated_at.unix_timestamp(),
            schema_version: i64::from(resource.schema_version),
        })
    }
}
impl TryFrom<ResourceRow> for CachedResource {
    type Error = Error;
    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_type: row.resource_type,
            resource_key: row.resource_key,
            name: row.name,
            source_url: row.source_url,
            raw_payload: serde_json::from_str(&row.raw_payload).or_raise(|| ErrorKind::InvalidData("raw payload"))?,
            fetched_at: UtcDateTime::from_unix_timestamp(row.fetched_at)
                .or_raise(|| ErrorKind::InvalidData("fetch date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
            schema_version: u32::try_from(row.schema_version).or_raise(|| ErrorKind::InvalidData("schema version"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_to_row() {
        let fetched = UtcDateTime::now();
        let resource = CachedResource::fetched(
            "type",
            "10",
            Some("fire".to_string()),
            "https://pokeapi.co/api/v2/type/10/",
            json!({"id": 10, "name": "fire"}),
            fetched,
        );
        let row = ResourceRow::try_from(&resource).unwrap();
        assert_eq!(row.raw_payload, r#"{"id":10,"name":"fire"}"#);
        assert_eq!(row.fetched_at, fetched.unix_timestamp());
        assert_eq!(row.schema_version, 1);
    }

    #[test]
    fn test_row_with_corrupt_payload() {
        let row = ResourceRow {
            resource_type: "type".to_string(),
            resource_key: "10".to_string(),
            name: None,
            source_url: "https://pokeapi.co/api/v2/type/10/".to_string(),
            raw_payload: "{not json".to_string(),
            fetched_at: 0,
            updated_at: 0,
            schema_version: 1,
        };
        let err = CachedResource::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("raw payload")));
    }
}
