use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Metadata for a binary asset copied into blob storage.
///
/// `source_url` identifies the asset; `(bucket, path)` is where the bytes
/// live. Two assets may share a path when their content hashes match.
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredAsset {
    /// Assigned by the database; `None` until stored.
    pub id: Option<i64>,
    pub asset_kind: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<i64>,
    pub source_url: String,
    pub bucket: String,
    pub path: String,
    pub content_type: Option<String>,
    pub byte_size: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub content_hash: String,
    pub updated_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct AssetRow {
    pub(crate) id: i64,
    pub(crate) asset_kind: String,
    pub(crate) resource_type: Option<String>,
    pub(crate) resource_id: Option<i64>,
    pub(crate) source_url: String,
    pub(crate) bucket: String,
    pub(crate) path: String,
    pub(crate) content_type: Option<String>,
    pub(crate) byte_size: i64,
    pub(crate) content_hash: String,
    pub(crate) updated_at: i64,
}
impl TryFrom<&MirroredAsset> for AssetRow {
    type Error = Error;
    fn try_from(asset: &MirroredAsset) -> Result<Self, Self::Error> {
        Ok(Self {
            id: asset.id.unwrap_or_default(),
            asset_kind: asset.asset_kind.clone(),
            resource_type: asset.resource_type.clone(),
            resource_id: asset.resource_id,
            source_url: asset.source_url.clone(),
            bucket: asset.bucket.clone(),
            path: asset.path.clone(),
            content_type: asset.content_type.clone(),
            byte_size: i64::try_from(asset.byte_size).or_raise(|| ErrorKind::InvalidData("byte size"))?,
            content_hash: asset.content_hash.clone(),
            updated_at: asset.updated_at.unix_timestamp(),
        })
    }
}
impl TryFrom<AssetRow> for MirroredAsset {
    type Error = Error;
    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            asset_kind: row.asset_kind,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            source_url: row.source_url,
            bucket: row.bucket,
            path: row.path,
            content_type: row.content_type,
            byte_size: u64::try_from(row.byte_size).or_raise(|| ErrorKind::InvalidData("byte size"))?,
            content_hash: row.content_hash,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}
