//! Repository for cached resources, mirrored assets and pokemon projections.
//!
//! All writes are upserts on natural keys, so concurrent workers converge on
//! the same rows without extra locking.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{AssetRow, ProjectionRow, ResourceRow};
use crate::{CachedResource, MirroredAsset, PokemonBasics, PokemonProjection, SpriteRole};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use time::UtcDateTime;

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Resource cache
    // =========================================================================

    /// Insert or replace a cached resource.
    ///
    /// A stored row is only replaced by a resource fetched at the same time
    /// or later, so a slow redelivery never overwrites a fresher document.
    /// Returns `true` if the row was written.
    pub async fn upsert_resource(&self, resource: &CachedResource) -> Result<bool> {
        let row = ResourceRow::try_from(resource)?;
        let result = sqlx::query(include_str!("../queries/upsert_resource.sql"))
            .bind(row.resource_type)
            .bind(row.resource_key)
            .bind(row.name)
            .bind(row.source_url)
            .bind(row.raw_payload)
            .bind(row.fetched_at)
            .bind(row.updated_at)
            .bind(row.schema_version)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_resource(
        &self,
        resource_type: impl AsRef<str>,
        resource_key: impl AsRef<str>,
    ) -> Result<Option<CachedResource>> {
        let row: Option<ResourceRow> = sqlx::query_as(include_str!("../queries/get_resource.sql"))
            .bind(resource_type.as_ref())
            .bind(resource_key.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CachedResource::try_from).transpose()
    }

    /// Number of cached resources per resource type.
    pub async fn count_resources_by_type(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(include_str!("../queries/count_resources_by_type.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(resource_type, total)| {
                let total = u64::try_from(total).or_raise(|| ErrorKind::InvalidData("resource count"))?;
                Ok((resource_type, total))
            })
            .collect()
    }

    // =========================================================================
    // Mirrored assets
    // =========================================================================

    pub async fn get_asset_by_source_url(&self, source_url: impl AsRef<str>) -> Result<Option<MirroredAsset>> {
        let row: Option<AssetRow> = sqlx::query_as(include_str!("../queries/get_asset_by_source_url.sql"))
            .bind(source_url.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(MirroredAsset::try_from).transpose()
    }

    /// Find the oldest asset in `bucket` whose bytes hash to `content_hash`.
    pub async fn find_asset_by_content_hash(
        &self,
        bucket: impl AsRef<str>,
        content_hash: impl AsRef<str>,
    ) -> Result<Option<MirroredAsset>> {
        let row: Option<AssetRow> = sqlx::query_as(include_str!("../queries/find_asset_by_content_hash.sql"))
            .bind(bucket.as_ref())
            .bind(content_hash.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(MirroredAsset::try_from).transpose()
    }

    /// Insert or replace the asset keyed by its `source_url`, returning its id.
    pub async fn upsert_asset(&self, asset: &MirroredAsset) -> Result<i64> {
        let row = AssetRow::try_from(asset)?;
        let (id,): (i64,) = sqlx::query_as(include_str!("../queries/upsert_asset.sql"))
            .bind(row.asset_kind)
            .bind(row.resource_type)
            .bind(row.resource_id)
            .bind(row.source_url)
            .bind(row.bucket)
            .bind(row.path)
            .bind(row.content_type)
            .bind(row.byte_size)
            .bind(row.content_hash)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    pub async fn count_assets(&self) -> Result<u64> {
        let (total,): (i64,) = sqlx::query_as(include_str!("../queries/count_assets.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(u64::try_from(total).or_raise(|| ErrorKind::InvalidData("asset count"))?)
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Insert or refresh the scalar columns of a pokemon projection.
    ///
    /// Sprite pointer columns are left untouched.
    pub async fn upsert_pokemon_basics(&self, basics: &PokemonBasics, now: UtcDateTime) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_pokemon_basics.sql"))
            .bind(basics.id)
            .bind(&basics.name)
            .bind(basics.height)
            .bind(basics.weight)
            .bind(basics.base_experience)
            .bind(basics.is_default)
            .bind(now.unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Point one sprite column of an existing projection at `path`.
    ///
    /// Returns `false` when no projection row exists for `pokemon_id`; the
    /// patch is opportunistic and never creates rows.
    pub async fn patch_pokemon_sprite(
        &self,
        pokemon_id: i64,
        role: SpriteRole,
        path: impl AsRef<str>,
        now: UtcDateTime,
    ) -> Result<bool> {
        let query = match role {
            SpriteRole::OfficialArtwork => include_str!("../queries/patch_pokemon_official_artwork.sql"),
            SpriteRole::FrontDefault => include_str!("../queries/patch_pokemon_front_default.sql"),
        };
        let result = sqlx::query(query)
            .bind(path.as_ref())
            .bind(now.unix_timestamp())
            .bind(pokemon_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_pokemon(&self, pokemon_id: i64) -> Result<Option<PokemonProjection>> {
        let row: Option<ProjectionRow> = sqlx::query_as(include_str!("../queries/get_pokemon.sql"))
            .bind(pokemon_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(PokemonProjection::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use time::Duration;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn resource(key: &str, payload: serde_json::Value, fetched_at: UtcDateTime) -> CachedResource {
        CachedResource::fetched(
            "type",
            key,
            payload.get("name").and_then(|n| n.as_str()).map(str::to_string),
            format!("https://pokeapi.co/api/v2/type/{key}/"),
            payload,
            fetched_at,
        )
    }

    fn asset(source_url: &str, path: &str, hash: &str) -> MirroredAsset {
        MirroredAsset {
            id: None,
            asset_kind: "sprite".to_string(),
            resource_type: Some("pokemon".to_string()),
            resource_id: Some(25),
            source_url: source_url.to_string(),
            bucket: "pokedex-sprites".to_string(),
            path: path.to_string(),
            content_type: Some("image/png".to_string()),
            byte_size: 128,
            content_hash: hash.to_string(),
            updated_at: UtcDateTime::now(),
        }
    }

    fn pikachu() -> PokemonBasics {
        PokemonBasics {
            id: 25,
            name: "pikachu".to_string(),
            height: Some(4),
            weight: Some(60),
            base_experience: Some(112),
            is_default: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_resource() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        assert!(repo.upsert_resource(&resource("10", json!({"id": 10, "name": "fire"}), now)).await.unwrap());
        let stored = repo.get_resource("type", "10").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("fire"));
        assert_eq!(stored.raw_payload["id"], 10);
        assert!(repo.get_resource("type", "11").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_resource_twice_keeps_one_row() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        repo.upsert_resource(&resource("10", json!({"id": 10, "name": "fire"}), now)).await.unwrap();
        repo.upsert_resource(&resource("10", json!({"id": 10, "name": "fire"}), now)).await.unwrap();
        let counts = repo.count_resources_by_type().await.unwrap();
        assert_eq!(counts.get("type"), Some(&1));
    }

    #[rstest]
    #[case::newer_fetch_wins(Duration::seconds(60), "newer")]
    #[case::same_instant_wins(Duration::ZERO, "newer")]
    #[case::older_fetch_loses(Duration::seconds(-60), "older-first")]
    #[tokio::test]
    async fn test_last_write_wins_by_fetch_time(#[case] offset: Duration, #[case] expected: &str) {
        let repo = repo().await;
        let first = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        repo.upsert_resource(&resource("10", json!({"id": 10, "name": "older-first"}), first)).await.unwrap();
        repo.upsert_resource(&resource("10", json!({"id": 10, "name": "newer"}), first + offset)).await.unwrap();
        let stored = repo.get_resource("type", "10").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn test_count_resources_by_type() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        for key in ["1", "2", "3"] {
            repo.upsert_resource(&resource(key, json!({"id": key}), now)).await.unwrap();
        }
        let mut stat = resource("1", json!({"id": 1}), now);
        stat.resource_type = "stat".to_string();
        repo.upsert_resource(&stat).await.unwrap();
        let counts = repo.count_resources_by_type().await.unwrap();
        assert_eq!(counts, BTreeMap::from([("stat".to_string(), 1), ("type".to_string(), 3)]));
    }

    #[tokio::test]
    async fn test_asset_upsert_is_keyed_by_source_url() {
        let repo = repo().await;
        let url = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/25.png";
        let first = repo.upsert_asset(&asset(url, "pokemon/25/pokemon/25.png", "aa")).await.unwrap();
        let second = repo.upsert_asset(&asset(url, "pokemon/25/elsewhere.png", "aa")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.count_assets().await.unwrap(), 1);
        let stored = repo.get_asset_by_source_url(url).await.unwrap().unwrap();
        assert_eq!(stored.id, Some(first));
        assert_eq!(stored.path, "pokemon/25/elsewhere.png");
    }

    #[tokio::test]
    async fn test_find_asset_by_content_hash_is_scoped_to_bucket() {
        let repo = repo().await;
        repo.upsert_asset(&asset("https://example.test/a.png", "a.png", "cafe")).await.unwrap();
        repo.upsert_asset(&asset("https://example.test/b.png", "b.png", "cafe")).await.unwrap();
        let found = repo.find_asset_by_content_hash("pokedex-sprites", "cafe").await.unwrap().unwrap();
        assert_eq!(found.path, "a.png");
        assert!(repo.find_asset_by_content_hash("other", "cafe").await.unwrap().is_none());
        assert!(repo.find_asset_by_content_hash("pokedex-sprites", "beef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_sprite_requires_existing_projection() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        let patched = repo.patch_pokemon_sprite(25, SpriteRole::FrontDefault, "p.png", now).await.unwrap();
        assert!(!patched);
        assert!(repo.get_pokemon(25).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_sprite_sets_only_its_column() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        repo.upsert_pokemon_basics(&pikachu(), now).await.unwrap();
        let path = "pokemon/25/other/official-artwork/25.png";
        assert!(repo.patch_pokemon_sprite(25, SpriteRole::OfficialArtwork, path, now).await.unwrap());
        let projection = repo.get_pokemon(25).await.unwrap().unwrap();
        assert_eq!(projection.sprite_path(SpriteRole::OfficialArtwork), Some(path));
        assert_eq!(projection.sprite_path(SpriteRole::FrontDefault), None);
    }

    #[tokio::test]
    async fn test_basics_upsert_preserves_sprite_columns() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        repo.upsert_pokemon_basics(&pikachu(), now).await.unwrap();
        repo.patch_pokemon_sprite(25, SpriteRole::FrontDefault, "pokemon/25/pokemon/25.png", now).await.unwrap();
        let mut renamed = pikachu();
        renamed.weight = Some(61);
        repo.upsert_pokemon_basics(&renamed, now).await.unwrap();
        let projection = repo.get_pokemon(25).await.unwrap().unwrap();
        assert_eq!(projection.basics.weight, Some(61));
        assert_eq!(projection.sprite_front_default_path.as_deref(), Some("pokemon/25/pokemon/25.png"));
    }
}
