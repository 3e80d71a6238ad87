mod asset;
mod projection;
mod resource;

pub(crate) use self::asset::AssetRow;
pub use self::asset::MirroredAsset;
pub(crate) use self::projection::ProjectionRow;
pub use self::projection::{PokemonBasics, PokemonProjection, SpriteRole};
pub(crate) use self::resource::ResourceRow;
pub use self::resource::{CURRENT_SCHEMA_VERSION, CachedResource};
