use derive_more::Display;
use std::borrow::Cow;

const DEAD_LETTER_SUFFIX: &str = "_dead";

/// A named partition of the queue with its own consumers.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct Lane(Cow<'static, str>);

impl Lane {
    /// Resource URLs waiting to be fetched into the cache.
    pub const INGEST: Lane = Lane(Cow::Borrowed("pokepedia_ingest"));
    /// Asset URLs waiting to be mirrored into blob storage.
    pub const SPRITES: Lane = Lane(Cow::Borrowed("pokepedia_sprites"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The lane that receives this lane's undeliverable messages.
    pub fn dead_letter(&self) -> Lane {
        Lane::new(format!("{}{DEAD_LETTER_SUFFIX}", self.0))
    }

    pub fn is_dead_letter(&self) -> bool {
        self.0.ends_with(DEAD_LETTER_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_letter_lane() {
        assert_eq!(Lane::INGEST.dead_letter().name(), "pokepedia_ingest_dead");
        assert!(Lane::SPRITES.dead_letter().is_dead_letter());
        assert!(!Lane::SPRITES.is_dead_letter());
    }

    #[test]
    fn test_owned_and_borrowed_compare_equal() {
        assert_eq!(Lane::new("pokepedia_ingest"), Lane::INGEST);
    }
}
