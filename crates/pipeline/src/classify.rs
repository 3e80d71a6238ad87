//! Sprite-role classification by storage path shape.
//!
//! Upstream gives no structured role for a sprite URL, only a path. Roles
//! are recognised with an ordered list of rules; the first rule whose
//! pattern matches decides. Paths no rule recognises have no role and leave
//! projections untouched.

use crate::consts::{FRONT_DEFAULT_REGEX, OFFICIAL_ARTWORK_REGEX, POKEMON_SPRITE_REGEX};
use pokemirror_cache::SpriteRole;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    role: SpriteRole,
}

impl Rule {
    pub fn new(pattern: Regex, role: SpriteRole) -> Self {
        Self { pattern, role }
    }

    pub fn role(&self) -> SpriteRole {
        self.role
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    /// Official artwork first: artwork paths also live under `pokemon/`.
    fn default() -> Self {
        Self::new(vec![
            Rule::new(OFFICIAL_ARTWORK_REGEX.clone(), SpriteRole::OfficialArtwork),
            Rule::new(POKEMON_SPRITE_REGEX.clone(), SpriteRole::FrontDefault),
            Rule::new(FRONT_DEFAULT_REGEX.clone(), SpriteRole::FrontDefault),
        ])
    }
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn classify(&self, path: &str) -> Option<SpriteRole> {
        self.rules.iter().find(|rule| rule.matches(path)).map(Rule::role)
    }
}
