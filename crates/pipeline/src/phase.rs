use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Dependency-ordered groups of resource types.
///
/// Seeding walks phases in declaration order so that vocabularies are queued
/// before the resources that reference them. The order is a scheduling hint
/// only: the cache accepts documents in any order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[display("master")]
    Master,
    #[display("reference")]
    Reference,
    #[display("species")]
    Species,
    #[display("pokemon")]
    Pokemon,
    #[display("relationships")]
    Relationships,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Master, Phase::Reference, Phase::Species, Phase::Pokemon, Phase::Relationships];

    /// The phase with this wire name, if any.
    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.to_string() == name)
    }

    pub fn resource_types(self) -> &'static [&'static str] {
        match self {
            Phase::Master => &["type", "stat", "egg-group", "growth-rate", "ability", "move"],
            Phase::Reference => &[
                "generation",
                "pokemon-color",
                "pokemon-habitat",
                "pokemon-shape",
                "item",
                "item-attribute",
                "item-category",
                "item-fling-effect",
                "location",
                "location-area",
                "pal-park-area",
                "region",
                "pokedex",
                "version",
                "version-group",
                "encounter-method",
                "encounter-condition",
                "encounter-condition-value",
                "gender",
                "nature",
                "characteristic",
                "berry",
                "berry-firmness",
                "berry-flavor",
                "contest-type",
                "contest-effect",
                "super-contest-effect",
                "machine",
                "move-ailment",
                "move-battle-style",
                "move-category",
                "move-damage-class",
                "move-learn-method",
                "move-target",
                "language",
            ],
            Phase::Species => &["pokemon-species"],
            Phase::Pokemon => &["pokemon"],
            Phase::Relationships => &["evolution-chain"],
        }
    }

    /// The phase a resource type is seeded in.
    pub fn of(resource_type: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.resource_types().contains(&resource_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case("master", Some(Phase::Master))]
    #[case("relationships", Some(Phase::Relationships))]
    #[case("Master", None)]
    #[case("backfill", None)]
    fn test_from_name(#[case] name: &str, #[case] expected: Option<Phase>) {
        assert_eq!(Phase::from_name(name), expected);
    }

    #[rstest]
    #[case("type", Some(Phase::Master))]
    #[case("berry", Some(Phase::Reference))]
    #[case("pokemon-species", Some(Phase::Species))]
    #[case("pokemon", Some(Phase::Pokemon))]
    #[case("evolution-chain", Some(Phase::Relationships))]
    #[case("pokemon-form", None)]
    fn test_phase_of(#[case] resource_type: &str, #[case] expected: Option<Phase>) {
        assert_eq!(Phase::of(resource_type), expected);
    }

    #[test]
    fn test_no_type_in_two_phases() {
        let mut seen = HashSet::new();
        for phase in Phase::ALL {
            for resource_type in phase.resource_types() {
                assert!(seen.insert(*resource_type), "{resource_type} listed twice");
            }
        }
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(Phase::Master < Phase::Relationships);
        assert_eq!(Phase::Species.to_string(), "species");
    }
}
