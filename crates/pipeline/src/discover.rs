//! Finding asset URLs inside upstream documents and deciding where they go.

use crate::consts::{API_PATH_REGEX, DOT_RUN_REGEX, WHITESPACE_REGEX};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Resource types whose documents carry a `sprites` field.
pub const SPRITE_BEARING_TYPES: &[&str] = &["pokemon", "pokemon-form", "item"];

/// Every distinct `http(s)://` URL inside the document's `sprites` field, in
/// first-seen order. Other resource types have no assets and yield nothing.
pub fn sprite_urls(resource_type: &str, document: &Value) -> Vec<String> {
    let mut found = Vec::new();
    if !SPRITE_BEARING_TYPES.contains(&resource_type) {
        return found;
    }
    if let Some(sprites) = document.get("sprites") {
        collect_urls(sprites, &mut HashSet::new(), &mut found);
    }
    found
}

fn collect_urls(value: &Value, seen: &mut HashSet<String>, found: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
            if (lower.starts_with("http://") || lower.starts_with("https://")) && seen.insert(s.clone()) {
                found.push(s.clone());
            }
        },
        Value::Array(items) => items.iter().for_each(|item| collect_urls(item, seen, found)),
        // serde_json keeps object keys sorted unless `preserve_order` is on;
        // either way the walk is deterministic.
        Value::Object(map) => map.values().for_each(|item| collect_urls(item, seen, found)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {},
    }
}

/// Storage path for an asset: `{resource_type}/{resource_id}/{tail}`.
///
/// `tail` is the source URL's path after its `sprites` segment, or its last
/// three segments when there is none. Whitespace becomes `-` and runs of dots
/// collapse to one, so the result never climbs out of its directory.
pub fn target_path(resource_type: &str, resource_id: &str, source_url: &str) -> String {
    let segments: Vec<String> = match Url::parse(source_url) {
        Ok(url) => url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    let tail = match segments.iter().position(|s| s == "sprites") {
        Some(index) => &segments[index + 1..],
        None => &segments[segments.len().saturating_sub(3)..],
    };
    let tail = if tail.is_empty() { "unknown".to_string() } else { tail.join("/") };
    let path = format!("{resource_type}/{resource_id}/{tail}");
    let path = DOT_RUN_REGEX.replace_all(&path, ".");
    WHITESPACE_REGEX.replace_all(&path, "-").into_owned()
}

/// Resource type and key encoded in an API URL (`…/api/v2/{type}/{key}/`).
pub fn parse_api_url(url: &str) -> (Option<String>, Option<String>) {
    let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_else(|_| url.to_string());
    match API_PATH_REGEX.captures(&path) {
        Some(captures) => (
            captures.get(1).map(|m| m.as_str().to_string()),
            captures.get(2).map(|m| m.as_str().to_string()),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const BASE: &str = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites";

    #[test]
    fn test_sprite_urls_walks_nested_structure() {
        let document = json!({
            "id": 25,
            "sprites": {
                "front_default": format!("{BASE}/pokemon/25.png"),
                "back_default": null,
                "other": {
                    "official-artwork": {"front_default": format!("{BASE}/pokemon/other/official-artwork/25.png")},
                    "showdown": {"front_default": format!("{BASE}/pokemon/25.png")}
                },
                "versions": [{"icon": format!("{BASE}/pokemon/versions/generation-viii/icons/25.png")}, "not a url"]
            }
        });
        let urls = sprite_urls("pokemon", &document);
        assert_eq!(urls.len(), 3);
        assert!(urls.contains(&format!("{BASE}/pokemon/other/official-artwork/25.png")));
    }

    #[rstest]
    #[case("type")]
    #[case("pokemon-species")]
    fn test_sprite_urls_ignores_other_types(#[case] resource_type: &str) {
        let document = json!({"sprites": {"front_default": format!("{BASE}/pokemon/25.png")}});
        assert!(sprite_urls(resource_type, &document).is_empty());
    }

    #[test]
    fn test_sprite_urls_without_sprites_field() {
        assert!(sprite_urls("item", &json!({"id": 1, "name": "master-ball"})).is_empty());
    }

    #[rstest]
    #[case::official_artwork(
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork/25.png",
        "pokemon/25/pokemon/other/official-artwork/25.png"
    )]
    #[case::front_default(
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/25.png",
        "pokemon/25/pokemon/25.png"
    )]
    #[case::no_sprites_segment("https://cdn.example.test/a/b/c/d/25.png", "pokemon/25/c/d/25.png")]
    #[case::dot_runs("https://cdn.example.test/sprites/../../secret..png", "pokemon/25/secret.png")]
    #[case::whitespace("https://cdn.example.test/sprites/front%20shiny/25.png", "pokemon/25/front%20shiny/25.png")]
    #[case::unparseable("not a url", "pokemon/25/unknown")]
    fn test_target_path(#[case] source_url: &str, #[case] expected: &str) {
        assert_eq!(target_path("pokemon", "25", source_url), expected);
    }

    #[test]
    fn test_target_path_replaces_whitespace() {
        // `Url` never yields literal whitespace, but a hand-built type name can.
        assert_eq!(target_path("odd type", "1", "https://x.test/sprites/a.png"), "odd-type/1/a.png");
    }

    #[rstest]
    #[case("https://pokeapi.co/api/v2/pokemon/25/", Some("pokemon"), Some("25"))]
    #[case("https://pokeapi.co/api/v2/evolution-chain/1", Some("evolution-chain"), Some("1"))]
    #[case("https://pokeapi.co/api/v2/type", Some("type"), None)]
    #[case("https://example.test/other/thing", None, None)]
    fn test_parse_api_url(#[case] url: &str, #[case] resource_type: Option<&str>, #[case] key: Option<&str>) {
        let (parsed_type, parsed_key) = parse_api_url(url);
        assert_eq!(parsed_type.as_deref(), resource_type);
        assert_eq!(parsed_key.as_deref(), key);
    }
}
