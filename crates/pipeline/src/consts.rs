use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($regex).expect(concat!("static regex ", stringify!($name), " compiles")));
    };
}

regex!(WHITESPACE_REGEX, r"\s+");
regex!(DOT_RUN_REGEX, r"\.{2,}");
// `/api/v2/{type}/{key}/`, trailing slash optional.
regex!(API_PATH_REGEX, r"/api/v2/([^/]+)(?:/([^/]+))?/?$");
regex!(OFFICIAL_ARTWORK_REGEX, r"(?:^|/)official-artwork(?:/|$)");
regex!(POKEMON_SPRITE_REGEX, r"(?i)(?:^|/)pokemon/\d+/pokemon/\d+\.(?:png|gif|svg)$");
regex!(FRONT_DEFAULT_REGEX, r"(?:^|/)pokemon/.*front_default");
