//! Object path validation.
//!
//! Target paths arrive inside queue messages, so they are untrusted input.
//! Every backend runs them through [`validate`] before touching storage.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an object path and returns its normalized form.
///
/// Paths are always relative to the bucket root: leading slashes and `.`
/// components are dropped, `..` is resolved, and anything that would leave
/// the root (or resolves to nothing at all) is rejected.
///
/// > **Note:** Null bytes are explicitly rejected; backslashes and
/// >           platform-specific prefixes are not normalized.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pokemirror_storage::validate_path;
/// assert!(validate_path("pokemon/25/pokemon/25.png").is_ok());
/// assert!(validate_path("pokemon/25/../26/front.png").is_ok());
/// assert!(validate_path("../secrets.png").is_err());
/// assert!(validate_path("pokemon/../../x.png").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("/pokemon/25/./other//official-artwork/25.png").unwrap(),
///     Path::new("pokemon/25/other/official-artwork/25.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("pokemon/25/pokemon/25.png").unwrap(), Path::new("pokemon/25/pokemon/25.png"));
        assert_eq!(validate("item/1/items/master-ball.png").unwrap(), Path::new("item/1/items/master-ball.png"));
        assert_eq!(validate("sprite.png").unwrap(), Path::new("sprite.png"));
    }

    #[test]
    fn test_leading_slash_is_dropped() {
        assert_eq!(validate("/pokemon/1/a.png").unwrap(), Path::new("pokemon/1/a.png"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(validate("a//b//c").unwrap(), Path::new("a/b/c"));
        assert_eq!(validate("a/./b/./c").unwrap(), Path::new("a/b/c"));
        assert_eq!(validate("a/b/..").unwrap(), Path::new("a"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("a\0b").is_err());
        assert!(validate("\0").is_err());
    }

    #[test]
    fn test_empty_paths() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("./.").is_err());
        assert!(validate("//").is_err());
    }
}
