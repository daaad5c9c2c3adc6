//! URL slug derivation for post titles and taxonomy terms.

use std::sync::LazyLock;

use regex::Regex;

/// Length of the digest prefix used for titles that contain Han characters.
const HAN_SLUG_LEN: usize = 8;

static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
static RE_HAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Han}").expect("static regex"));

/// Whether `c` belongs to the Han script, radicals and `〇` included.
pub fn is_han(c: char) -> bool {
    RE_HAN.is_match(c.encode_utf8(&mut [0; 4]))
}

/// Derive a URL slug from a post title.
///
/// Titles containing Han characters map to the first 8 hex characters of a
/// BLAKE3 digest of the trimmed, lower-cased title. Other titles are
/// lower-cased and every run of characters outside `[a-z0-9]` becomes a
/// single `-`, trimmed at both ends. The result may be empty.
///
/// ```ignore
/// slugify_title("Hello, World!") // → "hello-world"
/// slugify_title("你好世界")        // → 8 hex chars
/// ```
pub fn slugify_title(title: &str) -> String {
    if RE_HAN.is_match(title) {
        let normalized = title.trim().to_lowercase();
        let digest = blake3::hash(normalized.as_bytes());
        let mut slug = hex::encode(digest.as_bytes());
        slug.truncate(HAN_SLUG_LEN);
        return slug;
    }

    let lowered = title.to_lowercase();
    RE_NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_owned()
}

/// Directory name for a tag or series: spaces become `-`, nothing else changes.
pub fn taxonomy_dir(name: &str) -> String {
    name.replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_ascii_title() {
        assert_eq!(slugify_title("Hello World"), "hello-world");
        assert_eq!(slugify_title("Hello, World!"), "hello-world");
        assert_eq!(slugify_title("  Rust -- Ownership  "), "rust-ownership");
        assert_eq!(slugify_title("C++ & Go"), "c-go");
    }

    #[test]
    fn test_slugify_separators_become_dashes() {
        assert_eq!(slugify_title("foo.bar"), "foo-bar");
        assert_eq!(slugify_title("hello_world"), "hello-world");
        assert_eq!(slugify_title("Rust/Go"), "rust-go");
        assert_eq!(slugify_title("v1.2 -> v2"), "v1-2-v2");
    }

    #[test]
    fn test_slugify_accents_split_words() {
        assert_eq!(slugify_title("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slugify_empty_result() {
        assert_eq!(slugify_title("!!!"), "");
        assert_eq!(slugify_title(""), "");
    }

    #[test]
    fn test_slugify_han_title_is_stable() {
        let first = slugify_title("你好世界");
        let second = slugify_title("  你好世界 ");

        assert_eq!(first.len(), 8);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first, second);
        assert_ne!(first, slugify_title("你好"));
    }

    #[test]
    fn test_slugify_mixed_han_and_ascii() {
        let slug = slugify_title("Rust 入门");
        assert_eq!(slug.len(), 8);
        assert_eq!(slug, slugify_title("rust 入门"));
    }

    #[test]
    fn test_taxonomy_dir() {
        assert_eq!(taxonomy_dir("rust lang"), "rust-lang");
        assert_eq!(taxonomy_dir("Go"), "Go");
        assert_eq!(taxonomy_dir("系列 一"), "系列-一");
    }

    #[test]
    fn test_is_han() {
        assert!(is_han('中'));
        assert!(!is_han('a'));
        assert!(!is_han('あ'));
        assert!(is_han('〇'));
        assert!(is_han('⼀'));
    }

    #[test]
    fn test_slugify_ideographic_zero() {
        let slug = slugify_title("〇");
        assert_eq!(slug.len(), 8);
        assert!(slug.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
