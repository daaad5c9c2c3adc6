//! Front matter splitting and in-place rewriting.
//!
//! A document is `---` / YAML / `---` / body. Rewrites replace only the YAML
//! block; the body is written back byte-for-byte.

use std::{fs, path::Path};

use serde_yaml::{Mapping, Value};

use super::types::Verification;
use crate::error::{ContentError, ContentResult};

const DELIMITER: &str = "---";

/// Split a raw document into `(front_matter, body)`.
///
/// A leading UTF-8 BOM is ignored and `---\r\n` delimiter lines are accepted.
/// Anything before the first delimiter line is discarded.
pub fn split_front_matter(raw: &str) -> ContentResult<(&str, &str)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    // (line start, line end including newline) of the first two delimiter lines
    let mut delimiters: Vec<(usize, usize)> = Vec::with_capacity(2);
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == DELIMITER {
            delimiters.push((offset, offset + line.len()));
            if delimiters.len() == 2 {
                break;
            }
        }
        offset += line.len();
    }

    match delimiters[..] {
        [(_, fm_start), (fm_end, body_start)] => Ok((&raw[fm_start..fm_end], &raw[body_start..])),
        _ => Err(ContentError::MalformedDocument(
            "missing front matter block delimited by `---`".into(),
        )),
    }
}

/// Parse the front matter block into a YAML mapping (empty block → empty mapping).
pub fn parse_mapping(front_matter: &str) -> ContentResult<Mapping> {
    if front_matter.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(front_matter) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(ContentError::MalformedDocument(
            "front matter is not a key/value mapping".into(),
        )),
        Err(err) => Err(ContentError::MalformedDocument(format!(
            "invalid front matter: {err}"
        ))),
    }
}

/// Rewrite the front matter of the file at `path`.
///
/// `update` edits the parsed mapping; keys it does not touch are kept in
/// their original order.
pub fn rewrite_front_matter(path: &Path, update: impl FnOnce(&mut Mapping)) -> ContentResult<()> {
    let raw =
        fs::read_to_string(path).map_err(|err| ContentError::Io(path.to_path_buf(), err))?;
    let (front_matter, body) = split_front_matter(&raw)?;
    let mut mapping = parse_mapping(front_matter)?;

    update(&mut mapping);

    let yaml = serde_yaml::to_string(&mapping).map_err(|err| {
        ContentError::MalformedDocument(format!("cannot serialize front matter: {err}"))
    })?;

    let mut output = String::with_capacity(raw.len() + 64);
    output.push_str(DELIMITER);
    output.push('\n');
    output.push_str(&yaml);
    output.push_str(DELIMITER);
    output.push('\n');
    output.push_str(body);

    fs::write(path, output).map_err(|err| ContentError::Io(path.to_path_buf(), err))
}

/// Replace the `verification` key.
pub fn set_verification(mapping: &mut Mapping, verification: &Verification) {
    // Verification only holds strings, integers and bools, which always convert.
    if let Ok(value) = serde_yaml::to_value(verification) {
        mapping.insert(Value::from("verification"), value);
    }
}

/// Set the `draft` flag.
pub fn set_draft(mapping: &mut Mapping, draft: bool) {
    mapping.insert(Value::from("draft"), Value::Bool(draft));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_basic() {
        let (fm, body) = split_front_matter("---\ntitle: A\n---\n# Body\n").unwrap();
        assert_eq!(fm, "title: A\n");
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_split_crlf_and_bom() {
        let raw = "\u{feff}---\r\ntitle: A\r\n---\r\nbody\r\n";
        let (fm, body) = split_front_matter(raw).unwrap();
        assert_eq!(fm, "title: A\r\n");
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_split_keeps_later_rules_in_body() {
        let (_, body) = split_front_matter("---\na: 1\n---\nx\n---\ny\n").unwrap();
        assert_eq!(body, "x\n---\ny\n");
    }

    #[test]
    fn test_split_missing_delimiters() {
        assert!(matches!(
            split_front_matter("# just markdown\n"),
            Err(ContentError::MalformedDocument(_))
        ));
        assert!(split_front_matter("---\ntitle: A\n").is_err());
    }

    #[test]
    fn test_parse_mapping_rejects_non_mapping() {
        assert!(parse_mapping("- a\n- b\n").is_err());
        assert!(parse_mapping("title: [unclosed\n").is_err());
        assert!(parse_mapping("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_rewrite_preserves_body_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("post.md");
        let body = "\n# Title\n\nSome *text*\n---\ntrailing rule   \n";
        fs::write(&path, format!("---\ntitle: Hello\ncustom: keep me\ndraft: true\n---\n{body}"))
            .unwrap();

        rewrite_front_matter(&path, |m| set_draft(m, false)).unwrap();

        let rewritten = fs::read_to_string(&path).unwrap();
        let (fm, new_body) = split_front_matter(&rewritten).unwrap();
        assert_eq!(new_body, body);
        let mapping = parse_mapping(fm).unwrap();
        assert_eq!(mapping.get("custom").and_then(Value::as_str), Some("keep me"));
        assert_eq!(mapping.get("draft").and_then(Value::as_bool), Some(false));
        assert_eq!(mapping.get("title").and_then(Value::as_str), Some("Hello"));
    }

    #[test]
    fn test_rewrite_sets_verification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("post.md");
        fs::write(&path, "---\ntitle: Hello\n---\nbody\n").unwrap();

        let verification = Verification {
            author: "0xabc".into(),
            content_hash: "0x1234".into(),
            ..Default::default()
        };
        rewrite_front_matter(&path, |m| set_verification(m, &verification)).unwrap();

        let rewritten = fs::read_to_string(&path).unwrap();
        let (fm, _) = split_front_matter(&rewritten).unwrap();
        let parsed: Verification =
            serde_yaml::from_value(parse_mapping(fm).unwrap().get("verification").cloned().unwrap())
                .unwrap();
        assert_eq!(parsed, verification);
    }

    #[test]
    fn test_rewrite_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = rewrite_front_matter(&dir.path().join("nope.md"), |_| {}).unwrap_err();
        assert!(matches!(err, ContentError::Io(..)));
    }
}
