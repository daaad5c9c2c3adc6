//! Content hashing for post verification.
//!
//! The hash covers exactly `(title, raw_content)`: a BLAKE3 digest of the
//! JSON object `{"content": ..., "title": ...}`, hex encoded with a `0x` prefix.

use super::{
    frontmatter::{rewrite_front_matter, set_verification},
    types::Post,
};
use crate::error::{ContentError, ContentResult};

/// Hash of a title and markdown body.
pub fn compute_content_hash(title: &str, content: &str) -> String {
    let input = serde_json::json!({ "title": title, "content": content });
    let digest = blake3::hash(input.to_string().as_bytes());
    format!("0x{}", hex::encode(digest.as_bytes()))
}

impl Post {
    /// Fresh hash of the current title and body.
    pub fn content_hash(&self) -> String {
        compute_content_hash(&self.title, &self.raw_content)
    }

    /// True when no hash was recorded or the recorded one is stale.
    pub fn content_changed(&self) -> bool {
        match &self.verification {
            Some(v) if !v.content_hash.is_empty() => v.content_hash != self.content_hash(),
            _ => true,
        }
    }

    /// Record a fresh hash and write it back to the source file.
    ///
    /// Returns `Ok(false)` when the stored hash is already current. Read and
    /// write failures are returned, never swallowed.
    pub fn refresh_content_hash(&mut self) -> ContentResult<bool> {
        if !self.content_changed() {
            return Ok(false);
        }

        let hash = self.content_hash();
        let Some(path) = self.source.as_deref() else {
            return Err(ContentError::InvalidPost(format!(
                "post `{}` has no source file to record its hash in",
                self.slug
            )));
        };

        let mut verification = self.verification.clone().unwrap_or_default();
        verification.content_hash = hash;
        rewrite_front_matter(path, |mapping| set_verification(mapping, &verification))?;
        self.verification = Some(verification);
        Ok(true)
    }
}
