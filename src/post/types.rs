//! Post data types.

use std::{path::PathBuf, sync::LazyLock};

use chrono::{DateTime, Utc};
use educe::Educe;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{ContentError, ContentResult};

/// A parsed markdown document.
///
/// Posts are immutable once they enter the store; updates replace the
/// whole value under the same slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Tags in front matter order; duplicates are collapsed at index time.
    pub tags: Vec<String>,
    /// Series name, empty when the post belongs to none.
    pub series: String,
    pub series_order: i64,
    pub draft: bool,
    /// Estimated minutes, at least 1 once parsed.
    pub reading_time: u32,
    pub toc: Vec<TocItem>,
    /// Markdown body as written.
    pub raw_content: String,
    /// Rendered HTML body (trusted).
    pub content: String,
    pub verification: Option<Verification>,
    /// File the post was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Post {
    /// Site-relative URL: `/posts/<slug>/`, each slug segment percent-encoded.
    pub fn url_path(&self) -> String {
        let segments: Vec<_> = self.slug.split('/').map(urlencoding::encode).collect();
        format!("/posts/{}/", segments.join("/"))
    }

    /// Absolute URL under `base` (no trailing slash expected).
    pub fn permalink(&self, base: &str) -> String {
        format!("{base}{}", self.url_path())
    }

    /// Distinct non-empty tags, first occurrence order.
    pub fn distinct_tags(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|tag| !tag.is_empty() && seen.insert(*tag))
            .collect()
    }

    pub fn has_series(&self) -> bool {
        !self.series.is_empty()
    }
}

/// One node of a post's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocItem {
    pub title: String,
    pub id: String,
    pub level: u8,
    pub children: Vec<TocItem>,
}

/// A heading reported by the markdown renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// Verification block stored in front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Verification {
    pub author: String,
    pub content_hash: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arweave_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nft_contract: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft: Option<NftConfig>,
}

/// NFT minting parameters attached to a verified post.
#[derive(Debug, Clone, PartialEq, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, rename_all = "camelCase")]
pub struct NftConfig {
    /// Price in ETH, kept as written.
    #[educe(Default = String::from("0.01"))]
    pub price: String,
    #[educe(Default = 100)]
    pub max_supply: u32,
    /// Basis points, 0..=5000.
    #[educe(Default = 1000)]
    pub royalty_fee: u32,
    #[educe(Default = true)]
    pub one_per_address: bool,
    #[educe(Default = String::from("1.0.0"))]
    pub version: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub chain_id: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl NftConfig {
    const MIN_PRICE: f64 = 0.001;
    const MAX_PRICE: f64 = 10.0;
    const MAX_SUPPLY: u32 = 10_000;
    const MAX_ROYALTY_FEE: u32 = 5_000;

    pub fn validate(&self) -> ContentResult<()> {
        static RE_SEMVER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex"));

        let invalid = |msg: String| Err(ContentError::InvalidPost(msg));

        let price: f64 = match self.price.trim().parse() {
            Ok(price) => price,
            Err(_) => return invalid(format!("invalid nft price `{}`", self.price)),
        };
        if !(Self::MIN_PRICE..=Self::MAX_PRICE).contains(&price) {
            return invalid(format!(
                "nft price must be between {} and {} ETH",
                Self::MIN_PRICE,
                Self::MAX_PRICE
            ));
        }
        if !(1..=Self::MAX_SUPPLY).contains(&self.max_supply) {
            return invalid(format!("nft maxSupply must be between 1 and {}", Self::MAX_SUPPLY));
        }
        if self.royalty_fee > Self::MAX_ROYALTY_FEE {
            return invalid(format!(
                "nft royaltyFee must be between 0 and {}",
                Self::MAX_ROYALTY_FEE
            ));
        }
        if !RE_SEMVER.is_match(&self.version) {
            return invalid(format!("nft version `{}` is not semver", self.version));
        }
        Ok(())
    }
}
