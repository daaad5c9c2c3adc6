//! Document parser: raw markdown file → [`Post`].

use std::{fs, path::Path, sync::Arc, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, de};
use serde_yaml::Value;

use super::{
    frontmatter::{parse_mapping, split_front_matter},
    render::MarkdownRenderer,
    types::{Heading, NftConfig, Post, TocItem, Verification},
};
use crate::{
    error::{ContentError, ContentResult},
    log,
    utils::{
        date::parse_date,
        slug::{is_han, slugify_title},
    },
};

/// Han characters read per minute.
const HAN_CHARS_PER_MINUTE: usize = 300;
/// Words read per minute.
const WORDS_PER_MINUTE: usize = 200;

/// Recognized front matter keys. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FrontMatter {
    #[serde(deserialize_with = "string_field")]
    title: String,
    date: Option<Value>,
    #[serde(deserialize_with = "string_field")]
    description: String,
    #[serde(deserialize_with = "string_list")]
    tags: Vec<String>,
    #[serde(deserialize_with = "string_field")]
    slug: String,
    #[serde(deserialize_with = "string_field")]
    series: String,
    series_order: i64,
    draft: bool,
    verification: Option<Verification>,
}

/// Parses documents with an injected renderer and author wallet address.
#[derive(Clone)]
pub struct DocumentParser {
    renderer: Arc<dyn MarkdownRenderer>,
    wallet_address: String,
}

impl DocumentParser {
    pub fn new(renderer: Arc<dyn MarkdownRenderer>, wallet_address: impl Into<String>) -> Self {
        Self {
            renderer,
            wallet_address: wallet_address.into(),
        }
    }

    /// Read and parse the file at `path`, recording it as the post source.
    pub fn parse_file(&self, path: &Path) -> ContentResult<Post> {
        let raw =
            fs::read_to_string(path).map_err(|err| ContentError::Io(path.to_path_buf(), err))?;
        let mut post = self.parse(&raw).map_err(|err| match err {
            ContentError::MalformedDocument(msg) => {
                ContentError::MalformedDocument(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        post.source = Some(path.to_path_buf());
        Ok(post)
    }

    /// Parse a raw document. Fails with `MalformedDocument` without a
    /// front matter block or with an unparseable date.
    pub fn parse(&self, raw: &str) -> ContentResult<Post> {
        let (front_matter, body) = split_front_matter(raw)?;
        let meta = parse_front_matter(front_matter)?;

        let date = match meta.date.as_ref().and_then(scalar_to_string) {
            None => DateTime::<Utc>::UNIX_EPOCH,
            Some(s) => parse_date(&s)
                .ok_or_else(|| ContentError::MalformedDocument(format!("invalid date `{s}`")))?,
        };

        let rendered = self.renderer.render(body)?;

        let slug = match meta.slug.trim() {
            "" => slugify_title(&meta.title),
            explicit => explicit.to_owned(),
        };

        let verification = meta.verification.map(|v| self.backfill_verification(v));

        Ok(Post {
            slug,
            title: meta.title,
            date,
            description: meta.description,
            tags: meta.tags,
            series: meta.series.trim().to_owned(),
            series_order: meta.series_order,
            draft: meta.draft,
            reading_time: reading_time(body),
            toc: build_toc(&rendered.headings),
            raw_content: body.to_owned(),
            content: rendered.html,
            verification,
            source: None,
        })
    }

    /// Fill an empty author from config and replace invalid NFT parameters
    /// with defaults. Both are best effort and only logged.
    fn backfill_verification(&self, mut verification: Verification) -> Verification {
        if verification.author.is_empty() && !self.wallet_address.is_empty() {
            verification.author = self.wallet_address.clone();
        }
        let invalid_nft = verification.nft.as_ref().and_then(|nft| nft.validate().err());
        if let Some(err) = invalid_nft {
            log!("parse"; "{err}, using default nft parameters");
            verification.nft = Some(NftConfig::default());
        }
        verification
    }
}

fn parse_front_matter(front_matter: &str) -> ContentResult<FrontMatter> {
    let mapping = parse_mapping(front_matter)?;
    if mapping.is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_value(Value::Mapping(mapping))
        .map_err(|err| ContentError::MalformedDocument(format!("invalid front matter: {err}")))
}

/// String keys accept any scalar, so `title: 1984` reads as `"1984"`.
fn string_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    scalar_string(Value::deserialize(deserializer)?)
}

/// `tags: [2024, go]` as well as a single `tags: go`.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.into_iter().map(scalar_string::<D::Error>).collect(),
        other => Ok(vec![scalar_string::<D::Error>(other)?]),
    }
}

fn scalar_string<E: de::Error>(value: Value) -> Result<String, E> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => scalar_to_string(&other).ok_or_else(|| E::custom("expected a scalar value")),
    }
}

/// Dates may arrive as strings or, for bare years and the like, numbers.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Estimated reading time in minutes, at least 1.
///
/// Fenced code blocks and HTML tags are ignored. Han characters and other
/// words are counted separately and the slower estimate wins.
pub fn reading_time(markdown: &str) -> u32 {
    static RE_FENCED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("static regex"));
    static RE_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

    let text = RE_FENCED.replace_all(markdown, " ");
    let text = RE_TAG.replace_all(&text, " ");

    let han = text.chars().filter(|c| is_han(*c)).count();
    let words = text
        .chars()
        .map(|c| if is_han(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .count();

    let minutes = han
        .div_ceil(HAN_CHARS_PER_MINUTE)
        .max(words.div_ceil(WORDS_PER_MINUTE))
        .max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Fold a flat heading list into a tree: each heading becomes a child of
/// the nearest preceding heading with a smaller level.
pub fn build_toc(headings: &[Heading]) -> Vec<TocItem> {
    fn attach(done: TocItem, stack: &mut [TocItem], roots: &mut Vec<TocItem>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<TocItem> = Vec::new();

    for heading in headings {
        while stack.last().is_some_and(|top| top.level >= heading.level) {
            if let Some(done) = stack.pop() {
                attach(done, &mut stack, &mut roots);
            }
        }
        stack.push(TocItem {
            title: heading.title.clone(),
            id: heading.id.clone(),
            level: heading.level,
            children: Vec::new(),
        });
    }

    while let Some(done) = stack.pop() {
        attach(done, &mut stack, &mut roots);
    }

    roots
}
