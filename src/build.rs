//! Site building orchestration.
//!
//! One build is a fixed sequence of named steps. The first failing step
//! aborts the run with its name attached; files already written stay.
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean output            (build.clean)
//!     ├── parse posts             content/**/*.md → ContentStore
//!     ├── single pages            posts/<slug>/
//!     ├── home page               index.html
//!     ├── post list               posts/
//!     ├── static files            static/ → <output>/static/
//!     ├── paginated lists         posts/, posts/page/<n>/
//!     ├── taxonomy pages          tags/<tag>/…, series/<series>/…
//!     ├── tag cloud               tags/
//!     ├── rss feed                (build.rss.enable)
//!     └── sitemap                 (build.sitemap.enable)
//! ```

use std::{cell::Cell, path::PathBuf};

use anyhow::{Context, Result};

use crate::{
    config::SiteConfig,
    generator::{rss::build_rss, sitemap::build_sitemap},
    ingest::{ErrorMode, load_store},
    log,
    store::ContentStore,
    utils::{
        minify::{MinifyType, minify},
        output::{clean_dir, copy_dir, write_file},
        slug::taxonomy_dir,
    },
    view::{DefaultTheme, PageBuilder, TaxonomyKind, TemplateEngine, ViewModel},
};

/// Build the site with the default theme.
pub fn build_site(config: &SiteConfig) -> Result<ContentStore> {
    Materializer::new(config, &DefaultTheme).run()
}

/// Writes every page of the site for one configuration and theme.
pub struct Materializer<'a> {
    config: &'a SiteConfig,
    theme: &'a dyn TemplateEngine,
    pages_written: Cell<usize>,
}

impl<'a> Materializer<'a> {
    pub fn new(config: &'a SiteConfig, theme: &'a dyn TemplateEngine) -> Self {
        Self {
            config,
            theme,
            pages_written: Cell::new(0),
        }
    }

    /// Run every step in order and return the store the site was built from.
    pub fn run(&self) -> Result<ContentStore> {
        let config = self.config;
        let output = &config.build.output;

        self.step("clean output", || {
            if config.build.clean {
                clean_dir(output)?;
            }
            Ok(())
        })?;

        let store = self.step("parse posts", || load_store(config, ErrorMode::Strict))?;
        log!("build"; "{} posts", store.len());
        let pages = PageBuilder::new(&store, config, true);

        self.step("single pages", || {
            for post in store.list() {
                let dir = format!("posts/{}", post.slug);
                self.render_to(&dir, &pages.single_for(post))?;
            }
            Ok(())
        })?;

        self.step("home page", || self.render_to("", &pages.home()))?;

        self.step("post list", || self.render_to("posts", &pages.post_list()))?;

        self.step("static files", || {
            let copied = copy_dir(&config.build.static_dir, &output.join("static"))?;
            if copied > 0 {
                log!("build"; "copied {copied} static files");
            }
            Ok(())
        })?;

        self.step("paginated lists", || {
            let mut page = 1;
            while let Some(vm) = pages.post_list_page(page) {
                self.render_to(&paged_dir("posts", page), &vm)?;
                page += 1;
            }
            Ok(())
        })?;

        self.step("taxonomy pages", || {
            for kind in [TaxonomyKind::Tag, TaxonomyKind::Series] {
                for term in pages.taxonomy_terms(kind) {
                    let base = format!("{}/{}", kind.section(), taxonomy_dir(&term));
                    let mut page = 1;
                    while let Some(vm) = pages.taxonomy(kind, &term, page) {
                        self.render_to(&paged_dir(&base, page), &vm)?;
                        page += 1;
                    }
                }
            }
            Ok(())
        })?;

        self.step("tag cloud", || self.render_to("tags", &pages.tag_cloud()))?;

        self.step("rss feed", || build_rss(config, &store))?;

        self.step("sitemap", || build_sitemap(config, &store))?;

        log!("build"; "wrote {} pages to {}", self.pages_written.get(), output.display());
        Ok(store)
    }

    fn step<T>(&self, name: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        log!("build"; "{name}");
        run().with_context(|| format!("build step `{name}` failed"))
    }

    /// Render `vm` to `<output>/<dir>/index.html`.
    fn render_to(&self, dir: &str, vm: &ViewModel) -> Result<()> {
        let html = self
            .theme
            .render(vm)
            .with_context(|| format!("failed to render `{}`", vm.title))?;
        let html = minify(MinifyType::Html(html.as_bytes()), self.config);

        let mut path: PathBuf = self.config.build.output.clone();
        if !dir.is_empty() {
            path.push(dir);
        }
        path.push("index.html");
        write_file(&path, &html)?;

        self.pages_written.set(self.pages_written.get() + 1);
        Ok(())
    }
}

/// Page 1 lives at `base`, later pages at `base/page/<n>`.
fn paged_dir(base: &str, page: usize) -> String {
    if page <= 1 {
        base.to_owned()
    } else {
        format!("{base}/page/{page}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesConfig;
    use std::{collections::BTreeMap, fs, path::Path};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn site(root: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.base.title = "Blog".into();
        config.base.url = Some("https://example.com".into());
        config.build.content = root.join("content");
        config.build.output = root.join("public");
        config.build.static_dir = root.join("static");
        config.build.rss.enable = true;
        config.series = vec![SeriesConfig {
            name: "Coming Soon".into(),
            description: "Not yet".into(),
            order: 1,
        }];

        for day in 1..=7 {
            write(
                &config.build.content,
                &format!("go-{day}.md"),
                &format!("---\ntitle: Go {day}\ndate: 2024-01-0{day}\ntags: [go]\n---\n# Part {day}\n\nbody\n"),
            );
        }
        write(
            &config.build.content,
            "rust/intro.md",
            "---\ntitle: Rust Intro\ndate: 2024-02-01\ntags: [rust lang]\nseries: Rust Basics\nseriesOrder: 1\n---\nhello\n",
        );
        write(&config.build.static_dir, "css/site.css", "body { color: red; }");
        config
    }

    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .map(Result::unwrap)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(dir).unwrap().to_string_lossy().into_owned();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_build_writes_expected_layout() {
        let dir = TempDir::new().unwrap();
        let config = site(dir.path());
        let store = build_site(&config).unwrap();
        let out = &config.build.output;

        assert_eq!(store.len(), 8);
        for rel in [
            "index.html",
            "posts/index.html",
            "posts/page/2/index.html",
            "posts/go-1/index.html",
            "posts/rust-intro/index.html",
            "tags/index.html",
            "tags/go/index.html",
            "tags/go/page/2/index.html",
            "tags/rust-lang/index.html",
            "series/Rust-Basics/index.html",
            "series/Coming-Soon/index.html",
            "static/css/site.css",
            "feed.xml",
            "sitemap.xml",
        ] {
            assert!(out.join(rel).is_file(), "missing {rel}");
        }
        assert!(!out.join("tags/go/page/3").exists());
        assert!(!out.join("posts/page/3").exists());
    }

    #[test]
    fn test_tag_pages_split_at_page_size() {
        let dir = TempDir::new().unwrap();
        let mut config = site(dir.path());
        config.build.minify = false;
        build_site(&config).unwrap();

        let first = fs::read_to_string(config.build.output.join("tags/go/index.html")).unwrap();
        let second = fs::read_to_string(config.build.output.join("tags/go/page/2/index.html")).unwrap();
        assert_eq!(first.matches(r#"<li><a href="/posts/go-"#).count(), 6);
        assert_eq!(second.matches(r#"<li><a href="/posts/go-"#).count(), 1);
        assert!(second.contains(r#"<a href="/posts/go-1/">Go 1</a>"#));
    }

    #[test]
    fn test_two_builds_are_identical() {
        let dir = TempDir::new().unwrap();
        let mut config = site(dir.path());

        build_site(&config).unwrap();
        let first = snapshot(&config.build.output);

        config.build.output = dir.path().join("public2");
        build_site(&config).unwrap();
        let second = snapshot(&config.build.output);

        assert!(!first.is_empty());
        assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
        assert!(first == second);
    }

    #[test]
    fn test_clean_removes_stale_files() {
        let dir = TempDir::new().unwrap();
        let mut config = site(dir.path());
        write(&config.build.output, "stale.html", "old");

        build_site(&config).unwrap();
        assert!(config.build.output.join("stale.html").exists());

        config.build.clean = true;
        build_site(&config).unwrap();
        assert!(!config.build.output.join("stale.html").exists());
        assert!(config.build.output.join("index.html").exists());
    }

    #[test]
    fn test_malformed_document_aborts_parse_step() {
        let dir = TempDir::new().unwrap();
        let config = site(dir.path());
        write(&config.build.content, "broken.md", "no front matter\n");

        let err = build_site(&config).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("parse posts"));
        assert!(message.contains("broken.md"));
        assert!(!config.build.output.join("index.html").exists());
    }

    #[test]
    fn test_paged_dir() {
        assert_eq!(paged_dir("posts", 1), "posts");
        assert_eq!(paged_dir("tags/go", 3), "tags/go/page/3");
    }
}
