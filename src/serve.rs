//! Live preview server.
//!
//! Pages are rendered on demand from the shared [`ContentStore`]; nothing is
//! written to disk. Built on `tiny_http` with a fixed pool of worker threads
//! pulling from one listener.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  Worker Threads  │   │  Watcher Thread  │
//! │  (HTTP requests) │   │  (content dir)   │
//! └────────┬─────────┘   └────────┬─────────┘
//!          │ read                 │ add
//!          ▼                      ▼
//!       Arc<ContentStore> (RwLock inside)
//! ```
//!
//! # Routes
//!
//! | Path                                   | Page                        |
//! |----------------------------------------|-----------------------------|
//! | `/`                                    | home                        |
//! | `/posts?page=&tag=&series=`            | listing, optionally filtered|
//! | `/posts/page/<n>`                      | listing page `n`            |
//! | `/posts/<slug>`                        | single post                 |
//! | `/tags`                                | tag cloud                   |
//! | `/tags/<tag>[/page/<n>]`               | tag listing                 |
//! | `/series/<name>[/page/<n>]`            | series listing              |
//! | `/feed.xml`                            | RSS from the current store  |
//! | `/static/<path>`                       | file under `static_dir`     |

use crate::{
    config::SiteConfig,
    error::ContentError,
    generator::rss::feed_xml,
    ingest::{ErrorMode, load_store},
    log,
    store::ContentStore,
    view::{DefaultTheme, PageBuilder, TaxonomyKind, TemplateEngine, ViewModel},
    watch::watch_content,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
    thread,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the preview server.
///
/// 1. Loads the content directory (malformed documents are logged and skipped)
/// 2. Binds to the configured interface and port (with auto-retry on port conflict)
/// 3. Sets up Ctrl+C handler for graceful shutdown
/// 4. Spawns the content watcher (if enabled)
/// 5. Serves requests on `serve.workers` threads
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(config: Arc<SiteConfig>) -> Result<()> {
    let store = Arc::new(load_store(&config, ErrorMode::Lenient)?);
    log!("serve"; "{} posts loaded", store.len());

    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", config.serve.interface))?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let workers = config.serve.workers.max(1);

    // each unblock releases exactly one waiting worker
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        for _ in 0..workers {
            server_for_signal.unblock();
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if config.serve.watch {
        let config = Arc::clone(&config);
        let store = Arc::clone(&store);
        thread::spawn(move || {
            if let Err(err) = watch_content(&config, &store) {
                log!("watch"; "{err:#}");
            }
        });
    }

    let app = App::new(config, store);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                for request in server.incoming_requests() {
                    if let Err(e) = app.handle_request(request) {
                        log!("serve"; "request error: {e:#}");
                    }
                }
            });
        }
    });

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Routing
// ============================================================================

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Posts {
        page: usize,
        tag: Option<String>,
        series: Option<String>,
    },
    Post(String),
    TagCloud,
    Taxonomy {
        kind: TaxonomyKind,
        term: String,
        page: usize,
    },
    Feed,
    Static(String),
    NotFound,
}

/// Page number from a path segment or query value; anything unusable is page 1.
fn parse_page(value: &str) -> usize {
    value.parse().ok().filter(|&page| page >= 1).unwrap_or(1)
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| value.to_owned())
}

/// Query parameters with `+` as space and percent-decoding applied.
fn query_pairs(query: &str) -> impl Iterator<Item = (&str, String)> {
    query.split('&').filter(|pair| !pair.is_empty()).map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key, decode(&value.replace('+', " ")))
    })
}

impl Route {
    /// Parse a request URL (path plus optional query string).
    pub fn parse(url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let path = decode(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | ["index.html"] => Self::Home,
            ["posts"] => {
                let (mut page, mut tag, mut series) = (1, None, None);
                for (key, value) in query_pairs(query) {
                    match key {
                        "page" => page = parse_page(&value),
                        "tag" if !value.is_empty() => tag = Some(value),
                        "series" if !value.is_empty() => series = Some(value),
                        _ => {}
                    }
                }
                Self::Posts { page, tag, series }
            }
            ["posts", "page", page] => Self::Posts {
                page: parse_page(page),
                tag: None,
                series: None,
            },
            ["posts", slug @ ..] => Self::Post(slug.join("/")),
            ["tags"] => Self::TagCloud,
            [section @ ("tags" | "series"), term, rest @ ..] => {
                let kind = if *section == "tags" {
                    TaxonomyKind::Tag
                } else {
                    TaxonomyKind::Series
                };
                let page = match rest {
                    [] => 1,
                    ["page", page] => parse_page(page),
                    _ => return Self::NotFound,
                };
                Self::Taxonomy {
                    kind,
                    term: (*term).to_owned(),
                    page,
                }
            }
            ["feed.xml"] => Self::Feed,
            ["static", rest @ ..] if !rest.is_empty() && !rest.contains(&"..") => {
                Self::Static(rest.join("/"))
            }
            _ => Self::NotFound,
        }
    }
}

// ============================================================================
// Request Handling
// ============================================================================

/// A response body with its status and content type.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: TEXT,
            body: b"404 Not Found".to_vec(),
        }
    }

    fn server_error() -> Self {
        Self {
            status: 500,
            content_type: TEXT,
            body: b"500 Internal Server Error".to_vec(),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            status: 405,
            content_type: TEXT,
            body: b"405 Method Not Allowed".to_vec(),
        }
    }
}

/// Request handler state shared by all workers.
pub struct App {
    config: Arc<SiteConfig>,
    store: Arc<ContentStore>,
    theme: DefaultTheme,
}

impl App {
    pub fn new(config: Arc<SiteConfig>, store: Arc<ContentStore>) -> Self {
        Self {
            config,
            store,
            theme: DefaultTheme,
        }
    }

    fn handle_request(&self, request: Request) -> Result<()> {
        let reply = match request.method() {
            Method::Get | Method::Head => self.reply(request.url()),
            _ => Reply::method_not_allowed(),
        };

        let header = Header::from_bytes("Content-Type", reply.content_type)
            .map_err(|()| anyhow!("invalid content type `{}`", reply.content_type))?;
        let response = Response::from_data(reply.body)
            .with_status_code(StatusCode(reply.status))
            .with_header(header);

        request.respond(response).context("failed to send response")
    }

    /// Resolve a URL to a reply. Failures are logged and become 500.
    pub fn reply(&self, url: &str) -> Reply {
        match self.dispatch(&Route::parse(url)) {
            Ok(Some(reply)) => reply,
            Ok(None) => Reply::not_found(),
            Err(err) => {
                log!("error"; "{url}: {err:#}");
                Reply::server_error()
            }
        }
    }

    fn dispatch(&self, route: &Route) -> Result<Option<Reply>> {
        let pages = PageBuilder::new(&self.store, &self.config, false);

        let vm = match route {
            Route::Home => Some(pages.home()),
            Route::Posts { page, tag, series } => {
                pages.filtered_list(tag.as_deref(), series.as_deref(), *page)
            }
            Route::Post(slug) => match pages.single(slug) {
                Ok(vm) => Some(vm),
                Err(ContentError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            Route::TagCloud => Some(pages.tag_cloud()),
            Route::Taxonomy { kind, term, page } => pages
                .resolve_term(*kind, term)
                .and_then(|term| pages.taxonomy(*kind, &term, *page)),
            Route::Feed => {
                let xml = feed_xml(&self.config, &self.store)?;
                return Ok(Some(Reply::ok("application/rss+xml; charset=utf-8", xml)));
            }
            Route::Static(rel) => return self.static_file(rel),
            Route::NotFound => None,
        };

        vm.map(|vm| self.render(&vm)).transpose()
    }

    fn render(&self, vm: &ViewModel) -> Result<Reply> {
        let html = self
            .theme
            .render(vm)
            .with_context(|| format!("failed to render `{}`", vm.title))?;
        Ok(Reply::ok(HTML, html))
    }

    fn static_file(&self, rel: &str) -> Result<Option<Reply>> {
        let path = self.config.build.static_dir.join(rel);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(Reply::ok(guess_content_type(&path), content)))
    }
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => TEXT,
        Some("pdf") => "application/pdf",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn posts(page: usize, tag: Option<&str>, series: Option<&str>) -> Route {
        Route::Posts {
            page,
            tag: tag.map(str::to_owned),
            series: series.map(str::to_owned),
        }
    }

    fn taxonomy(kind: TaxonomyKind, term: &str, page: usize) -> Route {
        Route::Taxonomy {
            kind,
            term: term.to_owned(),
            page,
        }
    }

    #[test]
    fn test_route_parse_basic() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/posts"), posts(1, None, None));
        assert_eq!(Route::parse("/posts/"), posts(1, None, None));
        assert_eq!(Route::parse("/posts/hello-world/"), Route::Post("hello-world".into()));
        assert_eq!(Route::parse("/tags"), Route::TagCloud);
        assert_eq!(Route::parse("/feed.xml"), Route::Feed);
        assert_eq!(Route::parse("/nope"), Route::NotFound);
    }

    #[test]
    fn test_route_parse_pages() {
        assert_eq!(Route::parse("/posts/page/3/"), posts(3, None, None));
        assert_eq!(Route::parse("/posts/page/0"), posts(1, None, None));
        assert_eq!(Route::parse("/posts/page/abc"), posts(1, None, None));
        assert_eq!(Route::parse("/posts?page=-2"), posts(1, None, None));
        assert_eq!(Route::parse("/posts?page=2"), posts(2, None, None));
    }

    #[test]
    fn test_route_parse_filters() {
        assert_eq!(
            Route::parse("/posts?tag=rust+lang&series=Rust%20Basics&page=2"),
            posts(2, Some("rust lang"), Some("Rust Basics"))
        );
        assert_eq!(Route::parse("/posts?tag="), posts(1, None, None));
    }

    #[test]
    fn test_route_parse_taxonomy() {
        assert_eq!(Route::parse("/tags/go/"), taxonomy(TaxonomyKind::Tag, "go", 1));
        assert_eq!(
            Route::parse("/tags/go/page/2/"),
            taxonomy(TaxonomyKind::Tag, "go", 2)
        );
        assert_eq!(
            Route::parse("/series/Rust%20Basics"),
            taxonomy(TaxonomyKind::Series, "Rust Basics", 1)
        );
        assert_eq!(Route::parse("/tags/go/extra"), Route::NotFound);
    }

    #[test]
    fn test_route_parse_static_rejects_traversal() {
        assert_eq!(
            Route::parse("/static/css/site.css?v=2"),
            Route::Static("css/site.css".into())
        );
        assert_eq!(Route::parse("/static/../stars.toml"), Route::NotFound);
        assert_eq!(Route::parse("/static/%2E%2E/stars.toml"), Route::NotFound);
        assert_eq!(Route::parse("/static/"), Route::NotFound);
    }

    fn app(dir: &TempDir) -> App {
        let mut config = SiteConfig::default();
        config.base.title = "Blog".into();
        config.base.url = Some("http://127.0.0.1:5277".into());
        config.build.content = dir.path().join("content");
        config.build.static_dir = dir.path().join("static");
        config.build.refresh_hash = false;
        fs::create_dir_all(&config.build.content).unwrap();
        fs::create_dir_all(&config.build.static_dir).unwrap();

        for day in 1..=7 {
            fs::write(
                config.build.content.join(format!("go-{day}.md")),
                format!("---\ntitle: Go {day}\ndate: 2024-01-0{day}\ntags: [go, rust lang]\n---\nbody\n"),
            )
            .unwrap();
        }
        fs::write(config.build.static_dir.join("site.css"), "body{}").unwrap();

        let store = load_store(&config, ErrorMode::Lenient).unwrap();
        App::new(Arc::new(config), Arc::new(store))
    }

    #[test]
    fn test_reply_pages() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        for url in [
            "/",
            "/posts",
            "/posts/page/2",
            "/posts?tag=go&page=2",
            "/posts/go-3/",
            "/tags",
            "/tags/go/page/2/",
            "/tags/rust-lang/",
            "/tags/rust%20lang/",
        ] {
            let reply = app.reply(url);
            assert_eq!(reply.status, 200, "{url}");
            assert_eq!(reply.content_type, HTML);
        }

        let page = String::from_utf8(app.reply("/posts/go-3/").body).unwrap();
        assert!(page.contains("Go 3"));
    }

    #[test]
    fn test_reply_not_found() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        for url in [
            "/posts/missing/",
            "/posts/page/9",
            "/tags/python/",
            "/tags/go/page/3/",
            "/series/nothing/",
            "/static/missing.css",
            "/static/../content/go-1.md",
        ] {
            assert_eq!(app.reply(url).status, 404, "{url}");
        }
    }

    #[test]
    fn test_reply_feed_and_static() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let feed = app.reply("/feed.xml");
        assert_eq!(feed.status, 200);
        assert!(String::from_utf8(feed.body).unwrap().contains("<rss"));

        let css = app.reply("/static/site.css");
        assert_eq!(css.status, 200);
        assert_eq!(css.content_type, "text/css; charset=utf-8");
        assert_eq!(css.body, b"body{}");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
    }
}
