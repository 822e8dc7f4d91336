//! pagedpdf
//!
//! Render an HTML document, given as markup or as a URL, into a PDF by driving
//! a headless Chrome over the DevTools protocol. When paged output is
//! requested the [Paged.js](https://pagedjs.org) polyfill is injected into the
//! page and the renderer waits for it to finish laying out before printing,
//! so CSS paged-media rules (page breaks, margin boxes, running headers)
//! apply to the exported document.
//!
//! # Example
//!
//! ```no_run
//! use pagedpdf::RenderConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RenderConfig {
//!     paged: false,
//!     ..Default::default()
//! };
//!
//! let pdf = pagedpdf::render_text("<html><body>Hello</body></html>", &config)?;
//! assert!(pdf.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub mod error;
pub use error::{Error, Result};

pub mod filter;
pub mod observer;
pub mod paged;
pub mod render;

#[cfg(feature = "cdp")]
pub mod cdp;

#[cfg(feature = "cdp")]
pub mod async_api;

pub use filter::RequestFilter;
pub use paged::{CompletionState, PaginationReport};
pub use render::render_with;

#[cfg(feature = "cdp")]
pub use render::{render_text, render_url};

/// Where the document to render comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    /// Literal markup, passed to the browser unvalidated
    Text(String),
    /// A remote (or `file://`) location to navigate to
    Url(Url),
}

/// Configuration for a single render.
///
/// Every render launches its own browser, so one value can be reused for any
/// number of renders. The defaults mirror what a print pipeline usually
/// wants: paged output, backgrounds printed, no browser-drawn header/footer.
///
/// ```
/// let cfg = pagedpdf::RenderConfig::default();
/// assert!(cfg.paged);
/// assert_eq!(cfg.pagination.poll_interval.as_millis(), 500);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Run Paged.js and wait for it before exporting
    pub paged: bool,
    /// Options passed to the PDF export
    pub pdf: PdfOptions,
    /// Tuning for the pagination wait
    pub pagination: PaginationConfig,
    /// Hosts whose requests are aborted before reaching the network
    pub filter: RequestFilter,
    /// Whether to register `filter` on the page at all
    pub filter_requests: bool,
    /// Whether to forward in-page console output to the log
    pub forward_console: bool,
    /// Explicit browser executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Extra command-line switches for the browser process
    pub browser_args: Vec<String>,
    /// Timeout for navigation and other single protocol calls
    pub load_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            paged: true,
            pdf: PdfOptions::default(),
            pagination: PaginationConfig::default(),
            filter: RequestFilter::default(),
            filter_requests: true,
            forward_console: true,
            chrome_path: None,
            browser_args: vec![
                "--disable-dev-shm-usage".to_string(),
                "--export-tagged-pdf".to_string(),
            ],
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// PDF export options
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    /// Honour `@page { size }`; unset means "follow `RenderConfig::paged`"
    pub prefer_css_page_size: Option<bool>,
    /// Let the browser draw its own header and footer
    pub display_header_footer: bool,
    /// Print background colours and images
    pub print_background: bool,
    /// Landscape paper orientation
    pub landscape: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            prefer_css_page_size: None,
            display_header_footer: false,
            print_background: true,
            landscape: false,
        }
    }
}

impl PdfOptions {
    /// Options with every optional field decided for a render.
    pub fn resolved(&self, paged: bool) -> PdfOptions {
        PdfOptions {
            prefer_css_page_size: Some(self.prefer_css_page_size.unwrap_or(paged)),
            ..self.clone()
        }
    }
}

/// Location of the Paged.js polyfill build injected into paged renders
pub const DEFAULT_PAGEDJS_URL: &str =
    "https://unpkg.com/pagedjs@0.5.0-beta.2/dist/paged.polyfill.min.js";

/// Tuning for the render-completion wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Script resource providing `window.Paged` and `window.PagedPolyfill`
    pub script_url: String,
    /// Give up once the marker has been pending this long
    pub timeout: Duration,
    /// Delay between two reads of the marker
    pub poll_interval: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            script_url: DEFAULT_PAGEDJS_URL.to_string(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Console message emitted by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    /// Console method or event kind, e.g. "log", "warn" or "pageerror"
    pub level: String,
    /// Arguments joined with spaces
    pub text: String,
}

/// Information about an outgoing network request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Unique request identifier (backend-specific)
    pub request_id: String,
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
}

/// Action to take when a request is observed by `on_request` handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAction {
    /// Let the request proceed unmodified
    Continue,

    /// Abort the request on the client side with the given network error
    /// reason ("Failed", "Aborted", "BlockedByClient", ...)
    Fail { error_reason: String },
}

/// Expression that appends a `<script src>` element and settles once the
/// resource has loaded (or failed to).
pub fn script_tag_expression(url: &str) -> String {
    let src = serde_json::Value::String(url.to_string()).to_string();
    SCRIPT_TAG_TEMPLATE.replace("{{SRC}}", &src)
}

const SCRIPT_TAG_TEMPLATE: &str = r#"new Promise(function (resolve, reject) {
    const script = document.createElement('script');
    script.src = {{SRC}};
    script.onload = function () { resolve(true); };
    script.onerror = function () { reject(new Error('failed to load script ' + script.src)); };
    (document.head || document.documentElement).appendChild(script);
})"#;

/// A single browser page, owned by one render from launch to close.
pub trait PageController {
    /// Start a browser and open the page used for the render
    fn launch(config: &RenderConfig) -> Result<Self>
    where
        Self: Sized;

    /// Replace the page content with `html` and wait for it to load
    fn set_content(&mut self, html: &str) -> Result<()>;

    /// Navigate to `url` and wait for it to load
    fn goto(&mut self, url: &Url) -> Result<()>;

    /// Evaluate a JavaScript expression in the page, awaiting it if it is a
    /// promise. A thrown exception or rejection is returned as
    /// `Error::Script`; `undefined` comes back as `null`.
    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value>;

    /// Load an external script into the page, like a `<script src>` tag.
    fn add_script_tag(&mut self, url: &str) -> Result<()> {
        self.evaluate(&script_tag_expression(url)).map(|_| ())
    }

    /// Register a callback for console messages and uncaught errors.
    fn on_console<F>(&mut self, cb: F)
    where
        F: Fn(&ConsoleMessage) + Send + Sync + 'static;

    /// Register a callback deciding the fate of every outgoing request.
    fn on_request<F>(&mut self, cb: F)
    where
        F: Fn(&RequestInfo) -> RequestAction + Send + Sync + 'static;

    /// Print the current page to PDF bytes
    fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>>;

    /// Close the page and terminate the browser process
    fn close(self) -> Result<()>;
}
