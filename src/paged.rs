//! Paged.js injection and the render-completion wait.
//!
//! Paged.js lays the document out asynchronously inside the page, where the
//! controller cannot await it. The two sides synchronize through a marker
//! property on `window`:
//!
//! - the controller sets it to `null` before the library is injected,
//! - the page script writes `true` or `false` exactly once when
//!   `PagedPolyfill.preview()` settles,
//! - the controller polls it until it leaves `null` or the timeout elapses.
//!
//! The library runs with `PagedConfig.auto = false` so nothing is laid out
//! before the marker and the logging handler are in place.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::{Error, PageController, PaginationConfig, Result};

/// Window property carrying the completion state
pub const MARKER: &str = "__pagedjs_render_complete__";

/// Window property carrying the page count reported by Paged.js
pub const PAGE_COUNT: &str = "__pagedjs_page_count__";

/// State of the completion marker as read from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Pending,
    Succeeded,
    Failed,
}

impl CompletionState {
    /// Decode a marker value. Anything other than `null`, `true` or `false`
    /// means something else wrote the property.
    pub fn from_marker(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(CompletionState::Pending),
            serde_json::Value::Bool(true) => Ok(CompletionState::Succeeded),
            serde_json::Value::Bool(false) => Ok(CompletionState::Failed),
            other => Err(Error::PaginationFailed(format!(
                "unexpected completion marker value: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        self != CompletionState::Pending
    }
}

/// Outcome of a successful pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationReport {
    /// Pages produced, when Paged.js reported a count
    pub pages: Option<u64>,
    /// Time spent waiting for the marker
    pub elapsed: Duration,
}

const PREPARE_TEMPLATE: &str = r#"(function () {
    window.PagedConfig = { auto: false };
    window['{{MARKER}}'] = null;
    window['{{PAGE_COUNT}}'] = null;
    return null;
})()"#;

const AVAILABILITY_EXPRESSION: &str =
    "typeof window.Paged !== 'undefined' && typeof window.PagedPolyfill !== 'undefined'";

const START_TEMPLATE: &str = r#"(function () {
    const marker = '{{MARKER}}';
    if (window[marker] !== null) return false;
    console.info('render started');
    let page = 1;
    window.Paged.registerHandlers(class extends window.Paged.Handler {
        constructor(chunker, polisher, caller) {
            super(chunker, polisher, caller);
        }
        afterPreview(pages) {
            console.info('previewed ' + pages.length + ' pages');
        }
        beforeParsed() {
            console.debug('beforeParsed');
        }
        afterParsed() {
            console.debug('afterParsed');
        }
        beforePageLayout() {
            console.debug('beforePageLayout - page ' + page);
        }
        afterPageLayout() {
            console.debug('afterPageLayout - page ' + page);
            page++;
        }
        afterRendered(pages) {
            console.info('chunked ' + pages.length + ' pages');
        }
    });
    window.PagedPolyfill.preview().then(
        function (flow) {
            window['{{PAGE_COUNT}}'] = flow && typeof flow.total === 'number' ? flow.total : null;
            console.info('render complete');
            window[marker] = true;
        },
        function (err) {
            console.error(err);
            window[marker] = false;
        }
    );
    return true;
})()"#;

fn fill(template: &str) -> String {
    template
        .replace("{{MARKER}}", MARKER)
        .replace("{{PAGE_COUNT}}", PAGE_COUNT)
}

/// Expression configuring manual mode and installing the pending marker
pub fn prepare_expression() -> String {
    fill(PREPARE_TEMPLATE)
}

/// Expression registering the logging handler and starting the preview
pub fn start_expression() -> String {
    fill(START_TEMPLATE)
}

/// Expression reading the completion marker
pub fn poll_expression() -> String {
    format!("window['{}']", MARKER)
}

/// Expression reading the reported page count
pub fn page_count_expression() -> String {
    format!("window['{}']", PAGE_COUNT)
}

/// Expression checking that the library globals exist
pub fn availability_expression() -> &'static str {
    AVAILABILITY_EXPRESSION
}

/// Inject Paged.js into the loaded page and block until it has laid the
/// document out.
pub fn synchronize<P: PageController>(
    page: &mut P,
    config: &PaginationConfig,
) -> Result<PaginationReport> {
    page.evaluate(&prepare_expression())
        .map_err(|e| Error::PaginationInjection(format!("could not install marker: {}", e)))?;

    debug!("injecting {}", config.script_url);
    page.add_script_tag(&config.script_url)
        .map_err(|e| Error::PaginationInjection(format!("{}: {}", config.script_url, e)))?;

    let available = page
        .evaluate(availability_expression())
        .map_err(|e| Error::PaginationInjection(e.to_string()))?;
    if available != serde_json::Value::Bool(true) {
        return Err(Error::PaginationInjection(format!(
            "{} did not define Paged/PagedPolyfill",
            config.script_url
        )));
    }

    let started = page
        .evaluate(&start_expression())
        .map_err(|e| Error::PaginationFailed(format!("could not start preview: {}", e)))?;
    if started != serde_json::Value::Bool(true) {
        return Err(Error::PaginationFailed(
            "completion marker was already set before the preview started".into(),
        ));
    }

    let elapsed = wait_for_completion(page, config)?;

    let pages = match page.evaluate(&page_count_expression()) {
        Ok(v) => v.as_u64(),
        Err(e) => {
            warn!("could not read page count: {}", e);
            None
        }
    };

    match pages {
        Some(n) => info!("rendered {} pages in {:?}", n, elapsed),
        None => info!("rendered in {:?}", elapsed),
    }

    Ok(PaginationReport { pages, elapsed })
}

/// Poll the marker until it turns terminal. Returns the time spent waiting.
///
/// The first read happens immediately; the timeout is only reported once at
/// least `config.timeout` has passed.
pub fn wait_for_completion<P: PageController>(
    page: &mut P,
    config: &PaginationConfig,
) -> Result<Duration> {
    let start = Instant::now();
    let poll = poll_expression();

    loop {
        let value = page.evaluate(&poll)?;
        match CompletionState::from_marker(&value)? {
            CompletionState::Succeeded => return Ok(start.elapsed()),
            CompletionState::Failed => {
                return Err(Error::PaginationFailed(
                    "Paged.js reported a rendering failure (see browser log)".into(),
                ))
            }
            CompletionState::Pending => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(Error::RenderTimeout { elapsed });
        }
        thread::sleep(config.poll_interval.min(config.timeout - elapsed));
    }
}
