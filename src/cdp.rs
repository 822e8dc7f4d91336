//! Chrome DevTools Protocol page implementation

use crate::{
    observer, ConsoleMessage, Error, PageController, PdfOptions, RenderConfig, RequestAction,
    RequestInfo, Result,
};
use headless_chrome::browser::tab::Tab;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Network::ErrorReason;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::Deserialize;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type OnConsoleHandler = Arc<dyn Fn(&ConsoleMessage) + Send + Sync>;
type OnRequestHandler = Arc<dyn Fn(&RequestInfo) -> RequestAction + Send + Sync>;

const CONSOLE_BINDING: &str = "__pagedpdf_console";

/// Wraps an expression so that its outcome always comes back as a JSON
/// string envelope: `{ ok, value }` or `{ ok: false, error }`.
const EVAL_TEMPLATE: &str = r#"(async function () {
    try {
        const value = await ({{EXPRESSION}});
        return JSON.stringify({ ok: true, value: value === undefined ? null : value });
    } catch (err) {
        return JSON.stringify({ ok: false, error: String((err && err.stack) || err) });
    }
})()"#;

/// Resolves once the current document and its subresources have loaded.
const LOADED_EXPRESSION: &str = r#"document.readyState === 'complete'
    ? true
    : new Promise(function (resolve) {
        window.addEventListener('load', function () { resolve(true); }, { once: true });
    })"#;

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// A headless Chrome instance with the single tab a render works on.
///
/// Dropping the value kills the browser process, so a page that is never
/// explicitly closed still does not leak Chrome.
pub struct CdpPage {
    browser: Browser,
    tab: Arc<Tab>,

    on_console: Option<OnConsoleHandler>,
    on_request: Option<OnRequestHandler>,

    load_timeout: Duration,
    script_timeout: Duration,
}

/// Upper bound for a single evaluation. A poll read blocks for as long as
/// Paged.js holds the main thread.
fn script_timeout(config: &RenderConfig) -> Duration {
    config.load_timeout.max(config.pagination.timeout)
}

impl CdpPage {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab.set_default_timeout(self.load_timeout);

        self.tab
            .navigate_to(url)
            .map_err(|e| Error::ContentLoad(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::ContentLoad(format!("Wait for navigation failed: {}", e)))?;

        Ok(())
    }

    fn main_frame_id(&self) -> Result<String> {
        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| Error::ContentLoad(format!("Failed to read frame tree: {}", e)))?;
        Ok(tree.frame_tree.frame.id)
    }

    fn evaluate_within(
        &mut self,
        expression: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let wrapper = EVAL_TEMPLATE.replace("{{EXPRESSION}}", expression);

        let result = self
            .tab
            .set_default_timeout(timeout)
            .evaluate(&wrapper, true)
            .map_err(|e| Error::Script(format!("Evaluation failed: {}", e)))?;

        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Script("No value returned from evaluation".into()))?;

        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| Error::Script(format!("Malformed evaluation result: {}", e)))?;

        if envelope.ok {
            Ok(envelope.value.unwrap_or(serde_json::Value::Null))
        } else {
            Err(Error::Script(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

fn error_reason(name: &str) -> ErrorReason {
    match name {
        "Aborted" => ErrorReason::Aborted,
        "TimedOut" => ErrorReason::TimedOut,
        "AccessDenied" => ErrorReason::AccessDenied,
        "BlockedByClient" => ErrorReason::BlockedByClient,
        "NameNotResolved" => ErrorReason::NameNotResolved,
        _ => ErrorReason::Failed,
    }
}

impl PageController for CdpPage {
    fn launch(config: &RenderConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let args: Vec<&OsStr> = config.browser_args.iter().map(OsStr::new).collect();

        // The browser must outlive the longest quiet stretch of a render.
        let idle = config.load_timeout + config.pagination.timeout;

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .path(config.chrome_path.clone())
            .args(args)
            .idle_browser_timeout(idle)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(config.load_timeout);

        Ok(Self {
            browser,
            tab,
            on_console: None,
            on_request: None,
            load_timeout: config.load_timeout,
            script_timeout: script_timeout(config),
        })
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        // A fresh document picks up the hooks registered so far.
        self.navigate("about:blank")?;

        let frame_id = self.main_frame_id()?;
        self.tab
            .call_method(Page::SetDocumentContent {
                frame_id,
                html: html.to_string(),
            })
            .map_err(|e| Error::ContentLoad(format!("Failed to set document content: {}", e)))?;

        let load_timeout = self.load_timeout;
        self.evaluate_within(LOADED_EXPRESSION, load_timeout)
            .map_err(|e| Error::ContentLoad(format!("Document did not finish loading: {}", e)))?;

        Ok(())
    }

    fn goto(&mut self, url: &Url) -> Result<()> {
        self.navigate(url.as_str())
    }

    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        let timeout = self.script_timeout;
        self.evaluate_within(expression, timeout)
    }

    fn on_console<F>(&mut self, cb: F)
    where
        F: Fn(&ConsoleMessage) + Send + Sync + 'static,
    {
        let arc: OnConsoleHandler = Arc::new(cb);
        let handler_arc = arc.clone();

        // The binding receives JSON payloads from the page hook and forwards
        // them to the registered callback.
        let _ = self
            .tab
            .expose_function(
                CONSOLE_BINDING,
                Arc::new(move |payload: serde_json::Value| {
                    if let Some(msg) = observer::parse_payload(&payload) {
                        (handler_arc)(&msg);
                    }
                }),
            )
            .map_err(|e| warn!("Failed to expose console binding: {}", e))
            .ok();

        let hook = observer::CONSOLE_HOOK_TEMPLATE.replace("{{BINDING}}", CONSOLE_BINDING);

        let _ = self
            .tab
            .call_method(Page::AddScriptToEvaluateOnNewDocument {
                source: hook,
                world_name: None,
                include_command_line_api: None,
                run_immediately: None,
            })
            .map_err(|e| warn!("Failed to inject console hook: {}", e))
            .ok();

        self.on_console = Some(arc);
    }

    fn on_request<F>(&mut self, cb: F)
    where
        F: Fn(&RequestInfo) -> RequestAction + Send + Sync + 'static,
    {
        let arc: OnRequestHandler = Arc::new(cb);
        let handler_arc = arc.clone();

        let _ = self
            .tab
            .enable_fetch(None, Some(false))
            .map_err(|e| warn!("Failed to enable fetch domain: {}", e))
            .ok();

        let interceptor: Arc<dyn RequestInterceptor + Send + Sync> = Arc::new(
            move |_transport, _session_id, event: RequestPausedEvent| {
                let req = &event.params.request;

                let info = RequestInfo {
                    request_id: event.params.request_id.clone(),
                    url: req.url.clone(),
                    method: req.method.clone(),
                };

                match (handler_arc)(&info) {
                    RequestAction::Continue => RequestPausedDecision::Continue(None),
                    RequestAction::Fail { error_reason: reason } => {
                        RequestPausedDecision::Fail(FailRequest {
                            request_id: event.params.request_id.clone(),
                            error_reason: error_reason(&reason),
                        })
                    }
                }
            },
        );

        let _ = self
            .tab
            .enable_request_interception(interceptor)
            .map_err(|e| warn!("Failed to enable request interception: {}", e))
            .ok();

        self.on_request = Some(arc);
    }

    fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        let print_options = PrintToPdfOptions {
            landscape: Some(options.landscape),
            display_header_footer: Some(options.display_header_footer),
            print_background: Some(options.print_background),
            prefer_css_page_size: options.prefer_css_page_size,
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(print_options))
            .map_err(|e| Error::Export(format!("Print to PDF failed: {}", e)))
    }

    fn close(self) -> Result<()> {
        if let Err(e) = self.tab.close(true) {
            debug!("Tab close failed, killing browser anyway: {}", e);
        }
        drop(self.on_console);
        drop(self.on_request);
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
