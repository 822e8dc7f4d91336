//! Common test utilities
//!
//! `ScriptedPage` is an in-memory `PageController` that answers the
//! expressions the renderer evaluates according to a `Script`, and records
//! every call in a shared journal so tests can assert on ordering.

#![allow(dead_code)]

use pagedpdf::{
    paged, script_tag_expression, ConsoleMessage, Error, PageController, PdfOptions,
    RenderConfig, RequestAction, RequestInfo, Result, DEFAULT_PAGEDJS_URL,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use url::Url;

/// A minimal PDF body, enough for the magic-header check
pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n1 0 obj << >> endobj\ntrailer << >>\n%%EOF\n";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OnConsole,
    OnRequest,
    SetContent(String),
    Goto(String),
    Evaluate(String),
    PrintToPdf(PdfOptions),
    Close,
}

/// How the scripted page behaves
#[derive(Debug, Clone)]
pub struct Script {
    /// Fail `set_content`/`goto`
    pub load_error: bool,
    /// URL whose script-tag injection is recognised
    pub inject_url: String,
    /// Reject the script-tag injection
    pub inject_error: bool,
    /// Whether `Paged`/`PagedPolyfill` exist after injection
    pub polyfill_defined: bool,
    /// Successive marker reads; the last one repeats
    pub markers: Vec<Value>,
    /// Value of the page-count property
    pub page_count: Value,
    /// Result of `print_to_pdf`
    pub pdf: std::result::Result<Vec<u8>, String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            load_error: false,
            inject_url: DEFAULT_PAGEDJS_URL.to_string(),
            inject_error: false,
            polyfill_defined: true,
            markers: vec![json!(true)],
            page_count: json!(3),
            pdf: Ok(FAKE_PDF.to_vec()),
        }
    }
}

type RequestHandler = Arc<dyn Fn(&RequestInfo) -> RequestAction + Send + Sync>;
type ConsoleHandler = Arc<dyn Fn(&ConsoleMessage) + Send + Sync>;

/// Shared view on the calls a `ScriptedPage` received, plus the hooks the
/// renderer registered on it
#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
    request_handler: Arc<Mutex<Option<RequestHandler>>>,
    console_handler: Arc<Mutex<Option<ConsoleHandler>>>,
}

impl Journal {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Run a request through the registered request hook
    pub fn request(&self, method: &str, url: &str) -> Option<RequestAction> {
        let handler = self.request_handler.lock().unwrap().clone()?;
        Some(handler(&RequestInfo {
            request_id: "req-1".into(),
            url: url.into(),
            method: method.into(),
        }))
    }

    /// Emit a console message through the registered console hook
    pub fn console(&self, level: &str, text: &str) -> bool {
        match self.console_handler.lock().unwrap().clone() {
            Some(handler) => {
                handler(&ConsoleMessage {
                    level: level.into(),
                    text: text.into(),
                });
                true
            }
            None => false,
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(|c| pred(c))
    }

    pub fn rposition(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().rposition(|c| pred(c))
    }

    pub fn evaluated(&self, expression: &str) -> usize {
        self.count(|c| matches!(c, Call::Evaluate(e) if e == expression))
    }

    pub fn closes(&self) -> usize {
        self.count(|c| *c == Call::Close)
    }

    pub fn printed(&self) -> bool {
        self.count(|c| matches!(c, Call::PrintToPdf(_))) > 0
    }
}

pub struct ScriptedPage {
    script: Script,
    journal: Journal,
    marker_reads: usize,
}

impl ScriptedPage {
    pub fn new(script: Script) -> (Self, Journal) {
        let journal = Journal::default();
        let page = Self {
            script,
            journal: journal.clone(),
            marker_reads: 0,
        };
        (page, journal)
    }

    fn next_marker(&mut self) -> Value {
        let markers = &self.script.markers;
        let value = match markers.len() {
            0 => Value::Null,
            n => markers[self.marker_reads.min(n - 1)].clone(),
        };
        self.marker_reads += 1;
        value
    }
}

impl PageController for ScriptedPage {
    fn launch(_config: &RenderConfig) -> Result<Self> {
        Ok(Self::new(Script::default()).0)
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        self.journal.push(Call::SetContent(html.to_string()));
        if self.script.load_error {
            return Err(Error::ContentLoad("scripted load failure".into()));
        }
        Ok(())
    }

    fn goto(&mut self, url: &Url) -> Result<()> {
        self.journal.push(Call::Goto(url.to_string()));
        if self.script.load_error {
            return Err(Error::ContentLoad("scripted navigation failure".into()));
        }
        Ok(())
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value> {
        self.journal.push(Call::Evaluate(expression.to_string()));

        if expression == paged::poll_expression() {
            return Ok(self.next_marker());
        }
        if expression == paged::page_count_expression() {
            return Ok(self.script.page_count.clone());
        }
        if expression == paged::availability_expression() {
            return Ok(Value::Bool(self.script.polyfill_defined));
        }
        if expression == paged::start_expression() {
            return Ok(Value::Bool(true));
        }
        if expression == script_tag_expression(&self.script.inject_url) {
            if self.script.inject_error {
                return Err(Error::Script(format!(
                    "Error: failed to load script {}",
                    self.script.inject_url
                )));
            }
            return Ok(Value::Bool(true));
        }
        Ok(Value::Null)
    }

    fn on_console<F>(&mut self, cb: F)
    where
        F: Fn(&ConsoleMessage) + Send + Sync + 'static,
    {
        self.journal.push(Call::OnConsole);
        *self.journal.console_handler.lock().unwrap() = Some(Arc::new(cb));
    }

    fn on_request<F>(&mut self, cb: F)
    where
        F: Fn(&RequestInfo) -> RequestAction + Send + Sync + 'static,
    {
        self.journal.push(Call::OnRequest);
        *self.journal.request_handler.lock().unwrap() = Some(Arc::new(cb));
    }

    fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        self.journal.push(Call::PrintToPdf(options.clone()));
        self.script.pdf.clone().map_err(Error::Export)
    }

    fn close(self) -> Result<()> {
        self.journal.push(Call::Close);
        Ok(())
    }
}

/// Small timings so the timeout paths stay fast
pub fn quick_config() -> RenderConfig {
    let mut config = RenderConfig::default();
    config.pagination.timeout = std::time::Duration::from_millis(600);
    config.pagination.poll_interval = std::time::Duration::from_millis(100);
    config
}
