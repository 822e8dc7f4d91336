//! Forwarding of in-page diagnostics to the host log.
//!
//! Lines carry a `[BROWSER]` prefix and the `pagedpdf::browser` target so
//! they can be told apart from (and filtered separately to) the renderer's
//! own output. Nothing here affects the render outcome.

use crate::ConsoleMessage;
use log::Level;
use serde::Deserialize;

/// Log target for everything originating inside the page
pub const TARGET: &str = "pagedpdf::browser";

/// Map a console method (or event kind) to a log level.
pub fn level_for(kind: &str) -> Level {
    match kind {
        "error" | "pageerror" => Level::Error,
        "warn" | "warning" => Level::Warn,
        "info" => Level::Info,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => Level::Info,
    }
}

/// Write one console message to the log.
pub fn forward(msg: &ConsoleMessage) {
    log::log!(target: TARGET, level_for(&msg.level), "[BROWSER] {}", msg.text);
}

/// Report a failed navigation the same way in-page errors are reported.
pub fn navigation_failed(err: &crate::Error) {
    log::error!(target: TARGET, "[BROWSER] {}", err);
}

#[derive(Deserialize)]
struct BindingPayload {
    level: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

/// Decode the JSON payload posted by the in-page console hook.
///
/// The hook sends a JSON string; an already-decoded object is accepted too.
pub fn parse_payload(payload: &serde_json::Value) -> Option<ConsoleMessage> {
    let decoded = match payload.as_str() {
        Some(s) => serde_json::from_str::<serde_json::Value>(s).ok()?,
        None => payload.clone(),
    };
    let payload: BindingPayload = serde_json::from_value(decoded).ok()?;

    let text = payload
        .args
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
        .collect::<Vec<_>>()
        .join(" ");

    Some(ConsoleMessage {
        level: payload.level,
        text,
    })
}

/// Installed on every new document. Wraps the console methods and listens
/// for uncaught errors, posting each one to the `{{BINDING}}` binding.
/// `Error` objects are described by their stack instead of `[object Error]`.
pub(crate) const CONSOLE_HOOK_TEMPLATE: &str = r#"(function () {
    const bind = window['{{BINDING}}'];
    if (!bind || window.__pagedpdf_console_hooked__) return;
    window.__pagedpdf_console_hooked__ = true;
    const describe = function (a) {
        if (a instanceof Error) return a.stack || String(a);
        if (a !== null && typeof a === 'object') {
            try { return JSON.stringify(a); } catch (e) { return String(a); }
        }
        return String(a);
    };
    const send = function (level, args) {
        try { bind(JSON.stringify({ level: level, args: args.map(describe) })); } catch (e) {}
    };
    ['log', 'debug', 'info', 'warn', 'error', 'trace'].forEach(function (k) {
        const orig = console[k];
        console[k] = function (...args) {
            send(k, args);
            try { orig.apply(console, args); } catch (e) {}
        };
    });
    window.addEventListener('error', function (ev) {
        send('pageerror', [ev.error || ev.message]);
    });
    window.addEventListener('unhandledrejection', function (ev) {
        send('pageerror', [ev.reason]);
    });
})();"#;
