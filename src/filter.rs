//! Outbound request denylist.
//!
//! Third-party embeds (tweets, forms) either never finish loading in a
//! headless browser or contribute nothing to printed output, so their
//! requests are failed on the client side before they reach the network.
//! Everything else passes through untouched and is logged as `METHOD URL`,
//! except `data:` URLs whose payloads would flood the log.

use crate::{RequestAction, RequestInfo};
use log::{debug, info};
use url::Url;

/// Hosts blocked unless the caller supplies its own list
pub const DEFAULT_BLOCKED_HOSTS: [&str; 3] = [
    "cdn.syndication.twimg.com",
    "embed.typeform.com",
    "platform.twitter.com",
];

/// How a request URL is treated by a [`RequestFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Abort before it leaves the browser
    Deny,
    /// Continue and log it
    Allow,
    /// Continue without logging (inline `data:` payloads)
    AllowQuiet,
}

/// A pass/deny filter keyed on the request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    blocked_hosts: Vec<String>,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_HOSTS.iter().map(|h| h.to_string()))
    }
}

impl RequestFilter {
    pub fn new<I>(hosts: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut blocked_hosts: Vec<String> = hosts
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        blocked_hosts.sort();
        blocked_hosts.dedup();
        Self { blocked_hosts }
    }

    /// A filter that lets everything through (still logging).
    pub fn allow_all() -> Self {
        Self {
            blocked_hosts: Vec::new(),
        }
    }

    /// Add one more host to the denylist.
    pub fn block(&mut self, host: &str) {
        let host = host.trim().to_ascii_lowercase();
        if !host.is_empty() && !self.blocked_hosts.contains(&host) {
            self.blocked_hosts.push(host);
            self.blocked_hosts.sort();
        }
    }

    pub fn blocked_hosts(&self) -> &[String] {
        &self.blocked_hosts
    }

    /// Classify a request URL. Hosts compare like `URL.host` in the page:
    /// lowercase, with the port only when it is not the scheme default.
    pub fn classify(&self, url: &str) -> Verdict {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return Verdict::Allow,
        };

        if parsed.scheme() == "data" {
            return Verdict::AllowQuiet;
        }

        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => return Verdict::Allow,
        };

        if self.blocked_hosts.iter().any(|b| *b == host) {
            Verdict::Deny
        } else {
            Verdict::Allow
        }
    }

    /// Decide the fate of an intercepted request and log it.
    pub fn decide(&self, req: &RequestInfo) -> RequestAction {
        match self.classify(&req.url) {
            Verdict::Deny => {
                debug!("blocked {} {}", req.method, req.url);
                RequestAction::Fail {
                    error_reason: "Failed".to_string(),
                }
            }
            Verdict::Allow => {
                info!("{} {}", req.method, req.url);
                RequestAction::Continue
            }
            Verdict::AllowQuiet => RequestAction::Continue,
        }
    }
}
