//! Async-friendly entry points.
//!
//! The CDP backend blocks its calling thread for the whole render (navigation
//! waits, marker polling, export), so each render runs on a dedicated worker
//! thread that owns the page from launch to close. The result is handed back
//! through a oneshot channel and async callers never block their runtime.

use crate::{cdp, Error, PageController, RenderConfig, RenderSource, Result};
use std::thread;
use tokio::sync::oneshot;

/// Render `source` with headless Chrome without blocking the async runtime.
pub async fn render(source: RenderSource, config: RenderConfig) -> Result<Vec<u8>> {
    render_on::<cdp::CdpPage>(source, config).await
}

/// Same as [`render`] for an arbitrary page backend.
pub async fn render_on<P>(source: RenderSource, config: RenderConfig) -> Result<Vec<u8>>
where
    P: PageController + 'static,
{
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("pagedpdf-render".to_string())
        .spawn(move || {
            let res = crate::render::render::<P>(&source, &config);
            // The receiver is gone only if the caller stopped waiting.
            let _ = tx.send(res);
        })?;

    rx.await
        .map_err(|e| Error::Other(format!("Render worker canceled: {}", e)))?
}
