//! Render orchestration: launch → load → (paginate) → export → close.

use log::{debug, info, warn};
use std::time::Instant;

use crate::{observer, paged, Error, PageController, RenderConfig, RenderSource, Result};

/// Bytes every PDF document starts with
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Render markup into PDF bytes using headless Chrome.
#[cfg(feature = "cdp")]
pub fn render_text(content: &str, config: &RenderConfig) -> Result<Vec<u8>> {
    render::<crate::cdp::CdpPage>(&RenderSource::Text(content.to_string()), config)
}

/// Render the document at `url` into PDF bytes using headless Chrome.
#[cfg(feature = "cdp")]
pub fn render_url(url: &url::Url, config: &RenderConfig) -> Result<Vec<u8>> {
    render::<crate::cdp::CdpPage>(&RenderSource::Url(url.clone()), config)
}

/// Launch a fresh page of backend `P` and render `source` on it.
pub fn render<P: PageController>(source: &RenderSource, config: &RenderConfig) -> Result<Vec<u8>> {
    let started = Instant::now();
    let page = P::launch(config)?;
    debug!("browser launched in {:?}", started.elapsed());
    render_with(page, source, config)
}

/// Render `source` on an already launched page.
///
/// The page is consumed: it is closed exactly once after the export
/// attempt, whether or not loading, pagination or export failed. A failure to
/// close is logged but does not discard an exported document.
pub fn render_with<P: PageController>(
    mut page: P,
    source: &RenderSource,
    config: &RenderConfig,
) -> Result<Vec<u8>> {
    let outcome = drive(&mut page, source, config);

    if let Err(e) = page.close() {
        warn!("Failed to close browser (continuing anyway): {}", e);
    }

    outcome
}

fn drive<P: PageController>(
    page: &mut P,
    source: &RenderSource,
    config: &RenderConfig,
) -> Result<Vec<u8>> {
    if config.forward_console {
        page.on_console(observer::forward);
    }
    if config.filter_requests {
        let filter = config.filter.clone();
        page.on_request(move |req| filter.decide(req));
    }

    let loaded = match source {
        RenderSource::Text(html) => {
            debug!("loading {} bytes of markup", html.len());
            page.set_content(html)
        }
        RenderSource::Url(url) => {
            debug!("navigating to {}", url);
            page.goto(url)
        }
    };
    if let Err(e) = loaded {
        observer::navigation_failed(&e);
        return Err(e);
    }

    if config.paged {
        paged::synchronize(page, &config.pagination)?;
    }

    let options = config.pdf.resolved(config.paged);
    let pdf = page.print_to_pdf(&options)?;
    if !pdf.starts_with(PDF_MAGIC) {
        return Err(Error::Export(format!(
            "browser returned {} bytes that are not a PDF document",
            pdf.len()
        )));
    }

    info!("exported {} bytes of PDF", pdf.len());
    Ok(pdf)
}
