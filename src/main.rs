use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use log::info;
use pagedpdf::{Error, PaginationConfig, PdfOptions, RenderConfig, RenderSource, RequestFilter};
use sha2::{Digest, Sha256};
use url::Url;

/// Render an HTML document to PDF with headless Chrome, optionally paginated
/// by Paged.js.
#[derive(Parser, Debug)]
#[command(name = "pagedpdf", version, about)]
struct Cli {
    /// Read markup from this file
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Write the PDF to this file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Render the document at this URL instead of a file
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Paginate with Paged.js before printing
    #[arg(
        short,
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    paged: bool,

    /// Print without pagination (same as `--paged false`)
    #[arg(long = "no-paged")]
    no_paged: bool,

    /// Seconds to wait for pagination to finish
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    timeout: u64,

    /// Milliseconds between two checks of the pagination state
    #[arg(long, value_name = "MS", default_value_t = 500)]
    poll_interval: u64,

    /// Paged.js polyfill to inject
    #[arg(long, value_name = "URL", default_value = pagedpdf::DEFAULT_PAGEDJS_URL)]
    pagedjs_url: String,

    /// Chrome/Chromium executable to launch
    #[arg(long, value_name = "PATH", env = "PAGEDPDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Abort requests to this host (repeatable)
    #[arg(long = "block-host", value_name = "HOST")]
    block_hosts: Vec<String>,

    /// Do not block the built-in list of embed hosts
    #[arg(long)]
    no_default_blocklist: bool,

    /// Let Chrome print its own header and footer
    #[arg(long)]
    header_footer: bool,

    /// Landscape paper orientation
    #[arg(long)]
    landscape: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Where the markup comes from, after validation
#[derive(Debug, PartialEq, Eq)]
enum Input {
    File(PathBuf),
    Url(Url),
}

impl Cli {
    fn input(&self) -> pagedpdf::Result<Input> {
        match (&self.input, &self.url) {
            (Some(_), Some(_)) => Err(Error::Config(
                "--input and --url are mutually exclusive".into(),
            )),
            (None, None) => Err(Error::Config("one of --input or --url is required".into())),
            (Some(path), None) => Ok(Input::File(path.clone())),
            (None, Some(raw)) => Url::parse(raw)
                .map(Input::Url)
                .map_err(|e| Error::Config(format!("invalid --url '{}': {}", raw, e))),
        }
    }

    fn render_config(&self) -> pagedpdf::Result<RenderConfig> {
        if self.timeout == 0 {
            return Err(Error::Config("--timeout must be at least 1 second".into()));
        }
        if self.poll_interval == 0 {
            return Err(Error::Config("--poll-interval must be at least 1 ms".into()));
        }

        let mut filter = if self.no_default_blocklist {
            RequestFilter::allow_all()
        } else {
            RequestFilter::default()
        };
        for host in &self.block_hosts {
            filter.block(host);
        }

        Ok(RenderConfig {
            paged: self.paged && !self.no_paged,
            pdf: PdfOptions {
                display_header_footer: self.header_footer,
                landscape: self.landscape,
                ..Default::default()
            },
            pagination: PaginationConfig {
                script_url: self.pagedjs_url.clone(),
                timeout: Duration::from_secs(self.timeout),
                poll_interval: Duration::from_millis(self.poll_interval),
            },
            filter,
            chrome_path: self.chrome.clone(),
            ..Default::default()
        })
    }

    fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Read the markup for `input`. Bytes that are not UTF-8 are replaced
/// rather than rejected; the browser gets whatever the file holds.
async fn load_source(input: Input) -> pagedpdf::Result<RenderSource> {
    match input {
        Input::File(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| Error::io_at(&path, e))?;
            Ok(RenderSource::Text(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
        Input::Url(url) => Ok(RenderSource::Url(url)),
    }
}

async fn run(cli: &Cli) -> pagedpdf::Result<()> {
    let config = cli.render_config()?;
    let source = load_source(cli.input()?).await?;

    let started = Instant::now();
    let pdf = pagedpdf::async_api::render(source, config).await?;

    tokio::fs::write(&cli.output, &pdf)
        .await
        .map_err(|e| Error::io_at(&cli.output, e))?;

    info!(
        "wrote {} ({} bytes, sha256 {}) in {:?}",
        cli.output.display(),
        pdf.len(),
        hex::encode(Sha256::digest(&pdf)),
        started.elapsed()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    std::process::exit(exit_code(&run(&cli).await));
}

/// Report the outcome on stderr and map it to the process exit status.
fn exit_code(outcome: &pagedpdf::Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("pagedpdf: {}", e);
            1
        }
    }
}
