//! fnav - headless navigation shell
//!
//! Navigates a headless page through a list of paths on a live origin and
//! prints the resulting metrics as JSON.
//!
//! ```text
//! fnav <origin> [--config file.json] [--start /] [--prefetch] <path>...
//! ```

use anyhow::{bail, Context, Result};
use fnav_engine::{
    HeadSync, HeadlessPage, HttpTransport, NavigationEvent, Navigator, NavigatorConfig,
};
use tracing_subscriber::EnvFilter;

struct Args {
    origin: String,
    config: Option<String>,
    start: String,
    prefetch: bool,
    paths: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut origin = None;
    let mut config = None;
    let mut start = "/".to_string();
    let mut prefetch = false;
    let mut paths = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().context("--config needs a file")?),
            "--start" => start = args.next().context("--start needs a path")?,
            "--prefetch" => prefetch = true,
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ if origin.is_none() => origin = Some(arg),
            _ => paths.push(arg),
        }
    }

    let Some(origin) = origin else {
        bail!("usage: fnav <origin> [--config file.json] [--start /] [--prefetch] <path>...");
    };
    Ok(Args { origin, config, start, prefetch, paths })
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => {
            NavigatorConfig::from_file(path).with_context(|| format!("loading {}", path))?
        }
        None => NavigatorConfig::default(),
    };

    let transport = HttpTransport::with_timeout(&args.origin, config.fetch_config().timeout)
        .with_context(|| format!("invalid origin {}", args.origin))?;
    let host = HeadlessPage::new(&args.start).with_region(&config.content_selector, "");
    let navigator = Navigator::new(config, host, transport)?;
    navigator.add_hook(HeadSync);

    navigator.subscribe(|event| match &event.payload {
        NavigationEvent::Error { path, kind, message, .. } => {
            tracing::warn!("{} {} ({}): {}", event.name(), path, kind, message)
        }
        payload => tracing::debug!("{}: {:?}", event.name(), payload),
    });

    tracing::info!("Starting fnav against {}", args.origin);
    smol::block_on(async {
        if args.prefetch {
            for path in &args.paths {
                navigator.prefetch(path).await;
            }
        }
        for path in &args.paths {
            let ok = navigator.navigate(path).await;
            let title = navigator.host().head().title.unwrap_or_default();
            let outcome = if ok { "in-page" } else { "declined/fallback" };
            tracing::info!("{} -> {} {}", path, outcome, title);
        }
    });

    println!("{}", navigator.metrics().to_json()?);
    navigator.destroy();
    Ok(())
}
