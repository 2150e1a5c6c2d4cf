mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::header::{HeaderValue, RANGE};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, SavedAction};
use gallery::path::ExtractionPath;
use gallery::prelude::*;
use gallery::proxy::{ProxyRequest, ProxyResponse};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = GalleryConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database {
        config.database_url = Some(url);
    }
    let hub = Hub::connect(config).await?;

    match cli.command {
        Commands::Sources { kind } => {
            for s in hub.sources(kind).await? {
                let mode = match s.path() {
                    Some(p) => format!("json:{p}"),
                    None => "raw".to_string(),
                };
                println!("{:<20} {:<6} {:<16} {}  ({})", s.id, s.kind, mode, s.endpoint, s.name);
            }
        }
        Commands::Resolve { id } => match hub.resolve(&id).await? {
            Ok(locator) => println!("{locator}"),
            Err(e) => {
                eprintln!("{} error: {}", e.kind(), e);
                std::process::exit(1);
            }
        },
        Commands::Roll { kind, ids } => {
            let g = hub.gallery(kind).await?;
            if let Some(locator) = g.load_initial().await {
                println!("[{}] {}", g.snapshot().active, locator);
            }
            if ids.is_empty() {
                report(&g, g.refresh().await);
            }
            for id in ids {
                let outcome = g.select(&id).await?;
                report(&g, outcome);
            }
        }
        Commands::Saved { action } => match action {
            SavedAction::List { kind } => {
                for s in hub.saved_sources(kind).await? {
                    println!("{:<20} {:<6} {}  ({})", s.id, s.kind, s.endpoint, s.name);
                }
            }
            SavedAction::Add { id, name, endpoint, path, kind } => {
                let source = match path {
                    Some(p) => {
                        let path = ExtractionPath::parse(&p).with_context(|| format!("invalid path '{p}'"))?;
                        SourceDescriptor::structured(id, name, endpoint, path)
                    }
                    None => SourceDescriptor::raw(id, name, endpoint),
                };
                let source = source.with_kind(kind);
                source.validate()?;
                hub.save_source(&source).await?;
                println!("saved {}", source.id);
            }
            SavedAction::Remove { id } => {
                if hub.delete_source(&id).await? {
                    println!("removed {id}");
                } else {
                    eprintln!("no saved source '{id}'");
                }
            }
        },
        Commands::Download { video_url, filename, range, output } => {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            query.append_pair("video_url", &video_url);
            if let Some(name) = &filename {
                query.append_pair("filename", name);
            }
            let mut req = ProxyRequest::get(Some(&query.finish()));
            if let Some(range) = range {
                req.headers.insert(RANGE, HeaderValue::from_str(&range).context("invalid range")?);
            }
            let resp = hub.proxy()?.download(req).await;
            print_head(&resp);
            if !resp.status.is_success() {
                eprintln!("{}", String::from_utf8_lossy(&resp.body));
                std::process::exit(1);
            }
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &resp.body)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("wrote {} bytes to {}", resp.body.len(), path.display());
                }
                None => std::io::stdout().write_all(&resp.body).context("writing to stdout")?,
            }
        }
        Commands::Proxy { id, query } => {
            let proxy = hub.proxy()?;
            let resp = proxy.forward(&id, ProxyRequest::get(query.as_deref())).await;
            print_head(&resp);
            println!("{}", String::from_utf8_lossy(&resp.body));
        }
    }
    Ok(())
}

fn report(g: &Gallery, outcome: Outcome) {
    let active = g.snapshot().active;
    match outcome {
        Outcome::Applied(locator) => println!("[{active}] {locator}"),
        Outcome::Failed(e) => eprintln!("[{active}] {} error: {}", e.kind(), e),
        Outcome::Stale => eprintln!("[{active}] superseded"),
    }
}

fn print_head(resp: &ProxyResponse) {
    eprintln!("HTTP {}", resp.status);
    for (name, value) in &resp.headers {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
