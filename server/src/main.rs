use anyhow::{Context, Result};
use clap::Parser;
use reelsearch_core::IndexConfig;
use server::build_app_with_token;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP search service over an index written by `indexer build`.
#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Fields the index was built with
    #[arg(long, value_delimiter = ',', default_values_t = IndexConfig::default().fields)]
    fields: Vec<String>,
    /// Re-adding a document id through `/index/batch` replaces its old postings
    #[arg(long, default_value_t = false)]
    replace_on_overwrite: bool,
    /// Token for the admin endpoints; falls back to ADMIN_TOKEN
    #[arg(long)]
    admin_token: Option<String>,
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl Args {
    fn config(&self) -> IndexConfig {
        IndexConfig { fields: self.fields.clone(), replace_on_overwrite: self.replace_on_overwrite }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    let admin_token = args.admin_token.clone().or_else(|| std::env::var("ADMIN_TOKEN").ok());
    if admin_token.is_none() {
        tracing::warn!("no admin token configured; admin endpoints will reject every request");
    }
    let app = build_app_with_token(args.index.clone(), config, admin_token)
        .with_context(|| format!("opening index at {}", args.index))?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index, fields = ?args.fields, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
