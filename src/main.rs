use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use research_pilot::cli;
use research_pilot::generator::workflow::launch;
use research_pilot::llm::client::ProviderFactory;

#[tokio::main]
async fn main() -> Result<()> {
    // .env不存在时忽略
    let _ = dotenvy::dotenv();

    let args = cli::Args::parse();
    let check_providers = args.check_providers;
    let query = args.query.clone();
    let config = args.into_config()?;

    init_tracing(config.verbose)?;

    if check_providers {
        println!("🔍 检查LLM Provider可用状态...");
        for availability in ProviderFactory::survey(&config.llm).await {
            let icon = if availability.is_usable() { "✅" } else { "❌" };
            println!(
                "{} {:<8} {:<20} {}",
                icon,
                availability.kind,
                availability.kind.display_name(),
                availability.status
            );
        }
        return Ok(());
    }

    let query = match query {
        Some(query) if !query.trim().is_empty() => query,
        _ => read_query_from_stdin()?,
    };

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️ 收到中断信号，当前阶段结束后取消调研...");
            ctrl_c_token.cancel();
        }
    });

    let completed = launch(&config, query.trim(), cancel).await?;
    println!("{}", completed.output_path.display());

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

fn read_query_from_stdin() -> Result<String> {
    println!("📝 请输入调研问题（以EOF结束）:");
    let mut query = String::new();
    std::io::stdin()
        .read_to_string(&mut query)
        .context("Failed to read query from stdin")?;

    let query = query.trim().to_string();
    if query.is_empty() {
        bail!("no research query given");
    }
    Ok(query)
}
