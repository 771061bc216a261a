use anyhow::Context;
use creata_wallet_lib::host;
use creata_wallet_lib::{WalletContext, WalletPaths};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the message protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let paths = WalletPaths::from_env().context("resolving wallet data directory")?;
    let context = WalletContext::initialize(paths.root_dir().to_path_buf())
        .context("initializing wallet context")?;
    tracing::info!(root = %paths.root_dir().display(), "creata wallet host started");

    let auto_lock = context.start_auto_lock();

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let result = host::serve(context.service(), &mut stdin, &mut stdout).await;

    auto_lock.abort();
    context.session().lock(creata_wallet_lib::LockReason::UserRequested);
    result.context("native messaging loop failed")?;
    Ok(())
}
