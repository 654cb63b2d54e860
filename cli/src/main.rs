use clap::Parser;
use relay_txstore::TransactionStore;
use relay_txstore_cli::{cli::TxStoreCli, commands, config};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = TxStoreCli::parse();
    let mut config = config::get_config(&args.config_dir, args.environment)?;
    args.apply_overrides(&mut config);

    let subscriber = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "relay_txstore=debug,relay_txstore_cli=debug".into()),
    );

    // stdout carries command output
    match config.log.format {
        config::LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        config::LogFormat::Pretty => subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    // Without durable tracking the relay could reuse nonces it can no longer see
    let store = TransactionStore::open(config.store).await.inspect_err(|e| {
        tracing::error!(error = %e, "Refusing to start without a usable transaction store");
    })?;

    let output = commands::run(&store, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
