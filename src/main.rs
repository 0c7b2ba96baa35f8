use anyhow::Result;
use clap::Parser;
use edgecheck::{
    api::ApiClient,
    cli::{Args, Command},
    client::ChannelClient,
    config::Config,
    formatter::EventFormatter,
    monitoring::setup_metrics,
    tracing_setup::setup_tracing,
    types::{HistoryQuery, RunChecksRequest},
    ui::Dashboard,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup tracing/logging
    setup_tracing(&args.log_level, args.json_logs, !args.no_color)?;

    info!("Starting edgecheck v{}", env!("CARGO_PKG_VERSION"));

    // process-wide rustls provider for wss and https
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = Config::from_args(&args)?;

    if config.metrics.enabled {
        setup_metrics(config.metrics.port)?;
    }

    let api = ApiClient::new(&config.server.origin, config.server.api_timeout)?;
    let formatter = EventFormatter::new(
        config.output.format,
        config.output.colored,
        config.output.quiet,
    );

    match args.command.clone().unwrap_or(Command::Watch) {
        Command::Watch => {
            let client = ChannelClient::new(&config.channel)?;
            let mut dashboard = Dashboard::new(client, api, formatter, config.dashboard.clone());
            info!("Watching {}. Press Ctrl+C to stop...", config.channel.endpoint);
            dashboard.watch().await?;
        }
        Command::Run {
            checks,
            camera_count,
            manual,
        } => {
            let request = RunChecksRequest::new(checks, camera_count, !manual);
            let client = ChannelClient::new(&config.channel)?;
            let mut dashboard = Dashboard::new(client, api, formatter, config.dashboard.clone());
            match dashboard.run(request).await {
                Ok(result) => info!(status = result.status(), "Check run finished"),
                Err(e) => {
                    error!("Check run failed: {:#}", e);
                    return Err(e);
                }
            }
        }
        Command::Status => {
            let status = api.check_status().await?;
            println!("{}", formatter.status_line(&status));
        }
        Command::History {
            page,
            page_size,
            check_type,
            status,
        } => {
            let query = HistoryQuery {
                check_type,
                status,
                ..HistoryQuery::new(page, page_size)
            };
            let history = api.history(&query).await?;
            println!("{}", formatter.history_table(&history));
        }
        Command::Show { id } => {
            let entry = api.history_detail(id).await?;
            println!("{}", formatter.history_detail(&entry));
        }
        Command::Config => {
            let dashboard_config = api.config().await?;
            println!("{}", formatter.config_block(&dashboard_config));
        }
    }

    Ok(())
}
