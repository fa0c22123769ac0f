mod cli;

use std::sync::Arc;

use clap::Parser;
use clipfetch::client::HttpJobService;
use clipfetch::config::Config;
use clipfetch::controller::{Controller, ControllerPolicy, JobStatus, SessionState};
use clipfetch::stub::{self, StubState};
use cli::{Cli, Commands, FetchArgs};
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Fetch(args) => fetch(config, args).await?,
        Commands::Stub(args) => stub::run(args.address, StubState::default()).await?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

async fn fetch(mut config: Config, args: FetchArgs) -> Result<(), AnyError> {
    if let Some(base_url) = args.base_url {
        config.service.base_url = base_url;
        config.validate()?;
    }

    let service = HttpJobService::from_config(&config.service)?;
    let controller = Controller::new(Arc::new(service), ControllerPolicy::from(&config));

    let mut updates = controller.subscribe();
    let reporter = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            report(&state);
        }
    });

    let job_id = controller.start(&args.url, args.audio_only).await?;
    info!(%job_id, "Tracking job");

    let settled = controller.wait_until_settled().await;
    reporter.abort();

    match (&settled.job.status, &settled.link) {
        (JobStatus::Ready(_), Some(link)) => {
            let expires = link.expires_at.format(&Rfc3339)?;
            println!("{}", link.url);
            info!(
                kind = link.kind.as_str(),
                %expires,
                "Artifact ready, the service deletes it after its retention window"
            );
            Ok(())
        }
        (JobStatus::Error(error), _) => Err(error.to_string().into()),
        (status, _) => Err(format!("job ended without a retrieval link (status {})", status).into()),
    }
}

fn report(state: &SessionState) {
    let job = &state.job;
    match &job.status {
        JobStatus::Error(error) => warn!(code = error.code(), "{}", error),
        JobStatus::Ready(artifact) => info!(%artifact, "{}", job.status.headline()),
        status => info!(
            progress = %format!("{:.1}%", job.progress_percent),
            speed = %job.speed,
            eta = %job.eta,
            "{}",
            status.headline()
        ),
    }
}
