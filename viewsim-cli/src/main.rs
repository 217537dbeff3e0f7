mod cli;
mod error;
mod report;
mod viewer;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use viewsim_engine::{DEFAULT_USER_AGENT, Fetch, HttpConfig, HttpFetcher, SessionConfig};

use crate::{
    cli::{Args, parse_header},
    error::{AppError, Result},
    report::Report,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(report) => {
            print!("{report}");
            if report.total_failures() > 0 || report.aborted_viewers > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Application error: {e}");
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<Report> {
    if args.viewers == 0 {
        return Err(AppError::InvalidInput(
            "--viewers must be at least 1".to_string(),
        ));
    }

    let mut headers = Vec::with_capacity(args.headers.len());
    for raw in &args.headers {
        headers.push(parse_header(raw).map_err(AppError::InvalidInput)?);
    }

    let http = HttpConfig {
        request_timeout: Duration::from_secs(args.timeout),
        connect_timeout: Duration::from_secs(args.connect_timeout),
        follow_redirects: !args.no_redirects,
        user_agent: args
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        headers,
    };

    let mut config = SessionConfig::new(&args.url)
        .with_policy(args.selection_policy())
        .with_http(http.clone());
    if let Some(seconds) = args.play_seconds {
        config = config.with_duration_cap(seconds);
    }

    // One shared client; viewers only differ in session state.
    let fetch: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(http)?);

    let token = CancellationToken::new();
    spawn_interrupt_watcher(token.clone());

    info!(
        url = %args.url,
        viewers = args.viewers,
        play_seconds = args.play_seconds,
        "starting viewer simulation"
    );

    let mut tasks = Vec::with_capacity(args.viewers);
    for id in 0..args.viewers {
        let config = config.clone();
        let fetch = fetch.clone();
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            viewer::run_viewer(id, config, fetch, token, args.step_retries).await
        }));
    }

    let mut summary = Report::default();
    for task in tasks {
        summary.merge(task.await??);
    }
    Ok(summary)
}

fn spawn_interrupt_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping viewers");
            token.cancel();
        }
    });
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
