use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    pagination::LoadStatus,
    render::{TableBody, TableRow},
    CorrectionOutcome, FeedbackLogViewer, HttpClassifierClient, ImageFile, LogPageView,
    LogPaginator, PageAction, PredictionStatsViewer, PredictionWorkflow, PreviewRegistry,
    ReviewSession, SubmitOutcome, WorkflowView,
};
use shared::domain::Label;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Overrides, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(about = "Operator and admin client for the lesion classifier service")]
struct Args {
    /// Settings file; ignored when missing.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Print escaped table markup instead of plain text.
    #[arg(long, global = true)]
    html: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an image and optionally submit a correction.
    Predict {
        path: PathBuf,
        /// Correct the prediction to BCC, SCC or Mel.
        #[arg(long)]
        correct: Option<Label>,
        #[arg(long)]
        no_feedback: bool,
    },
    /// Show one page of the request log.
    Logs {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show collected corrections.
    FeedbackLog,
    /// Show prediction counts per label.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(
        &args.config,
        &Overrides {
            server_url: args.server_url.clone(),
            request_timeout_secs: args.timeout_secs,
        },
    )?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(server_url = %settings.server_url, "using classifier service");
    let api = HttpClassifierClient::new(&settings.server_url, settings.request_timeout())?
        .into_shared();

    match args.command {
        Command::Predict {
            path,
            correct,
            no_feedback,
        } => {
            let workflow =
                PredictionWorkflow::new(PreviewRegistry::new()).with_feedback_offer(!no_feedback);
            let session = ReviewSession::new(api, workflow)
                .with_confirmation_ttl(settings.confirmation_ttl());
            predict(&session, path, correct).await
        }
        Command::Logs { page } => {
            let mut paginator = LogPaginator::new(api);
            let view = match paginator.load().await {
                LoadStatus::Failed => paginator.view(),
                _ => paginator.handle(PageAction::Goto(page)).unwrap_or_else(|| {
                    warn!(
                        page,
                        total_pages = paginator.total_pages(),
                        "page out of range, showing the current page"
                    );
                    paginator.view()
                }),
            };
            print_log_page(&view, args.html);
            Ok(())
        }
        Command::FeedbackLog => {
            let body = FeedbackLogViewer::new(api).load().await;
            print_table(&body, args.html);
            Ok(())
        }
        Command::Stats => {
            let body = PredictionStatsViewer::new(api).load().await;
            print_table(&body, args.html);
            Ok(())
        }
    }
}

async fn predict(session: &ReviewSession, path: PathBuf, correct: Option<Label>) -> Result<()> {
    let file = ImageFile::from_path(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    session.select(file).await?;

    let outcome = session.submit().await?;
    let view = session.view().await;
    print_result(&view);
    match outcome {
        SubmitOutcome::Resulted { .. } => {}
        SubmitOutcome::Failed | SubmitOutcome::Discarded => {
            bail!(view.error.unwrap_or_else(|| "prediction failed".into()));
        }
    }

    let Some(label) = correct else {
        return Ok(());
    };
    match session.correct(label).await? {
        CorrectionOutcome::Confirmed(_) => {
            if let Some(message) = session.view().await.message {
                println!("{message}");
            }
            tokio::time::sleep(session.confirmation_ttl()).await;
            session.teardown().await;
            Ok(())
        }
        CorrectionOutcome::Failed | CorrectionOutcome::Discarded => {
            let view = session.view().await;
            bail!(view.error.unwrap_or_else(|| "feedback was not sent".into()));
        }
    }
}

fn print_result(view: &WorkflowView) {
    if let Some(filename) = &view.filename {
        println!("Image: {filename}");
    }
    if let Some(result) = &view.result {
        println!("Prediction: {}", result.label);
        println!("Confidence: {}", result.confidence.as_percent());
        match &result.request_id {
            Some(log_id) if view.feedback_offered => {
                println!("Log id: {log_id} (rerun with --correct BCC|SCC|Mel to correct)");
            }
            Some(log_id) => println!("Log id: {log_id}"),
            None => println!("This prediction was not logged and cannot be corrected."),
        }
    }
}

fn print_log_page(view: &LogPageView, html: bool) {
    if html {
        println!("{}", view.to_html());
        return;
    }
    println!("{}", view.body.to_text());
    if let Some(controls) = &view.controls {
        println!("{}", controls.label());
    }
}

fn print_table<R: TableRow>(body: &TableBody<R>, html: bool) {
    if html {
        println!("{}", body.to_html());
    } else {
        println!("{}", body.to_text());
    }
}
