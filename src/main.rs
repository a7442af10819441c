use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};

use ceremeet_launcher::config::LauncherConfig;
use ceremeet_launcher::errors::{LauncherError, Result};
use ceremeet_launcher::launcher::Launcher;
use ceremeet_launcher::locale::Locale;
use ceremeet_launcher::logging;
use ceremeet_launcher::services::{
    ApiClient, ContentSource, Downloader, HttpContentSource, LaunchOutcome, LinkResolver,
    MeetingService, RemoteApi, SessionManager, UpdateDecision,
};
use ceremeet_launcher::status::LauncherState;
use ceremeet_launcher::utils::paths::{resolve_log_dir, resolve_root_dir};

#[derive(Debug, Parser)]
#[command(name = "ceremeet-launcher", version)]
#[command(about = "Keeps Ceremeet up to date and opens meeting links in it")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an account.
    Register {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Create a meeting and print its link.
    CreateMeeting {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        meeting_password: String,
        #[arg(long, default_value = "")]
        presentation: String,
    },
    /// Compare the installed version with the published one.
    Check,
}

#[derive(Debug, Args, Clone)]
struct Credentials {
    #[arg(long, env = "CEREMEET_EMAIL")]
    email: String,
    #[arg(long, env = "CEREMEET_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    /// Meeting link, as passed by the URI handler.
    link: Option<String>,

    /// Create a meeting with this title after signing in and join it.
    #[arg(long, value_name = "TITLE", conflicts_with = "link")]
    host: Option<String>,

    #[arg(long, env = "CEREMEET_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "CEREMEET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// `eng-US` or `tr-TR`; defaults to the system locale.
    #[arg(long)]
    locale: Option<Locale>,

    #[arg(long, action = ArgAction::SetTrue)]
    no_launch: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = resolve_root_dir();
    let log_dir = resolve_log_dir(&root);
    if let Err(err) = logging::init(&log_dir) {
        eprintln!("logging disabled: {err}");
    }

    let result = match LauncherConfig::load(&root) {
        Ok(config) => dispatch(cli, config, root).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli, config: LauncherConfig, root: std::path::PathBuf) -> Result<()> {
    let api: Arc<dyn RemoteApi> = Arc::new(ApiClient::new(&config));
    let content: Arc<dyn ContentSource> =
        Arc::new(HttpContentSource::new(&config, Downloader::new(&config)));

    match cli.command {
        Some(Commands::Register { name, credentials }) => {
            let launcher = Launcher::new(&config, root, api, content);
            let message = launcher
                .register(&name, &credentials.email, &credentials.password)
                .await?;
            println!("registered {}: {}", credentials.email, message);
            Ok(())
        }
        Some(Commands::CreateMeeting {
            credentials,
            title,
            meeting_password,
            presentation,
        }) => {
            let sessions = SessionManager::new(api.clone());
            let session = sessions
                .login(&credentials.email, &credentials.password)
                .await?;
            let meetings = MeetingService::new(api.clone(), LinkResolver::new(&config, api));
            let created = meetings
                .create(&title, &meeting_password, &presentation, &session)
                .await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(())
        }
        Some(Commands::Check) => {
            let launcher = Launcher::new(&config, root, api, content);
            let decision = launcher.check_for_updates().await?;
            match decision {
                UpdateDecision::NoUpdate => println!("up to date"),
                UpdateDecision::FullInstall(remote) => println!("not installed; {remote} available"),
                UpdateDecision::IncrementalUpdate(remote) => println!("update to {remote} available"),
            }
            Ok(())
        }
        None => {
            let launcher = Launcher::new(&config, root, api, content);
            let outcome = run(&launcher, cli.run).await;
            launcher.shutdown().await;
            outcome
        }
    }
}

async fn run(launcher: &Launcher, args: RunArgs) -> Result<()> {
    let locale = args.locale.unwrap_or_else(Locale::detect);
    let mut status = launcher.subscribe();
    let mut progress = launcher.subscribe_progress();
    let mut latency = launcher.subscribe_latency();

    let status_printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let state = status.borrow_and_update().state;
            println!("{}", locale.label(state));
        }
    });
    let progress_printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(percent) = *progress.borrow_and_update() {
                println!("{percent}%");
            }
        }
    });

    let latency_printer = tokio::spawn(async move {
        while latency.changed().await.is_ok() {
            if let Some(ms) = *latency.borrow_and_update() {
                println!("ping {ms} ms");
            }
        }
    });

    let result = drive(launcher, &args, locale).await;
    status_printer.abort();
    progress_printer.abort();
    latency_printer.abort();
    result
}

async fn drive(launcher: &Launcher, args: &RunArgs, locale: Locale) -> Result<()> {
    let state = launcher.start_up(args.link.as_deref()).await?;
    if let Some(version) = launcher.installed_version() {
        println!("Ceremeet {version}");
    }
    if state == LauncherState::Failed {
        let reason = launcher.snapshot().last_error.unwrap_or_default();
        return Err(LauncherError::Install(format!("update failed: {reason}")));
    }

    let (Some(email), Some(password)) = (args.email.as_deref(), args.password.as_deref()) else {
        println!("{}", locale.label(launcher.snapshot().state));
        return Ok(());
    };
    let session = launcher.login(email, password).await?;
    println!(
        "signed in as {} ({})",
        session.name,
        session.effective_tier().unwrap_or("no membership")
    );

    if let Some(title) = args.host.as_deref() {
        let created = launcher.create_meeting(title, "", "").await?;
        println!("created meeting: {}", created.link);
        launcher.submit_link(&created.link).await?;
    }

    let snapshot = launcher.snapshot();
    if let Some((_, meeting)) = snapshot.link.resolved() {
        println!("meeting: {}", meeting.title);
    } else if snapshot.link.is_invalid() {
        return Err(LauncherError::InvalidLink(
            "the meeting link could not be resolved".to_string(),
        ));
    }
    if args.no_launch || snapshot.state != LauncherState::Ready {
        println!("{}", locale.label(snapshot.state));
        return Ok(());
    }

    match launcher.launch(locale).await? {
        LaunchOutcome::Started { pid } => {
            println!("started Ceremeet (pid {pid})");
            if let Some(outcome) = launcher.await_handoff().await {
                tracing::info!("credential handoff finished: {:?}", outcome);
            }
            Ok(())
        }
        LaunchOutcome::AlreadyRunning => {
            println!("Ceremeet is already running");
            Ok(())
        }
        LaunchOutcome::NotFound => Err(LauncherError::NotFound(format!(
            "companion executable missing under {}",
            launcher.install_root().display()
        ))),
        LaunchOutcome::NotReady => Err(LauncherError::Transition(
            "launcher is not ready to start a meeting".to_string(),
        )),
    }
}
