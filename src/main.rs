use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swapover::config::Config;
use swapover::update::{self, GithubReleaseSource, ReplacementHandoff, StartupMode, Updater};
use swapover::{RepoRef, UpdateRequest};

#[derive(Parser, Debug)]
#[command(name = "swapover")]
#[command(about = "Keep an executable up to date from its GitHub releases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to ~/.config/swapover/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Repository owner publishing releases
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Asset name template ({version}, {os}, {arch}, {ext})
    #[arg(long, global = true)]
    template: Option<String>,

    /// Directory the downloaded update is staged in
    #[arg(long, value_name = "DIR", global = true)]
    staging_dir: Option<PathBuf>,

    /// Target OS in asset naming (defaults to the running platform)
    #[arg(long, global = true)]
    os: Option<String>,

    /// Target architecture in asset naming (defaults to the running platform)
    #[arg(long, global = true)]
    arch: Option<String>,

    /// Do not pass this invocation's arguments to the updated process
    #[arg(long, global = true)]
    no_forward_args: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check for a newer release and download it
    Check,

    /// Download the latest release and restart into it
    Update,

    /// Remove a previously downloaded update
    Cleanup,

    /// Print the running version
    Version,
}

fn main() -> Result<()> {
    // Before the replacement step, so an update process logs it too
    let raw_args: Vec<OsString> = env::args_os().collect();
    let (verbose, quiet) = log_flags(&raw_args);
    init_tracing(verbose, quiet);

    let mode = update::handle_replacement_mode();
    let args = mode.effective_args();
    let cli = Cli::parse_from(args.iter());

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let executable_path = match &mode {
        StartupMode::Resumed { .. } => PathBuf::from(&args[0]),
        StartupMode::Normal => {
            env::current_exe().context("Failed to get current executable path")?
        }
    };

    if mode.is_resumed() {
        println!(
            "{} Updated to version {}",
            "✓".green(),
            update::CURRENT_VERSION.green()
        );
    } else {
        let staging_dir = cli
            .source
            .staging_dir
            .clone()
            .unwrap_or_else(|| config.staging_dir());
        if let Err(e) = update::cleanup(&staging_dir) {
            warn!("Failed to clean up old update files: {}", e);
        }
    }

    match cli.command {
        Some(Command::Check) => {
            let request = build_request(&cli.source, &config, executable_path)?;
            run_check_command(request, &config)
        }
        Some(Command::Update) => {
            let request = build_request(&cli.source, &config, executable_path)?;
            run_update_command(request, &config)
        }
        Some(Command::Cleanup) => run_cleanup_command(&cli.source, &config),
        Some(Command::Version) | None => {
            println!("swapover {}", update::CURRENT_VERSION);
            Ok(())
        }
    }
}

/// Verbosity flags of an invocation, read ahead of full argument parsing.
///
/// For an update process these come from the forwarded arguments.
fn log_flags(args: &[OsString]) -> (u8, bool) {
    let rest = args.get(1..).unwrap_or_default();
    let args: Vec<String> = match ReplacementHandoff::from_args(rest) {
        Ok(Some(handoff)) => handoff.forwarded_args.unwrap_or_default(),
        _ => rest
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect(),
    };

    let mut verbose = 0u8;
    let mut quiet = false;
    for arg in args.iter().take_while(|a| a.as_str() != "--") {
        match arg.as_str() {
            "--verbose" => verbose = verbose.saturating_add(1),
            "--quiet" => quiet = true,
            short if short.starts_with('-') && !short.starts_with("--") => {
                let flags = &short[1..];
                if !flags.is_empty() && flags.chars().all(|c| c == 'v' || c == 'q') {
                    for c in flags.chars() {
                        match c {
                            'v' => verbose = verbose.saturating_add(1),
                            _ => quiet = true,
                        }
                    }
                }
            }
            _ => {}
        }
    }
    (verbose, quiet)
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_request(
    args: &SourceArgs,
    config: &Config,
    executable_path: PathBuf,
) -> Result<UpdateRequest> {
    let owner = args
        .owner
        .clone()
        .or_else(|| config.owner.clone())
        .ok_or_else(|| missing_setting("owner"))?;
    let repo = args
        .repo
        .clone()
        .or_else(|| config.repo.clone())
        .ok_or_else(|| missing_setting("repo"))?;

    Ok(UpdateRequest {
        repo: RepoRef::new(owner, repo),
        token: config.token(),
        current_version: update::CURRENT_VERSION.to_string(),
        staging_dir: args
            .staging_dir
            .clone()
            .unwrap_or_else(|| config.staging_dir()),
        executable_path,
        asset_template: args
            .template
            .clone()
            .unwrap_or_else(|| config.asset_template.clone()),
        os: args.os.clone().or_else(|| config.os.clone()),
        arch: args.arch.clone().or_else(|| config.arch.clone()),
        forward_args: config.forward_args && !args.no_forward_args,
    })
}

fn missing_setting(name: &str) -> anyhow::Error {
    anyhow!(
        "No {} configured. Pass --{} or set `{}` in {}",
        name,
        name,
        name,
        Config::config_path().display()
    )
}

fn release_source(config: &Config) -> Result<GithubReleaseSource> {
    let source = match &config.api_url {
        Some(url) => GithubReleaseSource::with_api_base(url),
        None => GithubReleaseSource::new(),
    };
    Ok(source.context("Failed to create HTTP client")?.show_progress(true))
}

fn run_check_command(request: UpdateRequest, config: &Config) -> Result<()> {
    let updater = Updater::new(request, release_source(config)?);
    if check_and_report(&updater)? {
        println!("  Run `swapover update` to install");
    }
    Ok(())
}

fn run_update_command(request: UpdateRequest, config: &Config) -> Result<()> {
    let updater = Updater::new(request, release_source(config)?);
    if !check_and_report(&updater)? {
        return Ok(());
    }

    println!("{}", "Installing...".cyan());
    match updater.apply() {
        Ok(never) => match never {},
        Err(e) => Err(anyhow::Error::new(e).context("Failed to install update")),
    }
}

/// Returns true when an update was staged
fn check_and_report(updater: &Updater<GithubReleaseSource>) -> Result<bool> {
    println!("{}", "Checking for updates...".cyan());

    let outcome = match updater.check_and_prepare()? {
        Some(outcome) => outcome,
        None => {
            println!(
                "{} You're running the latest version ({})",
                "✓".green(),
                updater.request().current_version
            );
            return Ok(false);
        }
    };

    println!(
        "{} New version available: {} → {}",
        "↑".yellow(),
        outcome.current_version.dimmed(),
        outcome.latest_version.green()
    );

    if !outcome.release_notes.is_empty() {
        println!("\n{}", "Release notes:".cyan());
        println!("{}\n", outcome.release_notes.dimmed());
    }

    println!("Downloaded {}", outcome.asset_name);
    Ok(true)
}

fn run_cleanup_command(args: &SourceArgs, config: &Config) -> Result<()> {
    let staging_dir = args
        .staging_dir
        .clone()
        .unwrap_or_else(|| config.staging_dir());
    update::cleanup(&staging_dir)?;

    println!(
        "{} Removed staged update from {}",
        "✓".green(),
        staging_dir.display()
    );
    Ok(())
}
