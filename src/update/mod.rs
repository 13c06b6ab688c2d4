pub mod asset;
pub mod github;
pub mod handoff;
pub mod installer;
pub mod liveness;
pub mod stager;
pub mod version;

use std::convert::Infallible;
use std::env;
use std::ffi::OsString;
use std::process::{self, Child, Command};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{ReplacementError, UpdateError};
use crate::models::{UpdateOutcome, UpdateRequest};

pub use github::{GithubReleaseSource, ReleaseSource};
pub use handoff::ReplacementHandoff;
pub use stager::{cleanup, staged_path};
pub use version::CURRENT_VERSION;

/// How long an update process waits for the process it replaces to exit
pub const PARENT_EXIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Arguments a resumed process acts on, recorded by [`handle_replacement_mode`]
static RESUMED_ARGS: OnceLock<Vec<OsString>> = OnceLock::new();

/// How this process was started, as decided by [`handle_replacement_mode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupMode {
    /// Ordinary launch
    Normal,
    /// This process just replaced the original executable. `args` is the
    /// argument list (program name first) the application should parse in
    /// place of `std::env::args`.
    Resumed { args: Vec<OsString> },
}

impl StartupMode {
    pub fn is_resumed(&self) -> bool {
        matches!(self, StartupMode::Resumed { .. })
    }

    /// Arguments the application should act on
    pub fn effective_args(&self) -> Vec<OsString> {
        match self {
            StartupMode::Normal => env::args_os().collect(),
            StartupMode::Resumed { args } => args.clone(),
        }
    }
}

/// Arguments of the current invocation, as the application sees them.
///
/// In a resumed process these are the forwarded arguments, never the
/// internal update-mode ones.
pub fn startup_args() -> Vec<OsString> {
    match RESUMED_ARGS.get() {
        Some(args) => args.clone(),
        None => env::args_os().collect(),
    }
}

/// Call first thing in `main`.
///
/// Returns [`StartupMode::Normal`] unless this process was launched by
/// [`Updater::apply`]. In that case it waits for the old process to exit,
/// copies this executable over the original one and returns
/// [`StartupMode::Resumed`]. Any failure along the way is printed to stderr
/// and the process exits with status 1.
pub fn handle_replacement_mode() -> StartupMode {
    let args: Vec<OsString> = env::args_os().collect();
    match resume(&args, PARENT_EXIT_TIMEOUT) {
        Ok(StartupMode::Resumed { args }) => {
            record_resumed_args(args.clone());
            StartupMode::Resumed { args }
        }
        Ok(mode) => mode,
        Err(e) => fatal(e),
    }
}

/// Run the replacement described by `args` (program name first), if any
pub fn resume(args: &[OsString], timeout: Duration) -> Result<StartupMode, ReplacementError> {
    let rest = args.get(1..).unwrap_or_default();
    let handoff = match ReplacementHandoff::from_args(rest)? {
        Some(handoff) => handoff,
        None => return Ok(StartupMode::Normal),
    };

    perform_replacement(&handoff, timeout)?;

    let mut resumed = vec![handoff.original_path.into_os_string()];
    resumed.extend(
        handoff
            .forwarded_args
            .unwrap_or_default()
            .into_iter()
            .map(OsString::from),
    );
    Ok(StartupMode::Resumed { args: resumed })
}

fn record_resumed_args(args: Vec<OsString>) {
    if RESUMED_ARGS.set(args).is_err() {
        debug!("Resumed arguments already recorded");
    }
}

fn fatal(err: ReplacementError) -> ! {
    error!(error = %err, "Update failed");
    eprintln!("{}", err);
    process::exit(1)
}

/// Wait for the parent to exit, then copy the running executable over the
/// original path
pub fn perform_replacement(
    handoff: &ReplacementHandoff,
    timeout: Duration,
) -> Result<(), ReplacementError> {
    info!(pid = handoff.parent_pid, "Waiting for previous process to exit");
    liveness::wait_for_exit(handoff.parent_pid, timeout)?;

    let current = env::current_exe().map_err(ReplacementError::CurrentExe)?;
    info!(
        from = %current.display(),
        to = %handoff.original_path.display(),
        "Replacing executable"
    );
    installer::replace_executable(&current, &handoff.original_path).map_err(|source| {
        ReplacementError::Copy {
            from: current.clone(),
            to: handoff.original_path.clone(),
            source,
        }
    })
}

/// Checks for, stages and applies updates for one [`UpdateRequest`]
pub struct Updater<S> {
    request: UpdateRequest,
    source: S,
}

impl<S: ReleaseSource> Updater<S> {
    pub fn new(request: UpdateRequest, source: S) -> Self {
        Self { request, source }
    }

    pub fn request(&self) -> &UpdateRequest {
        &self.request
    }

    /// Check for a newer release and stage it if there is one.
    ///
    /// `Ok(None)` means the current version is up to date.
    pub fn check_and_prepare(&self) -> Result<Option<UpdateOutcome>, UpdateError> {
        let req = &self.request;
        req.validate()?;

        let platform = req.target_platform();
        let token = req.token.as_deref();

        info!(repo = %req.repo, current = %req.current_version, "Checking for updates");
        let release = self
            .source
            .fetch_latest_release(&req.repo, token)
            .map_err(UpdateError::ReleaseFetch)?;

        if !version::is_newer(&req.current_version, &release.tag) {
            info!(latest = %release.tag, "Already up to date");
            return Ok(None);
        }

        let expected = asset::render(&req.asset_template, &release.tag, &platform);
        debug!(asset = %expected, os = %platform.os, arch = %platform.arch, "Resolved asset name");
        let artifact = asset::find_asset(&release.artifacts, &expected)?;

        let mut stream = self
            .source
            .fetch_artifact(artifact, token)
            .map_err(UpdateError::Download)?;
        let staged = stager::stage(&mut *stream, &req.staging_dir)?;
        info!(version = %release.tag, path = %staged.display(), "Update staged");

        Ok(Some(UpdateOutcome {
            current_version: req.current_version.clone(),
            latest_version: release.tag,
            download_url: artifact.url.clone(),
            asset_name: artifact.name.clone(),
            release_notes: release.notes.unwrap_or_default(),
        }))
    }

    /// Start the staged update and exit this process.
    ///
    /// Only returns if the update process could not be started.
    pub fn apply(&self) -> Result<Infallible, UpdateError> {
        let child = self.spawn_staged()?;
        info!(pid = child.id(), "Update process started, exiting");
        process::exit(0)
    }

    /// Launch the staged artifact in replacement mode without exiting
    pub fn spawn_staged(&self) -> Result<Child, UpdateError> {
        let req = &self.request;
        if req.executable_path.as_os_str().is_empty() {
            return Err(UpdateError::Configuration {
                field: "executable_path",
            });
        }

        let staged = staged_path(&req.staging_dir);
        if !staged.is_file() {
            return Err(UpdateError::NothingPrepared { path: staged });
        }

        let handoff = ReplacementHandoff {
            original_path: req.executable_path.clone(),
            parent_pid: process::id(),
            forwarded_args: req.forward_args.then(|| {
                startup_args()
                    .into_iter()
                    .skip(1)
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect()
            }),
        };

        debug!(path = %staged.display(), "Spawning update process");
        Command::new(&staged)
            .args(handoff.to_args())
            .spawn()
            .map_err(|source| UpdateError::Spawn {
                path: staged,
                source,
            })
    }
}
