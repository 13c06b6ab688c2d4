pub mod config;
pub mod error;
pub mod models;
pub mod update;

pub use error::{ReplacementError, SourceError, UpdateError};
pub use models::{
    ArtifactDescriptor, Platform, ReleaseDescriptor, RepoRef, UpdateOutcome, UpdateRequest,
};
pub use update::{
    cleanup, handle_replacement_mode, resume, GithubReleaseSource, ReleaseSource, StartupMode,
    Updater,
};
