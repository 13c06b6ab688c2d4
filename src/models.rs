use serde::Deserialize;
use std::path::PathBuf;

use crate::error::UpdateError;

/// Owner/name pair identifying where releases are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Target OS/architecture pair, in release-asset naming (`linux`, `amd64`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for
    pub fn current() -> Self {
        Self::new(
            os_name(std::env::consts::OS),
            arch_name(std::env::consts::ARCH),
        )
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Everything one check/apply cycle needs. Built fresh for each check.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub repo: RepoRef,
    pub token: Option<String>,
    pub current_version: String,
    /// Writable directory holding the staged artifact
    pub staging_dir: PathBuf,
    /// Absolute path of the executable to be replaced
    pub executable_path: PathBuf,
    /// Asset name template, e.g. `app-{version}-{os}-{arch}{ext}`
    pub asset_template: String,
    pub os: Option<String>,
    pub arch: Option<String>,
    /// Pass this process's arguments on to the replacement process
    pub forward_args: bool,
}

impl UpdateRequest {
    /// Check that every required field is present
    pub fn validate(&self) -> Result<(), UpdateError> {
        let required: [(&'static str, bool); 6] = [
            ("owner", self.repo.owner.is_empty()),
            ("repo", self.repo.name.is_empty()),
            ("current_version", self.current_version.is_empty()),
            ("staging_dir", self.staging_dir.as_os_str().is_empty()),
            ("executable_path", self.executable_path.as_os_str().is_empty()),
            ("asset_template", self.asset_template.is_empty()),
        ];

        match required.iter().find(|(_, missing)| *missing) {
            Some((field, _)) => Err(UpdateError::Configuration { field: *field }),
            None => Ok(()),
        }
    }

    /// Explicit os/arch win; anything left unset falls back to the running platform
    pub fn target_platform(&self) -> Platform {
        let current = Platform::current();
        Platform {
            os: non_empty(&self.os).unwrap_or(current.os),
            arch: non_empty(&self.arch).unwrap_or(current.arch),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Latest published release as reported by a release source
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDescriptor {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(rename = "body", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(rename = "assets", default)]
    pub artifacts: Vec<ArtifactDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

/// A newer release that has been downloaded and staged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub current_version: String,
    pub latest_version: String,
    pub download_url: String,
    pub asset_name: String,
    pub release_notes: String,
}
