use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::UpdateError;

/// Version-independent name of the staged executable
const STAGED_NAME: &str = "update";

/// Location of the staged artifact inside `staging_dir`
pub fn staged_path(staging_dir: &Path) -> PathBuf {
    staging_dir.join(format!("{}{}", STAGED_NAME, std::env::consts::EXE_SUFFIX))
}

/// Write `reader` to the staged path and make it executable.
///
/// Bytes go to a temporary file in the same directory which is renamed into
/// place once the whole stream has been written, so the staged path only
/// ever holds a complete artifact. Any previously staged file is replaced.
pub fn stage(reader: &mut dyn Read, staging_dir: &Path) -> Result<PathBuf, UpdateError> {
    let dest = staged_path(staging_dir);
    let staging_err = |source: io::Error| UpdateError::Staging {
        path: dest.clone(),
        source,
    };

    fs::create_dir_all(staging_dir).map_err(staging_err)?;

    let mut tmp = NamedTempFile::new_in(staging_dir).map_err(staging_err)?;
    let written = io::copy(reader, tmp.as_file_mut()).map_err(staging_err)?;
    tmp.as_file().sync_all().map_err(staging_err)?;
    make_executable(tmp.path()).map_err(staging_err)?;

    tmp.persist(&dest).map_err(|e| staging_err(e.error))?;
    debug!(path = %dest.display(), bytes = written, "Staged update");

    Ok(dest)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Remove the staged artifact, if any. Safe to call repeatedly.
pub fn cleanup(staging_dir: &Path) -> Result<(), UpdateError> {
    let path = staged_path(staging_dir);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed staged update");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UpdateError::Cleanup { path, source }),
    }
}
