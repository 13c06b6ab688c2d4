use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Overwrite `dest` with the contents of `src`, keeping `dest`'s permissions.
///
/// Symlinks are followed, so a linked `dest` keeps pointing at the file that
/// now holds the new bytes. The new bytes are written next to the resolved
/// file and renamed over it. When that directory is not writable the file is
/// copied in place instead, which can leave it partially written if the copy
/// fails midway.
pub fn replace_executable(src: &Path, dest: &Path) -> io::Result<()> {
    let dest = resolve(dest)?;
    let dest = dest.as_path();

    let permissions = match fs::metadata(dest) {
        Ok(meta) => meta.permissions(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::metadata(src)?.permissions(),
        Err(e) => return Err(e),
    };

    let dir = dest
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    match NamedTempFile::new_in(dir) {
        Ok(mut tmp) => {
            io::copy(&mut File::open(src)?, tmp.as_file_mut())?;
            tmp.as_file().sync_all()?;
            fs::set_permissions(tmp.path(), permissions)?;
            tmp.persist(dest).map_err(|e| e.error)?;
            debug!(dest = %dest.display(), "Renamed new executable into place");
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot write beside executable, copying in place");
            fs::copy(src, dest)?;
            fs::set_permissions(dest, permissions)?;
        }
    }

    Ok(())
}

/// Final target of `path`, or `path` itself when nothing exists there yet
fn resolve(path: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(real) => {
            if real != path {
                debug!(path = %path.display(), target = %real.display(), "Resolved executable link");
            }
            Ok(real)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}
