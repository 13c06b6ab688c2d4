//! Arguments passed from an exiting process to the update process it spawns.
//!
//! This is the only place that reads or writes the raw argument strings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use crate::error::ReplacementError;

pub const MARKER: &str = "--perform-update";
const ORIGINAL_PATH: &str = "--original-path=";
const PID: &str = "--pid=";
const FORWARDED_ARGS: &str = "--forwarded-args=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementHandoff {
    /// Executable to overwrite
    pub original_path: PathBuf,
    /// Process that must exit before the overwrite
    pub parent_pid: u32,
    /// Arguments of the original invocation, program name excluded
    pub forwarded_args: Option<Vec<String>>,
}

impl ReplacementHandoff {
    /// Encode as arguments for the spawned process, marker first
    pub fn to_args(&self) -> Vec<OsString> {
        let mut original_path = OsString::from(ORIGINAL_PATH);
        original_path.push(&self.original_path);

        let mut args = vec![
            OsString::from(MARKER),
            original_path,
            OsString::from(format!("{}{}", PID, self.parent_pid)),
        ];
        if let Some(forwarded) = &self.forwarded_args {
            // Serializing a list of strings cannot fail
            let json = serde_json::to_vec(forwarded).unwrap_or_default();
            args.push(OsString::from(format!(
                "{}{}",
                FORWARDED_ARGS,
                URL_SAFE_NO_PAD.encode(json)
            )));
        }
        args
    }

    /// Parse the arguments following the program name.
    ///
    /// Returns `Ok(None)` when the first argument is not the marker.
    pub fn from_args<S: AsRef<OsStr>>(args: &[S]) -> Result<Option<Self>, ReplacementError> {
        match args.first() {
            Some(first) if first.as_ref() == MARKER => {}
            _ => return Ok(None),
        }

        let mut original_path = None;
        let mut parent_pid = None;
        let mut forwarded_args = None;

        for arg in &args[1..] {
            let arg = arg.as_ref();
            if let Some(path) = strip_key(arg, ORIGINAL_PATH) {
                original_path = Some(path).filter(|p| !p.is_empty()).map(PathBuf::from);
            } else if let Some(pid) = strip_key(arg, PID) {
                parent_pid = pid
                    .to_str()
                    .and_then(|p| p.parse::<u32>().ok())
                    .filter(|&p| p != 0);
            } else if let Some(blob) = strip_key(arg, FORWARDED_ARGS) {
                forwarded_args = Some(decode_args(&blob)?);
            }
        }

        match (original_path, parent_pid) {
            (Some(original_path), Some(parent_pid)) => Ok(Some(Self {
                original_path,
                parent_pid,
                forwarded_args,
            })),
            (path, pid) => Err(ReplacementError::MalformedHandoff {
                reason: format!("original-path={:?}, pid={:?}", path, pid),
            }),
        }
    }
}

/// Value after `key` when `arg` starts with it, without a UTF-8 round trip
#[cfg(unix)]
fn strip_key(arg: &OsStr, key: &str) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;

    arg.as_bytes()
        .strip_prefix(key.as_bytes())
        .map(|rest| OsStr::from_bytes(rest).to_os_string())
}

#[cfg(not(unix))]
fn strip_key(arg: &OsStr, key: &str) -> Option<OsString> {
    arg.to_str()?.strip_prefix(key).map(OsString::from)
}

fn decode_args(blob: &OsStr) -> Result<Vec<String>, ReplacementError> {
    let malformed = |reason: String| ReplacementError::MalformedHandoff { reason };

    let blob = blob
        .to_str()
        .ok_or_else(|| malformed("forwarded args are not base64".to_string()))?;
    let json = URL_SAFE_NO_PAD
        .decode(blob)
        .map_err(|e| malformed(format!("forwarded args are not base64: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| malformed(format!("forwarded args are not a string list: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_without_marker_is_none() {
        let empty: [String; 0] = [];
        assert_eq!(ReplacementHandoff::from_args(&empty).unwrap(), None);
        let args = strings(&["check", "--perform-update"]);
        assert_eq!(ReplacementHandoff::from_args(&args).unwrap(), None);
    }

    #[test]
    fn test_parse_any_key_order() {
        let args = strings(&["--perform-update", "--pid=4242", "--original-path=/opt/app/bin"]);
        let handoff = ReplacementHandoff::from_args(&args).unwrap().unwrap();
        assert_eq!(handoff.original_path, PathBuf::from("/opt/app/bin"));
        assert_eq!(handoff.parent_pid, 4242);
        assert_eq!(handoff.forwarded_args, None);
    }

    #[test]
    fn test_forwarded_args_survive_encoding() {
        let handoff = ReplacementHandoff {
            original_path: PathBuf::from("/opt/app/bin"),
            parent_pid: 17,
            forwarded_args: Some(strings(&["update", "--name=a b", "--pid=1", "ünï"])),
        };
        let args = handoff.to_args();
        assert_eq!(args[0], MARKER);
        assert_eq!(ReplacementHandoff::from_args(&args).unwrap(), Some(handoff));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_original_path_is_kept_exactly() {
        use std::os::unix::ffi::OsStringExt;

        let raw = b"/opt/\xffapp\xfe/bin".to_vec();
        let handoff = ReplacementHandoff {
            original_path: PathBuf::from(OsString::from_vec(raw.clone())),
            parent_pid: 17,
            forwarded_args: None,
        };

        let parsed = ReplacementHandoff::from_args(&handoff.to_args())
            .unwrap()
            .unwrap();
        assert_eq!(parsed.original_path.into_os_string().into_vec(), raw);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        for args in [
            strings(&["--perform-update"]),
            strings(&["--perform-update", "--pid=12"]),
            strings(&["--perform-update", "--original-path=/opt/app"]),
            strings(&["--perform-update", "--original-path=/opt/app", "--pid=0"]),
            strings(&["--perform-update", "--original-path=/opt/app", "--pid=abc"]),
            strings(&["--perform-update", "--original-path=", "--pid=12"]),
        ] {
            assert!(matches!(
                ReplacementHandoff::from_args(&args),
                Err(ReplacementError::MalformedHandoff { .. })
            ));
        }
    }

    #[test]
    fn test_garbled_forwarded_args_are_malformed() {
        let args = strings(&[
            "--perform-update",
            "--original-path=/opt/app",
            "--pid=12",
            "--forwarded-args=!!!",
        ]);
        assert!(ReplacementHandoff::from_args(&args).is_err());
    }
}
