use semver::Version;
use tracing::debug;

/// Version of the running swapover binary
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a version string (with or without 'v' prefix)
///
/// Short forms are padded, so `v1` reads as `1.0.0` and `1.2` as `1.2.0`.
pub fn parse_version(version_str: &str) -> Option<Version> {
    let cleaned = version_str.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(cleaned) {
        return Some(version);
    }

    let core_len = cleaned
        .find(|c: char| c == '-' || c == '+')
        .unwrap_or(cleaned.len());
    let (core, suffix) = cleaned.split_at(core_len);
    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Returns true only if `latest` is strictly newer than `current`
///
/// Unparseable input on either side is never treated as newer.
pub fn is_newer(current: &str, latest: &str) -> bool {
    match (parse_version(current), parse_version(latest)) {
        (Some(current_ver), Some(latest_ver)) => latest_ver > current_ver,
        _ => {
            debug!(current, latest, "Unparseable version, not offering update");
            false
        }
    }
}
