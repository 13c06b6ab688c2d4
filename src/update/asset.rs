use crate::error::UpdateError;
use crate::models::{ArtifactDescriptor, Platform};

/// Build the expected asset name from a template.
///
/// Supported placeholders: `{version}`, `{os}`, `{arch}` and `{ext}`, where
/// `{ext}` is `.exe` for a windows target and empty otherwise.
pub fn render(template: &str, version: &str, platform: &Platform) -> String {
    let ext = if platform.is_windows() { ".exe" } else { "" };

    template
        .replace("{version}", version)
        .replace("{os}", &platform.os)
        .replace("{arch}", &platform.arch)
        .replace("{ext}", ext)
}

/// Find the asset whose name is exactly `expected`
pub fn find_asset<'a>(
    assets: &'a [ArtifactDescriptor],
    expected: &str,
) -> Result<&'a ArtifactDescriptor, UpdateError> {
    assets
        .iter()
        .find(|a| a.name == expected)
        .ok_or_else(|| UpdateError::AssetNotFound {
            expected: expected.to_string(),
            candidates: assets.iter().map(|a| a.name.clone()).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "app-{version}-{os}-{arch}{ext}";

    fn asset(name: &str) -> ArtifactDescriptor {
        ArtifactDescriptor {
            name: name.to_string(),
            url: format!("https://example.com/{}", name),
            size: 1,
        }
    }

    #[test]
    fn test_render_linux() {
        let name = render(TEMPLATE, "v1.2.0", &Platform::new("linux", "amd64"));
        assert_eq!(name, "app-v1.2.0-linux-amd64");
    }

    #[test]
    fn test_render_windows_adds_exe() {
        let name = render(TEMPLATE, "v1.2.0", &Platform::new("windows", "arm64"));
        assert_eq!(name, "app-v1.2.0-windows-arm64.exe");
    }

    #[test]
    fn test_render_leaves_no_placeholders() {
        let platform = Platform::new("darwin", "arm64");
        let name = render(TEMPLATE, "2.0.0", &platform);
        for token in ["{version}", "{os}", "{arch}", "{ext}"] {
            assert!(!name.contains(token));
        }
        assert_eq!(name, render(TEMPLATE, "2.0.0", &platform));
    }

    #[test]
    fn test_render_without_placeholders() {
        let name = render("app", "v1.0.0", &Platform::new("linux", "amd64"));
        assert_eq!(name, "app");
    }

    #[test]
    fn test_find_asset_is_exact() {
        let assets = vec![
            asset("APP-v1.2.0-linux-amd64"),
            asset("app-v1.2.0-linux-amd64.tar.gz"),
            asset("app-v1.2.0-linux-amd64"),
            asset("app-v1.2.0-linux-amd"),
        ];
        let found = find_asset(&assets, "app-v1.2.0-linux-amd64").unwrap();
        assert_eq!(found.name, "app-v1.2.0-linux-amd64");
        assert_eq!(found.url, "https://example.com/app-v1.2.0-linux-amd64");
    }

    #[test]
    fn test_find_asset_not_found() {
        let assets = vec![asset("app-v1.2.0-windows-amd64.exe")];
        match find_asset(&assets, "app-v1.2.0-linux-amd64") {
            Err(UpdateError::AssetNotFound {
                expected,
                candidates,
            }) => {
                assert_eq!(expected, "app-v1.2.0-linux-amd64");
                assert_eq!(candidates, vec!["app-v1.2.0-windows-amd64.exe"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
