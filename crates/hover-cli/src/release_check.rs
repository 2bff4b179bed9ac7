use std::time::Duration;

use serde::Deserialize;

pub const IGNORE_ENV: &str = "HOVER_IGNORE_CHECK_NEW_RELEASE";

const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/go-flutter-desktop/hover/releases/latest";

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Looks up the latest published release and mentions it when the running
/// binary is older. Purely informational; every failure is silent.
pub fn check_for_update(current: &str) {
    if std::env::var(IGNORE_ENV).map(|value| value == "true").unwrap_or(false) {
        return;
    }
    match fetch_latest() {
        Ok(latest) if latest.tag_name != current => {
            tracing::warn!(
                current,
                latest = %latest.tag_name,
                "a newer hover release is available"
            );
        }
        Ok(_) => {}
        Err(error) => {
            tracing::debug!(%error, "release check failed");
        }
    }
}

fn fetch_latest() -> Result<LatestRelease, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .user_agent(concat!("hover/", env!("CARGO_PKG_VERSION")))
        .build()?;
    client
        .get(LATEST_RELEASE_URL)
        .send()?
        .error_for_status()?
        .json()
}
