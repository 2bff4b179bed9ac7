use std::time::Duration;

use serde::Deserialize;

/// Online allow-list of desktop implementations that live outside the Dart
/// plugin package itself.
pub const STANDALONE_LIST_URL: &str =
    "https://raw.githubusercontent.com/go-flutter-desktop/plugins/master/standalone-implementation-list.json";

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StandaloneImplementation {
    /// Dart package name the implementation stands in for.
    pub name: String,
    /// URL of the ready-made import stub.
    pub import: String,
}

/// Fetches the allow-list once per invocation. Unreachable or malformed
/// lists degrade to an empty one with a warning; plugins then simply fall
/// back to their non-standalone handling.
pub fn fetch_standalone_list() -> Vec<StandaloneImplementation> {
    match try_fetch(STANDALONE_LIST_URL) {
        Ok(list) => list,
        Err(error) => {
            tracing::warn!(%error, "could not fetch the standalone plugin list, continuing without it");
            Vec::new()
        }
    }
}

fn try_fetch(url: &str) -> Result<Vec<StandaloneImplementation>, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("hover/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let response = client.get(url).send()?.error_for_status()?;
    response.json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_entries_decode() {
        let body = r#"[{"name": "url_launcher", "import": "https://example.invalid/import-url_launcher-plugin.go"}]"#;
        let list: Vec<StandaloneImplementation> =
            serde_json::from_str(body).expect("decode list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "url_launcher");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let body = r#"[{"name": "x", "import": "y", "surprise": true}]"#;
        let result: Result<Vec<StandaloneImplementation>, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }
}
