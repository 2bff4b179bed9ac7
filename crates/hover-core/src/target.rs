use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
        }
    }

    /// The platform of the operating system this process runs on.
    pub fn host() -> Result<Self, TargetError> {
        match std::env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Darwin),
            "windows" => Ok(Platform::Windows),
            other => Err(TargetError::UnsupportedHost(other.to_string())),
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Linux | Platform::Darwin => "",
        }
    }

    pub fn all() -> [Platform; 3] {
        [Platform::Linux, Platform::Darwin, Platform::Windows]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = TargetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "linux" => Ok(Platform::Linux),
            "darwin" => Ok(Platform::Darwin),
            "windows" => Ok(Platform::Windows),
            other => Err(TargetError::UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    AppImage,
    Deb,
    Snap,
    Bundle,
    Pkg,
    Msi,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::AppImage => "appimage",
            Format::Deb => "deb",
            Format::Snap => "snap",
            Format::Bundle => "bundle",
            Format::Pkg => "pkg",
            Format::Msi => "msi",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = TargetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "appimage" => Ok(Format::AppImage),
            "deb" => Ok(Format::Deb),
            "snap" => Ok(Format::Snap),
            "bundle" => Ok(Format::Bundle),
            "pkg" => Ok(Format::Pkg),
            "msi" => Ok(Format::Msi),
            other => Err(TargetError::UnknownFormat(other.to_string())),
        }
    }
}

/// Every legal (platform, format) pair. Expansion of `*` wildcards follows
/// this order, which keeps `bundle` ahead of `pkg` for darwin.
static FORMAT_REGISTRY: &[(Platform, Format)] = &[
    (Platform::Linux, Format::AppImage),
    (Platform::Linux, Format::Deb),
    (Platform::Linux, Format::Snap),
    (Platform::Darwin, Format::Bundle),
    (Platform::Darwin, Format::Pkg),
    (Platform::Windows, Format::Msi),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub platform: Platform,
    pub format: Option<Format>,
}

impl Target {
    pub fn bare(platform: Platform) -> Self {
        Target {
            platform,
            format: None,
        }
    }

    pub fn packaged(platform: Platform, format: Format) -> Self {
        Target {
            platform,
            format: Some(format),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            Some(format) => write!(f, "{}-{}", self.platform, format),
            None => write!(f, "{}", self.platform),
        }
    }
}

pub fn formats_for(platform: Platform) -> Vec<Format> {
    FORMAT_REGISTRY
        .iter()
        .filter(|(entry_platform, _)| *entry_platform == platform)
        .map(|(_, format)| *format)
        .collect()
}

pub fn is_valid_pair(platform: Platform, format: Format) -> bool {
    FORMAT_REGISTRY
        .iter()
        .any(|entry| *entry == (platform, format))
}

/// Parses a comma-separated target list, expanding wildcards and validating
/// every item against the format registry. A `pkg` target always pulls a
/// `bundle` target for the same platform in front of it.
pub fn parse_targets(spec: &str, require_format: bool) -> Result<Vec<Target>, TargetError> {
    let mut targets = Vec::new();
    for item in spec.split(',') {
        let item = item.trim();
        expand_item(item, require_format, &mut targets)?;
    }
    Ok(dedup_targets(targets))
}

fn expand_item(
    item: &str,
    require_format: bool,
    targets: &mut Vec<Target>,
) -> Result<(), TargetError> {
    if item.is_empty() {
        return Err(TargetError::EmptyItem);
    }
    if item == "*" {
        if require_format {
            return Err(TargetError::MissingFormat(item.to_string()));
        }
        targets.extend(Platform::all().map(Target::bare));
        return Ok(());
    }
    if item == "*-*" {
        for (platform, format) in FORMAT_REGISTRY {
            push_with_bundle(*platform, *format, targets);
        }
        return Ok(());
    }
    let (platform_token, format_token) = match item.split_once('-') {
        Some((platform, format)) => (platform, Some(format)),
        None => (item, None),
    };
    if platform_token == "*" {
        // "*-<format>" has no expansion rule; only "*" and "*-*" are wildcards.
        return Err(TargetError::UnknownPlatform(item.to_string()));
    }
    let platform: Platform = platform_token.parse()?;
    match format_token {
        None => {
            if require_format {
                return Err(TargetError::MissingFormat(item.to_string()));
            }
            targets.push(Target::bare(platform));
        }
        Some("*") => {
            for format in formats_for(platform) {
                push_with_bundle(platform, format, targets);
            }
        }
        Some(format_token) => {
            let format: Format = format_token.parse()?;
            if !is_valid_pair(platform, format) {
                return Err(TargetError::InvalidPair { platform, format });
            }
            push_with_bundle(platform, format, targets);
        }
    }
    Ok(())
}

fn push_with_bundle(platform: Platform, format: Format, targets: &mut Vec<Target>) {
    // A pkg is assembled out of a bundle build, so the bundle target must
    // come first in the produced list.
    if format == Format::Pkg {
        targets.push(Target::packaged(platform, Format::Bundle));
    }
    targets.push(Target::packaged(platform, format));
}

fn dedup_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut deduped: Vec<Target> = Vec::with_capacity(targets.len());
    for target in targets {
        if !deduped.contains(&target) {
            deduped.push(target);
        }
    }
    deduped
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetError {
    EmptyItem,
    UnknownPlatform(String),
    UnknownFormat(String),
    InvalidPair { platform: Platform, format: Format },
    MissingFormat(String),
    UnsupportedHost(String),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::EmptyItem => write!(f, "empty target in list"),
            TargetError::UnknownPlatform(token) => {
                write!(f, "unknown target platform '{}'", token)
            }
            TargetError::UnknownFormat(token) => {
                write!(f, "unknown packaging format '{}'", token)
            }
            TargetError::InvalidPair { platform, format } => {
                write!(f, "format '{}' is not available for '{}'", format, platform)
            }
            TargetError::MissingFormat(item) => {
                write!(f, "target '{}' needs a packaging format", item)
            }
            TargetError::UnsupportedHost(os) => {
                write!(f, "host operating system '{}' is not supported", os)
            }
        }
    }
}

impl std::error::Error for TargetError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn packaged(platform: Platform, format: Format) -> Target {
        Target::packaged(platform, format)
    }

    #[test]
    fn bare_platform_parses() {
        let targets = parse_targets("linux", false).expect("should parse");
        assert_eq!(targets, vec![Target::bare(Platform::Linux)]);
    }

    #[test]
    fn platform_format_pair_parses() {
        let targets = parse_targets("linux-deb", true).expect("should parse");
        assert_eq!(targets, vec![packaged(Platform::Linux, Format::Deb)]);
    }

    #[test]
    fn bare_wildcard_expands_to_platforms() {
        let targets = parse_targets("*", false).expect("should parse");
        assert_eq!(
            targets,
            vec![
                Target::bare(Platform::Linux),
                Target::bare(Platform::Darwin),
                Target::bare(Platform::Windows),
            ]
        );
    }

    #[test]
    fn platform_wildcard_expands_formats() {
        let targets = parse_targets("linux-*", true).expect("should parse");
        assert_eq!(
            targets,
            vec![
                packaged(Platform::Linux, Format::AppImage),
                packaged(Platform::Linux, Format::Deb),
                packaged(Platform::Linux, Format::Snap),
            ]
        );
    }

    #[test]
    fn full_wildcard_expands_every_pair_with_bundle_before_pkg() {
        let targets = parse_targets("*-*", true).expect("should parse");
        assert_eq!(
            targets,
            vec![
                packaged(Platform::Linux, Format::AppImage),
                packaged(Platform::Linux, Format::Deb),
                packaged(Platform::Linux, Format::Snap),
                packaged(Platform::Darwin, Format::Bundle),
                packaged(Platform::Darwin, Format::Pkg),
                packaged(Platform::Windows, Format::Msi),
            ]
        );
        let bundle = targets
            .iter()
            .position(|target| target.format == Some(Format::Bundle))
            .expect("bundle present");
        let pkg = targets
            .iter()
            .position(|target| target.format == Some(Format::Pkg))
            .expect("pkg present");
        assert!(bundle < pkg);
    }

    #[test]
    fn pkg_synthesizes_bundle_first() {
        let targets = parse_targets("darwin-pkg", true).expect("should parse");
        assert_eq!(
            targets,
            vec![
                packaged(Platform::Darwin, Format::Bundle),
                packaged(Platform::Darwin, Format::Pkg),
            ]
        );
    }

    #[test]
    fn duplicates_collapse_preserving_first_occurrence() {
        let targets = parse_targets("linux-deb,darwin-bundle,linux-deb", true).expect("parse");
        assert_eq!(
            targets,
            vec![
                packaged(Platform::Linux, Format::Deb),
                packaged(Platform::Darwin, Format::Bundle),
            ]
        );
    }

    #[test]
    fn parse_is_idempotent_over_its_own_output() {
        let first = parse_targets("*-*,darwin-pkg,linux-*", true).expect("parse");
        let rendered = first
            .iter()
            .map(|target| target.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let second = parse_targets(&rendered, true).expect("reparse");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_platform_rejected() {
        let error = parse_targets("freebsd-deb", true).expect_err("error");
        assert_eq!(error, TargetError::UnknownPlatform("freebsd".to_string()));
    }

    #[test]
    fn unknown_format_rejected() {
        let error = parse_targets("linux-rpm", true).expect_err("error");
        assert_eq!(error, TargetError::UnknownFormat("rpm".to_string()));
    }

    #[test]
    fn invalid_pair_rejected() {
        let error = parse_targets("linux-msi", true).expect_err("error");
        assert_eq!(
            error,
            TargetError::InvalidPair {
                platform: Platform::Linux,
                format: Format::Msi,
            }
        );
    }

    #[test]
    fn missing_format_rejected_when_required() {
        let error = parse_targets("linux", true).expect_err("error");
        assert_eq!(error, TargetError::MissingFormat("linux".to_string()));
    }

    #[test]
    fn wildcard_platform_with_fixed_format_rejected() {
        let error = parse_targets("*-deb", true).expect_err("error");
        assert!(matches!(error, TargetError::UnknownPlatform(_)));
    }
}
