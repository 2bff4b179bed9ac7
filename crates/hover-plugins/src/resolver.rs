use std::path::{Path, PathBuf};

use hover_core::project::{Lockfile, PackageDescription};

use crate::allowlist::StandaloneImplementation;
use crate::PluginError;

/// Subdirectory a plugin uses to ship its desktop host implementation.
pub const DESKTOP_DIR: &str = "go";

/// Auto-import template a desktop-capable plugin may bundle.
pub const TEMPLATE_FILE: &str = "import.go.tmpl";

pub const DEFAULT_HOST: &str = "pub.dartlang.org";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    pub version: String,
    pub source: PluginSource,
    /// Whether an import stub can be produced without manual work.
    pub auto_import: bool,
    /// The desktop implementation lives outside the Dart package.
    pub standalone: bool,
    pub import_source: ImportSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginSource {
    Hosted { host: String },
    Local { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportSource {
    /// Bundled template inside the plugin's desktop subdirectory.
    Template(PathBuf),
    /// Ready-made stub published at a URL (standalone implementations).
    Url(String),
    /// No stub available; the module is only version-pinned.
    None,
}

/// The per-user Dart package cache holding hosted package sources.
pub fn pub_cache_dir() -> Option<PathBuf> {
    if let Ok(cache) = std::env::var("PUB_CACHE") {
        if !cache.is_empty() {
            return Some(PathBuf::from(cache));
        }
    }
    dirs::home_dir().map(|home| home.join(".pub-cache"))
}

/// Walks the lock file and produces the set of plugins that supply (or are
/// known to have) a desktop host-side implementation.
pub fn discover_plugins(
    lockfile: &Lockfile,
    project_root: &Path,
    pub_cache: &Path,
    standalone: &[StandaloneImplementation],
) -> Result<Vec<PluginEntry>, PluginError> {
    let mut entries = Vec::new();
    for (name, package) in &lockfile.packages {
        let (location, source) = match &package.description {
            PackageDescription::Sdk(_) => continue,
            PackageDescription::Path { path, relative } => {
                let path = if *relative {
                    project_root.join(path)
                } else {
                    PathBuf::from(path)
                };
                (path.clone(), PluginSource::Local { path })
            }
            PackageDescription::Hosted { url, .. } => {
                let host = host_directory(url.as_deref());
                let location = pub_cache
                    .join("hosted")
                    .join(&host)
                    .join(format!("{}-{}", name, package.version));
                (location, PluginSource::Hosted { host })
            }
        };

        if !declares_plugin(&location) {
            continue;
        }

        let desktop_dir = location.join(DESKTOP_DIR);
        let listed = standalone.iter().find(|entry| entry.name == *name);
        let entry = if desktop_dir.is_dir() {
            let template = desktop_dir.join(TEMPLATE_FILE);
            if template.is_file() {
                PluginEntry {
                    name: name.clone(),
                    version: package.version.clone(),
                    source,
                    auto_import: true,
                    standalone: false,
                    import_source: ImportSource::Template(desktop_dir),
                }
            } else if let Some(listed) = listed {
                standalone_entry(name, &package.version, source, listed)
            } else {
                PluginEntry {
                    name: name.clone(),
                    version: package.version.clone(),
                    source,
                    auto_import: false,
                    standalone: false,
                    import_source: ImportSource::None,
                }
            }
        } else if let Some(listed) = listed {
            standalone_entry(name, &package.version, source, listed)
        } else {
            continue;
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn standalone_entry(
    name: &str,
    version: &str,
    source: PluginSource,
    listed: &StandaloneImplementation,
) -> PluginEntry {
    PluginEntry {
        name: name.to_string(),
        version: version.to_string(),
        source,
        auto_import: true,
        standalone: true,
        import_source: ImportSource::Url(listed.import.clone()),
    }
}

/// A package counts as a plugin when its manifest carries a
/// `flutter: plugin:` section.
fn declares_plugin(location: &Path) -> bool {
    let manifest = location.join("pubspec.yaml");
    let contents = match std::fs::read_to_string(&manifest) {
        Ok(contents) => contents,
        Err(_) => return false,
    };
    let value: serde_yaml::Value = match serde_yaml::from_str(&contents) {
        Ok(value) => value,
        Err(_) => return false,
    };
    value
        .as_mapping()
        .and_then(|root| root.get(serde_yaml::Value::from("flutter")))
        .and_then(serde_yaml::Value::as_mapping)
        .and_then(|flutter| flutter.get(serde_yaml::Value::from("plugin")))
        .is_some()
}

fn host_directory(url: Option<&str>) -> String {
    let Some(url) = url else {
        return DEFAULT_HOST.to_string();
    };
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_HOST.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn lockfile(yaml: &str) -> Lockfile {
        serde_yaml::from_str(yaml).expect("decode lockfile")
    }

    fn plant_plugin(pub_cache: &Path, host: &str, name: &str, version: &str, template: bool) {
        let root = pub_cache
            .join("hosted")
            .join(host)
            .join(format!("{}-{}", name, version));
        let desktop = root.join(DESKTOP_DIR);
        fs::create_dir_all(&desktop).expect("create plugin dirs");
        fs::write(
            root.join("pubspec.yaml"),
            format!("name: {}\nflutter:\n  plugin:\n    platforms: {{}}\n", name),
        )
        .expect("write plugin pubspec");
        if template {
            fs::write(desktop.join(TEMPLATE_FILE), "package main\n").expect("write template");
        }
    }

    #[test]
    fn sdk_sentinel_entries_are_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let lock = lockfile(
            "packages:\n  flutter:\n    description: flutter\n    version: \"0.0.0\"\n    source: sdk\n",
        );
        let entries =
            discover_plugins(&lock, dir.path(), &dir.path().join("pub-cache"), &[]).expect("discover");
        assert!(entries.is_empty());
    }

    #[test]
    fn bundled_template_marks_auto_import() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pub_cache = dir.path().join("pub-cache");
        plant_plugin(&pub_cache, "pub.dartlang.org", "url_launcher", "5.7.10", true);
        let lock = lockfile(concat!(
            "packages:\n",
            "  url_launcher:\n",
            "    description:\n",
            "      name: url_launcher\n",
            "      url: \"https://pub.dartlang.org\"\n",
            "    version: \"5.7.10\"\n",
            "    source: hosted\n",
        ));
        let entries = discover_plugins(&lock, dir.path(), &pub_cache, &[]).expect("discover");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(entry.auto_import);
        assert!(!entry.standalone);
        assert_eq!(
            entry.import_source,
            ImportSource::Template(
                pub_cache
                    .join("hosted")
                    .join("pub.dartlang.org")
                    .join("url_launcher-5.7.10")
                    .join(DESKTOP_DIR)
            )
        );
    }

    #[test]
    fn non_plugin_package_is_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pub_cache = dir.path().join("pub-cache");
        let root = pub_cache
            .join("hosted")
            .join("pub.dartlang.org")
            .join("args-2.0.0");
        fs::create_dir_all(&root).expect("create package dir");
        fs::write(root.join("pubspec.yaml"), "name: args\n").expect("write pubspec");
        let lock = lockfile(concat!(
            "packages:\n",
            "  args:\n",
            "    description:\n",
            "      name: args\n",
            "      url: \"https://pub.dartlang.org\"\n",
            "    version: \"2.0.0\"\n",
            "    source: hosted\n",
        ));
        let entries = discover_plugins(&lock, dir.path(), &pub_cache, &[]).expect("discover");
        assert!(entries.is_empty());
    }

    #[test]
    fn plugin_without_desktop_dir_needs_standalone_listing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pub_cache = dir.path().join("pub-cache");
        let root = pub_cache
            .join("hosted")
            .join("pub.dartlang.org")
            .join("path_provider-1.6.0");
        fs::create_dir_all(&root).expect("create package dir");
        fs::write(
            root.join("pubspec.yaml"),
            "name: path_provider\nflutter:\n  plugin:\n    platforms: {}\n",
        )
        .expect("write pubspec");
        let lock = lockfile(concat!(
            "packages:\n",
            "  path_provider:\n",
            "    description:\n",
            "      name: path_provider\n",
            "      url: \"https://pub.dartlang.org\"\n",
            "    version: \"1.6.0\"\n",
            "    source: hosted\n",
        ));

        let entries = discover_plugins(&lock, dir.path(), &pub_cache, &[]).expect("discover");
        assert!(entries.is_empty());

        let listed = vec![StandaloneImplementation {
            name: "path_provider".to_string(),
            import: "https://example.invalid/import-path_provider-plugin.go".to_string(),
        }];
        let entries = discover_plugins(&lock, dir.path(), &pub_cache, &listed).expect("discover");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].standalone);
        assert!(entries[0].auto_import);
        assert_eq!(
            entries[0].import_source,
            ImportSource::Url("https://example.invalid/import-path_provider-plugin.go".to_string())
        );
    }

    #[test]
    fn relative_path_plugin_resolves_against_project_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        let project = dir.path().join("app");
        let plugin_root = project.join("plugins").join("my_plugin");
        let desktop = plugin_root.join(DESKTOP_DIR);
        fs::create_dir_all(&desktop).expect("create plugin");
        fs::write(
            plugin_root.join("pubspec.yaml"),
            "name: my_plugin\nflutter:\n  plugin:\n    platforms: {}\n",
        )
        .expect("write pubspec");
        fs::write(desktop.join(TEMPLATE_FILE), "package main\n").expect("write template");
        let lock = lockfile(concat!(
            "packages:\n",
            "  my_plugin:\n",
            "    description:\n",
            "      path: \"plugins/my_plugin\"\n",
            "      relative: true\n",
            "    version: \"0.1.0\"\n",
            "    source: path\n",
        ));
        let entries =
            discover_plugins(&lock, &project, &dir.path().join("pub-cache"), &[]).expect("discover");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].source,
            PluginSource::Local {
                path: plugin_root.clone()
            }
        );
        assert_eq!(
            entries[0].import_source,
            ImportSource::Template(plugin_root.join(DESKTOP_DIR))
        );
    }

    #[test]
    fn host_directory_strips_scheme() {
        assert_eq!(host_directory(Some("https://pub.dartlang.org")), "pub.dartlang.org");
        assert_eq!(host_directory(Some("http://pub.flutter-io.cn/")), "pub.flutter-io.cn");
        assert_eq!(host_directory(None), DEFAULT_HOST);
    }
}
