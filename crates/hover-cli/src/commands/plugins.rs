use hover_plugins::resolver;
use hover_plugins::{fetch_standalone_list, PluginImporter};

use crate::commands::make_context;

pub fn get(force: bool) -> Result<(), String> {
    let context = make_context(None)?;
    let lockfile = context.lockfile().map_err(|error| error.to_string())?;
    let pub_cache = resolver::pub_cache_dir()
        .ok_or_else(|| "could not locate the Dart package cache; set PUB_CACHE".to_string())?;
    let standalone = fetch_standalone_list();
    let plugins = resolver::discover_plugins(
        &lockfile,
        context.project_root(),
        &pub_cache,
        &standalone,
    )
    .map_err(|error| error.to_string())?;
    if plugins.is_empty() {
        println!("no desktop plugins found in the lock file");
        return Ok(());
    }
    let importer = PluginImporter::new(&context).map_err(|error| error.to_string())?;
    importer
        .import(&plugins, force)
        .map_err(|error| error.to_string())?;
    for plugin in &plugins {
        println!("imported: {} {}", plugin.name, plugin.version);
    }
    Ok(())
}

pub fn tidy(purge: bool) -> Result<(), String> {
    let context = make_context(None)?;
    let lockfile = context.lockfile().map_err(|error| error.to_string())?;
    let pub_cache = resolver::pub_cache_dir()
        .ok_or_else(|| "could not locate the Dart package cache; set PUB_CACHE".to_string())?;
    let standalone = fetch_standalone_list();
    let plugins = resolver::discover_plugins(
        &lockfile,
        context.project_root(),
        &pub_cache,
        &standalone,
    )
    .map_err(|error| error.to_string())?;
    let importer = PluginImporter::new(&context).map_err(|error| error.to_string())?;
    importer
        .tidy(&plugins, purge)
        .map_err(|error| error.to_string())
}
