use std::path::PathBuf;

use hover_core::{layout, Context};

pub mod build;
pub mod clean_cache;
pub mod init_packaging;
pub mod plugins;

/// Assembles the context every command threads through the core crates.
pub fn make_context(cache_path: Option<PathBuf>) -> Result<Context, String> {
    let project_root = std::env::current_dir()
        .map_err(|error| format!("failed to resolve the working directory: {}", error))?;
    let cache_root = match cache_path {
        Some(path) => path,
        None => layout::default_cache_root()
            .ok_or_else(|| "no per-user cache directory available; pass --cache-path".to_string())?,
    };
    Ok(Context::new(
        project_root,
        cache_root,
        concat!("v", env!("CARGO_PKG_VERSION")).to_string(),
    ))
}
