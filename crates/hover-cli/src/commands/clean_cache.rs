use std::path::PathBuf;

use crate::commands::make_context;

pub fn run(cache_path: Option<PathBuf>) -> Result<(), String> {
    let context = make_context(cache_path)?;
    hover_engine::clean(context.cache_root()).map_err(|error| error.to_string())?;
    println!("engine cache removed");
    Ok(())
}
