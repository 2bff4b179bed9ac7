use hover_core::target::parse_targets;
use hover_core::Platform;
use hover_pack::{task_for, EmbeddedRecipes, PackError, PackagingTask};

use crate::commands::make_context;

pub fn run(target_spec: &str) -> Result<(), String> {
    let context = make_context(None)?;
    let host = Platform::host().map_err(|error| error.to_string())?;
    let targets = parse_targets(target_spec, true).map_err(|error| error.to_string())?;

    // Packaging init never needs a container, so a missing runtime is fine
    // here; a no-op runner stands in.
    let runner = NoContainer;
    for target in targets {
        let task = task_for(&context, &runner, &EmbeddedRecipes, host, target)
            .map_err(|error| error.to_string())?;
        match task.init() {
            Ok(()) => println!("initialized packaging for {}", target),
            Err(PackError::AlreadyInitialized { .. }) => {
                println!("packaging for {} is already initialized", target)
            }
            Err(error) => return Err(error.to_string()),
        }
    }
    Ok(())
}

struct NoContainer;

impl hover_pack::ContainerRunner for NoContainer {
    fn build_image(
        &self,
        _tag: &str,
        _recipe_dir: &std::path::Path,
    ) -> Result<(), hover_pack::ContainerError> {
        Ok(())
    }

    fn run(
        &self,
        _tag: &str,
        _mount_dir: &std::path::Path,
        _command: &str,
    ) -> Result<(), hover_pack::ContainerError> {
        Ok(())
    }
}
