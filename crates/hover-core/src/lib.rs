pub mod config;
pub mod context;
pub mod layout;
pub mod mode;
pub mod project;
pub mod target;
pub mod tools;
pub mod version;

pub use context::Context;
pub use mode::BuildMode;
pub use target::{Format, Platform, Target};
