//! CLI command implementations.

pub mod build;
pub mod copy;
pub mod scripts;
pub mod serve;

pub use build::{build_file, build_folder};
pub use copy::copy_folders;
pub use scripts::load_scripts;
pub use serve::serve;
