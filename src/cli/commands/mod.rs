//! CLI command implementations

pub mod completions;
pub mod config;
pub mod get;
pub mod manifest;
pub mod precache;
pub mod register;
pub mod reset;
pub mod resolve;
pub mod status;
pub mod update;

pub use completions::execute as completions;
pub use config::execute as config;
pub use get::execute as get;
pub use manifest::execute as manifest;
pub use precache::execute as precache;
pub use register::execute as register;
pub use reset::execute as reset;
pub use resolve::execute as resolve;
pub use status::execute as status;
pub use update::execute as update;
