pub mod bucket;
#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod placement;
pub mod placement_dump;
pub mod projection;
pub mod scenario;
pub mod tile;
pub mod transform;

#[cfg(feature = "cli")]
pub use cli::run;
