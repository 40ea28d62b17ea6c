pub mod batch;
pub mod config;

pub use batch::BatchFile;
pub use config::{CalibrationSection, Config, Overrides, RulesConfig};
