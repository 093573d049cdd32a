//! CLI surface and run configuration (§6, §4.L).

mod settings;

pub use settings::*;
