//! Progress reporting (§4.M): a single bar tracking bytes and files
//! transferred, with a quiet mode that disables rendering entirely.

mod reporter;

pub use reporter::*;
