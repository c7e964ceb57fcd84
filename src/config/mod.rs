// src/config/mod.rs

//! Configuration for procsched.
//!
//! - [`values`]: the key/value `Config` handed to schedules, processes and
//!   edges.
//! - [`model`]: the TOML pipeline file data model.
//! - [`loader`]: reading pipeline files from disk.
//! - [`validate`]: turning a raw file into a validated `PipelineFile`.
//! - [`assemble`]: building a `Pipeline` from a validated file.

pub mod assemble;
pub mod loader;
pub mod model;
pub mod validate;
pub mod values;

pub use assemble::build_pipeline;
pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{PipelineFile, ProcessDecl, RawPipelineFile};
pub use values::Config;
