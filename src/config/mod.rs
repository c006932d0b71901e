// src/config/mod.rs

//! Task configuration model and durable registry.
//!
//! - [`model`] defines `TaskConfig` and the patch type accepted by the
//!   admin API's update endpoint.
//! - [`registry`] persists the list of tasks as a JSON array on disk.

pub mod model;
pub mod registry;

pub use model::{TaskConfig, TaskPatch};
pub use registry::TaskRegistry;
