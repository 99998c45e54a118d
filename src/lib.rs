#![allow(clippy::manual_unwrap_or_default)]
#![allow(clippy::manual_unwrap_or)]

pub mod client;
pub mod constants;
pub mod engine;
pub mod hardening;
pub mod heuristic;
pub mod logging;
pub mod main_helper;
pub mod payload;
pub mod prompt;
pub mod redaction_layer;
pub mod render;
pub mod segment;
pub mod session;
pub mod str_utils;
pub mod streaming;
pub mod tool_call;
pub mod tool_schema;
pub mod types;
pub mod view;

pub use types::*;

pub use main_helper::Args;
