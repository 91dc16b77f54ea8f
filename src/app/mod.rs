//! Application runtime composition modules.

pub(crate) mod config;
pub(crate) mod exit;
pub(crate) mod output;
pub(crate) mod progress;
pub(crate) mod runtime;
pub(crate) mod terminal;
