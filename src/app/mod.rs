//! Application runtime composition modules.

pub(crate) mod batch;
pub(crate) mod commands;
pub(crate) mod exit_handler;
pub(crate) mod progress_view;
pub(crate) mod settings;
pub(crate) mod terminal;
