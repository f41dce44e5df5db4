pub mod classify;
pub mod config;
pub mod logging;
pub mod mirror;
pub mod pattern;
pub mod remote;
pub mod runner;
pub mod selection;
