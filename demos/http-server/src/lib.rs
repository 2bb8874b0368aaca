//! `cmdrun-server`: runs catalog commands in the background and serves their status over HTTP.
//!
//! The same binary is the worker: `cmdrun-server worker` reads one job request from stdin, runs it
//! and exits.
pub mod app;
pub mod commands;
pub mod config;
