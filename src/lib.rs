//! flask-cli - command-line runner for web applications
//!
//! Finds an application from a user-supplied identifier, loads it lazily
//! and exposes its commands next to the built-in `run` and `shell`.
//!
//! # Architecture
//!
//! - [`cli`] - Command group, option binding, built-in commands
//! - [`script_info`] - Per-invocation configuration and application cache
//! - [`locate`] - Identifier parsing, namespace registry, app discovery
//! - [`dispatch`] - Load-once request handler for the server
//! - [`serving`] - Development HTTP server and reloader
//! - [`app`] - Application contract, ambient context, concrete `App`
//! - [`http`] - Request/response types and the `Handler` trait
//!
//! # Invariants
//!
//! 1. An invocation loads at most one application
//! 2. Built-in commands shadow application commands of the same name
//! 3. Listing commands never fails because the application is missing
//! 4. The dispatcher runs its loader at most once successfully, under
//!    any number of concurrent first requests

pub mod app;
pub mod cli;
pub mod dispatch;
pub mod http;
pub mod locate;
pub mod script_info;
pub mod serving;
