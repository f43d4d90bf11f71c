//! scoped-events - An in-process, synchronous event dispatcher.
//!
//! This crate provides a typed publish/subscribe registry with features including:
//! - Event categories identified by Rust type
//! - Subscriptions scoped by sender, resolved from an explicit value, an
//!   ambient context or a bound default
//! - Removal by subscription handle or by original handler identity

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod logging;
pub mod macros;
