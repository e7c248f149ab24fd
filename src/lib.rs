//! Cairn: the web tier of a content management system.
//!
//! Routes inbound requests to published content, keeps that content cached
//! in process, and propagates cache refreshes across a load-balanced farm.

pub mod application;
pub mod config;
pub mod content;
pub mod domain;
pub mod infra;
pub mod messaging;
pub mod routing;
pub(crate) mod util;
