//! sharex-mcp: MCP server over a ShareX screenshot directory
//!
//! Mirrors the watched folder into bounded in-memory caches (still images
//! and GIFs tracked separately, newest kept), extracts bounded frame sets
//! from GIFs on demand, and serves a small set of read-only query tools
//! over stdio.

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod media;
pub mod model;
pub mod service;
pub mod sharex;
pub mod sync;
pub mod watch;
