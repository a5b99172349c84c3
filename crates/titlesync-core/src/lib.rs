//! Titlesync Core Library
//!
//! Rename-and-alias synchronization engine: derives a document title from the
//! first line of content, keeps the filename in sync with it, and maintains an
//! engine-owned alias entry in the document's frontmatter. The engine reacts
//! to change notifications from a host (which owns the document store) and
//! issues rename/frontmatter mutations back through the host traits.

pub mod alias;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod frontmatter;
pub mod host;
pub mod limiter;
pub mod logging;
pub mod outcome;
pub mod reader;
pub mod state;
pub mod tasks;
pub mod title;
