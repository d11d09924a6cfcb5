//! Shopware media manager exposed as a filesystem.
//!
//! Media folders become directories and media items become files. Requests
//! go through a shared [`pacer::Pacer`] and folder ids are remembered by a
//! [`dir_cache::DirCache`].

pub mod auth;
pub mod config;
pub mod dir_cache;
pub mod error;
pub mod fs;
pub mod log_appender;
pub mod pacer;
pub mod shopware_service;

pub use error::{MediaFsError, Result};
pub use fs::{Filesystem, MediaFs, Object, RootKind};
