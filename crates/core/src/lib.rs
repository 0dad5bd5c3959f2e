//! Core business logic for Pixfeed.
//!
//! This crate contains the domain rules with no web framework or database dependencies.
//! Persistence is reached through the repository traits in [`post`], which the db
//! crate implements.
//!
//! # Modules
//!
//! - `post` - Upload, feed assembly, and owner-scoped deletion of posts
//! - `storage` - Media store backends and upload staging
//! - `auth` - Password hashing

pub mod auth;
pub mod post;
pub mod storage;
