//! Murmur: a small server-rendered social blog.
//!
//! Layers, leaves first: [`domain`] entities and validation, [`application`]
//! services over repository traits, [`infra`] adapters (Postgres, uploads,
//! HTTP, telemetry), [`presentation`] view models and templates, and the
//! [`cache`] that fronts the home feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
