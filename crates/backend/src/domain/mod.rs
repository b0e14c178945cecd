//! Domain types - configuration consumed by every lifecycle decision

pub mod config;
