//! Nashr - A multilingual article publishing platform
//!
//! Authors write articles in Uzbek, Russian and English; reviewers approve
//! them through an editorial workflow before they are published.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
