//! Marquee Backend Library
//!
//! Token authentication and access control for the movie catalog API.
//! Exposes the modules for use by the server binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
