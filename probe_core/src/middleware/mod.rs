//! Middleware for the health endpoint

pub mod logging;
