//! Library crate for tune-race-back, exposing modules for binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod matcher;
pub mod providers;
pub mod routes;
pub mod services;
pub mod state;
