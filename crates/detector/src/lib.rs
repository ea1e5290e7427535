//! Intrusion detector service
//!
//! HTTP surface and configuration for the detector binary.

pub mod api;
pub mod config;
