//! Integration tests module
//!
//! This module organizes all integration tests for the r-mymusic application.

pub mod catalog_test;
pub mod config_test;
pub mod host_test;
pub mod session_test;
