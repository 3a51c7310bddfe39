//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory store implementing every repository trait
//! - A scripted payment provider and an `AppState` builder for route tests

mod app_state_builder;
mod billing_mocks;
mod factories;
mod provider_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use provider_mocks::*;
