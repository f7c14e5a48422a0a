//! Test utilities shared by unit and HTTP tests.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory payment store implementing every repository trait
//! - Scripted fakes for the gateway and the subscription extension endpoint
//! - A builder for a fully wired `AppState`

mod app_state_builder;
mod factories;
mod payment_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use payment_mocks::*;
