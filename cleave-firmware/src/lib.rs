#![no_std]
pub mod engine;
pub mod key_states;
pub mod layer_stack;
pub mod postponer;
pub mod program;
pub mod recorder;
pub mod reports;
pub mod runner;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod time_driver_test_stub;

#[macro_use]
mod macros;

/// One scheduler tick equals one pass of the fixed-rate polling loop:
/// postponer drain, macro-context advance, cooldown bookkeeping.
pub const TICK_MS: u64 = 1;
