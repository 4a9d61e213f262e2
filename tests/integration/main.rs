//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no relay board
//! or thermometer attached.

mod brewing_flow_tests;
mod gateway_tests;
mod mock_hw;
mod store_tests;
mod watchdog_tests;
