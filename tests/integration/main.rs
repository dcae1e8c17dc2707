//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a pipeline end to end
//! against the simulated modem.  All tests run on the host (x86_64) with
//! no real hardware required.

mod mock_hw;
mod mock_modem;
mod ota_tests;
mod staging_tests;
