//! Integration test crate.
//!
//! All tests live in `tests/`; this library target exists so the crate
//! participates in the workspace and the test files can grow shared
//! helpers here if they ever need them.
