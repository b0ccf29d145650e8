//! Resource adapters.
//!
//! [`InMemoryResources`] implements every resolution capability over data
//! held in memory, loaded from JSON or assembled with builder methods. It
//! backs the command line front end and the test suites.

pub mod memory;

pub use memory::InMemoryResources;
