pub mod fixture;
pub mod flaky;

pub use fixture::{TestGraph, TestResult};
pub use flaky::FlakyStore;
