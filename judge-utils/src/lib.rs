#![deny(clippy::all)]

pub mod math;
pub mod os_cmd;
pub mod tracing;
