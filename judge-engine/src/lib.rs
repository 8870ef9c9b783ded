#![deny(clippy::all)]

pub mod aggregate;
pub mod checker;
pub mod config;
pub mod lang;

mod compile;
mod exec;
mod judger;
mod service;
mod testcase;
mod workspace;

pub use self::config::Config;
pub use self::judger::Judger;
pub use self::service::JudgeService;
