#![warn(clippy::pedantic)]
// Noisy doc/signature lints for a small service crate
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod platform;
pub mod relay;
pub mod secrets;
pub mod server;
pub mod talk;
pub(crate) mod utils;
pub mod verify;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
