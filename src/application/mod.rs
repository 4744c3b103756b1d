//! Application wiring: the service context, the request entry point and
//! the failure boundary.

mod context;
mod core;
mod error;
mod failure;

pub use context::AppContext;
pub use core::Application;
pub use error::AppError;
pub use failure::{guard, install_panic_hook, Failure};
