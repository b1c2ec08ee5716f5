//! Terminal output helpers shared by the fpm binary.

mod output;
mod progress;

pub use output::{Output, Verbosity};
pub use progress::ProgressManager;
