//! Pipeline assembly and report output.

mod factory;
mod report;

pub use factory::build_pipeline;
pub use report::{log_report, print_json};
