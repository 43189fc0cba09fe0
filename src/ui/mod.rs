//! Terminal output
//!
//! Uses `cliclack` for interactive prompts and `indicatif` for precache
//! progress, with plain output in CI/non-interactive environments.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, step_error, step_info,
    step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{PrecacheProgress, TaskSpinner};
pub use prompts::confirm;
