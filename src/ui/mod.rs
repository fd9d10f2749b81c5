//! Terminal output for the CLI
//!
//! Interactive terminals get colored status lines and a live build bar
//! (`indicatif`); CI and piped output fall back to plain lines.
//!
//! # Example
//!
//! ```rust,ignore
//! use dockyard::ui::{self, BuildOutput, UiContext};
//!
//! let ctx = UiContext::detect();
//! let mut out = BuildOutput::new(&ctx);
//! let results = cache.build(&mut out, &tags, &artifacts, &builder).await?;
//! out.finish();
//!
//! for result in &results {
//!     ui::artifact_result(&ctx, &result.image_name, &result.tag);
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    artifact_result, remark, step_error_detail, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::BuildOutput;
pub use prompts::confirm;
