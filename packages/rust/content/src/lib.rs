//! Content production for copyforge: prompt rendering, model-output parsing,
//! HTML finalization, and the deterministic quality audit.
//!
//! Everything here is row-scoped and side-effect free except the generator,
//! which calls the model through the injected gateway. The auditor is a pure
//! function so the quality loop can re-score any draft without I/O.

mod auditor;
mod finalize;
mod generator;
mod parser;
mod prompts;

pub use auditor::{Auditor, CATEGORY_MAX};
pub use finalize::finalize_html;
pub use generator::Generator;
pub use parser::extract_bundle;
pub use prompts::PromptLibrary;
