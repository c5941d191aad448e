//! kinesis-notes
//!
//! Clinical note synthesis from committed checklist responses, rendered
//! through Tera templates in the clinic's two locales.

pub mod error;
pub mod format;
pub mod generate;
pub mod phrases;
pub mod render;
