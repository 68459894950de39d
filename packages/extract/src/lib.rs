//! Recovering files from pipeline output and verifying them.
//!
//! Two independent halves:
//! - [`extractor`]: turns heterogeneous pipeline outputs ([`RawOutput`]) into
//!   [`FileUnit`](forge_core::FileUnit)s by trying strategies in a fixed order
//! - [`validate`]: static syntax and required-file checks producing a
//!   [`VerificationReport`](forge_core::VerificationReport)
//!
//! Nothing here executes generated content.

mod error;
pub mod extractor;
mod raw;
mod scan;
pub mod validate;

pub use error::ExtractError;
pub use extractor::{Extracted, Shape, Strategy, extract, extract_files};
pub use raw::RawOutput;
pub use validate::{Language, check_structure, check_syntax, verify};
