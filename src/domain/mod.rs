//! Domain types for Strata.
//!
//! The domain layer provides:
//! - **Error types** ([`StrataError`]) with the user/internal taxonomy and
//!   exit-code contract
//! - **Result type alias** ([`Result`])
//! - **Document helpers** ([`document`]) for path lookup and key projection
//!   over dynamically shaped JSON documents

pub mod document;
pub mod errors;
pub mod result;

pub use errors::{StrataError, INTERNAL_ERROR_EXIT_CODE, USER_ERROR_EXIT_CODE};
pub use result::Result;
