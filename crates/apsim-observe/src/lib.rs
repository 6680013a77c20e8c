//! Logging bootstrap for the server manager.
//!
//! Backend output is relayed under the `apsim.backend.stdout` and
//! `apsim.backend.stderr` targets, so a filter such as
//! `info,apsim.backend.stdout=warn` silences the chatty stream only.
mod logger;
pub use logger::*;
