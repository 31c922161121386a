//! Format-independent pipeline stages.
//!
//! ```text
//! route ──▶ validate ──▶ (extract) ──▶ postprocess ──▶ retention
//! (ext)     (size/pages)               (strip images)  (sweep old outputs)
//! ```
//!
//! Extraction itself is format-specific and lives in [`crate::extract`].

pub mod postprocess;
pub mod retention;
pub mod route;
pub mod validate;
