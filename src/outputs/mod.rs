//! Export of the accumulated session.
//!
//! # Submodules
//!
//! - [`csv`]: One row per item, in accumulator order
//! - [`json`]: A [`FeedSnapshot`](crate::models::FeedSnapshot) of the whole session
//!
//! # CSV Layout
//!
//! ```text
//! Time,Sample ID,text,source
//! 2024-01-03,0b7e…,"Apple shares climb after ""upbeat"" guidance","Reuters"
//! ```

pub mod csv;
pub mod json;
