//! Field extraction from fetched pages and API payloads
//!
//! - `patterns`: ordered regexes over visible text
//! - `html`: label/value pairs from tables and definition lists
//! - `fields`: alias normalization into a `PartialRecord`

pub mod fields;
pub mod html;
pub mod patterns;

pub use fields::{normalize, RawFields};
