//! Upload transfer helpers.

pub mod progress_stream;
