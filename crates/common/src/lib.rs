//! The `impl_context!` helper shared by genchat crate error types.

pub mod error;

pub use error::FromMessage;
