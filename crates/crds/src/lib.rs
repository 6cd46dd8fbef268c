//! Node GC CRD Definitions
//!
//! Kubernetes Custom Resource Definitions and well-known keys shared by the
//! garbage collector and the controllers it cooperates with.

pub mod keys;
pub mod machine;

pub use keys::*;
pub use machine::*;
