//! Traits and type definitions for the collaborators used while building certification paths

pub mod environment_traits;

pub use crate::environment::environment_traits::*;
