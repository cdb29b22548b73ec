//! Certification path building from a target certificate to a trust anchor

mod cert_issuers_iter;
mod cert_path_iter;
pub mod path_builder;
pub mod path_results;

pub use crate::builder::{path_builder::*, path_results::*};
