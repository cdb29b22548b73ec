//! Certificate value type, settings, signature policy and candidate path validation

pub mod path_settings;
pub mod path_validator;
pub mod pdv_certificate;
pub mod pdv_extension;
pub mod signature_policy;

pub use crate::{
    validator::path_settings::*, validator::path_validator::*, validator::pdv_certificate::*,
    validator::pdv_extension::*, validator::signature_policy::*,
};
