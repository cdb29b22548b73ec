//! Structures and functions related to configuring certification path building operations

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use pkiprocmacros::*;

use crate::util::error::*;

#[cfg(feature = "std")]
use std::path::Path;
#[cfg(feature = "std")]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "std")]
use serde_json::Result as SerdeResult;

/// `PathBuilderSettings` is a newtype around a `BTreeMap` that maps setting names to a variant
/// value. Typed accessors are generated for each of the `PS_*` settings defined below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct PathBuilderSettings(pub BTreeMap<String, PathBuilderSettingTypes>);

impl PathBuilderSettings {
    /// Creates a new empty [`PathBuilderSettings`]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `PathBuilderSettingTypes` is used to define a variant map with types associated with
/// building and validating certification paths.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum PathBuilderSettingTypes {
    /// Represents bool values
    Bool(bool),
    /// Represents u32 values
    U32(u32),
    /// Represents u64 values
    U64(u64),
    /// Represents String values
    String(String),
}

//-----------------------------------------------------------------------------------------------
// Setting names
//-----------------------------------------------------------------------------------------------
/// `PS_TIME_OF_INTEREST` is used to retrieve the time of interest, expressed as seconds since
/// the Unix epoch, used when validating candidate paths. Zero disables validity checks. The
/// default value is the current time when the std feature is available and 0 otherwise.
pub static PS_TIME_OF_INTEREST: &str = "psTimeOfInterest";

/// `PS_MIN_RSA_MODULUS_BITS` is used to retrieve the minimum acceptable RSA modulus length, in bits.
/// The default value is 2048.
pub static PS_MIN_RSA_MODULUS_BITS: &str = "psMinRsaModulusBits";

/// `PS_MAX_PATH_DEPTH` is used to retrieve the maximum number of certificates below the trust anchor
/// that a candidate path may contain. The default value is 0, which imposes no limit.
pub static PS_MAX_PATH_DEPTH: &str = "psMaxPathDepth";

/// `PS_ENFORCE_TRUST_ANCHOR_VALIDITY` is used to retrieve a boolean value indicating whether the
/// validity period of the trust anchor certificate is checked. The default value is true.
pub static PS_ENFORCE_TRUST_ANCHOR_VALIDITY: &str = "psEnforceTrustAnchorValidity";

/// `PS_ENFORCE_ALG_AND_KEY_SIZE_CONSTRAINTS` is used to retrieve a boolean value indicating whether
/// the signature policy is consulted when validating candidate paths. The default value is true.
pub static PS_ENFORCE_ALG_AND_KEY_SIZE_CONSTRAINTS: &str = "psEnforceAlgAndKeySizeConstraints";

/// `PS_SETTINGS_LABEL` is used to retrieve an optional label that is included in log output.
pub static PS_SETTINGS_LABEL: &str = "psSettingsLabel";

pbs_gets_and_sets_with_default!(PS_TIME_OF_INTEREST, u64, {
    #[cfg(feature = "std")]
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => 0,
    }
    #[cfg(not(feature = "std"))]
    0
});
pbs_gets_and_sets_with_default!(PS_MIN_RSA_MODULUS_BITS, u32, 2048);
pbs_gets_and_sets_with_default!(PS_MAX_PATH_DEPTH, u32, 0);
pbs_gets_and_sets_with_default!(PS_ENFORCE_TRUST_ANCHOR_VALIDITY, bool, true);
pbs_gets_and_sets_with_default!(PS_ENFORCE_ALG_AND_KEY_SIZE_CONSTRAINTS, bool, true);
pbs_gets_and_sets!(PS_SETTINGS_LABEL, String);

/// `read_settings` accepts a string containing the name of a file that notionally contains JSON data that
/// represents [`PathBuilderSettings`].
///
/// When no file name is provided or the file does not exist, default settings are returned. A file
/// that cannot be parsed yields [`Error::ParseError`].
#[cfg(feature = "std")]
pub fn read_settings(fname: &Option<String>) -> Result<PathBuilderSettings> {
    if let Some(fname) = fname {
        let p = Path::new(fname.as_str());
        if Path::exists(p) {
            let json = std::fs::read(p)?;
            let r: SerdeResult<PathBuilderSettings> = serde_json::from_slice(&json);
            return match r {
                Ok(pbs) => Ok(pbs),
                Err(e) => {
                    log::error!("Failed to parse settings from {}: {}", fname, e);
                    Err(Error::ParseError)
                }
            };
        }
    }
    Ok(PathBuilderSettings::new())
}

#[test]
fn test_default_gets_pbs() {
    let pbs = PathBuilderSettings::default();

    #[cfg(feature = "std")]
    {
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(pbs.get_time_of_interest() >= before);
    }
    #[cfg(not(feature = "std"))]
    {
        assert_eq!(pbs.get_time_of_interest(), 0);
    }

    assert_eq!(2048, pbs.get_min_rsa_modulus_bits());
    assert_eq!(0, pbs.get_max_path_depth());
    assert!(pbs.get_enforce_trust_anchor_validity());
    assert!(pbs.get_enforce_alg_and_key_size_constraints());
    assert_eq!(None, pbs.get_settings_label());
}

#[test]
fn test_sets_pbs() {
    let mut pbs = PathBuilderSettings::new();
    pbs.set_time_of_interest(1_700_000_000);
    pbs.set_min_rsa_modulus_bits(3072);
    pbs.set_max_path_depth(4);
    pbs.set_enforce_trust_anchor_validity(false);
    pbs.set_enforce_alg_and_key_size_constraints(false);
    pbs.set_settings_label("unit test".to_string());

    assert_eq!(1_700_000_000, pbs.get_time_of_interest());
    assert_eq!(3072, pbs.get_min_rsa_modulus_bits());
    assert_eq!(4, pbs.get_max_path_depth());
    assert!(!pbs.get_enforce_trust_anchor_validity());
    assert!(!pbs.get_enforce_alg_and_key_size_constraints());
    assert_eq!(Some("unit test".to_string()), pbs.get_settings_label());

    // a value of the wrong type falls back to the default
    pbs.0.insert(
        PS_MAX_PATH_DEPTH.to_string(),
        PathBuilderSettingTypes::Bool(true),
    );
    assert_eq!(0, pbs.get_max_path_depth());
}
