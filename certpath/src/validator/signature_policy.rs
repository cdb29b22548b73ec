//! Signature policy consulted when validating candidate certification paths

use der::asn1::{ObjectIdentifier, Uint};
use der::{Decode, Sequence};
use log::error;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::{
    util::error::*, util::pdv_alg_oids::*, validator::path_settings::PathBuilderSettings,
};

/// The `SignaturePolicy` trait determines which signature algorithms and public keys are acceptable
/// while validating a certification path. Implementations are read-only and may be shared across
/// concurrently running builders.
pub trait SignaturePolicy {
    /// Returns true if the signature algorithm may be used to sign certificates. The default
    /// implementation rejects MD2 and MD5 based algorithms.
    fn is_acceptable_signature_algorithm(&self, alg: &AlgorithmIdentifierOwned) -> bool {
        alg.oid != PKIXALG_MD2_WITH_RSA_ENCRYPTION && alg.oid != PKIXALG_MD5_WITH_RSA_ENCRYPTION
    }

    /// Returns true if an RSA key with a modulus of the given length is acceptable. The default
    /// implementation accepts any length.
    fn is_acceptable_modulus_length_for_rsa(&self, _modulus_length_bits: usize) -> bool {
        true
    }

    /// Returns true if an EC key on the named curve is acceptable. The default implementation
    /// accepts P-256, P-384 and P-521.
    fn is_acceptable_curve_for_ecdsa(&self, curve: &ObjectIdentifier) -> bool {
        *curve == PKIXALG_SECP256R1 || *curve == PKIXALG_SECP384R1 || *curve == PKIXALG_SECP521R1
    }
}

/// `SimpleSignaturePolicy` applies the default algorithm and curve checks plus a minimum RSA modulus length.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimpleSignaturePolicy {
    /// Smallest acceptable RSA modulus, in bits
    pub min_rsa_modulus_length_bits: usize,
}

impl SimpleSignaturePolicy {
    /// Creates a policy that requires RSA moduli of at least `min_rsa_modulus_length_bits` bits.
    pub fn new(min_rsa_modulus_length_bits: usize) -> Self {
        SimpleSignaturePolicy {
            min_rsa_modulus_length_bits,
        }
    }

    /// Creates a policy using the PS_MIN_RSA_MODULUS_BITS value from the settings.
    pub fn from_settings(settings: &PathBuilderSettings) -> Self {
        SimpleSignaturePolicy::new(settings.get_min_rsa_modulus_bits() as usize)
    }
}

impl Default for SimpleSignaturePolicy {
    fn default() -> Self {
        SimpleSignaturePolicy::new(2048)
    }
}

impl SignaturePolicy for SimpleSignaturePolicy {
    fn is_acceptable_modulus_length_for_rsa(&self, modulus_length_bits: usize) -> bool {
        modulus_length_bits >= self.min_rsa_modulus_length_bits
    }
}

/// RSAPublicKey ::= SEQUENCE {
///     modulus           INTEGER,  -- n
///     publicExponent    INTEGER   -- e
/// }
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct RsaPublicKey {
    modulus: Uint,
    public_exponent: Uint,
}

fn bit_length(value: &[u8]) -> usize {
    match value.iter().position(|b| *b != 0) {
        Some(i) => (value.len() - i - 1) * 8 + (8 - value[i].leading_zeros() as usize),
        None => 0,
    }
}

/// `rsa_modulus_length_bits` returns the length of the modulus from an RSA SubjectPublicKeyInfo.
pub fn rsa_modulus_length_bits(spki: &SubjectPublicKeyInfoOwned) -> Result<usize> {
    let key_bytes = match spki.subject_public_key.as_bytes() {
        Some(b) => b,
        None => return Err(Error::ParseError),
    };
    let rsa = RsaPublicKey::from_der(key_bytes)?;
    Ok(bit_length(rsa.modulus.as_bytes()))
}

/// `check_public_key_against_policy` returns `ProhibitedKeySize` when the key is an RSA key that is
/// too short or an EC key on a curve the policy does not accept. Keys of other types are not
/// evaluated.
pub fn check_public_key_against_policy(
    spki: &SubjectPublicKeyInfoOwned,
    policy: &dyn SignaturePolicy,
) -> Result<()> {
    if spki.algorithm.oid == PKIXALG_RSA_ENCRYPTION {
        let bits = match rsa_modulus_length_bits(spki) {
            Ok(bits) => bits,
            Err(e) => {
                error!("Failed to parse RSA public key: {}", e);
                return Err(Error::PathValidation(PathValidationStatus::EncodingError));
            }
        };
        if !policy.is_acceptable_modulus_length_for_rsa(bits) {
            error!("RSA modulus length of {} bits is not acceptable", bits);
            return Err(Error::PathValidation(
                PathValidationStatus::ProhibitedKeySize,
            ));
        }
    } else if spki.algorithm.oid == PKIXALG_EC_PUBLIC_KEY {
        let curve = match &spki.algorithm.parameters {
            Some(params) => params.decode_as::<ObjectIdentifier>().ok(),
            None => None,
        };
        match curve {
            Some(curve) if policy.is_acceptable_curve_for_ecdsa(&curve) => {}
            Some(curve) => {
                error!("Elliptic curve {} is not acceptable", curve);
                return Err(Error::PathValidation(
                    PathValidationStatus::ProhibitedKeySize,
                ));
            }
            None => {
                error!("Elliptic curve public key lacks a named curve");
                return Err(Error::PathValidation(
                    PathValidationStatus::ProhibitedKeySize,
                ));
            }
        }
    }
    Ok(())
}
