//! Functions related to validating candidate certification paths
//!
//! Candidate paths are ordered from the target certificate (index 0) to the trust anchor (last
//! index). The trust anchor's own signature is not checked.

use alloc::format;
use alloc::sync::Arc;

use const_oid::db::rfc5912::{ID_CE_BASIC_CONSTRAINTS, ID_CE_KEY_USAGE};
use der::Decode;
use x509_cert::ext::pkix::KeyUsages;

use crate::{
    environment::environment_traits::*, util::error::*, util::logging::*,
    util::pdv_utilities::*, validator::path_settings::*, validator::pdv_certificate::*,
    validator::pdv_extension::*, validator::signature_policy::*,
};

/// `BasicPathValidator` performs the minimal set of checks a candidate path must pass: name
/// chaining, validity, basic constraints, key usage, critical extensions, algorithm and key size
/// constraints and signature verification.
#[derive(Clone)]
pub struct BasicPathValidator {
    verify_signature_message: VerifySignatureMessage,
    /// Check the validity period of the trust anchor certificate
    pub enforce_trust_anchor_validity: bool,
    /// Consult the signature policy for algorithms and public keys
    pub enforce_alg_and_key_size_constraints: bool,
}

impl BasicPathValidator {
    /// Creates a validator that uses the given signature verification function.
    pub fn new(verify_signature_message: VerifySignatureMessage) -> Self {
        BasicPathValidator {
            verify_signature_message,
            enforce_trust_anchor_validity: true,
            enforce_alg_and_key_size_constraints: true,
        }
    }

    /// Creates a validator configured from the PS_ENFORCE_TRUST_ANCHOR_VALIDITY and
    /// PS_ENFORCE_ALG_AND_KEY_SIZE_CONSTRAINTS settings.
    pub fn from_settings(
        verify_signature_message: VerifySignatureMessage,
        settings: &PathBuilderSettings,
    ) -> Self {
        BasicPathValidator {
            verify_signature_message,
            enforce_trust_anchor_validity: settings.get_enforce_trust_anchor_validity(),
            enforce_alg_and_key_size_constraints: settings
                .get_enforce_alg_and_key_size_constraints(),
        }
    }

    /// `validate_path` runs each check in turn and returns the first failure encountered.
    pub fn validate_path(
        &self,
        path: &[Arc<PDVCertificate>],
        policy: &dyn SignaturePolicy,
        time_of_interest: u64,
    ) -> Result<()> {
        if path.is_empty() {
            return Err(Error::PathValidation(
                PathValidationStatus::MissingCertificate,
            ));
        }

        check_names(path)?;
        check_validity(path, time_of_interest, self.enforce_trust_anchor_validity)?;
        if path.len() == 1 {
            // the target is itself a trust anchor
            return Ok(());
        }
        check_basic_constraints(path)?;
        check_key_usage(path)?;
        check_critical_extensions(path)?;
        if self.enforce_alg_and_key_size_constraints {
            enforce_alg_and_key_size_constraints(path, policy)?;
        }
        verify_signatures(path, self.verify_signature_message)?;
        log_message(
            &PeLogLevels::PeDebug,
            format!(
                "Successfully completed basic path validation checks for certificate issued to {}",
                path[0].subject_to_string()
            )
            .as_str(),
        );
        Ok(())
    }
}

impl PathValidator for BasicPathValidator {
    fn validate(
        &self,
        path: &[Arc<PDVCertificate>],
        policy: &dyn SignaturePolicy,
        time_of_interest: u64,
    ) -> PathValidationStatus {
        match self.validate_path(path, policy, time_of_interest) {
            Ok(()) => PathValidationStatus::Valid,
            Err(Error::PathValidation(status)) => status,
            Err(e) => {
                log_message(
                    &PeLogLevels::PeError,
                    format!("Unexpected error while validating path: {}", e).as_str(),
                );
                PathValidationStatus::EncodingError
            }
        }
    }
}

//-----------------------------------------------------------------------------
// Functions that perform some small aspect of path validation
//-----------------------------------------------------------------------------
/// `check_names` ensures the issuer name of each certificate matches the subject name of the
/// certificate that follows it in the path.
pub fn check_names(path: &[Arc<PDVCertificate>]) -> Result<()> {
    for pair in path.windows(2) {
        if pair[0].normalized_issuer != pair[1].normalized_subject {
            log_error_for_ca(
                &pair[0],
                format!(
                    "issuer name does not match subject name of {}",
                    pair[1].subject_to_string()
                )
                .as_str(),
            );
            return Err(Error::PathValidation(
                PathValidationStatus::NameChainingFailure,
            ));
        }
    }
    Ok(())
}

/// `check_validity` ensures each certificate is valid at the time of interest. The trust anchor is
/// only checked when `enforce_trust_anchor_validity` is true. A time of interest of zero disables
/// the check.
pub fn check_validity(
    path: &[Arc<PDVCertificate>],
    time_of_interest: u64,
    enforce_trust_anchor_validity: bool,
) -> Result<()> {
    if 0 == time_of_interest || path.is_empty() {
        return Ok(());
    }

    let anchor_index = path.len() - 1;
    for (i, cert) in path.iter().enumerate() {
        if i == anchor_index && !enforce_trust_anchor_validity {
            continue;
        }
        valid_at_time(&cert.decoded_cert.tbs_certificate, time_of_interest, false)?;
    }
    Ok(())
}

/// `check_basic_constraints` ensures all intermediate CA certificates feature a basicConstraints extension
/// with the cA field set to true and that the path length does not violate any pathLenConstraint.
/// The target may not assert a pathLenConstraint unless it also asserts cA.
pub fn check_basic_constraints(path: &[Arc<PDVCertificate>]) -> Result<()> {
    if path.len() < 2 {
        return Ok(());
    }
    let anchor_index = path.len() - 1;
    let mut max_path_length: u32 = u32::MAX;

    // walk the intermediates from the one issued by the trust anchor toward the target
    for ca_cert in path[1..anchor_index].iter().rev() {
        if !ca_cert.is_self_issued() {
            if max_path_length == 0 {
                log_error_for_ca(ca_cert, "path length constraint violation");
                return Err(Error::PathValidation(
                    PathValidationStatus::InvalidPathLength,
                ));
            }
            max_path_length -= 1;
        }

        let bc = match ca_cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)? {
            Some(PDVExtension::BasicConstraints(bc)) => bc,
            _ => {
                log_error_for_ca(ca_cert, "missing basic constraints");
                return Err(Error::PathValidation(
                    PathValidationStatus::MissingBasicConstraints,
                ));
            }
        };

        if !bc.ca {
            log_error_for_ca(ca_cert, "invalid basic constraints");
            return Err(Error::PathValidation(
                PathValidationStatus::InvalidBasicConstraints,
            ));
        }

        if let Some(pl) = bc.path_len_constraint {
            max_path_length = max_path_length.min(pl as u32);
        }
    }

    if let Some(PDVExtension::BasicConstraints(bc)) =
        path[0].get_extension(&ID_CE_BASIC_CONSTRAINTS)?
    {
        if bc.path_len_constraint.is_some() && !bc.ca {
            log_error_for_ca(
                &path[0],
                "pathLenConstraint is present in a certificate that is not a CA",
            );
            return Err(Error::PathValidation(
                PathValidationStatus::InvalidBasicConstraints,
            ));
        }
    }

    Ok(())
}

fn is_ca(cert: &PDVCertificate) -> bool {
    matches!(
        cert.get_extension(&ID_CE_BASIC_CONSTRAINTS),
        Ok(Some(PDVExtension::BasicConstraints(bc))) if bc.ca
    )
}

/// `check_key_usage` ensures intermediate CA certificates that feature a keyUsage extension assert
/// keyCertSign, and that a target that is not a CA does not assert keyCertSign.
pub fn check_key_usage(path: &[Arc<PDVCertificate>]) -> Result<()> {
    if path.len() < 2 {
        return Ok(());
    }
    let anchor_index = path.len() - 1;
    for ca_cert in path[1..anchor_index].iter() {
        if let Some(PDVExtension::KeyUsage(ku)) = ca_cert.get_extension(&ID_CE_KEY_USAGE)? {
            if !ku.0.contains(KeyUsages::KeyCertSign) {
                log_error_for_ca(ca_cert, "keyCertSign is not set in key usage extension");
                return Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage));
            }
        }
    }

    let target = &path[0];
    if let Some(PDVExtension::KeyUsage(ku)) = target.get_extension(&ID_CE_KEY_USAGE)? {
        if ku.0.contains(KeyUsages::KeyCertSign) && !is_ca(target) {
            log_error_for_ca(
                target,
                "keyCertSign is set in a target certificate that is not a CA",
            );
            return Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage));
        }
    }
    Ok(())
}

/// `check_critical_extensions` ensures no certificate other than the trust anchor features a critical
/// extension that is not listed in [`PROCESSED_CRITICAL_EXTENSIONS`].
pub fn check_critical_extensions(path: &[Arc<PDVCertificate>]) -> Result<()> {
    if path.len() < 2 {
        return Ok(());
    }
    let anchor_index = path.len() - 1;
    for cert in path[..anchor_index].iter() {
        if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
            for ext in exts {
                if ext.critical && !PROCESSED_CRITICAL_EXTENSIONS.contains(&ext.extn_id) {
                    log_error_for_ca(
                        cert,
                        format!("unprocessed critical extension: {}", ext.extn_id).as_str(),
                    );
                    return Err(Error::PathValidation(
                        PathValidationStatus::UnprocessedCriticalExtension,
                    ));
                }
            }
        }
    }
    Ok(())
}

/// `enforce_alg_and_key_size_constraints` consults the signature policy for the signature algorithm
/// of each certificate other than the trust anchor and for the public key used to verify it.
pub fn enforce_alg_and_key_size_constraints(
    path: &[Arc<PDVCertificate>],
    policy: &dyn SignaturePolicy,
) -> Result<()> {
    for pair in path.windows(2) {
        let cert = &pair[0];
        let issuer = &pair[1];
        if !policy.is_acceptable_signature_algorithm(cert.signature_algorithm()) {
            log_error_for_ca(
                cert,
                format!(
                    "signature algorithm {} is not acceptable",
                    cert.signature_algorithm().oid
                )
                .as_str(),
            );
            return Err(Error::PathValidation(PathValidationStatus::ProhibitedAlg));
        }
        if let Err(e) = check_public_key_against_policy(issuer.subject_public_key_info(), policy)
        {
            log_error_for_ca(issuer, "public key is not acceptable");
            return Err(e);
        }
    }
    Ok(())
}

/// `verify_signatures` verifies the signature of each certificate other than the trust anchor
/// using the public key of the certificate that follows it in the path.
pub fn verify_signatures(
    path: &[Arc<PDVCertificate>],
    verify_signature_message: VerifySignatureMessage,
) -> Result<()> {
    for pair in path.windows(2) {
        let cur_cert = &pair[0];
        let working_spki = pair[1].subject_public_key_info();

        let defer_cert = match DeferDecodeSigned::from_der(cur_cert.encoded_cert.as_slice()) {
            Ok(defer_cert) => defer_cert,
            Err(e) => {
                log_error_for_ca(
                    cur_cert,
                    format!("failed to defer decode certificate: {}", e).as_str(),
                );
                return Err(Error::PathValidation(PathValidationStatus::EncodingError));
            }
        };

        let signature = match defer_cert.signature.as_bytes() {
            Some(s) => s,
            None => {
                log_error_for_ca(cur_cert, "signature is not octet aligned");
                return Err(Error::PathValidation(PathValidationStatus::EncodingError));
            }
        };

        let r = verify_signature_message(
            defer_cert.tbs_field.as_slice(),
            signature,
            &defer_cert.signature_algorithm,
            working_spki,
        );
        if let Err(e) = r {
            log_error_for_ca(
                cur_cert,
                format!("signature verification error: {:?}", e).as_str(),
            );
            return Err(Error::PathValidation(
                PathValidationStatus::SignatureVerificationFailure,
            ));
        }
    }
    Ok(())
}
