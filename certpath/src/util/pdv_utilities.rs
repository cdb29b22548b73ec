//! Utility functions that support certification path building

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str;

use der::asn1::{BmpString, Ia5String, PrintableString, TeletexStringRef, Utf8StringRef};
use der::{Encode, Tagged};
use log::error;
use subtle_encoding::hex;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RelativeDistinguishedName};
use x509_cert::{Certificate, TbsCertificate};

use crate::{util::error::*, validator::pdv_certificate::PDVCertificate};

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field (after normalization).
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// `valid_at_time` evaluates the not_before and not_after fields of the given TBSCertificate instance
/// and provides an indication of validity relative to presented time of interest.
///
/// It returns the number of seconds left to live if the certificate is valid at the given time or
/// an error indicating which field failed if the certificate is not valid. The not_before field is
/// evaluated first.
///
/// To stifle logging output upon error, pass true for the stifle_log parameter.
pub fn valid_at_time(target: &TbsCertificate, toi: u64, stifle_log: bool) -> Result<u64> {
    if 0 == toi {
        // zero is used to disable validity check
        return Ok(0);
    }

    let nb = target.validity.not_before.to_unix_duration().as_secs();
    if nb > toi {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                "certificate is not yet valid, i.e., not_before is after the configured time of interest",
            );
        }
        return Err(Error::PathValidation(
            PathValidationStatus::InvalidNotBeforeDate,
        ));
    }

    let na = target.validity.not_after.to_unix_duration().as_secs();
    if na < toi {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                format!(
                    "certificate is expired relative to the configured time of interest: {}",
                    target.validity.not_after
                )
                .as_str(),
            );
        }
        Err(Error::PathValidation(
            PathValidationStatus::InvalidNotAfterDate,
        ))
    } else {
        Ok(na - toi)
    }
}

pub(crate) fn log_error_for_name(name: &Name, msg: &str) {
    let name_str = name_to_string(name);
    error!(
        "Encountered error while processing certificate with subject {}: {}",
        name_str, msg
    );
}

pub(crate) fn log_error_for_ca(ca: &PDVCertificate, msg: &str) {
    log_error_for_name(&ca.decoded_cert.tbs_certificate.subject, msg);
}

/// `name_to_string` returns an RFC 4514 string representation of the presented name.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// Retrieves a string value from the last RDN element in the presented Name, or an empty string
/// if the name is empty.
pub fn get_leaf_rdn(name: &Name) -> String {
    match name.0.last() {
        Some(rdn) => rdn.to_string(),
        None => String::new(),
    }
}

/// `buffer_to_hex` returns an upper case hex representation of the presented buffer.
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    match str::from_utf8(hex.as_slice()) {
        Ok(s) => s.to_string(),
        Err(_) => "".to_string(),
    }
}

/// `get_string_value_from_atav` decodes the value of an attribute when it is one of the directory
/// string types. None is returned for all other value types.
pub fn get_string_value_from_atav(atav: &AttributeTypeAndValue) -> Option<String> {
    match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        der::Tag::TeletexString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: TeletexStringRef<'_>| s.to_string()),
        der::Tag::BmpString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: BmpString| s.to_string()),
        _ => None,
    }
}

// Escapes the separators used when joining normalized attributes and RDNs.
fn escape_normalized_value(value: &str) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ',' | '+' | '=' | '\\' => {
                s.push('\\');
                s.push(c);
            }
            _ => s.push(c),
        }
    }
    s
}

fn normalize_atav(atav: &AttributeTypeAndValue) -> Result<String> {
    if let Some(val) = get_string_value_from_atav(atav) {
        let lowered = val.trim().to_lowercase();
        let collapsed = lowered.split_whitespace().collect::<Vec<&str>>().join(" ");
        Ok(format!(
            "{}={}",
            atav.oid,
            escape_normalized_value(collapsed.as_str())
        ))
    } else {
        let enc = atav.value.to_der()?;
        Ok(format!("{}=#{}", atav.oid, buffer_to_hex(enc.as_slice())))
    }
}

fn normalize_rdn(rdn: &RelativeDistinguishedName) -> Result<String> {
    let mut atavs = Vec::with_capacity(rdn.0.len());
    for atav in rdn.0.iter() {
        atavs.push(normalize_atav(atav)?);
    }
    atavs.sort();
    Ok(atavs.join("+"))
}

/// `normalize_name` produces the canonical string form of a distinguished name that is used as the
/// equality key for subject and issuer name matching.
///
/// Directory string values are trimmed, lowercased and have internal runs of whitespace collapsed
/// to a single space. Attributes within a multi-valued RDN are sorted. Values that are not
/// directory strings are rendered as the hex encoding of the DER value. RDN order is preserved.
pub fn normalize_name(name: &Name) -> Result<String> {
    let mut rdns = Vec::with_capacity(name.0.len());
    for rdn in name.0.iter() {
        rdns.push(normalize_rdn(rdn)?);
    }
    Ok(rdns.join(","))
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    // no match if not the same number of RDNs
    if left.0.len() != right.0.len() {
        return false;
    }
    if left == right {
        return true;
    }

    match (normalize_name(left), normalize_name(right)) {
        (Ok(l), Ok(r)) => l == r,
        _ => false,
    }
}
