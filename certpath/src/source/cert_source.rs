//! The cert_source module provides a manually populated in-memory certificate store that serves as
//! a synchronous issuer source when building certification paths.
//!
//! ```
//! use std::rc::Rc;
//! use certpath::{CertIssuerSource, CertSource};
//!
//! let cert_source = CertSource::new();
//! assert!(cert_source.is_empty());
//!
//! // sources are registered with a CertPathBuilder as Rc<dyn CertIssuerSource>
//! let _source: Rc<dyn CertIssuerSource> = Rc::new(cert_source);
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::{format, vec::Vec};

use crate::{
    environment::environment_traits::CertIssuerSource,
    util::error::*,
    util::logging::*,
    util::pdv_utilities::{buffer_to_hex, get_leaf_rdn},
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
};

/// `CertSource` holds a list of certificates indexed by normalized subject name. When used as a
/// [`CertIssuerSource`] it answers synchronously with every certificate whose subject matches the
/// issuer of the queried certificate and never answers asynchronously.
#[derive(Clone, Default, Debug)]
pub struct CertSource {
    /// Certificates in the order they were added
    certs: ParsedCertificateList,

    /// Maps certificate subject names to keys in the `certs` field.
    name_map: BTreeMap<String, Vec<usize>>,
}

impl CertSource {
    /// CertSource::new instantiates a new empty CertSource.
    pub fn new() -> CertSource {
        CertSource {
            certs: Vec::new(),
            name_map: BTreeMap::new(),
        }
    }

    /// `add_cert` adds a certificate to the source and indexes it by normalized subject name.
    pub fn add_cert(&mut self, cert: Arc<PDVCertificate>) {
        let index = self.certs.len();
        self.name_map
            .entry(cert.normalized_subject.clone())
            .or_default()
            .push(index);
        self.certs.push(cert);
    }

    /// `get_certificates_for_name` returns the certificates whose normalized subject name matches
    /// `normalized_name`, or [`Error::NotFound`] if there are none.
    pub fn get_certificates_for_name(&self, normalized_name: &str) -> Result<ParsedCertificateList> {
        let retval: ParsedCertificateList = match self.name_map.get(normalized_name) {
            Some(indices) => indices
                .iter()
                .filter_map(|i| self.certs.get(*i).cloned())
                .collect(),
            None => Vec::new(),
        };

        if retval.is_empty() {
            Err(Error::NotFound)
        } else {
            Ok(retval)
        }
    }

    /// `get_certificates` returns all certificates in the order they were added.
    pub fn get_certificates(&self) -> &[Arc<PDVCertificate>] {
        self.certs.as_slice()
    }

    /// `len` returns the number of certificates in the source.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// `is_empty` returns true if the source contains no certificates.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Log certificate details at info level.
    pub fn log_certs(&self) {
        if self.certs.is_empty() {
            log_message(&PeLogLevels::PeInfo, "No certificates present");
        }

        for (i, cert) in self.certs.iter().enumerate() {
            let sub = get_leaf_rdn(&cert.decoded_cert.tbs_certificate.subject);
            let iss = get_leaf_rdn(&cert.decoded_cert.tbs_certificate.issuer);
            log_message(
                &PeLogLevels::PeInfo,
                format!(
                    "Index: {}; Fingerprint: {}; Issuer: {}; Subject: {}",
                    i,
                    buffer_to_hex(&cert.fingerprint),
                    iss,
                    sub
                )
                .as_str(),
            );
        }
    }
}

impl CertIssuerSource for CertSource {
    fn sync_get_issuers_of(&self, cert: &PDVCertificate, issuers: &mut ParsedCertificateList) {
        if let Ok(certs) = self.get_certificates_for_name(&cert.normalized_issuer) {
            issuers.extend(certs);
        }
    }
}
