//! The trust_store module provides an in-memory index of trust anchor certificates keyed by
//! normalized subject name.
//!
//! Trust is a property of a (name, key) pair rather than of a particular encoded certificate. A
//! certificate is trusted when it is one of the stored anchors, or when a stored anchor has the same
//! normalized subject name and the same SubjectPublicKeyInfo.
//!
//! ```
//! use certpath::TrustStore;
//!
//! let trust_store = TrustStore::new();
//! assert!(trust_store.is_empty());
//! assert!(trust_store
//!     .find_trust_anchors_by_normalized_name("2.5.4.3=root")
//!     .is_empty());
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;

use log::{debug, info};

use crate::{
    util::pdv_utilities::{buffer_to_hex, get_leaf_rdn},
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
};

/// `TrustStore` is a multimap from normalized subject name to trust anchor certificates.
///
/// Several anchors may share a subject name (i.e., cross-signed or re-keyed roots) and lookups
/// return all of them in insertion order. No duplicate detection is performed when adding anchors.
/// The store is read-only while builds that use it are in progress and may be shared via `Arc`.
#[derive(Clone, Default, Debug)]
pub struct TrustStore {
    /// Maps normalized subject names to anchors
    anchors: BTreeMap<String, ParsedCertificateList>,
    /// Number of anchors across all names
    count: usize,
}

impl TrustStore {
    /// TrustStore::new instantiates a new empty TrustStore.
    pub fn new() -> TrustStore {
        TrustStore {
            anchors: BTreeMap::new(),
            count: 0,
        }
    }

    /// `add_trusted_certificate` adds `cert` as a trust anchor, indexed by its normalized subject name.
    pub fn add_trusted_certificate(&mut self, cert: Arc<PDVCertificate>) {
        debug!(
            "Adding trust anchor with subject {}",
            get_leaf_rdn(&cert.decoded_cert.tbs_certificate.subject)
        );
        self.anchors
            .entry(cert.normalized_subject.clone())
            .or_default()
            .push(cert);
        self.count += 1;
    }

    /// `find_trust_anchors_by_normalized_name` returns all anchors whose normalized subject name equals
    /// `normalized_name`, in the order they were added.
    pub fn find_trust_anchors_by_normalized_name(
        &self,
        normalized_name: &str,
    ) -> &[Arc<PDVCertificate>] {
        match self.anchors.get(normalized_name) {
            Some(anchors) => anchors.as_slice(),
            None => &[],
        }
    }

    /// `is_trusted_certificate` returns true if `cert` is one of the stored anchors or if a stored anchor
    /// has the same normalized subject name and the same SubjectPublicKeyInfo.
    pub fn is_trusted_certificate(&self, cert: &PDVCertificate) -> bool {
        let anchors = self.find_trust_anchors_by_normalized_name(&cert.normalized_subject);
        if anchors
            .iter()
            .any(|anchor| core::ptr::eq(anchor.as_ref(), cert))
        {
            return true;
        }
        anchors.iter().any(|anchor| anchor.spki_der == cert.spki_der)
    }

    /// `clear` removes all anchors.
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.count = 0;
    }

    /// `len` returns the number of anchors in the store.
    pub fn len(&self) -> usize {
        self.count
    }

    /// `is_empty` returns true if the store contains no anchors.
    pub fn is_empty(&self) -> bool {
        0 == self.count
    }

    /// Log trust anchor details at info level.
    pub fn log_trust_anchors(&self) {
        if self.is_empty() {
            info!("No trust anchors present");
        }
        for (i, ta) in self.anchors.values().flatten().enumerate() {
            info!(
                "Index: {:3}; Fingerprint: {}; Subject: {}; Locator: {}",
                i,
                buffer_to_hex(&ta.fingerprint),
                get_leaf_rdn(&ta.decoded_cert.tbs_certificate.subject),
                ta.locator().unwrap_or("")
            );
        }
    }
}
