//! Iterates over the candidate issuers of a single certificate, merging trust anchors, synchronous
//! issuer sources and asynchronous issuer sources into one de-duplicated sequence.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::rc::{Rc, Weak};
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::debug;

use crate::{
    builder::path_builder::{BuilderShared, IssuerNotifier},
    environment::environment_traits::{CertIssuerSource, IssuerRequest, IssuerRequestStatus},
    source::trust_store::TrustStore,
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
};

/// Identifies the asynchronous request made by one issuer iterator of one issuer source.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct RequestKey {
    /// Identifier of the `CertIssuersIter` that made the request, unique within a builder
    pub iter_id: u64,
    /// Index of the issuer source that answered the request
    pub slot: usize,
}

/// Result of asking a `CertIssuersIter` for its next issuer
pub(crate) enum IssuerPoll {
    /// The next issuer, or None when all sources are exhausted
    Ready(Option<Arc<PDVCertificate>>),
    /// Waiting on an asynchronous source
    Pending,
}

/// `CertIssuersIter` yields the issuers of `cert` in order: trust anchors with a matching subject,
/// then the results of each synchronous source in registration order, then the results of
/// asynchronous sources in arrival order. Candidates are de-duplicated by SHA-256 fingerprint.
pub(crate) struct CertIssuersIter {
    id: u64,
    cert: Arc<PDVCertificate>,
    issuers: ParsedCertificateList,
    cur_issuer: usize,
    present_issuers: BTreeSet<[u8; 32]>,
    did_initial_query: bool,
    did_async_query: bool,
    pending_async_results: usize,
    pending_async_requests: Vec<Option<Box<dyn IssuerRequest>>>,
}

impl CertIssuersIter {
    pub(crate) fn new(id: u64, cert: Arc<PDVCertificate>) -> CertIssuersIter {
        CertIssuersIter {
            id,
            cert,
            issuers: Vec::new(),
            cur_issuer: 0,
            present_issuers: BTreeSet::new(),
            did_initial_query: false,
            did_async_query: false,
            pending_async_results: 0,
            pending_async_requests: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn cert(&self) -> &Arc<PDVCertificate> {
        &self.cert
    }

    /// Returns the next issuer of `cert`. Asynchronous sources are only queried when `allow_async` is
    /// true and every synchronously available issuer has been returned.
    pub(crate) fn get_next_issuer(
        &mut self,
        allow_async: bool,
        trust_store: &TrustStore,
        sources: &[Rc<dyn CertIssuerSource>],
        notifier_target: &Weak<BuilderShared>,
    ) -> IssuerPoll {
        if !self.did_initial_query {
            self.did_initial_query = true;
            for anchor in trust_store.find_trust_anchors_by_normalized_name(&self.cert.normalized_issuer)
            {
                self.present_issuers.insert(anchor.fingerprint);
                self.issuers.push(anchor.clone());
            }
            for source in sources {
                let mut new_issuers = Vec::new();
                source.sync_get_issuers_of(&self.cert, &mut new_issuers);
                self.add_issuers(new_issuers);
            }
            debug!(
                "Found {} synchronous issuer candidate(s) for {}",
                self.issuers.len(),
                self.cert.subject_to_string()
            );
        }

        if let Some(issuer) = self.take_next_issuer() {
            return IssuerPoll::Ready(Some(issuer));
        }

        if self.did_async_query {
            if 0 == self.pending_async_results {
                return IssuerPoll::Ready(None);
            }
            return IssuerPoll::Pending;
        }

        if !allow_async {
            return IssuerPoll::Ready(None);
        }

        self.did_async_query = true;
        for (slot, source) in sources.iter().enumerate() {
            let notifier = IssuerNotifier::new(
                notifier_target.clone(),
                RequestKey {
                    iter_id: self.id,
                    slot,
                },
            );
            let request = source.async_get_issuers_of(&self.cert, notifier);
            if request.is_some() {
                self.pending_async_results += 1;
            }
            self.pending_async_requests.push(request);
        }

        // a source may have produced results while being queried
        if let Some(issuer) = self.take_next_issuer() {
            return IssuerPoll::Ready(Some(issuer));
        }
        if 0 == self.pending_async_results {
            IssuerPoll::Ready(None)
        } else {
            debug!(
                "Waiting on {} asynchronous issuer request(s) for {}",
                self.pending_async_results,
                self.cert.subject_to_string()
            );
            IssuerPoll::Pending
        }
    }

    /// Drains whatever is available from the request in `slot`. Requests that report `Done` are
    /// released. Notifications for released or unknown requests are ignored.
    pub(crate) fn got_async_certs(&mut self, slot: usize) {
        let mut new_issuers = Vec::new();
        let mut done = false;
        match self.pending_async_requests.get_mut(slot) {
            Some(Some(request)) => loop {
                match request.get_next() {
                    IssuerRequestStatus::Issuer(issuer) => new_issuers.push(issuer),
                    IssuerRequestStatus::Pending => break,
                    IssuerRequestStatus::Done => {
                        done = true;
                        break;
                    }
                }
            },
            _ => return,
        }

        if done {
            self.pending_async_requests[slot] = None;
            self.pending_async_results -= 1;
        }
        self.add_issuers(new_issuers);
    }

    fn take_next_issuer(&mut self) -> Option<Arc<PDVCertificate>> {
        let issuer = self.issuers.get(self.cur_issuer).cloned();
        if issuer.is_some() {
            self.cur_issuer += 1;
        }
        issuer
    }

    fn add_issuers(&mut self, new_issuers: ParsedCertificateList) {
        for issuer in new_issuers {
            if self.present_issuers.insert(issuer.fingerprint) {
                self.issuers.push(issuer);
            }
        }
    }
}
