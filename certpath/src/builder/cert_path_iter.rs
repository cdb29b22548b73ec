//! Depth-first enumeration of candidate certification paths from a target certificate to a trust anchor

use alloc::collections::BTreeSet;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use log::debug;

use crate::{
    builder::cert_issuers_iter::{CertIssuersIter, IssuerPoll, RequestKey},
    builder::path_builder::BuilderShared,
    environment::environment_traits::CertIssuerSource,
    source::trust_store::TrustStore,
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
};

/// Result of asking a `CertPathIter` for its next path
pub(crate) enum PathPoll {
    /// The next path, target first and ending with a trust anchor. An empty list means every path
    /// has been returned.
    Ready(ParsedCertificateList),
    /// Waiting on an asynchronous source
    Pending,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum IterState {
    None,
    GetNextIssuer,
    GetNextIssuerComplete,
    ReturnAPath,
    Backtrack,
}

/// Subject, subjectAltName and SubjectPublicKeyInfo. Two certificates with the same key are treated
/// as the same node for loop detection.
type PathNodeKey = (String, Vec<u8>, Vec<u8>);

fn path_node_key(cert: &PDVCertificate) -> PathNodeKey {
    (
        cert.normalized_subject.clone(),
        cert.san_value.clone(),
        cert.spki_der.clone(),
    )
}

/// Stack of issuer iterators for the partial path currently being explored. The first entry holds the
/// target.
#[derive(Default)]
struct CertIssuerIterPath {
    iters: Vec<CertIssuersIter>,
    present_certs: BTreeSet<PathNodeKey>,
}

impl CertIssuerIterPath {
    fn is_present(&self, cert: &PDVCertificate) -> bool {
        self.present_certs.contains(&path_node_key(cert))
    }

    fn append(&mut self, iter: CertIssuersIter) {
        self.present_certs.insert(path_node_key(iter.cert()));
        self.iters.push(iter);
    }

    fn pop(&mut self) -> Option<CertIssuersIter> {
        let iter = self.iters.pop()?;
        self.present_certs.remove(&path_node_key(iter.cert()));
        Some(iter)
    }

    fn len(&self) -> usize {
        self.iters.len()
    }

    fn is_empty(&self) -> bool {
        self.iters.is_empty()
    }

    fn find_mut(&mut self, iter_id: u64) -> Option<&mut CertIssuersIter> {
        self.iters.iter_mut().find(|iter| iter.id() == iter_id)
    }

    fn copy_path(&self) -> ParsedCertificateList {
        self.iters.iter().map(|iter| iter.cert().clone()).collect()
    }
}

/// `CertPathIter` generates candidate paths by depth-first search over the issuers of each
/// certificate, returning one path each time `get_next_path` is called. Paths are not validated here.
pub(crate) struct CertPathIter {
    next_cert: Option<Arc<PDVCertificate>>,
    cur_path: CertIssuerIterPath,
    cert_issuer_sources: Vec<Rc<dyn CertIssuerSource>>,
    trust_store: Arc<TrustStore>,
    notifier_target: Weak<BuilderShared>,
    out_path: ParsedCertificateList,
    next_state: IterState,
    waiting_for_issuer: bool,
    allow_async: bool,
    next_iter_id: u64,
    max_depth: usize,
}

impl CertPathIter {
    pub(crate) fn new(
        target: Arc<PDVCertificate>,
        trust_store: Arc<TrustStore>,
        notifier_target: Weak<BuilderShared>,
    ) -> CertPathIter {
        CertPathIter {
            next_cert: Some(target),
            cur_path: CertIssuerIterPath::default(),
            cert_issuer_sources: Vec::new(),
            trust_store,
            notifier_target,
            out_path: Vec::new(),
            next_state: IterState::GetNextIssuerComplete,
            waiting_for_issuer: false,
            allow_async: false,
            next_iter_id: 0,
            max_depth: 0,
        }
    }

    pub(crate) fn add_cert_issuer_source(&mut self, source: Rc<dyn CertIssuerSource>) {
        self.cert_issuer_sources.push(source);
    }

    /// Limits the number of non-anchor certificates on a path. Zero means no limit.
    pub(crate) fn set_max_path_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Advances the search until the next path is found, every path has been returned or an
    /// asynchronous source must be waited on.
    pub(crate) fn get_next_path(&mut self, allow_async: bool) -> PathPoll {
        if IterState::None == self.next_state {
            return PathPoll::Ready(Vec::new());
        }
        self.allow_async = allow_async;
        self.out_path.clear();
        self.do_loop()
    }

    /// Delivers a notification from an asynchronous source. Returns the outcome of the resumed search
    /// when the iterator was waiting on an issuer and is no longer blocked.
    pub(crate) fn handle_issuers_ready(&mut self, key: RequestKey) -> Option<ParsedCertificateList> {
        for deferred in self.take_deferred() {
            self.deliver(deferred);
        }
        self.deliver(key);
        if !self.waiting_for_issuer {
            return None;
        }
        self.waiting_for_issuer = false;
        match self.do_loop() {
            PathPoll::Ready(path) => Some(path),
            PathPoll::Pending => None,
        }
    }

    fn do_loop(&mut self) -> PathPoll {
        loop {
            let state = mem::replace(&mut self.next_state, IterState::None);
            match state {
                IterState::None => return PathPoll::Ready(mem::take(&mut self.out_path)),
                IterState::GetNextIssuer => {
                    if let PathPoll::Pending = self.do_get_next_issuer() {
                        return PathPoll::Pending;
                    }
                }
                IterState::GetNextIssuerComplete => self.do_get_next_issuer_complete(),
                IterState::Backtrack => self.do_backtrack(),
                IterState::ReturnAPath => {
                    self.next_state = IterState::GetNextIssuer;
                    return PathPoll::Ready(mem::take(&mut self.out_path));
                }
            }
        }
    }

    fn do_get_next_issuer(&mut self) -> PathPoll {
        if self.cur_path.is_empty() {
            self.next_state = IterState::None;
            return PathPoll::Ready(Vec::new());
        }
        match self.poll_back_issuer() {
            IssuerPoll::Ready(next) => {
                self.next_cert = next;
                self.next_state = IterState::GetNextIssuerComplete;
                PathPoll::Ready(Vec::new())
            }
            IssuerPoll::Pending => {
                self.next_state = IterState::GetNextIssuer;
                self.waiting_for_issuer = true;
                PathPoll::Pending
            }
        }
    }

    /// Polls the last iterator on the current path. Notifications that arrived while the builder was
    /// busy are delivered before giving up and waiting.
    fn poll_back_issuer(&mut self) -> IssuerPoll {
        loop {
            let poll = match self.cur_path.iters.last_mut() {
                Some(back) => back.get_next_issuer(
                    self.allow_async,
                    &self.trust_store,
                    &self.cert_issuer_sources,
                    &self.notifier_target,
                ),
                None => return IssuerPoll::Ready(None),
            };
            if let IssuerPoll::Pending = poll {
                let deferred = self.take_deferred();
                if deferred.is_empty() {
                    return IssuerPoll::Pending;
                }
                for key in deferred {
                    self.deliver(key);
                }
                continue;
            }
            return poll;
        }
    }

    fn do_get_next_issuer_complete(&mut self) {
        let next_cert = match self.next_cert.take() {
            Some(next_cert) => next_cert,
            None => {
                self.next_state = IterState::Backtrack;
                return;
            }
        };

        if self.trust_store.is_trusted_certificate(&next_cert) {
            debug!(
                "Reached trust anchor {} at depth {}",
                next_cert.subject_to_string(),
                self.cur_path.len()
            );
            self.out_path = self.cur_path.copy_path();
            self.out_path.push(next_cert);
            self.next_state = IterState::ReturnAPath;
            return;
        }

        if self.cur_path.is_present(&next_cert) {
            debug!(
                "Skipping {} to avoid a loop",
                next_cert.subject_to_string()
            );
            self.next_state = IterState::GetNextIssuer;
            return;
        }

        if 0 < self.max_depth && self.cur_path.len() >= self.max_depth {
            debug!(
                "Skipping {} because the maximum path depth of {} has been reached",
                next_cert.subject_to_string(),
                self.max_depth
            );
            self.next_state = IterState::GetNextIssuer;
            return;
        }

        debug!(
            "Looking for issuers of {} at depth {}",
            next_cert.subject_to_string(),
            self.cur_path.len()
        );
        let iter = CertIssuersIter::new(self.next_iter_id, next_cert);
        self.next_iter_id += 1;
        self.cur_path.append(iter);
        self.next_state = IterState::GetNextIssuer;
    }

    fn do_backtrack(&mut self) {
        if let Some(iter) = self.cur_path.pop() {
            debug!("Exhausted issuers of {}", iter.cert().subject_to_string());
        }
        if self.cur_path.is_empty() {
            debug!("Finished enumerating candidate paths");
            self.next_state = IterState::None;
        } else {
            self.next_state = IterState::GetNextIssuer;
        }
    }

    fn deliver(&mut self, key: RequestKey) {
        if let Some(iter) = self.cur_path.find_mut(key.iter_id) {
            iter.got_async_certs(key.slot);
        }
    }

    fn take_deferred(&self) -> Vec<RequestKey> {
        match self.notifier_target.upgrade() {
            Some(shared) => shared.take_deferred(),
            None => Vec::new(),
        }
    }
}
