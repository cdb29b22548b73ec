//! The path_builder module provides [`CertPathBuilder`], which searches for a certification path from
//! a target certificate to a trust anchor and validates each candidate path as it is found.
//!
//! Candidate issuers are drawn from the [`TrustStore`] and from any number of registered
//! [`CertIssuerSource`] implementations. Sources that answer synchronously are always consulted.
//! Sources that answer asynchronously are consulted only when [`CertPathBuilder::run`] is given a
//! completion callback, and only after the synchronously available candidates for a certificate have
//! been tried. The build stops at the first path that validates successfully.
//!
//! ```
//! use std::sync::Arc;
//! use certpath::*;
//!
//! fn build(target: Arc<PDVCertificate>, trust_store: Arc<TrustStore>, verify: VerifySignatureMessage) {
//!     let builder = CertPathBuilder::new(
//!         target,
//!         trust_store,
//!         Arc::new(SimpleSignaturePolicy::default()),
//!         Arc::new(BasicPathValidator::new(verify)),
//!         1_700_000_000,
//!     );
//!     assert_eq!(CompletionStatus::Sync, builder.run(None));
//!     if !builder.result().is_success() {
//!         builder.result().log_paths();
//!     }
//! }
//! ```

use alloc::rc::{Rc, Weak};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;

use log::{debug, info};

use crate::{
    builder::cert_issuers_iter::RequestKey,
    builder::cert_path_iter::{CertPathIter, PathPoll},
    builder::path_results::{CertPathBuilderResult, ResultPath},
    environment::environment_traits::*,
    source::trust_store::TrustStore,
    util::error::PathValidationStatus,
    validator::path_settings::PathBuilderSettings,
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
    validator::signature_policy::SignaturePolicy,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum BuilderState {
    None,
    GetNextPath,
    GetNextPathComplete,
}

/// State shared between a [`CertPathBuilder`] and the [`IssuerNotifier`] handles it gives to
/// asynchronous issuer sources.
pub(crate) struct BuilderShared {
    engine: RefCell<BuilderEngine>,
    /// Notifications that arrived while the engine was busy
    deferred: RefCell<Vec<RequestKey>>,
}

impl BuilderShared {
    pub(crate) fn take_deferred(&self) -> Vec<RequestKey> {
        match self.deferred.try_borrow_mut() {
            Ok(mut deferred) => mem::take(&mut *deferred),
            Err(_) => Vec::new(),
        }
    }
}

/// `IssuerNotifier` is handed to [`CertIssuerSource::async_get_issuers_of`]. The source calls
/// [`IssuerNotifier::notify`] each time new results can be read from the request it returned.
///
/// A notifier holds only a weak reference to the builder. Notifying after the builder has been
/// dropped, or after the request was cancelled, does nothing.
#[derive(Clone)]
pub struct IssuerNotifier {
    shared: Weak<BuilderShared>,
    key: RequestKey,
}

impl IssuerNotifier {
    pub(crate) fn new(shared: Weak<BuilderShared>, key: RequestKey) -> IssuerNotifier {
        IssuerNotifier { shared, key }
    }

    /// `notify` tells the builder that results are available. If this completes an asynchronous build,
    /// the completion callback runs before `notify` returns. The callback may drop the builder.
    ///
    /// When called while the builder is itself executing (i.e., from within a call into the source),
    /// the notification is queued. Queued notifications are processed before the builder next waits
    /// and ahead of the next notification it receives.
    pub fn notify(&self) {
        let shared = match self.shared.upgrade() {
            Some(shared) => shared,
            None => return,
        };

        let callback = match shared.engine.try_borrow_mut() {
            Ok(mut engine) => engine.on_issuers_ready(self.key),
            Err(_) => {
                if let Ok(mut deferred) = shared.deferred.try_borrow_mut() {
                    deferred.push(self.key);
                }
                return;
            }
        };

        if let Some(callback) = callback {
            callback();
        }
    }
}

impl core::fmt::Debug for IssuerNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IssuerNotifier")
            .field("iter_id", &self.key.iter_id)
            .field("slot", &self.key.slot)
            .finish()
    }
}

struct BuilderEngine {
    cert_path_iter: CertPathIter,
    signature_policy: Arc<dyn SignaturePolicy + Send + Sync>,
    validator: Arc<dyn PathValidator + Send + Sync>,
    time_of_interest: u64,
    result: CertPathBuilderResult,
    next_path: ParsedCertificateList,
    next_state: BuilderState,
    callback: Option<CompletionCallback>,
    started: bool,
}

impl BuilderEngine {
    fn do_loop(&mut self, allow_async: bool) -> CompletionStatus {
        loop {
            let state = mem::replace(&mut self.next_state, BuilderState::None);
            match state {
                BuilderState::None => return CompletionStatus::Sync,
                BuilderState::GetNextPath => {
                    if CompletionStatus::Async == self.do_get_next_path(allow_async) {
                        return CompletionStatus::Async;
                    }
                }
                BuilderState::GetNextPathComplete => self.do_get_next_path_complete(),
            }
        }
    }

    fn do_get_next_path(&mut self, allow_async: bool) -> CompletionStatus {
        self.next_state = BuilderState::GetNextPathComplete;
        match self.cert_path_iter.get_next_path(allow_async) {
            PathPoll::Ready(path) => {
                self.next_path = path;
                CompletionStatus::Sync
            }
            PathPoll::Pending => CompletionStatus::Async,
        }
    }

    fn do_get_next_path_complete(&mut self) {
        if self.next_path.is_empty() {
            debug!("No more candidate paths");
            self.next_state = BuilderState::None;
            return;
        }

        let path = mem::take(&mut self.next_path);
        let status =
            self.validator
                .validate(&path, self.signature_policy.as_ref(), self.time_of_interest);
        debug!(
            "Candidate path of length {} validated with status: {}",
            path.len(),
            status
        );
        let done = PathValidationStatus::Valid == status;
        self.result.add_result_path(ResultPath {
            path,
            error: status,
        });

        self.next_state = if done {
            BuilderState::None
        } else {
            BuilderState::GetNextPath
        };
    }

    fn on_issuers_ready(&mut self, key: RequestKey) -> Option<CompletionCallback> {
        let path = self.cert_path_iter.handle_issuers_ready(key)?;
        self.next_path = path;
        match self.do_loop(true) {
            CompletionStatus::Sync => {
                info!(
                    "Asynchronous build finished after {} candidate path(s)",
                    self.result.paths.len()
                );
                self.callback.take()
            }
            CompletionStatus::Async => None,
        }
    }
}

/// `CertPathBuilder` finds and validates a certification path from a target certificate to a trust
/// anchor.
///
/// A builder is single use: register issuer sources, call [`run`](CertPathBuilder::run) once, then read
/// the [`result`](CertPathBuilder::result). Every candidate path attempted is recorded in the result,
/// in the order attempted. The builder and the sources registered with it are confined to one thread.
pub struct CertPathBuilder {
    shared: Rc<BuilderShared>,
}

impl CertPathBuilder {
    /// `new` creates a builder for `target` that will accept paths ending at an anchor in
    /// `trust_store` and judged valid by `validator` at `time_of_interest`, expressed as seconds since
    /// the Unix epoch.
    pub fn new(
        target: Arc<PDVCertificate>,
        trust_store: Arc<TrustStore>,
        signature_policy: Arc<dyn SignaturePolicy + Send + Sync>,
        validator: Arc<dyn PathValidator + Send + Sync>,
        time_of_interest: u64,
    ) -> CertPathBuilder {
        let shared = Rc::new_cyclic(|weak: &Weak<BuilderShared>| BuilderShared {
            engine: RefCell::new(BuilderEngine {
                cert_path_iter: CertPathIter::new(target, trust_store, weak.clone()),
                signature_policy,
                validator,
                time_of_interest,
                result: CertPathBuilderResult::default(),
                next_path: Vec::new(),
                next_state: BuilderState::None,
                callback: None,
                started: false,
            }),
            deferred: RefCell::new(Vec::new()),
        });
        CertPathBuilder { shared }
    }

    /// `from_settings` creates a builder using the time of interest and maximum path depth read from
    /// `settings`. The settings label, if any, is logged.
    pub fn from_settings(
        target: Arc<PDVCertificate>,
        trust_store: Arc<TrustStore>,
        signature_policy: Arc<dyn SignaturePolicy + Send + Sync>,
        validator: Arc<dyn PathValidator + Send + Sync>,
        settings: &PathBuilderSettings,
    ) -> CertPathBuilder {
        if let Some(label) = settings.get_settings_label() {
            info!(
                "Building path for {} using settings labeled {}",
                target.subject_to_string(),
                label
            );
        }
        let builder = CertPathBuilder::new(
            target,
            trust_store,
            signature_policy,
            validator,
            settings.get_time_of_interest(),
        );
        builder.set_max_path_depth(settings.get_max_path_depth() as usize);
        builder
    }

    /// `add_cert_issuer_source` registers a source of candidate issuers. Sources are consulted in
    /// registration order.
    ///
    /// # Panics
    ///
    /// Panics if called after [`run`](CertPathBuilder::run).
    pub fn add_cert_issuer_source(&self, source: Rc<dyn CertIssuerSource>) {
        let mut engine = self.shared.engine.borrow_mut();
        assert!(
            !engine.started,
            "issuer sources must be added before the build is run"
        );
        engine.cert_path_iter.add_cert_issuer_source(source);
    }

    /// `set_max_path_depth` limits the number of non-anchor certificates, target included, on any
    /// candidate path. Zero means no limit.
    pub fn set_max_path_depth(&self, max_depth: usize) {
        self.shared
            .engine
            .borrow_mut()
            .cert_path_iter
            .set_max_path_depth(max_depth);
    }

    /// `run` starts the build.
    ///
    /// Returns [`CompletionStatus::Sync`] when the build finished before returning, in which case
    /// `callback` is never invoked. Returns [`CompletionStatus::Async`] when the build is waiting on an
    /// asynchronous source. The callback is then invoked exactly once, from within
    /// [`IssuerNotifier::notify`], when the build finishes. Dropping the builder before then cancels
    /// the build and all outstanding requests, and the callback is never invoked.
    ///
    /// When `callback` is None asynchronous sources are not queried and the build always completes
    /// synchronously.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn run(&self, callback: Option<CompletionCallback>) -> CompletionStatus {
        let mut engine = self.shared.engine.borrow_mut();
        assert!(!engine.started, "a CertPathBuilder may only be run once");
        engine.started = true;
        engine.next_state = BuilderState::GetNextPath;

        let status = engine.do_loop(callback.is_some());
        if CompletionStatus::Async == status {
            engine.callback = callback;
        } else {
            info!(
                "Build finished after {} candidate path(s)",
                engine.result.paths.len()
            );
        }
        status
    }

    /// `result` returns a snapshot of the candidate paths attempted so far. Once the build has finished
    /// this is the final result. The snapshot does not borrow the builder, so holding it does not
    /// prevent an asynchronous build from making progress.
    pub fn result(&self) -> CertPathBuilderResult {
        self.shared.engine.borrow().result.clone()
    }

    /// `take_result` moves the result out of the builder, leaving an empty result behind.
    pub fn take_result(&self) -> CertPathBuilderResult {
        mem::take(&mut self.shared.engine.borrow_mut().result)
    }
}
