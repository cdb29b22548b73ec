//! The environment_traits module features trait definitions and type definitions that describe the
//! collaborators a [`CertPathBuilder`](../../builder/path_builder/struct.CertPathBuilder.html) relies
//! upon: sources of candidate issuer certificates and validators of candidate paths.

use alloc::boxed::Box;
use alloc::sync::Arc;

use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::{
    builder::path_builder::IssuerNotifier, util::error::*,
    validator::pdv_certificate::{PDVCertificate, ParsedCertificateList},
    validator::signature_policy::SignaturePolicy,
};

/// `CompletionStatus` is returned from [`CertPathBuilder::run`](../../builder/path_builder/struct.CertPathBuilder.html#method.run).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompletionStatus {
    /// The build finished before `run` returned and the result may be read immediately
    Sync,
    /// The build is waiting on an issuer source. The completion callback fires when it finishes.
    Async,
}

/// `CompletionCallback` is invoked exactly once when an asynchronous build finishes.
pub type CompletionCallback = Box<dyn FnOnce()>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform signature verification
/// over a message.
pub type VerifySignatureMessage = fn(
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `IssuerRequestStatus` is returned each time an [`IssuerRequest`] is polled.
#[derive(Clone, Debug)]
pub enum IssuerRequestStatus {
    /// Another candidate issuer
    Issuer(Arc<PDVCertificate>),
    /// No further results are available right now. The source calls [`IssuerNotifier::notify`] when more arrive.
    Pending,
    /// The request is exhausted
    Done,
}

/// The [`IssuerRequest`] trait represents an outstanding asynchronous query for the issuers of one
/// certificate. Dropping the request cancels it.
pub trait IssuerRequest {
    /// get_next returns the next available result.
    fn get_next(&mut self) -> IssuerRequestStatus;
}

/// The [`CertIssuerSource`] trait enables trait objects to supply candidate issuer certificates
/// backed via some means, i.e., an in-memory list, a disk cache or a network fetch.
pub trait CertIssuerSource {
    /// sync_get_issuers_of appends the issuers of `cert` that are immediately available to `issuers`.
    fn sync_get_issuers_of(&self, cert: &PDVCertificate, issuers: &mut ParsedCertificateList);

    /// async_get_issuers_of starts an asynchronous query for the issuers of `cert`. None is returned
    /// when the source has nothing to fetch. Otherwise the source calls `notifier.notify()`
    /// whenever new results can be read from the returned request.
    fn async_get_issuers_of(
        &self,
        _cert: &Arc<PDVCertificate>,
        _notifier: IssuerNotifier,
    ) -> Option<Box<dyn IssuerRequest>> {
        None
    }
}

/// The [`PathValidator`] trait defines the interface for implementations that validate one fully
/// assembled candidate path, ordered from the target to the trust anchor.
///
/// `PathValidationStatus::Valid` indicates success. Any other value is recorded unmodified as the
/// error for the candidate path.
pub trait PathValidator {
    /// validate evaluates `path` against `policy` at `time_of_interest`.
    fn validate(
        &self,
        path: &[Arc<PDVCertificate>],
        policy: &dyn SignaturePolicy,
        time_of_interest: u64,
    ) -> PathValidationStatus;
}
