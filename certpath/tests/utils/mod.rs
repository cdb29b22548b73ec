#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use certpath::*;
use const_oid::db::rfc5912::{ID_CE_BASIC_CONSTRAINTS, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME};
use der::asn1::{Any, BitString, Ia5String, ObjectIdentifier, OctetString, UtcTime};
use der::Encode;
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

/// Tue Nov 14 22:13:20 UTC 2023
pub const TOI: u64 = 1_700_000_000;
/// Wed Jan 01 00:00:00 UTC 2020
pub const NOT_BEFORE: u64 = 1_577_836_800;
/// Tue Jan 01 00:00:00 UTC 2030
pub const NOT_AFTER: u64 = 1_893_456_000;
/// Sat Jan 01 00:00:00 UTC 2022
pub const EXPIRED: u64 = 1_640_995_200;

/// Returns an EC SubjectPublicKeyInfo whose point is derived from `key_id`.
pub fn test_spki(key_id: u8, curve: ObjectIdentifier) -> SubjectPublicKeyInfoOwned {
    let mut point = vec![0x04];
    point.extend_from_slice(&[key_id; 64]);
    SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: PKIXALG_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&curve).unwrap()),
        },
        subject_public_key: BitString::from_bytes(&point).unwrap(),
    }
}

fn digest_signature(spki_der: &[u8], message: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(spki_der);
    hasher.update(message);
    hasher.finalize().to_vec()
}

/// "Signs" by hashing the signer's encoded public key with the message. Paired with `verify_by_key`.
pub fn sign_by_key(key_id: u8, curve: ObjectIdentifier, message: &[u8]) -> Vec<u8> {
    let spki_der = test_spki(key_id, curve).to_der().unwrap();
    digest_signature(&spki_der, message)
}

/// Implements [`VerifySignatureMessage`] for certificates produced by [`CertTemplate`].
pub fn verify_by_key(
    message: &[u8],
    signature: &[u8],
    _signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> certpath::Result<()> {
    let spki_der = spki.to_der()?;
    if digest_signature(&spki_der, message).as_slice() == signature {
        Ok(())
    } else {
        Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure,
        ))
    }
}

fn utc(secs: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

fn extension(oid: ObjectIdentifier, critical: bool, value: Vec<u8>) -> Extension {
    Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value).unwrap(),
    }
}

/// Describes a test certificate. Keys are identified by a small integer and every certificate is
/// signed by the key named by `issuer_key`.
#[derive(Clone, Debug)]
pub struct CertTemplate {
    pub subject: String,
    pub issuer: String,
    pub subject_key: u8,
    pub issuer_key: u8,
    pub serial: u8,
    pub ca: bool,
    pub basic_constraints: bool,
    pub path_len: Option<u8>,
    pub key_usage: Option<KeyUsages>,
    pub not_before: u64,
    pub not_after: u64,
    pub dns_name: Option<String>,
    pub unknown_critical_extension: bool,
    pub curve: ObjectIdentifier,
    pub issuer_curve: ObjectIdentifier,
    pub signature_alg: ObjectIdentifier,
}

impl CertTemplate {
    /// A CA certificate valid from 2020 through 2029
    pub fn ca(subject: &str, issuer: &str, subject_key: u8, issuer_key: u8) -> CertTemplate {
        CertTemplate {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            subject_key,
            issuer_key,
            serial: 1,
            ca: true,
            basic_constraints: true,
            path_len: None,
            key_usage: Some(KeyUsages::KeyCertSign),
            not_before: NOT_BEFORE,
            not_after: NOT_AFTER,
            dns_name: None,
            unknown_critical_extension: false,
            curve: PKIXALG_SECP256R1,
            issuer_curve: PKIXALG_SECP256R1,
            signature_alg: PKIXALG_ECDSA_WITH_SHA256,
        }
    }

    /// A self-signed CA certificate
    pub fn root(subject: &str, key: u8) -> CertTemplate {
        CertTemplate::ca(subject, subject, key, key)
    }

    /// An end entity certificate
    pub fn end_entity(subject: &str, issuer: &str, subject_key: u8, issuer_key: u8) -> CertTemplate {
        CertTemplate {
            ca: false,
            key_usage: Some(KeyUsages::DigitalSignature),
            ..CertTemplate::ca(subject, issuer, subject_key, issuer_key)
        }
    }

    pub fn serial(mut self, serial: u8) -> Self {
        self.serial = serial;
        self
    }

    pub fn validity(mut self, not_before: u64, not_after: u64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn expired(self) -> Self {
        let not_before = self.not_before;
        self.validity(not_before, EXPIRED)
    }

    pub fn path_len(mut self, path_len: u8) -> Self {
        self.path_len = Some(path_len);
        self
    }

    pub fn dns_name(mut self, dns_name: &str) -> Self {
        self.dns_name = Some(dns_name.to_string());
        self
    }

    pub fn build_cert(&self) -> Certificate {
        let mut exts = vec![];
        if self.basic_constraints {
            let bc = BasicConstraints {
                ca: self.ca,
                path_len_constraint: self.path_len,
            };
            exts.push(extension(ID_CE_BASIC_CONSTRAINTS, true, bc.to_der().unwrap()));
        }
        if let Some(ku) = self.key_usage {
            let ku = KeyUsage(ku.into());
            exts.push(extension(ID_CE_KEY_USAGE, true, ku.to_der().unwrap()));
        }
        if let Some(dns_name) = &self.dns_name {
            let san = SubjectAltName(vec![GeneralName::DnsName(
                Ia5String::new(dns_name).unwrap(),
            )]);
            exts.push(extension(ID_CE_SUBJECT_ALT_NAME, false, san.to_der().unwrap()));
        }
        if self.unknown_critical_extension {
            exts.push(extension(
                ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1"),
                true,
                vec![0x05, 0x00],
            ));
        }

        let signature_alg = AlgorithmIdentifierOwned {
            oid: self.signature_alg,
            parameters: None,
        };
        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[self.serial]).unwrap(),
            signature: signature_alg.clone(),
            issuer: Name::from_str(&self.issuer).unwrap(),
            validity: Validity {
                not_before: utc(self.not_before),
                not_after: utc(self.not_after),
            },
            subject: Name::from_str(&self.subject).unwrap(),
            subject_public_key_info: test_spki(self.subject_key, self.curve),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(exts),
        };
        let tbs_der = tbs_certificate.to_der().unwrap();
        let signature = sign_by_key(self.issuer_key, self.issuer_curve, &tbs_der);
        Certificate {
            tbs_certificate,
            signature_algorithm: signature_alg,
            signature: BitString::from_bytes(&signature).unwrap(),
        }
    }

    pub fn build(&self) -> Arc<PDVCertificate> {
        Arc::new(PDVCertificate::try_from(self.build_cert()).unwrap())
    }
}

/// Returns the fingerprints of a path, for comparing paths built from different certificate instances.
pub fn fingerprints(path: &[Arc<PDVCertificate>]) -> Vec<[u8; 32]> {
    path.iter().map(|c| c.fingerprint).collect()
}

/// Single threaded FIFO task queue standing in for an event loop
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue::default()
    }

    pub fn post(&self, task: Box<dyn FnOnce()>) {
        self.tasks.borrow_mut().push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Runs tasks, including tasks posted while running, until the queue is empty. Returns the number
    /// of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    count += 1;
                }
                None => return count,
            }
        }
    }
}

#[derive(Default)]
struct AsyncRequestState {
    results: VecDeque<Arc<PDVCertificate>>,
    done: bool,
}

struct AsyncRequest {
    state: Rc<RefCell<AsyncRequestState>>,
    live_requests: Rc<Cell<usize>>,
}

impl IssuerRequest for AsyncRequest {
    fn get_next(&mut self) -> IssuerRequestStatus {
        let mut state = self.state.borrow_mut();
        match state.results.pop_front() {
            Some(issuer) => IssuerRequestStatus::Issuer(issuer),
            None if state.done => IssuerRequestStatus::Done,
            None => IssuerRequestStatus::Pending,
        }
    }
}

impl Drop for AsyncRequest {
    fn drop(&mut self) {
        self.live_requests.set(self.live_requests.get() - 1);
    }
}

/// Issuer source that only answers asynchronously. Each query posts one task that releases all
/// matching issuers at once. When `notify_inline` is set the source instead notifies before
/// `async_get_issuers_of` returns.
pub struct AsyncCertSource {
    certs: CertSource,
    queue: TaskQueue,
    notify_inline: bool,
    pub queries: Rc<Cell<usize>>,
    pub live_requests: Rc<Cell<usize>>,
}

impl AsyncCertSource {
    pub fn new(queue: &TaskQueue) -> AsyncCertSource {
        AsyncCertSource {
            certs: CertSource::new(),
            queue: queue.clone(),
            notify_inline: false,
            queries: Rc::new(Cell::new(0)),
            live_requests: Rc::new(Cell::new(0)),
        }
    }

    pub fn new_inline() -> AsyncCertSource {
        AsyncCertSource {
            notify_inline: true,
            ..AsyncCertSource::new(&TaskQueue::new())
        }
    }

    pub fn add_cert(&mut self, cert: Arc<PDVCertificate>) {
        self.certs.add_cert(cert);
    }
}

impl CertIssuerSource for AsyncCertSource {
    fn sync_get_issuers_of(&self, _cert: &PDVCertificate, _issuers: &mut ParsedCertificateList) {}

    fn async_get_issuers_of(
        &self,
        cert: &Arc<PDVCertificate>,
        notifier: IssuerNotifier,
    ) -> Option<Box<dyn IssuerRequest>> {
        self.queries.set(self.queries.get() + 1);
        let matches = self
            .certs
            .get_certificates_for_name(&cert.normalized_issuer)
            .ok()?;

        let state = Rc::new(RefCell::new(AsyncRequestState::default()));
        self.live_requests.set(self.live_requests.get() + 1);
        let request = AsyncRequest {
            state: state.clone(),
            live_requests: self.live_requests.clone(),
        };

        let release = move || {
            {
                let mut state = state.borrow_mut();
                state.results.extend(matches);
                state.done = true;
            }
            notifier.notify();
        };
        if self.notify_inline {
            release();
        } else {
            self.queue.post(Box::new(release));
        }
        Some(Box::new(request))
    }
}

/// One query received by a [`ManualCertSource`]. The test decides when and in how many batches the
/// results are delivered.
pub struct ManualQuery {
    /// Normalized subject of the certificate whose issuers were requested
    pub subject: String,
    state: Rc<RefCell<AsyncRequestState>>,
    notifier: IssuerNotifier,
}

impl ManualQuery {
    /// Makes `issuers` readable from the request, marks it exhausted when `done` is set, then notifies.
    pub fn deliver(&self, issuers: &[&Arc<PDVCertificate>], done: bool) {
        {
            let mut state = self.state.borrow_mut();
            state
                .results
                .extend(issuers.iter().map(|issuer| (*issuer).clone()));
            state.done |= done;
        }
        self.notifier.notify();
    }

    /// Notifies without making anything new available.
    pub fn notify(&self) {
        self.notifier.notify();
    }
}

/// Asynchronous issuer source that answers every query with a request the test completes by hand
#[derive(Default)]
pub struct ManualCertSource {
    queries: RefCell<Vec<Rc<ManualQuery>>>,
    pub live_requests: Rc<Cell<usize>>,
}

impl ManualCertSource {
    pub fn new() -> ManualCertSource {
        ManualCertSource::default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }

    pub fn query(&self, index: usize) -> Rc<ManualQuery> {
        self.queries.borrow()[index].clone()
    }
}

impl CertIssuerSource for ManualCertSource {
    fn sync_get_issuers_of(&self, _cert: &PDVCertificate, _issuers: &mut ParsedCertificateList) {}

    fn async_get_issuers_of(
        &self,
        cert: &Arc<PDVCertificate>,
        notifier: IssuerNotifier,
    ) -> Option<Box<dyn IssuerRequest>> {
        let state = Rc::new(RefCell::new(AsyncRequestState::default()));
        self.queries.borrow_mut().push(Rc::new(ManualQuery {
            subject: cert.normalized_subject.clone(),
            state: state.clone(),
            notifier,
        }));
        self.live_requests.set(self.live_requests.get() + 1);
        Some(Box::new(AsyncRequest {
            state,
            live_requests: self.live_requests.clone(),
        }))
    }
}

/// Path validator that returns a fixed status and counts invocations
pub struct FixedStatusValidator {
    pub status: PathValidationStatus,
    pub calls: std::sync::atomic::AtomicUsize,
}

impl FixedStatusValidator {
    pub fn new(status: PathValidationStatus) -> FixedStatusValidator {
        FixedStatusValidator {
            status,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl PathValidator for FixedStatusValidator {
    fn validate(
        &self,
        path: &[Arc<PDVCertificate>],
        _policy: &dyn SignaturePolicy,
        _time_of_interest: u64,
    ) -> PathValidationStatus {
        assert!(!path.is_empty());
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.status
    }
}

pub fn basic_validator() -> Arc<BasicPathValidator> {
    Arc::new(BasicPathValidator::new(verify_by_key))
}

pub fn default_policy() -> Arc<SimpleSignaturePolicy> {
    Arc::new(SimpleSignaturePolicy::default())
}

pub fn trust_store_with(anchors: &[&Arc<PDVCertificate>]) -> Arc<TrustStore> {
    let mut trust_store = TrustStore::new();
    for anchor in anchors {
        trust_store.add_trusted_certificate((*anchor).clone());
    }
    Arc::new(trust_store)
}

pub fn cert_source_with(certs: &[&Arc<PDVCertificate>]) -> Rc<dyn CertIssuerSource> {
    let mut cert_source = CertSource::new();
    for cert in certs {
        cert_source.add_cert((*cert).clone());
    }
    Rc::new(cert_source)
}

/// Builds a path synchronously using the basic validator at [`TOI`].
pub fn build_sync(
    target: &Arc<PDVCertificate>,
    trust_store: Arc<TrustStore>,
    sources: Vec<Rc<dyn CertIssuerSource>>,
) -> CertPathBuilderResult {
    let builder = CertPathBuilder::new(
        target.clone(),
        trust_store,
        default_policy(),
        basic_validator(),
        TOI,
    );
    for source in sources {
        builder.add_cert_issuer_source(source);
    }
    assert_eq!(CompletionStatus::Sync, builder.run(None));
    builder.take_result()
}
