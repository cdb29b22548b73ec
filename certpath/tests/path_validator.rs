use std::sync::Arc;

use certpath::*;
use x509_cert::ext::pkix::KeyUsages;

mod utils;
use utils::*;

struct Chain {
    root: Arc<PDVCertificate>,
    ca: Arc<PDVCertificate>,
    target: Arc<PDVCertificate>,
}

impl Chain {
    fn new() -> Chain {
        Chain::with(
            CertTemplate::root("CN=Root", 1),
            CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
            CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
        )
    }

    fn with(root: CertTemplate, ca: CertTemplate, target: CertTemplate) -> Chain {
        Chain {
            root: root.build(),
            ca: ca.build(),
            target: target.build(),
        }
    }

    fn path(&self) -> ParsedCertificateList {
        vec![self.target.clone(), self.ca.clone(), self.root.clone()]
    }
}

fn validate(path: &[Arc<PDVCertificate>]) -> PathValidationStatus {
    BasicPathValidator::new(verify_by_key).validate(path, &SimpleSignaturePolicy::default(), TOI)
}

#[test]
fn valid_path() {
    let chain = Chain::new();
    let validator = BasicPathValidator::new(verify_by_key);
    assert!(validator
        .validate_path(&chain.path(), &SimpleSignaturePolicy::default(), TOI)
        .is_ok());
    assert_eq!(PathValidationStatus::Valid, validate(&chain.path()));
}

#[test]
fn anchor_only_path() {
    let chain = Chain::new();
    assert_eq!(PathValidationStatus::Valid, validate(&[chain.root]));
}

#[test]
fn empty_path() {
    assert_eq!(PathValidationStatus::MissingCertificate, validate(&[]));
}

#[test]
fn name_chaining_failure() {
    let chain = Chain::new();
    let path = vec![chain.target.clone(), chain.root.clone()];
    assert_eq!(PathValidationStatus::NameChainingFailure, validate(&path));
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::NameChainingFailure
        )),
        check_names(&path)
    );
}

#[test]
fn validity_checks() {
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1).validity(TOI + 1000, NOT_AFTER),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(
        PathValidationStatus::InvalidNotBeforeDate,
        validate(&chain.path())
    );

    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2).expired(),
    );
    assert_eq!(
        PathValidationStatus::InvalidNotAfterDate,
        validate(&chain.path())
    );

    // zero disables validity checks
    let validator = BasicPathValidator::new(verify_by_key);
    assert_eq!(
        PathValidationStatus::Valid,
        validator.validate(&chain.path(), &SimpleSignaturePolicy::default(), 0)
    );
}

#[test]
fn trust_anchor_validity() {
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1).expired(),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(
        PathValidationStatus::InvalidNotAfterDate,
        validate(&chain.path())
    );

    let mut validator = BasicPathValidator::new(verify_by_key);
    validator.enforce_trust_anchor_validity = false;
    assert_eq!(
        PathValidationStatus::Valid,
        validator.validate(&chain.path(), &SimpleSignaturePolicy::default(), TOI)
    );
}

#[test]
fn basic_constraints_checks() {
    let mut no_bc = CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1);
    no_bc.basic_constraints = false;
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        no_bc,
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(
        PathValidationStatus::MissingBasicConstraints,
        validate(&chain.path())
    );

    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::end_entity("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(
        PathValidationStatus::InvalidBasicConstraints,
        validate(&chain.path())
    );

    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2).path_len(0),
    );
    assert_eq!(
        PathValidationStatus::InvalidBasicConstraints,
        validate(&chain.path())
    );
}

#[test]
fn path_length_constraint() {
    let root = CertTemplate::root("CN=Root", 1).build();
    let ca1 = CertTemplate::ca("CN=CA1", "CN=Root", 2, 1).path_len(0).build();
    let ca2 = CertTemplate::ca("CN=CA2", "CN=CA1", 3, 2).build();
    let target = CertTemplate::end_entity("CN=Target", "CN=CA2", 4, 3).build();

    let path = vec![target.clone(), ca2.clone(), ca1.clone(), root.clone()];
    assert_eq!(PathValidationStatus::InvalidPathLength, validate(&path));

    // self-issued certificates do not count against the constraint
    let rekey = CertTemplate::ca("CN=CA1", "CN=CA1", 5, 2).build();
    let target = CertTemplate::end_entity("CN=Target", "CN=CA1", 4, 5).build();
    let path = vec![target, rekey, ca1, root];
    assert_eq!(PathValidationStatus::Valid, validate(&path));
}

#[test]
fn key_usage_checks() {
    let mut ca = CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1);
    ca.key_usage = Some(KeyUsages::DigitalSignature);
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        ca,
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(PathValidationStatus::InvalidKeyUsage, validate(&chain.path()));

    // absent key usage is acceptable
    let mut ca = CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1);
    ca.key_usage = None;
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        ca,
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(PathValidationStatus::Valid, validate(&chain.path()));

    let mut target = CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2);
    target.key_usage = Some(KeyUsages::KeyCertSign);
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        target,
    );
    assert_eq!(PathValidationStatus::InvalidKeyUsage, validate(&chain.path()));
}

#[test]
fn critical_extension_checks() {
    let mut ca = CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1);
    ca.unknown_critical_extension = true;
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        ca,
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(
        PathValidationStatus::UnprocessedCriticalExtension,
        validate(&chain.path())
    );

    // extensions in the trust anchor are not evaluated
    let mut root = CertTemplate::root("CN=Root", 1);
    root.unknown_critical_extension = true;
    let chain = Chain::with(
        root,
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2),
    );
    assert_eq!(PathValidationStatus::Valid, validate(&chain.path()));
}

#[test]
fn algorithm_and_key_size_constraints() {
    let mut target = CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2);
    target.signature_alg = PKIXALG_MD5_WITH_RSA_ENCRYPTION;
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        target,
    );
    assert_eq!(PathValidationStatus::ProhibitedAlg, validate(&chain.path()));

    let mut validator = BasicPathValidator::new(verify_by_key);
    validator.enforce_alg_and_key_size_constraints = false;
    assert_eq!(
        PathValidationStatus::Valid,
        validator.validate(&chain.path(), &SimpleSignaturePolicy::default(), TOI)
    );

    let mut ca = CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1);
    ca.curve = PKIXALG_SECP192R1;
    let mut target = CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 2);
    target.issuer_curve = PKIXALG_SECP192R1;
    let chain = Chain::with(CertTemplate::root("CN=Root", 1), ca, target);
    assert_eq!(
        PathValidationStatus::ProhibitedKeySize,
        validate(&chain.path())
    );
}

#[test]
fn signature_verification() {
    let chain = Chain::with(
        CertTemplate::root("CN=Root", 1),
        CertTemplate::ca("CN=Intermediate", "CN=Root", 2, 1),
        CertTemplate::end_entity("CN=Target", "CN=Intermediate", 3, 8),
    );
    assert_eq!(
        PathValidationStatus::SignatureVerificationFailure,
        validate(&chain.path())
    );
    assert!(verify_signatures(&chain.path()[1..], verify_by_key).is_ok());
}
