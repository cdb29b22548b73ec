//! Error types

use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// `PathValidationStatus` classifies the outcome of validating one candidate certification path.
/// It is recorded, unmodified, in each [`ResultPath`](../path_results/struct.ResultPath.html)
/// produced by the path builder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum PathValidationStatus {
    /// No errors were encountered while validating certification path
    Valid,
    /// NameChainingFailure occurs when a path features certificates for which the subject
    /// name of a superior certificate does not match the issuer name of the immediately subordinate certificate.
    NameChainingFailure,
    /// SignatureVerificationFailure occurs when a path features certificates for which the subject
    /// public key of a superior certificate does not verify the signature of the immediately subordinate certificate.
    SignatureVerificationFailure,
    /// InvalidNotBeforeDate occurs when a path features a certificate that contains a notBefore
    /// date that is after the time of interest used for a certification path validation operation.
    InvalidNotBeforeDate,
    /// InvalidNotAfterDate occurs when a path features a certificate that contains a notAfter
    /// date that is before the time of interest used for a certification path validation operation.
    InvalidNotAfterDate,
    /// MissingBasicConstraints occurs when a path features an intermediate CA certificate that
    /// does not contain a basicConstraints extension.
    MissingBasicConstraints,
    /// InvalidBasicConstraints occurs when a path features an intermediate CA certificate that
    /// contains a basicConstraints extension with the cA field set to false, or a target that asserts
    /// a pathLenConstraint without asserting cA.
    InvalidBasicConstraints,
    /// InvalidPathLength occurs when a path has more certificates than allowed by a
    /// constraint asserted in an intermediate CA certificate present in the path.
    InvalidPathLength,
    /// InvalidKeyUsage occurs when an intermediate CA certificate lacks keyCertSign or when a
    /// target certificate that is not a CA asserts keyCertSign.
    InvalidKeyUsage,
    /// UnprocessedCriticalExtension occurs when a certificate features a critical extension that was not
    /// processed during certification path validation.
    UnprocessedCriticalExtension,
    /// ProhibitedAlg occurs when the signature policy rejects a signature algorithm.
    ProhibitedAlg,
    /// ProhibitedKeySize occurs when the signature policy rejects a public key (i.e., an RSA modulus
    /// that is too short or an unsupported elliptic curve).
    ProhibitedKeySize,
    /// EncodingError occurs when an object cannot be parsed (though this is more likely to manifest
    /// as an Asn1Error).
    EncodingError,
    /// MissingCertificate occurs when the certification path is missing a target certificate.
    MissingCertificate,
    /// NoPathsFound occurs when the certification path builder fails to find any candidate paths
    /// that reach a trust anchor.
    NoPathsFound,
}

/// Error type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// PathValidationError encountered
    PathValidation(PathValidationStatus),
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// An artifact could not be parsed
    ParseError,
    /// Asn1Error is used to propagate error information from the x509 crate.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    #[cfg(feature = "std")]
    StdIoError(std::io::ErrorKind),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<PathValidationStatus> for Error {
    fn from(status: PathValidationStatus) -> Error {
        Error::PathValidation(status)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl fmt::Display for PathValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationStatus::Valid => write!(f, "Valid"),
            PathValidationStatus::NameChainingFailure => write!(f, "Name chaining failure"),
            PathValidationStatus::SignatureVerificationFailure => {
                write!(f, "Signature verification failure")
            }
            PathValidationStatus::InvalidNotBeforeDate => write!(f, "InvalidNotBeforeDate"),
            PathValidationStatus::InvalidNotAfterDate => write!(f, "InvalidNotAfterDate"),
            PathValidationStatus::MissingBasicConstraints => write!(f, "MissingBasicConstraints"),
            PathValidationStatus::InvalidBasicConstraints => write!(f, "InvalidBasicConstraints"),
            PathValidationStatus::InvalidPathLength => write!(f, "InvalidPathLength"),
            PathValidationStatus::InvalidKeyUsage => write!(f, "InvalidKeyUsage"),
            PathValidationStatus::UnprocessedCriticalExtension => {
                write!(f, "UnprocessedCriticalExtension")
            }
            PathValidationStatus::ProhibitedAlg => write!(f, "ProhibitedAlg"),
            PathValidationStatus::ProhibitedKeySize => write!(f, "ProhibitedKeySize"),
            PathValidationStatus::EncodingError => write!(f, "EncodingError"),
            PathValidationStatus::MissingCertificate => write!(f, "MissingCertificate"),
            PathValidationStatus::NoPathsFound => {
                write!(f, "NoPathsFound (no path to a trust anchor)")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PathValidation(err) => write!(f, "PathValidationError: {}", err),
            Error::NotFound => write!(f, "NotFound"),
            Error::ParseError => write!(f, "ParseError"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            #[cfg(feature = "std")]
            Error::StdIoError(err) => write!(f, "StdError: {:?}", err),
        }
    }
}

#[test]
fn error_test() {
    use alloc::format;
    use alloc::string::ToString;

    assert_eq!("Valid", format!("{}", PathValidationStatus::Valid));
    let _s = format!("{}", PathValidationStatus::NameChainingFailure);
    let _s = format!("{}", PathValidationStatus::SignatureVerificationFailure);
    let _s = format!("{}", PathValidationStatus::InvalidNotBeforeDate);
    let _s = format!("{}", PathValidationStatus::InvalidNotAfterDate);
    let _s = format!("{}", PathValidationStatus::MissingBasicConstraints);
    let _s = format!("{}", PathValidationStatus::InvalidBasicConstraints);
    let _s = format!("{}", PathValidationStatus::InvalidPathLength);
    let _s = format!("{}", PathValidationStatus::InvalidKeyUsage);
    let _s = format!("{}", PathValidationStatus::UnprocessedCriticalExtension);
    let _s = format!("{}", PathValidationStatus::ProhibitedAlg);
    let _s = format!("{}", PathValidationStatus::ProhibitedKeySize);
    let _s = format!("{}", PathValidationStatus::EncodingError);
    let _s = format!("{}", PathValidationStatus::MissingCertificate);
    assert!(PathValidationStatus::NoPathsFound
        .to_string()
        .contains("trust anchor"));

    assert_eq!(
        Error::PathValidation(PathValidationStatus::ProhibitedAlg),
        Error::from(PathValidationStatus::ProhibitedAlg)
    );
    assert_eq!("NotFound", format!("{}", Error::NotFound));
    let _s = format!("{}", Error::ParseError);
}
