//! Wrappers around the certificate extensions consulted while building and validating paths

use alloc::collections::BTreeMap;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_EXT_KEY_USAGE, ID_CE_ISSUER_ALT_NAME, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME,
    ID_CE_SUBJECT_KEY_IDENTIFIER, ID_PE_AUTHORITY_INFO_ACCESS,
};
use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::*;

use crate::util::error::*;

/// `EXTS_OF_INTEREST` lists the extensions that are parsed and cached when a
/// [`PDVCertificate`](../pdv_certificate/struct.PDVCertificate.html) is instantiated.
pub const EXTS_OF_INTEREST: &[ObjectIdentifier] = &[
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_KEY_USAGE,
    ID_CE_EXT_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_ISSUER_ALT_NAME,
    ID_CE_SUBJECT_KEY_IDENTIFIER,
    ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ID_CE_CERTIFICATE_POLICIES,
    ID_PE_AUTHORITY_INFO_ACCESS,
];

/// `PROCESSED_CRITICAL_EXTENSIONS` lists the extensions that the basic path validator processes when
/// they are marked critical. Any other critical extension causes validation to fail.
pub const PROCESSED_CRITICAL_EXTENSIONS: &[ObjectIdentifier] = &[
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_KEY_USAGE,
    ID_CE_EXT_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_ISSUER_ALT_NAME,
    ID_CE_SUBJECT_KEY_IDENTIFIER,
    ID_CE_AUTHORITY_KEY_IDENTIFIER,
];

/// The [`ExtensionProcessing`] trait provides a common means of extracting extensions from objects that
/// feature extensions and that retain copies of the decoded extension structures, like `PDVCertificate`.
///
/// The decoded extensions are cached and accessed via the get_extension function.
pub trait ExtensionProcessing {
    /// `get_extension` takes an ObjectIdentifier that identifies an extension type and returns
    /// a previously parsed PDVExtension instance containing the decoded extension if the extension was present.
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>>;

    /// `parse_extension` takes an ObjectIdentifier that identifies an extension type and returns
    /// a `PDVExtension` containing the decoded extension if the extension was present.
    fn parse_extension(&'_ mut self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>>;

    /// `parse_extensions` parses and caches each of the listed extensions that are present.
    fn parse_extensions(&'_ mut self, oids: &[ObjectIdentifier]);
}

/// [`ParsedExtensions`] is a typedef of a BTreeMap map that associates [`PDVExtension`] objects with object
/// identifier values. This is used to avoid parsing extensions repeatedly when validating candidate paths.
pub type ParsedExtensions = BTreeMap<ObjectIdentifier, PDVExtension>;

/// [`PDVExtension`] provides a wrapper for supported extension types.
#[derive(PartialEq, Clone, Eq, Debug)]
pub enum PDVExtension {
    /// Parsed BasicConstraints extension
    BasicConstraints(BasicConstraints),
    /// Parsed SubjectKeyIdentifier extension
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    /// Parsed ExtendedKeyUsage extension
    ExtendedKeyUsage(ExtendedKeyUsage),
    /// Parsed AuthorityInfoAccessSyntax extension
    AuthorityInfoAccessSyntax(AuthorityInfoAccessSyntax),
    /// Parsed KeyUsage extension
    KeyUsage(KeyUsage),
    /// Parsed SubjectAltName extension
    SubjectAltName(SubjectAltName),
    /// Parsed IssuerAltName extension
    IssuerAltName(IssuerAltName),
    /// Parsed CertificatePolicies extension
    CertificatePolicies(CertificatePolicies),
    /// Parsed AuthorityKeyIdentifier extension
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
}
