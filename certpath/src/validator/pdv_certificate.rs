//! Certificate value type used throughout path building and validation

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_EXT_KEY_USAGE, ID_CE_ISSUER_ALT_NAME, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME,
    ID_CE_SUBJECT_KEY_IDENTIFIER, ID_PE_AUTHORITY_INFO_ACCESS,
};
use der::asn1::{BitString, ObjectIdentifier};
use der::{Decode, Encode};
use log::{debug, error};
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::pkix::*;
use x509_cert::Certificate;

use crate::{
    util::error::*, util::pdv_utilities::*, validator::pdv_extension::*,
};

/// [`Asn1Metadata`] is a typedef of a BTreeMap map that associates types represented by the [`Asn1MetadataTypes`]
/// enum objects with arbitrary string values. At present this is only used to convey a locator, i.e.,
/// a filename or URI, for troubleshooting purposes.
pub type Asn1Metadata = BTreeMap<String, Asn1MetadataTypes>;

/// [`MD_LOCATOR`] is used to set/get a String value to/from an [`Asn1Metadata`] object. The value
/// may represent a file name, URI or other locator for troubleshooting purposes.
pub static MD_LOCATOR: &str = "mdLocator";

/// Small assortment of types that can be saved as certificate metadata.
#[derive(PartialEq, Clone, Eq, Debug)]
pub enum Asn1MetadataTypes {
    /// Used for metadata represented as a bool
    Bool(bool),
    /// Used for metadata represented as a u32
    Number(u32),
    /// Used for metadata represented as a String
    String(String),
    /// Used for metadata represented as a `Vec<u8>`
    Buffer(Vec<u8>),
}

/// [`ParsedCertificateList`] is an ordered list of shared certificates. It is used for candidate
/// paths (target first) and for lists of candidate issuers.
pub type ParsedCertificateList = Vec<Arc<PDVCertificate>>;

/// [`PDVCertificate`] aggregates a binary, DER-encoded Certificate, the parsed Certificate, optional metadata
/// and parsed extensions in support of certification path building and validation operations.
///
/// Values consulted repeatedly while building paths (normalized names, the encoded
/// SubjectPublicKeyInfo, the raw SubjectAltName value and the SHA-256 fingerprint) are computed once
/// when the object is instantiated. Instances are immutable and are shared via `Arc`.
#[derive(Clone, Eq, PartialEq, Debug)]
#[readonly::make]
pub struct PDVCertificate {
    /// Binary, encoded Certificate object
    #[readonly]
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    #[readonly]
    pub decoded_cert: Certificate,
    /// Optional metadata about the certificate
    pub metadata: Option<Asn1Metadata>,
    /// Parsed extensions from the Certificate, see [`EXTS_OF_INTEREST`]
    #[readonly]
    pub parsed_extensions: ParsedExtensions,
    /// Normalized form of the subject name
    #[readonly]
    pub normalized_subject: String,
    /// Normalized form of the issuer name
    #[readonly]
    pub normalized_issuer: String,
    /// DER encoding of the SubjectPublicKeyInfo
    #[readonly]
    pub spki_der: Vec<u8>,
    /// Contents of the SubjectAltName extension's OCTET STRING, empty when the extension is absent
    #[readonly]
    pub san_value: Vec<u8>,
    /// SHA-256 hash of `encoded_cert`
    #[readonly]
    pub fingerprint: [u8; 32],
}

impl PDVCertificate {
    fn from_parts(
        encoded_cert: Vec<u8>,
        decoded_cert: Certificate,
        metadata: Option<Asn1Metadata>,
    ) -> Result<Self> {
        let tbs = &decoded_cert.tbs_certificate;
        let normalized_subject = normalize_name(&tbs.subject)?;
        let normalized_issuer = normalize_name(&tbs.issuer)?;
        let spki_der = tbs.subject_public_key_info.to_der()?;
        let san_value = match &tbs.extensions {
            Some(exts) => exts
                .iter()
                .find(|ext| ext.extn_id == ID_CE_SUBJECT_ALT_NAME)
                .map(|ext| ext.extn_value.as_bytes().to_vec())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let fingerprint: [u8; 32] = Sha256::digest(encoded_cert.as_slice()).into();

        let mut pdv_cert = PDVCertificate {
            encoded_cert,
            decoded_cert,
            metadata,
            parsed_extensions: ParsedExtensions::new(),
            normalized_subject,
            normalized_issuer,
            spki_der,
            san_value,
            fingerprint,
        };
        pdv_cert.parse_extensions(EXTS_OF_INTEREST);
        Ok(pdv_cert)
    }

    /// `subject_public_key_info` returns the SubjectPublicKeyInfo from the certificate.
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.decoded_cert.tbs_certificate.subject_public_key_info
    }

    /// `signature_algorithm` returns the signature algorithm from the outer Certificate structure.
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.decoded_cert.signature_algorithm
    }

    /// `is_self_issued` returns true if the subject and issuer names match after normalization.
    pub fn is_self_issued(&self) -> bool {
        self.normalized_subject == self.normalized_issuer
    }

    /// `locator` returns the locator saved as metadata, if any.
    pub fn locator(&self) -> Option<&str> {
        match &self.metadata {
            Some(md) => match md.get(MD_LOCATOR) {
                Some(Asn1MetadataTypes::String(s)) => Some(s.as_str()),
                _ => None,
            },
            None => None,
        }
    }

    /// `subject_to_string` returns an RFC 4514 string representation of the subject name.
    pub fn subject_to_string(&self) -> String {
        name_to_string(&self.decoded_cert.tbs_certificate.subject)
    }
}

impl TryFrom<&[u8]> for PDVCertificate {
    type Error = Error;

    fn try_from(enc_cert: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(enc_cert)?;
        PDVCertificate::from_parts(enc_cert.to_vec(), cert, None)
    }
}

impl TryFrom<Certificate> for PDVCertificate {
    type Error = Error;

    fn try_from(cert: Certificate) -> Result<Self> {
        let enc_cert = cert.to_der()?;
        PDVCertificate::from_parts(enc_cert, cert, None)
    }
}

impl ExtensionProcessing for PDVCertificate {
    /// `get_extension` takes an ObjectIdentifier that identifies an extension type and returns
    /// a previously parsed [`PDVExtension`] instance containing the decoded extension if the extension was present.
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&'_ PDVExtension>> {
        Ok(self.parsed_extensions.get(oid))
    }

    /// `parse_extensions` parses each of the listed extensions that are present in the certificate.
    /// Extensions that fail to parse are logged and omitted from the cache.
    fn parse_extensions(&'_ mut self, oids: &[ObjectIdentifier]) {
        for oid in oids {
            if let Err(e) = self.parse_extension(oid) {
                error!(
                    "Failed to parse extension {} from certificate with subject {}: {}",
                    oid,
                    self.subject_to_string(),
                    e
                );
            }
        }
    }

    /// `parse_extension` takes an ObjectIdentifier that identifies an extension type and returns
    /// a [`PDVExtension`] containing the decoded extension if the extension was present.
    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&PDVExtension>> {
        macro_rules! add_and_return {
            ($pe:ident, $v:ident, $t:ident) => {
                match $t::from_der($v) {
                    Ok(r) => {
                        let ext = PDVExtension::$t(r);
                        $pe.insert(*oid, ext);
                        return Ok($pe.get(oid));
                    }
                    Err(e) => {
                        return Err(Error::Asn1Error(e));
                    }
                }
            };
        }

        let pe = &mut self.parsed_extensions;
        if pe.contains_key(oid) {
            return Ok(pe.get(oid));
        }

        if let Some(exts) = self.decoded_cert.tbs_certificate.extensions.as_ref() {
            if let Some(i) = exts.iter().find(|&ext| ext.extn_id == *oid) {
                let v = i.extn_value.as_bytes();
                match *oid {
                    ID_CE_BASIC_CONSTRAINTS => {
                        add_and_return!(pe, v, BasicConstraints);
                    }
                    ID_CE_SUBJECT_KEY_IDENTIFIER => {
                        add_and_return!(pe, v, SubjectKeyIdentifier);
                    }
                    ID_CE_EXT_KEY_USAGE => {
                        add_and_return!(pe, v, ExtendedKeyUsage);
                    }
                    ID_PE_AUTHORITY_INFO_ACCESS => {
                        add_and_return!(pe, v, AuthorityInfoAccessSyntax);
                    }
                    ID_CE_KEY_USAGE => {
                        add_and_return!(pe, v, KeyUsage);
                    }
                    ID_CE_SUBJECT_ALT_NAME => {
                        add_and_return!(pe, v, SubjectAltName);
                    }
                    ID_CE_ISSUER_ALT_NAME => {
                        add_and_return!(pe, v, IssuerAltName);
                    }
                    ID_CE_CERTIFICATE_POLICIES => {
                        add_and_return!(pe, v, CertificatePolicies);
                    }
                    ID_CE_AUTHORITY_KEY_IDENTIFIER => {
                        add_and_return!(pe, v, AuthorityKeyIdentifier);
                    }
                    _ => {
                        // ignore unrecognized
                    }
                }
            }
        }
        Ok(None)
    }
}

/// [`DeferDecodeSigned`] used to parse only the top-level Certificate structure, without parsing the details of the
/// TBSCertificate, AlgorithmIdentifier or BIT STRING fields.
///
/// Deferred decoding avoids re-encoding the TBSCertificate when verifying signatures (and potentially
/// encountering problems with structures that were not DER-encoded prior to signing).
pub struct DeferDecodeSigned {
    /// tbsCertificate       TBSCertificate,
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_certificate = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_certificate.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

/// `parse_cert` takes a buffer containing a binary DER encoded certificate and returns
/// a [`PDVCertificate`] containing the parsed certificate if parsing was successful. The `locator`
/// is saved as [`MD_LOCATOR`] metadata.
pub fn parse_cert(buffer: &[u8], locator: &str) -> Result<PDVCertificate> {
    match Certificate::from_der(buffer) {
        Ok(cert) => {
            let mut md = Asn1Metadata::new();
            md.insert(
                MD_LOCATOR.to_string(),
                Asn1MetadataTypes::String(locator.to_string()),
            );
            let pdv_cert = PDVCertificate::from_parts(buffer.to_vec(), cert, Some(md))?;
            debug!(
                "Parsed certificate from {} with subject {}",
                locator,
                pdv_cert.subject_to_string()
            );
            Ok(pdv_cert)
        }
        Err(e) => {
            error!("Failed to parse certificate from {}: {}", locator, e);
            Err(Error::Asn1Error(e))
        }
    }
}

#[test]
fn parse_cert_garbage_test() {
    let r = parse_cert(&[0x30, 0x03, 0x02, 0x01, 0x01], "garbage.der");
    assert!(matches!(r, Err(Error::Asn1Error(_))));
    assert!(PDVCertificate::try_from([0x01u8, 0x02].as_slice()).is_err());
}
