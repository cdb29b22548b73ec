//! Structures that record the candidate paths attempted by a certification path builder

use alloc::vec::Vec;

use log::info;

use crate::{
    util::error::PathValidationStatus,
    util::pdv_utilities::buffer_to_hex,
    validator::pdv_certificate::ParsedCertificateList,
};

/// `ResultPath` records one candidate path, ordered from the target to the trust anchor, along with
/// the status returned by the path validator.
#[derive(Clone, Debug)]
pub struct ResultPath {
    /// Candidate path, target first
    pub path: ParsedCertificateList,
    /// Status returned by the path validator, `Valid` on success
    pub error: PathValidationStatus,
}

impl ResultPath {
    /// Returns true if the path validated successfully.
    pub fn is_success(&self) -> bool {
        PathValidationStatus::Valid == self.error
    }
}

/// `CertPathBuilderResult` collects every candidate path attempted by a build, in the order attempted,
/// along with the index of the best one.
///
/// A successful path is always preferred over unsuccessful ones. No ordering is applied among
/// failures, so `best_result_index` remains 0 unless a successful path is recorded.
#[derive(Clone, Debug, Default)]
pub struct CertPathBuilderResult {
    /// Candidate paths in the order they were attempted
    pub paths: Vec<ResultPath>,
    /// Index into `paths` of the best result
    pub best_result_index: usize,
}

impl CertPathBuilderResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the best path validated successfully.
    pub fn is_success(&self) -> bool {
        match self.best_result() {
            Some(rp) => rp.is_success(),
            None => false,
        }
    }

    /// Returns the best path's status, or `NoPathsFound` when no candidate path reached a trust anchor.
    pub fn error(&self) -> PathValidationStatus {
        match self.best_result() {
            Some(rp) => rp.error,
            None => PathValidationStatus::NoPathsFound,
        }
    }

    /// Returns the best result, if any paths were attempted.
    pub fn best_result(&self) -> Option<&ResultPath> {
        self.paths.get(self.best_result_index)
    }

    pub(crate) fn add_result_path(&mut self, result_path: ResultPath) {
        if result_path.is_success() && !self.is_success() {
            self.best_result_index = self.paths.len();
        }
        self.paths.push(result_path);
    }

    /// Logs each attempted path at info level, marking the best one.
    pub fn log_paths(&self) {
        if self.paths.is_empty() {
            info!("No candidate paths were found: {}", self.error());
            return;
        }
        for (i, rp) in self.paths.iter().enumerate() {
            let best = if i == self.best_result_index {
                " (best)"
            } else {
                ""
            };
            info!("Path #{}{}: {}", i, best, rp.error);
            for (j, cert) in rp.path.iter().enumerate() {
                info!(
                    "    {}: {} - {}",
                    j,
                    buffer_to_hex(&cert.fingerprint),
                    cert.subject_to_string()
                );
            }
        }
    }
}

#[test]
fn empty_result_test() {
    let result = CertPathBuilderResult::new();
    assert!(!result.is_success());
    assert!(result.best_result().is_none());
    assert_eq!(PathValidationStatus::NoPathsFound, result.error());
    result.log_paths();
}

#[test]
fn best_result_test() {
    let mut result = CertPathBuilderResult::new();
    result.add_result_path(ResultPath {
        path: Vec::new(),
        error: PathValidationStatus::InvalidNotAfterDate,
    });
    result.add_result_path(ResultPath {
        path: Vec::new(),
        error: PathValidationStatus::SignatureVerificationFailure,
    });
    assert!(!result.is_success());
    assert_eq!(0, result.best_result_index);
    assert_eq!(PathValidationStatus::InvalidNotAfterDate, result.error());

    result.add_result_path(ResultPath {
        path: Vec::new(),
        error: PathValidationStatus::Valid,
    });
    assert!(result.is_success());
    assert_eq!(2, result.best_result_index);

    // a later success does not displace the first
    result.add_result_path(ResultPath {
        path: Vec::new(),
        error: PathValidationStatus::Valid,
    });
    assert_eq!(2, result.best_result_index);
    assert_eq!(PathValidationStatus::Valid, result.error());
}
