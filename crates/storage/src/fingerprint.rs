//! Deterministic request fingerprints.

use sha2::{Digest, Sha256};

use naturalness_common::{BoundingBox, Index, TimeRange};

/// Hex digest identifying one imagery request.
///
/// Two requests with the same index, bounding box, time range and resolution
/// always produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex characters kept from the SHA-256 digest.
    const LEN: usize = 32;

    pub fn of(index: Index, bbox: &BoundingBox, time_range: &TimeRange, resolution: f64) -> Self {
        // f64 Display is the shortest exact round-trip form, so distinct
        // parameters never share a canonical string.
        let canonical = format!(
            "{}|{}|{}|{}|{}",
            index.as_str(),
            bbox.cache_key(),
            time_range.start_date,
            time_range.end_date,
            resolution
        );
        let digest = Sha256::digest(canonical.as_bytes());

        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex[..Self::LEN].to_string())
    }

    /// Wrap an already computed digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the raw provider response for this fingerprint.
    /// Format: {fingerprint}/response.tiff
    pub fn response_path(&self) -> String {
        format!("{}/response.tiff", self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
