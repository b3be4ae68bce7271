//! Architectum error codes
//!
//! Error codes follow the pattern: ARC-{CATEGORY}-{3-digit number}
//!
//! Categories:
//! - REF: relationship endpoint references a node that does not exist
//! - NF: requested node, mirror entry, relationship or blueprint is absent
//! - IO: file access, permissions, persistence
//! - PARSE: parser failure or timeout for a single file
//! - VAL: malformed input to a single call
//! - CON: graph store, mirror store and ledger disagree
//!
//! Each error code is stable and should not be reused.

/// Relationship endpoint missing from the graph
pub const ARC_REF_001_DANGLING_ENDPOINT: &str = "ARC-REF-001";

/// Entity not found
pub const ARC_NF_001_NOT_FOUND: &str = "ARC-NF-001";

/// File could not be read or written
pub const ARC_IO_001_ACCESS: &str = "ARC-IO-001";

/// Parser rejected the file or timed out
pub const ARC_PARSE_001_PARSE_FAILED: &str = "ARC-PARSE-001";

/// Invalid input
pub const ARC_VAL_001_INVALID_INPUT: &str = "ARC-VAL-001";

/// Stores out of sync
pub const ARC_CON_001_STORES_DIVERGED: &str = "ARC-CON-001";

/// Error code documentation
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | ARC-REF-001 | Relationship endpoint missing | Add both nodes before the relationship |
/// | ARC-NF-001 | Entity not found | Check the id/path; run `architectum sync` |
/// | ARC-IO-001 | File access failed | Check file path and permissions |
/// | ARC-PARSE-001 | Parse failed | Fix the source file or raise the parse timeout |
/// | ARC-VAL-001 | Invalid input | Check arguments (detail level, selection, paths) |
/// | ARC-CON-001 | Stores diverged | Re-sync the file with `--force` |
pub fn describe(code: &str) -> Option<&'static str> {
    match code {
        ARC_REF_001_DANGLING_ENDPOINT => Some("relationship endpoint missing"),
        ARC_NF_001_NOT_FOUND => Some("entity not found"),
        ARC_IO_001_ACCESS => Some("file access failed"),
        ARC_PARSE_001_PARSE_FAILED => Some("parse failed"),
        ARC_VAL_001_INVALID_INPUT => Some("invalid input"),
        ARC_CON_001_STORES_DIVERGED => Some("stores diverged"),
        _ => None,
    }
}
