//! Version identifiers with an optional API group prefix
//!
//! A version is either short (`v1beta1`) or group-qualified
//! (`stable.example.com/v1beta1`).

/// Strip the `<group>/` prefix from a version, if any
pub fn trim_group(version: &str) -> &str {
    match version.find('/') {
        Some(idx) => &version[idx + 1..],
        None => version,
    }
}

/// Check if a version carries a group prefix
pub fn is_qualified(version: &str) -> bool {
    version.contains('/')
}

/// Check if two versions denote the same version
///
/// Versions match when:
/// - they are equal strings
/// - one is short, the other is qualified, and the qualified one without
///   its group equals the short one
///
/// Two qualified versions with different groups never match. The relation is
/// only defined pairwise: `a/v1` matches `v1` and `v1` matches `b/v1`, but
/// `a/v1` does not match `b/v1`.
pub fn versions_matched(v0: &str, v1: &str) -> bool {
    if v0 == v1 {
        return true;
    }
    match (v0.find('/'), v1.find('/')) {
        (None, Some(idx1)) => v0 == &v1[idx1 + 1..],
        (Some(idx0), None) => &v0[idx0 + 1..] == v1,
        _ => false,
    }
}
