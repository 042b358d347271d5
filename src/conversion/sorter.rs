//! Ordering of CRD versions by maturity
//!
//! Versions are ordered by major number first, then unstable before stable
//! (`v1alpha1 < v1beta1 < v1`). Group prefixes are ignored.

use std::cmp::Ordering;

use super::version::trim_group;

/// Split `v1beta2` into (`1`, `beta2`)
fn split_version(version: &str) -> (&str, &str) {
    let version = trim_group(version).trim_start_matches('v');
    let digits = version
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(version.len());
    version.split_at(digits)
}

/// Ordering predicate of [`sort_versions`]: true when `ver0` is less mature
/// than `ver1` and sorts before it
///
/// Majors and suffixes are compared as strings, not as numbers, so `v10`
/// sorts before `v2`.
pub fn is_greater_than(ver0: &str, ver1: &str) -> bool {
    let (major0, rest0) = split_version(ver0);
    let (major1, rest1) = split_version(ver1);

    if major0 != major1 {
        return major0 < major1;
    }
    match (rest0.is_empty(), rest1.is_empty()) {
        (true, true) => false,
        // Stable is greater than unstable.
        (true, false) => false,
        (false, true) => true,
        (false, false) => rest0 < rest1,
    }
}

/// Compare two versions by maturity
pub fn compare_versions(ver0: &str, ver1: &str) -> Ordering {
    if is_greater_than(ver0, ver1) {
        Ordering::Less
    } else if is_greater_than(ver1, ver0) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Sort versions from the least to the most mature
pub fn sort_versions<S: AsRef<str>>(versions: &mut [S]) {
    versions.sort_by(|a, b| compare_versions(a.as_ref(), b.as_ref()));
}
