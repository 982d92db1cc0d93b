//! Package version normalization.
//!
//! Turns a source-control-derived version (`tag[-distance-shortid[-dirty]]`)
//! into a `version` and `release` pair following the Fedora naming guidelines
//! for pre-release packages:
//! <http://fedoraproject.org/wiki/Packaging:NamingGuidelines#Pre-Release_packages>

use std::fmt;

use serde::Serialize;

use crate::error::VersionError;

/// Packaging version: a `version` and a dot separated `release` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageVersion {
    pub version: String,
    pub release: String,
}

impl PackageVersion {
    pub fn new(version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            release: release.into(),
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.release)
    }
}

/// Tag markers for non-final builds, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixKind {
    Pre,
    Dev,
}

impl SuffixKind {
    pub const ALL: [SuffixKind; 2] = [SuffixKind::Pre, SuffixKind::Dev];

    pub fn as_str(self) -> &'static str {
        match self {
            SuffixKind::Pre => "pre",
            SuffixKind::Dev => "dev",
        }
    }
}

/// A tag split into its base version and an optional pre/dev marker.
#[derive(Debug, PartialEq, Eq)]
struct Tag<'a> {
    base: &'a str,
    suffix: Option<(SuffixKind, &'a str)>,
}

/// Split `tag` at the last occurrence of the first marker that appears in it.
///
/// `pre` always wins over `dev`, even when `dev` occurs later in the tag.
fn split_tag(tag: &str) -> Tag<'_> {
    SuffixKind::ALL
        .iter()
        .find_map(|&kind| {
            tag.rsplit_once(kind.as_str()).map(|(base, number)| Tag {
                base,
                suffix: Some((kind, number)),
            })
        })
        .unwrap_or(Tag {
            base: tag,
            suffix: None,
        })
}

fn malformed(input: &str, reason: &str) -> VersionError {
    VersionError::Malformed {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a versioneer style version into a [`PackageVersion`].
///
/// - `0.1.2` becomes `0.1.2` / `1`
/// - `0.1.2pre2` becomes `0.1.2` / `0.pre.2`
/// - `0.1.2-69-gd2ff20c-dirty` becomes `0.1.2` / `1.69.gd2ff20c.dirty`
///
/// A distance, short commit id and `dirty` flag are appended to the release
/// as-is. Such versions are untagged builds; callers deciding whether
/// something is releasable must check for them separately.
pub fn make_package_version(source_version: &str) -> Result<PackageVersion, VersionError> {
    if source_version.is_empty() {
        return Err(malformed(source_version, "empty version"));
    }

    let mut fields = source_version.split('-');
    let tag = fields.next().unwrap_or_default();
    let remainder: Vec<&str> = fields.collect();

    if tag.is_empty() {
        return Err(malformed(source_version, "missing tag"));
    }
    if remainder.iter().any(|field| field.is_empty()) {
        return Err(malformed(source_version, "empty field after tag"));
    }

    let Tag { base, suffix } = split_tag(tag);
    if base.is_empty() {
        return Err(malformed(source_version, "missing version before suffix"));
    }

    let mut release: Vec<&str> = match suffix {
        Some((kind, number)) => {
            if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidSuffixNumber {
                    suffix: kind.as_str().to_string(),
                    number: number.to_string(),
                    input: source_version.to_string(),
                });
            }
            vec!["0", kind.as_str(), number]
        }
        None => vec!["1"],
    };
    release.extend(remainder);

    Ok(PackageVersion::new(base, release.join(".")))
}
