//! Documentation version grammar: decides whether a version may be published
//! and under which alias.
//!
//! ```text
//! <major>.<minor>.<micro>[dev<N> | pre<N>][+doc<N>][-<count>-g<hash>][-dirty]
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::VersionError;

const DOC_VERSION_PATTERN: &str = concat!(
    r"^(?P<release>\d+\.\d+\.\d+)",
    r"(?:dev(?P<weekly_release>\d+)|pre(?P<pre_release>\d+))?",
    r"(?:\+doc(?P<documentation_revision>\d+))?",
    r"(?:-(?P<commit_count>\d+)-g(?P<commit_hash>[0-9a-f]+))?",
    r"(?:-(?P<dirty>dirty))?$",
);

static PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DOC_VERSION_PATTERN).expect("doc version pattern compiles"));

/// A parsed documentation version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocVersion {
    pub release: String,
    pub weekly_release: Option<String>,
    pub pre_release: Option<String>,
    pub documentation_revision: Option<String>,
    pub commit_count: Option<String>,
    pub commit_hash: Option<String>,
    pub dirty: bool,
}

impl DocVersion {
    /// A final release: no weekly or pre marker, no commits since the tag, clean tree.
    pub fn is_release(&self) -> bool {
        self.commit_count.is_none()
            && self.pre_release.is_none()
            && self.weekly_release.is_none()
            && !self.dirty
    }

    /// A tagged weekly (`devN`) release.
    pub fn is_weekly_release(&self) -> bool {
        self.weekly_release.is_some()
            && self.commit_count.is_none()
            && self.pre_release.is_none()
            && !self.dirty
    }
}

pub fn parse_doc_version(version: &str) -> Result<DocVersion, VersionError> {
    let captures = PATTERN
        .captures(version)
        .ok_or_else(|| VersionError::UnparseableDocVersion(version.to_string()))?;
    let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());

    Ok(DocVersion {
        release: group("release").unwrap_or_default(),
        weekly_release: group("weekly_release"),
        pre_release: group("pre_release"),
        documentation_revision: group("documentation_revision"),
        commit_count: group("commit_count"),
        commit_hash: group("commit_hash"),
        dirty: captures.name("dirty").is_some(),
    })
}

/// The version the documentation for `version` is published as.
///
/// A documentation-only release (`1.2.3+doc1`) publishes over its base release;
/// every other version publishes as itself.
pub fn get_doc_version(version: &str) -> Result<String, VersionError> {
    let parsed = parse_doc_version(version)?;
    if parsed.is_release() && parsed.documentation_revision.is_some() {
        Ok(parsed.release)
    } else {
        Ok(version.to_string())
    }
}

/// `false` for anything that does not parse.
pub fn is_release(version: &str) -> bool {
    parse_doc_version(version).is_ok_and(|v| v.is_release())
}

/// `false` for anything that does not parse.
pub fn is_weekly_release(version: &str) -> bool {
    parse_doc_version(version).is_ok_and(|v| v.is_weekly_release())
}

/// Published alias a documentation version is routed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Devel,
    Latest,
}

impl Channel {
    pub fn for_doc_version(doc_version: &str) -> Self {
        if is_release(doc_version) {
            Channel::Latest
        } else {
            Channel::Devel
        }
    }

    /// Key prefix of the alias, as matched by the routing rule.
    pub fn routing_prefix(self) -> &'static str {
        match self {
            Channel::Devel => "en/devel/",
            Channel::Latest => "en/latest/",
        }
    }

    /// Path prefix of the alias, as served through the CDN.
    pub fn path_prefix(self) -> &'static str {
        match self {
            Channel::Devel => "/en/devel/",
            Channel::Latest => "/en/latest/",
        }
    }
}
