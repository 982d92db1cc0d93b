//! Error types shared by the version parsers and the publish pipeline.

use std::fmt;

use crate::contract::CollaboratorError;

/// Errors raised while parsing version strings.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// The input does not follow `tag[-distance-shortid[-dirty]]`.
    #[error("malformed version {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    /// A `pre` or `dev` marker was followed by something other than digits.
    #[error("Non-integer value {number:?} for {suffix:?}. Supplied version {input}")]
    InvalidSuffixNumber {
        suffix: String,
        number: String,
        input: String,
    },

    /// The input does not match the documentation version grammar.
    #[error("unparseable documentation version {0:?}")]
    UnparseableDocVersion(String),
}

/// The individual effects issued while publishing, used to tag collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ListSource,
    ListDestination,
    DeleteStale,
    Copy,
    UpdateRoutingRule,
    ListOldPrefix,
    Invalidate,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ListSource => "list source keys",
            Step::ListDestination => "list destination keys",
            Step::DeleteStale => "delete stale keys",
            Step::Copy => "copy keys",
            Step::UpdateRoutingRule => "update routing rule",
            Step::ListOldPrefix => "list keys under old routing prefix",
            Step::Invalidate => "create cdn invalidation",
        };
        f.write_str(name)
    }
}

/// Errors raised by the publish pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The doc version is neither a final nor a weekly release.
    #[error("Can't publish non-release.")]
    NotAPublishableVersion(String),

    /// A collaborator call failed; the remaining steps were not issued.
    #[error("{step} failed: {source}")]
    Collaborator {
        step: Step,
        #[source]
        source: CollaboratorError,
    },
}

impl PublishError {
    pub(crate) fn collaborator(step: Step, source: CollaboratorError) -> Self {
        PublishError::Collaborator { step, source }
    }
}

pub type PublishResult<T> = Result<T, PublishError>;
