use std::fmt;

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures. Everything else in the pipeline degrades to a [`Diagnostic`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("missing package part: {0}")]
    PartMissing(String),

    #[error("XML parse error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },
}

/// Non-fatal conditions collected while parsing or applying.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Diagnostic {
    /// An optional part was absent; defaults were substituted.
    PartMissing { part: String },
    /// A style chain was cyclic or pointed at an unknown style.
    MalformedStyleChain { style_id: String, reason: String },
    /// A drawing referenced a relationship (or media part) that does not exist.
    UnresolvedMediaReference { rel_id: String },
    /// Profile and visual tree disagree on the paragraph count.
    ProfileTreeMismatch { profile: usize, tree: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PartMissing { part } => write!(f, "optional part {part} is absent"),
            Diagnostic::MalformedStyleChain { style_id, reason } => {
                write!(f, "style chain of {style_id} is malformed: {reason}")
            }
            Diagnostic::UnresolvedMediaReference { rel_id } => {
                write!(f, "media relationship {rel_id} does not resolve")
            }
            Diagnostic::ProfileTreeMismatch { profile, tree } => write!(
                f,
                "profile has {profile} paragraphs but the tree has {tree}"
            ),
        }
    }
}
