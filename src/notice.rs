//! Side-channel messages produced while resolving a recipe.
//!
//! Notices never change the resolved configuration; they are what a user
//! should read (deprecated flag names, ignored options, post-install
//! instructions).

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// A deprecated option name was replaced by its canonical name.
    Deprecated { alias: String, canonical: String },
    /// An option or platform combination worth warning about.
    Advisory(String),
    /// Post-install instructions (service loading, manual config edits).
    Caveat(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Deprecated { alias, canonical } => {
                write!(f, "--with-{} is deprecated, use --with-{}", alias, canonical)
            }
            Notice::Advisory(msg) | Notice::Caveat(msg) => write!(f, "{}", msg),
        }
    }
}

/// Receives notices as the pipeline runs.
pub trait NoticeSink {
    fn notice(&mut self, notice: Notice);
}

impl NoticeSink for Vec<Notice> {
    fn notice(&mut self, notice: Notice) {
        self.push(notice);
    }
}

/// Prints notices to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotices;

impl NoticeSink for ConsoleNotices {
    fn notice(&mut self, notice: Notice) {
        match &notice {
            Notice::Deprecated { .. } | Notice::Advisory(_) => {
                crate::output::warning(&notice.to_string())
            }
            Notice::Caveat(text) => crate::output::caveat(text),
        }
    }
}
