//! Builders for the Drive `q` filter language.

use crate::models::FOLDER_MIME_TYPE;

/// A conjunction of `q` clauses, joined with ` and `.
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Vec<String>,
}

impl Query {
    /// An empty query matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to children of `parent_id`.
    #[must_use]
    pub fn in_parent(mut self, parent_id: &str) -> Self {
        self.clauses.push(format!("'{}' in parents", escape(parent_id)));
        self
    }

    /// Restrict to objects named exactly `name`.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.clauses.push(format!("name = '{}'", escape(name)));
        self
    }

    /// Restrict to folders.
    #[must_use]
    pub fn folders_only(mut self) -> Self {
        self.clauses
            .push(format!("mimeType = '{FOLDER_MIME_TYPE}'"));
        self
    }

    /// Append every clause of `other` to this query.
    #[must_use]
    pub fn and(mut self, other: Query) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Whether any clause has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render the final `q` string.
    #[must_use]
    pub fn build(&self) -> String {
        self.clauses.join(" and ")
    }
}

/// Escape a value for embedding in a single-quoted `q` literal.
///
/// Drive's query language takes backslash escapes for `'` and `\`.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
