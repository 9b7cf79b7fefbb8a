//! Resolution of `/`-separated Drive paths to object ids.
//!
//! Drive has no path lookup endpoint; the resolver walks the parent-child
//! graph one component at a time with filtered list calls. Sibling folders
//! may share a name, so each level is a depth-first search over every match,
//! returning the first branch that resolves all remaining components.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::client::DriveClient;
use crate::error::DriveError;
use crate::http_client::HttpClient;
use crate::models::ROOT_ID;
use crate::query::Query;

/// Split a path into lookup components.
///
/// Normalizes first: `.` components and empty components (duplicate or
/// trailing slashes) are dropped, `..` pops the previous component. The
/// empty path and `/` both yield no components.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other.to_owned()),
        }
    }
    parts
}

impl<C: HttpClient> DriveClient<C> {
    /// Resolve `path` to an object id, or `None` when nothing matches.
    ///
    /// `leaf_query` is applied to the terminal component only; every
    /// intermediate component is implicitly restricted to folders. The
    /// empty or root path resolves to the literal [`ROOT_ID`] alias.
    pub async fn find_file(
        &self,
        path: &str,
        leaf_query: Query,
    ) -> Result<Option<String>, DriveError> {
        let parts = split_path(path);
        if parts.is_empty() {
            return Ok(Some(ROOT_ID.to_owned()));
        }
        debug!(path, depth = parts.len(), "resolving path");
        self.resolve_under(ROOT_ID, &parts, &leaf_query).await
    }

    /// Recursion is boxed: each level awaits the levels below it.
    fn resolve_under<'a>(
        &'a self,
        parent_id: &'a str,
        parts: &'a [String],
        leaf_query: &'a Query,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriveError>> + Send + 'a>> {
        Box::pin(async move {
            let name = &parts[0];
            let is_leaf = parts.len() == 1;
            let mut query = Query::new().in_parent(parent_id).named(name);
            if is_leaf {
                query = query.and(leaf_query.clone());
            } else {
                query = query.folders_only();
            }

            let mut stream = self.list(query);
            while let Some(file) = stream.next().await? {
                if is_leaf {
                    // First match wins; remaining pages are abandoned.
                    return Ok(Some(file.id));
                }
                match self.resolve_under(&file.id, &parts[1..], leaf_query).await {
                    Ok(Some(id)) => return Ok(Some(id)),
                    Ok(None) => {
                        // Same-name sibling with no downstream match; keep
                        // searching the remaining candidates.
                    }
                    Err(err) => {
                        warn!(name = %name, candidate = %file.id, %err,
                            "descent failed, trying next candidate");
                    }
                }
            }
            Ok(None)
        })
    }
}
