//! Scope testing and URL path utilities
//!
//! The scope filter decides whether a candidate URL falls under one of the
//! configured scope roots. A root covers a candidate when scheme and host
//! match and the candidate path is the root path or a subpath of it. With
//! upgrades enabled, every `http://` root gains an `https://` shadow root so
//! in-scope redirects to TLS stay in scope.

use url::Url;

/// Predicate over the configured scope roots.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    allowed: Vec<Url>,
}

impl ScopeFilter {
    /// Builds the filter, inserting an `https://` shadow root for every
    /// `http://` root when `allow_upgrade` is set.
    pub fn new(scope: &[Url], allow_upgrade: bool) -> Self {
        let mut allowed: Vec<Url> = scope.to_vec();
        if allow_upgrade {
            for root in scope {
                if root.scheme() == "http" {
                    let mut shadow = root.clone();
                    // set_scheme only fails for cross-category changes
                    let _ = shadow.set_scheme("https");
                    allowed.push(shadow);
                }
            }
        }
        Self { allowed }
    }

    /// Returns true iff `target` is a subpath of any allowed root.
    pub fn contains(&self, target: &Url) -> bool {
        self.allowed.iter().any(|root| url_is_subpath(root, target))
    }
}

/// Returns true if `child` is `parent` or lives under `parent`'s path on the
/// same scheme and host. Identical paths count as subpaths of each other.
pub fn url_is_subpath(parent: &Url, child: &Url) -> bool {
    if child.scheme() != parent.scheme() {
        return false;
    }
    if child.host_str() != parent.host_str() || child.port_or_known_default() != parent.port_or_known_default() {
        return false;
    }
    if parent.path() == "/" {
        // Everything is in this path
        return true;
    }
    let p_path = clean_path(parent.path());
    let c_path = clean_path(child.path());
    if c_path.len() < p_path.len() {
        return false;
    }
    if c_path == p_path {
        return true;
    }
    if !c_path.starts_with(&p_path) {
        return false;
    }
    c_path.as_bytes()[p_path.len()] == b'/'
}

/// Lexically cleans an absolute path: collapses repeated slashes, resolves
/// `.` and `..` segments, and drops any trailing slash except for the root.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut cleaned = String::new();
    for segment in segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    cleaned
}

/// Returns true if the URL names a directory (empty path or trailing slash).
pub fn url_is_dir(url: &Url) -> bool {
    let path = url.path();
    path.is_empty() || path.ends_with('/')
}

/// Returns true if the final path segment carries a file extension.
pub fn url_has_extension(url: &Url) -> bool {
    let path = url.path();
    match (path.rfind('.'), path.rfind('/')) {
        (Some(dot), Some(slash)) => dot > slash,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Enumerates the ancestor directories of a URL's path, nearest the root
/// first, excluding the root itself. `/a/b/c/d.ext` yields `/a`, `/a/b`,
/// `/a/b/c`; a single-segment path yields nothing.
pub fn parent_paths(child: &Url) -> Vec<Url> {
    let trimmed = child.path().trim_end_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    let mut results = Vec::new();
    for i in 2..segments.len() {
        let mut parent = child.clone();
        parent.set_path(&segments[..i].join("/"));
        parent.set_query(None);
        parent.set_fragment(None);
        results.push(parent);
    }
    results
}

/// Deduplicates a list of strings, preserving first-seen order.
pub fn dedupe_strings(input: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(input.len());
    for value in input {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}
