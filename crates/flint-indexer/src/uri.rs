use std::collections::HashMap;

use flint_core::{file_uri_to_path, AbsPathBuf};

/// Memoized URI → path resolution.
///
/// Partitioning resolves the same handful of URIs once per symbol, reference,
/// and graph node, so each distinct URI is parsed exactly once per task.
/// Unresolvable URIs are logged on first sight and yield `None` thereafter.
#[derive(Debug, Default)]
pub(crate) struct UriMemo {
    cache: HashMap<String, Option<AbsPathBuf>>,
}

impl UriMemo {
    pub(crate) fn resolve(&mut self, uri: &str) -> Option<&AbsPathBuf> {
        if !self.cache.contains_key(uri) {
            let resolved = match file_uri_to_path(uri) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::error!(
                        target = "flint.indexer",
                        error = %err,
                        "skipping unresolvable file URI"
                    );
                    None
                }
            };
            self.cache.insert(uri.to_string(), resolved);
        }
        self.cache.get(uri).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn caches_hits_and_misses() {
        let mut memo = UriMemo::default();
        assert_eq!(
            memo.resolve("file:///p/a.cc").unwrap().as_path(),
            Path::new("/p/a.cc")
        );
        assert!(memo.resolve("not-a-uri").is_none());
        assert!(memo.resolve("not-a-uri").is_none());
        assert_eq!(memo.cache.len(), 2);
    }
}
