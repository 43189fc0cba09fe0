//! Request path resolution
//!
//! Maps a requested path to the manifest entries that may back it,
//! following the file shapes static export tooling produces for routes:
//! 1. The verbatim path
//! 2. `/index.html` for the root
//! 3. `<path>/index.html`
//! 4. `<path>.html`
//! 5. Hidden-index variants (`<path>/_index.html`, `<path>/_index/index.html`,
//!    `<dir>/_<name>.html`, `<dir>/_<name>/index.html`)
//!
//! A final segment containing a dot is treated as a concrete file and is
//! never expanded. This is a heuristic: an extension-less route whose name
//! contains a dot only resolves verbatim.

use crate::integrity::Integrity;
use crate::manifest::{normalize_path, Manifest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One static-routing fallback shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackRule {
    /// The path itself
    Exact,
    /// `/` → `/index.html`
    RootIndex,
    /// `<path>/index.html`
    DirIndex,
    /// `<path>.html`
    HtmlSuffix,
    /// `<path>/_index.html`
    HiddenIndex,
    /// `<path>/_index/index.html`
    HiddenIndexDir,
    /// `<dir>/_<name>.html`
    HiddenName,
    /// `<dir>/_<name>/index.html`
    HiddenNameDir,
}

impl FallbackRule {
    /// Default precedence
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::Exact,
            Self::RootIndex,
            Self::DirIndex,
            Self::HtmlSuffix,
            Self::HiddenIndex,
            Self::HiddenIndexDir,
            Self::HiddenName,
            Self::HiddenNameDir,
        ]
    }

    /// Rewrite a normalized path, or `None` when the rule does not apply
    pub fn apply(&self, path: &str) -> Option<String> {
        let is_root = path == "/";
        match self {
            Self::Exact => Some(path.to_string()),
            Self::RootIndex => is_root.then(|| "/index.html".to_string()),
            _ if is_root => None,
            Self::DirIndex => Some(format!("{}/index.html", path)),
            Self::HtmlSuffix => Some(format!("{}.html", path)),
            Self::HiddenIndex => Some(format!("{}/_index.html", path)),
            Self::HiddenIndexDir => Some(format!("{}/_index/index.html", path)),
            Self::HiddenName | Self::HiddenNameDir => {
                let (dir, name) = path.rsplit_once('/')?;
                if matches!(self, Self::HiddenName) {
                    Some(format!("{}/_{}.html", dir, name))
                } else {
                    Some(format!("{}/_{}/index.html", dir, name))
                }
            }
        }
    }
}

impl fmt::Display for FallbackRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::RootIndex => "root-index",
            Self::DirIndex => "dir-index",
            Self::HtmlSuffix => "html-suffix",
            Self::HiddenIndex => "hidden-index",
            Self::HiddenIndexDir => "hidden-index-dir",
            Self::HiddenName => "hidden-name",
            Self::HiddenNameDir => "hidden-name-dir",
        };
        write!(f, "{}", name)
    }
}

/// A manifest entry that may satisfy a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Manifest path to fetch
    pub path: String,
    /// Expected digest
    pub integrity: Integrity,
    /// Rule that produced this candidate
    pub rule: FallbackRule,
}

/// Whether the last segment looks like a concrete file (contains a dot)
pub fn is_file_shaped(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

/// Resolves request paths against a manifest
#[derive(Debug, Clone)]
pub struct Resolver {
    manifest: Arc<Manifest>,
    rules: Vec<FallbackRule>,
}

impl Resolver {
    /// Create a resolver; the verbatim rule always runs first
    pub fn new(manifest: Arc<Manifest>, rules: &[FallbackRule]) -> Self {
        let mut ordered = vec![FallbackRule::Exact];
        for rule in rules {
            if !ordered.contains(rule) {
                ordered.push(*rule);
            }
        }
        Self {
            manifest,
            rules: ordered,
        }
    }

    /// The manifest being resolved against
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Rules in precedence order
    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Every manifest-backed candidate for a path, in precedence order
    pub fn candidates(&self, path: &str) -> Vec<Candidate> {
        let Ok(path) = normalize_path(path) else {
            return Vec::new();
        };

        let rules: &[FallbackRule] = if is_file_shaped(&path) {
            &[FallbackRule::Exact]
        } else {
            &self.rules
        };

        let mut candidates: Vec<Candidate> = Vec::new();
        for rule in rules {
            let Some(rewritten) = rule.apply(&path) else {
                continue;
            };
            if candidates.iter().any(|c| c.path == rewritten) {
                continue;
            }
            if let Some(integrity) = self.manifest.get(&rewritten) {
                candidates.push(Candidate {
                    path: rewritten,
                    integrity: integrity.clone(),
                    rule: *rule,
                });
            }
        }
        candidates
    }

    /// The winning candidate for a path (first manifest hit)
    pub fn resolve(&self, path: &str) -> Option<Candidate> {
        self.candidates(path).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::DigestScheme;

    const DIGEST: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn resolver(paths: &[&str]) -> Resolver {
        let manifest =
            Manifest::from_pairs(paths.iter().map(|p| (*p, DIGEST)), DigestScheme::ContentHash)
                .unwrap();
        Resolver::new(Arc::new(manifest), &FallbackRule::defaults())
    }

    #[test]
    fn exact_match_wins() {
        let r = resolver(&["/about", "/about/index.html"]);
        let c = r.resolve("/about").unwrap();
        assert_eq!(c.path, "/about");
        assert_eq!(c.rule, FallbackRule::Exact);
    }

    #[test]
    fn fallback_precedence_for_directory() {
        let r = resolver(&["/about/_index.html", "/about.html", "/about/index.html"]);

        let paths: Vec<String> = r.candidates("/about/").into_iter().map(|c| c.path).collect();
        assert_eq!(
            paths,
            vec!["/about/index.html", "/about.html", "/about/_index.html"]
        );
        assert_eq!(r.resolve("/about/").unwrap().path, "/about/index.html");
    }

    #[test]
    fn html_suffix_before_hidden_index() {
        let r = resolver(&["/about/_index.html", "/about.html"]);
        assert_eq!(r.resolve("/about").unwrap().path, "/about.html");
    }

    #[test]
    fn root_resolves_to_index() {
        let r = resolver(&["/index.html"]);
        let c = r.resolve("/").unwrap();
        assert_eq!(c.path, "/index.html");
        assert_eq!(c.rule, FallbackRule::RootIndex);
    }

    #[test]
    fn root_does_not_use_path_rules() {
        // "/.html" or "//index.html" must never be produced for the root
        let r = resolver(&["/.html", "/_index.html"]);
        assert!(r.resolve("/").is_none());
    }

    #[test]
    fn hidden_variants() {
        let r = resolver(&["/blog/_post/index.html"]);
        assert_eq!(r.resolve("/blog/post").unwrap().rule, FallbackRule::HiddenNameDir);

        let r = resolver(&["/blog/_post.html"]);
        assert_eq!(r.resolve("/blog/post").unwrap().rule, FallbackRule::HiddenName);

        let r = resolver(&["/blog/post/_index/index.html"]);
        assert_eq!(r.resolve("/blog/post").unwrap().rule, FallbackRule::HiddenIndexDir);
    }

    #[test]
    fn dotted_segment_is_not_expanded() {
        let r = resolver(&["/app.js/index.html", "/app.js.html"]);
        assert!(r.resolve("/app.js").is_none());

        let r = resolver(&["/app.js"]);
        assert_eq!(r.resolve("/app.js").unwrap().path, "/app.js");
    }

    #[test]
    fn missing_path_resolves_to_nothing() {
        let r = resolver(&["/index.html"]);
        assert!(r.resolve("/missing").is_none());
        assert!(r.candidates("relative").is_empty());
    }

    #[test]
    fn custom_rules_keep_exact_first() {
        let manifest = Manifest::from_pairs(
            [("/docs", DIGEST), ("/docs.html", DIGEST)],
            DigestScheme::ContentHash,
        )
        .unwrap();
        let r = Resolver::new(
            Arc::new(manifest),
            &[FallbackRule::HtmlSuffix, FallbackRule::Exact],
        );

        assert_eq!(r.rules(), &[FallbackRule::Exact, FallbackRule::HtmlSuffix]);
        assert_eq!(r.resolve("/docs").unwrap().path, "/docs");
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let manifest =
            Manifest::from_pairs([("/about.html", DIGEST)], DigestScheme::ContentHash).unwrap();
        let r = Resolver::new(Arc::new(manifest), &[FallbackRule::DirIndex]);
        assert!(r.resolve("/about").is_none());
    }
}
