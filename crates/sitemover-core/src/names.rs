//! Sink-safe naming.
//!
//! # Design
//! - `sanitize` is deterministic: the same policy, kind, and title always yield the same name.
//! - `NameRegistry` owns the per-traversal naming state: names already claimed under each
//!   destination container and the folder renames recorded so far.
//! - A rename whose target would still introduce nested containers is abandoned and the
//!   original name is kept.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::descriptor::ContentKind;
use crate::sink::SinkHandle;

const PATH_SEPARATOR: char = '/';
const LINK_SUFFIX: &str = ".html";
const FALLBACK_NAME: &str = "untitled";

/// Naming rules imposed by a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePolicy {
    /// Maximum name length in characters.
    pub max_len: usize,
    /// Characters the destination refuses inside a single name.
    pub illegal: &'static [char],
    /// Replacement for illegal and control characters.
    pub replacement: char,
}

impl NamePolicy {
    /// Archive entries: portable across common extractors.
    pub const ARCHIVE: Self = Self {
        max_len: 255,
        illegal: &['/', '\\', ':', '*', '?', '"', '<', '>', '|'],
        replacement: '_',
    };

    /// Remote store: separators are rejected, everything else is allowed.
    pub const REMOTE_STORE: Self = Self {
        max_len: 255,
        illegal: &['/', '\\'],
        replacement: '_',
    };

    fn is_illegal(&self, ch: char) -> bool {
        ch.is_control() || self.illegal.contains(&ch)
    }
}

/// Map a title to a destination-safe name.
///
/// Illegal characters are replaced, surrounding whitespace is trimmed, links gain an `.html`
/// suffix, and the result is truncated to the policy limit while keeping any extension.
#[must_use]
pub fn sanitize(policy: &NamePolicy, kind: ContentKind, title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|ch| {
            if policy.is_illegal(ch) {
                policy.replacement
            } else {
                ch
            }
        })
        .collect();
    let mut name = replaced.trim().to_string();
    if name.is_empty() || name == "." || name == ".." {
        name = FALLBACK_NAME.to_string();
    }
    if kind == ContentKind::Link && !name.to_lowercase().ends_with(LINK_SUFFIX) {
        name.push_str(LINK_SUFFIX);
    }
    fit(&name, kind, policy.max_len)
}

fn split_extension(name: &str, kind: ContentKind) -> (&str, &str) {
    if kind == ContentKind::Folder {
        return (name, "");
    }
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

fn fit(name: &str, kind: ContentKind, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    let (stem, extension) = split_extension(name, kind);
    let extension_len = extension.chars().count();
    if extension_len == 0 || extension_len * 2 > max_len {
        return name.chars().take(max_len).collect();
    }
    let stem: String = stem.chars().take(max_len - extension_len).collect();
    format!("{stem}{extension}")
}

/// Per-traversal naming state.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    policy: NamePolicy,
    claimed: HashMap<String, HashSet<String>>,
    renames: BTreeMap<String, String>,
}

impl NameRegistry {
    /// Empty registry for a destination policy.
    #[must_use]
    pub fn new(policy: NamePolicy) -> Self {
        Self {
            policy,
            claimed: HashMap::new(),
            renames: BTreeMap::new(),
        }
    }

    /// Destination policy in force.
    #[must_use]
    pub const fn policy(&self) -> &NamePolicy {
        &self.policy
    }

    /// Sanitize a title under the registry's policy.
    #[must_use]
    pub fn sanitize(&self, kind: ContentKind, title: &str) -> String {
        sanitize(&self.policy, kind, title)
    }

    /// Claim `proposed` under `parent`, returning the name actually granted.
    ///
    /// Names compare case-insensitively. A name already claimed by a sibling becomes
    /// `name (2)`, `name (3)`, ... with any file extension kept at the end.
    pub fn claim(&mut self, parent: &SinkHandle, kind: ContentKind, proposed: &str) -> String {
        let siblings = self.claimed.entry(parent.as_str().to_string()).or_default();
        if siblings.insert(proposed.to_lowercase()) {
            return proposed.to_string();
        }
        let (stem, extension) = split_extension(proposed, kind);
        let mut counter = 2_u32;
        loop {
            let suffix = format!(" ({counter}){extension}");
            let room = self
                .policy
                .max_len
                .saturating_sub(suffix.chars().count());
            let stem: String = stem.chars().take(room).collect();
            let candidate = format!("{stem}{suffix}");
            if siblings.insert(candidate.to_lowercase()) {
                debug!(original = %proposed, granted = %candidate, "sibling name disambiguated");
                return candidate;
            }
            counter += 1;
        }
    }

    /// Mark `name` as taken under `parent` without disambiguating it.
    ///
    /// Returns `false` when a sibling already holds the name.
    pub fn reserve(&mut self, parent: &SinkHandle, name: &str) -> bool {
        self.claimed
            .entry(parent.as_str().to_string())
            .or_default()
            .insert(name.to_lowercase())
    }

    /// Record that the folder at `original_suffix` is named `name` at the destination.
    ///
    /// The rename is abandoned when `name` would contain more than one separator once the
    /// trailing one is added. Returns whether the rename was recorded.
    pub fn record_rename(&mut self, original_suffix: &str, name: &str) -> bool {
        let mut target = name.to_string();
        if !target.ends_with(PATH_SEPARATOR) {
            target.push(PATH_SEPARATOR);
        }
        if target.matches(PATH_SEPARATOR).count() > 1 {
            debug!(suffix = %original_suffix, name = %name, "rename abandoned; name would nest");
            return false;
        }
        self.renames.insert(original_suffix.to_string(), target);
        true
    }

    /// Destination name recorded for a folder suffix, with its trailing separator.
    #[must_use]
    pub fn resolve(&self, original_suffix: &str) -> Option<&str> {
        self.renames.get(original_suffix).map(String::as_str)
    }

    /// Rewrite a root-relative source path, replacing every renamed folder segment.
    #[must_use]
    pub fn rewrite(&self, relative_path: &str) -> String {
        let mut rewritten = String::with_capacity(relative_path.len());
        let mut consumed = 0;
        for (index, _) in relative_path.match_indices(PATH_SEPARATOR) {
            let suffix = &relative_path[..=index];
            let segment = &relative_path[consumed..=index];
            rewritten.push_str(self.resolve(suffix).unwrap_or(segment));
            consumed = index + 1;
        }
        rewritten.push_str(&relative_path[consumed..]);
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        let name = sanitize(&NamePolicy::ARCHIVE, ContentKind::File, " a/b:c?.txt ");
        assert_eq!(name, "a_b_c_.txt");
        let remote = sanitize(&NamePolicy::REMOTE_STORE, ContentKind::File, "a:b\\c.txt");
        assert_eq!(remote, "a:b_c.txt");
    }

    #[test]
    fn sanitize_is_deterministic_and_handles_links() {
        let first = sanitize(&NamePolicy::ARCHIVE, ContentKind::Link, "Library");
        let second = sanitize(&NamePolicy::ARCHIVE, ContentKind::Link, "Library");
        assert_eq!(first, "Library.html");
        assert_eq!(first, second);
        assert_eq!(
            sanitize(&NamePolicy::ARCHIVE, ContentKind::Link, "page.HTML"),
            "page.HTML"
        );
        assert_eq!(
            sanitize(&NamePolicy::ARCHIVE, ContentKind::Folder, "  "),
            "untitled"
        );
    }

    #[test]
    fn sanitize_truncates_but_keeps_extension() {
        let title = format!("{}.pdf", "x".repeat(300));
        let name = sanitize(&NamePolicy::REMOTE_STORE, ContentKind::File, &title);
        assert_eq!(name.chars().count(), 255);
        assert!(name.ends_with(".pdf"));

        let folder = sanitize(&NamePolicy::REMOTE_STORE, ContentKind::Folder, &"y".repeat(300));
        assert_eq!(folder.chars().count(), 255);
    }

    #[test]
    fn claim_disambiguates_case_insensitively_per_parent() {
        let mut registry = NameRegistry::new(NamePolicy::ARCHIVE);
        let root = SinkHandle::new("");
        let other = SinkHandle::new("A/");
        assert_eq!(registry.claim(&root, ContentKind::File, "notes.txt"), "notes.txt");
        assert_eq!(registry.claim(&root, ContentKind::File, "Notes.TXT"), "Notes (2).TXT");
        assert_eq!(registry.claim(&root, ContentKind::File, "notes.txt"), "notes (3).txt");
        assert_eq!(registry.claim(&other, ContentKind::File, "notes.txt"), "notes.txt");
        assert_eq!(registry.claim(&root, ContentKind::Folder, "v1.0"), "v1.0");
        assert_eq!(registry.claim(&root, ContentKind::Folder, "v1.0"), "v1.0 (2)");
    }

    #[test]
    fn reserved_names_push_later_claims_aside() {
        let mut registry = NameRegistry::new(NamePolicy::ARCHIVE);
        let message = SinkHandle::new("m1");
        assert!(registry.reserve(&message, "message.txt"));
        assert!(!registry.reserve(&message, "Message.TXT"));
        assert_eq!(
            registry.claim(&message, ContentKind::File, "message.txt"),
            "message (2).txt"
        );
        assert!(registry.reserve(&SinkHandle::new("m2"), "message.txt"));
    }

    #[test]
    fn renames_resolve_consistently_for_descendants() {
        let mut registry = NameRegistry::new(NamePolicy::ARCHIVE);
        assert!(registry.record_rename("A:B/", "A_B"));
        assert!(registry.record_rename("A:B/C?/", "C_"));
        assert_eq!(registry.resolve("A:B/"), Some("A_B/"));
        assert_eq!(registry.resolve("A:B/"), Some("A_B/"));
        assert_eq!(registry.rewrite("A:B/C?/file.txt"), "A_B/C_/file.txt");
        assert_eq!(registry.rewrite("A:B/other.txt"), "A_B/other.txt");
        assert_eq!(registry.rewrite("plain/file.txt"), "plain/file.txt");
    }

    #[test]
    fn nested_rename_is_abandoned() {
        let mut registry = NameRegistry::new(NamePolicy::ARCHIVE);
        assert!(!registry.record_rename("a/", "x/y"));
        assert_eq!(registry.resolve("a/"), None);
        assert_eq!(registry.rewrite("a/f.txt"), "a/f.txt");
    }
}
