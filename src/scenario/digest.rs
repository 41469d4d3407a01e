//! Content digest and naming.
//!
//! The digest is a SHA-256 over the identity-relevant fields of a scenario.
//! Map-valued fields are fed in key order so the result does not depend on
//! insertion order. Re-recording an identical exchange therefore reproduces
//! the same name.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use super::Scenario;

static SEPARATOR_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/\\]+").expect("valid regex"));

static NON_ALPHABET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_\-:]").expect("valid regex"));

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

impl Scenario {
    /// Deterministic checksum over the scenario's identity fields.
    ///
    /// Covers method, group, path, request contents, request query and
    /// header assertion maps, request content pattern, response contents and
    /// response contents file.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(self.method.as_str().as_bytes());
        field(self.group.as_bytes());
        field(self.path.as_bytes());
        field(self.request.contents.as_bytes());
        for map in [
            &self.request.assert_query_params_pattern,
            &self.request.assert_headers_pattern,
        ] {
            field(&(map.len() as u64).to_le_bytes());
            for (k, v) in map {
                field(k.as_bytes());
                field(v.as_bytes());
            }
        }
        field(self.request.assert_contents_pattern.as_bytes());
        field(self.response.contents.as_bytes());
        field(self.response.contents_file.as_bytes());
        to_hex(&hasher.finalize())
    }

    /// Path with separators turned into dashes, e.g. `v1-books-{id}`.
    #[must_use]
    pub fn normal_name(&self) -> String {
        normalize_path(&self.path, '-')
    }

    /// `{prefix}{path-up-to-first-placeholder}-{status}-{digest}`.
    #[must_use]
    pub fn build_name(&self, prefix: &str) -> String {
        format!(
            "{prefix}{}-{}-{}",
            normalize_dir_path(&self.normal_name()),
            self.response.status_code,
            self.digest()
        )
    }

    /// Replaces the name with [`build_name`](Self::build_name).
    pub fn set_name(&mut self, prefix: &str) {
        self.name = self.build_name(prefix);
    }
}

/// Collapses runs of `/` or `\` into `sep` and trims one leading and one
/// trailing `sep`. Inputs shorter than two characters are returned as is.
#[must_use]
pub fn normalize_path(path: &str, sep: char) -> String {
    let mut buf = [0u8; 4];
    let sep_str: &str = sep.encode_utf8(&mut buf);
    let path = SEPARATOR_RUN_RE.replace_all(path, sep_str);
    if path.chars().count() < 2 {
        return path.into_owned();
    }
    let trimmed = path.strip_prefix(sep).unwrap_or(&path);
    let trimmed = trimmed.strip_suffix(sep).unwrap_or(trimmed);
    trimmed.to_string()
}

/// Normalized path truncated before its first placeholder.
#[must_use]
pub fn normalize_dir_path(path: &str) -> String {
    let path = normalize_path(path, '/');
    let idx = path.find(':').or_else(|| path.find('{'));
    match idx {
        Some(0) => String::new(),
        Some(i) if i > 1 => path[..i - 1].to_string(),
        _ => path,
    }
}

/// Replaces characters outside `[a-zA-Z0-9_\-:]` with `rep`, collapses runs
/// of `rep` and drops a trailing one. An empty `rep` simply deletes them.
#[must_use]
pub fn sanitize_non_alphabet(name: &str, rep: &str) -> String {
    let replaced = NON_ALPHABET_RE.replace_all(name, rep).into_owned();
    if rep.is_empty() {
        return replaced;
    }
    let Ok(run) = Regex::new(&format!("({})+", regex::escape(rep))) else {
        return replaced;
    };
    let collapsed = run.replace_all(&replaced, rep);
    collapsed
        .strip_suffix(rep)
        .unwrap_or(&collapsed)
        .to_string()
}

/// Derives a scenario group.
///
/// A non-empty `title` wins. Otherwise the path up to its first placeholder
/// is used with the leading `/` removed and `/` replaced by `_`; an empty
/// result becomes `root`.
#[must_use]
pub fn normalize_group(title: &str, path: &str) -> String {
    if !title.is_empty() {
        return title.to_string();
    }
    let mut path = path;
    for marker in ['{', ':'] {
        if let Some(n) = path.find(marker) {
            path = &path[..n.saturating_sub(1)];
        }
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    let group = path.replace('/', "_");
    if group.is_empty() {
        "root".to_string()
    } else {
        group
    }
}
