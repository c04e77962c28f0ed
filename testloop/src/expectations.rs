//! Known-to-fail manifest.
//!
//! Lets a run declare tests as known to fail without touching their bodies:
//!
//! ```toml
//! [[known_to_fail]]
//! glob = "lab::power::*"
//! bug = "BUG-812"
//! ```
//!
//! Exact ids win over globs, globs over regexes.

use anyhow::{anyhow, bail, Context, Result};
use globset::Glob;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct KnownToFail {
  exact: Vec<Entry>,
  globs: Vec<Entry>,
  regexes: Vec<Entry>,
}

impl KnownToFail {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_path(path: &Path) -> Result<Self> {
    let raw =
      fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    Self::parse(&raw).map_err(|err| anyhow!("{}: {err}", path.display()))
  }

  pub fn parse(raw: &str) -> Result<Self> {
    let manifest = match toml::from_str::<RawManifest>(raw) {
      Ok(manifest) => manifest,
      Err(toml_err) => serde_json::from_str::<RawManifest>(raw).map_err(|json_err| {
        anyhow!("failed to parse manifest as TOML ({toml_err}) or JSON ({json_err})")
      })?,
    };

    let mut known = KnownToFail::default();
    for raw_entry in manifest.known_to_fail {
      let matcher = raw_entry.matcher()?;
      let bug = raw_entry.bug.unwrap_or_default();
      let entry = Entry { matcher, bug };
      match entry.matcher {
        Matcher::Exact(_) => known.exact.push(entry),
        Matcher::Glob(_) => known.globs.push(entry),
        Matcher::Regex(_) => known.regexes.push(entry),
      }
    }
    Ok(known)
  }

  pub fn is_empty(&self) -> bool {
    self.exact.is_empty() && self.globs.is_empty() && self.regexes.is_empty()
  }

  /// Bug reference of the first entry matching `name`.
  pub fn lookup(&self, name: &str) -> Option<&str> {
    [&self.exact, &self.globs, &self.regexes]
      .into_iter()
      .flat_map(|entries| entries.iter())
      .find(|entry| entry.matcher.matches(name))
      .map(|entry| entry.bug.as_str())
  }
}

#[derive(Debug, Clone)]
struct Entry {
  matcher: Matcher,
  bug: String,
}

#[derive(Debug, Clone)]
enum Matcher {
  Exact(String),
  Glob(globset::GlobMatcher),
  Regex(Regex),
}

impl Matcher {
  fn matches(&self, name: &str) -> bool {
    match self {
      Matcher::Exact(pattern) => pattern == name,
      Matcher::Glob(glob) => glob.is_match(name),
      Matcher::Regex(re) => re.is_match(name),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
  #[serde(default)]
  known_to_fail: Vec<RawEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
  id: Option<String>,
  glob: Option<String>,
  regex: Option<String>,
  #[serde(alias = "tracking_issue")]
  bug: Option<String>,
}

impl RawEntry {
  fn matcher(&self) -> Result<Matcher> {
    match (&self.id, &self.glob, &self.regex) {
      (Some(id), None, None) => Ok(Matcher::Exact(id.clone())),
      (None, Some(glob), None) => {
        let compiled = Glob::new(glob)
          .map_err(|err| anyhow!("invalid glob '{glob}': {err}"))?
          .compile_matcher();
        Ok(Matcher::Glob(compiled))
      }
      (None, None, Some(regex)) => {
        let compiled =
          Regex::new(regex).map_err(|err| anyhow!("invalid regex '{regex}': {err}"))?;
        Ok(Matcher::Regex(compiled))
      }
      (None, None, None) => bail!("manifest entry missing `id`/`glob`/`regex`"),
      _ => bail!("manifest entry must specify exactly one of `id`/`glob`/`regex`"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn manifest_prefers_exact_then_glob_then_regex() {
    let manifest = r#"
[[known_to_fail]]
regex = "lab::.*"
bug = "BUG-3"

[[known_to_fail]]
glob = "lab::power::*"
bug = "BUG-2"

[[known_to_fail]]
id = "lab::power::reboot"
bug = "BUG-1"
    "#;

    let known = KnownToFail::parse(manifest).unwrap();
    assert_eq!(known.lookup("lab::power::reboot"), Some("BUG-1"));
    assert_eq!(known.lookup("lab::power::cold"), Some("BUG-2"));
    assert_eq!(known.lookup("lab::net::ping"), Some("BUG-3"));
    assert_eq!(known.lookup("other::x"), None);
  }

  #[test]
  fn json_manifest_is_accepted() {
    let known =
      KnownToFail::parse(r#"{"known_to_fail": [{"id": "a::b", "tracking_issue": "BUG-7"}]}"#)
        .unwrap();
    assert_eq!(known.lookup("a::b"), Some("BUG-7"));
  }

  #[test]
  fn entry_needs_exactly_one_matcher() {
    let err = KnownToFail::parse("[[known_to_fail]]\nbug = \"x\"\n").unwrap_err();
    assert!(err.to_string().contains("missing"));

    let err =
      KnownToFail::parse("[[known_to_fail]]\nid = \"a\"\nglob = \"b\"\n").unwrap_err();
    assert!(err.to_string().contains("exactly one"));
  }

  #[test]
  fn path_is_named_in_errors() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("ktf.toml");
    fs::write(&path, "[[known_to_fail]]\nregex = \"(\"\n").unwrap();
    let err = KnownToFail::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("ktf.toml"));
    assert!(KnownToFail::empty().is_empty());
  }
}
