//! Scope, ignore, and changed-since predicates over packages.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::error::{Error, Result};
use crate::package::Package;

/// Pre-combined include/exclude predicate handed to the selector.
///
/// A package matches when it passes the scope patterns (if any), is not
/// ignored, and — when a changed-since set is present — belongs to it.
#[derive(Debug)]
pub struct PackageFilter {
    scope: Vec<Regex>,
    ignore: Vec<Regex>,
    changed: Option<HashSet<String>>,
}

impl PackageFilter {
    pub fn new(scope: &[String], ignore: &[String]) -> Result<Self> {
        Ok(Self {
            scope: compile_globs(scope)?,
            ignore: compile_globs(ignore)?,
            changed: None,
        })
    }

    /// Restricts the filter to packages whose files differ from `since_ref`.
    /// Git runs anchored at `packages_dir`, not wherever the process happens
    /// to be standing.
    ///
    /// # Errors
    ///
    /// Returns `Error::FilterPrerequisite` when `packages_dir` is not inside
    /// a git work tree, before any scheduling happens.
    pub fn with_changed_since(
        mut self,
        packages: &[Package],
        packages_dir: &Path,
        since_ref: &str,
    ) -> Result<Self> {
        let repo_root = git_work_tree_root(packages_dir)?;
        let files = git_changed_files(packages_dir, since_ref)?;
        self.changed = Some(changed_packages(packages, &repo_root, &files));
        Ok(self)
    }

    pub fn matches(&self, package: &Package) -> bool {
        if !self.scope.is_empty() && !self.scope.iter().any(|re| re.is_match(&package.name)) {
            return false;
        }
        if self.ignore.iter().any(|re| re.is_match(&package.name)) {
            return false;
        }
        if let Some(ref changed) = self.changed {
            return changed.contains(&package.name);
        }
        true
    }
}

/// Maps changed file paths (relative to the repository root) onto the
/// packages whose location contains them.
pub fn changed_packages(
    packages: &[Package],
    repo_root: &Path,
    files: &[PathBuf],
) -> HashSet<String> {
    let locations: Vec<(String, PathBuf)> = packages
        .iter()
        .map(|p| (p.name.clone(), normalize_dir(&p.location)))
        .collect();

    let mut changed = HashSet::new();
    for file in files {
        let absolute = normalize_file(&repo_root.join(file));
        for (name, location) in &locations {
            if absolute.starts_with(location) {
                changed.insert(name.clone());
            }
        }
    }
    changed
}

fn normalize_dir(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Canonicalizes through the parent directory so deleted files still map
/// onto their package.
fn normalize_file(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => normalize_dir(parent).join(name),
        _ => path.to_path_buf(),
    }
}

/// Translates a name glob (`*` and `?` wildcards) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex)
        .map_err(|e| Error::FilterPrerequisite(format!("invalid glob '{pattern}': {e}")))
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

fn git_work_tree_root(anchor: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--show-toplevel")
        .current_dir(anchor)
        .output()
        .map_err(|e| Error::FilterPrerequisite(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        return Err(Error::FilterPrerequisite(
            "--since requires the packages directory to be inside a git work tree".to_string(),
        ));
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(root))
}

fn git_changed_files(anchor: &Path, since_ref: &str) -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .arg("diff")
        .arg("--name-only")
        .arg(since_ref)
        .current_dir(anchor)
        .output()
        .map_err(|e| Error::FilterPrerequisite(format!("failed to run git diff: {e}")))?;

    if !output.status.success() {
        return Err(Error::FilterPrerequisite(format!(
            "git diff against '{}' failed: {}",
            since_ref,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(|line| PathBuf::from(line.trim()))
        .filter(|p| !p.as_os_str().is_empty())
        .collect())
}
