//! Local repository management by shelling out to the `git` binary: clone
//! into the managed base directory, list managed clones, validate repos.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;

use crate::util::validate_repo_name;

/// Clone `url` under `repos_base`, returning the local directory name.
///
/// An existing target that is already a git repo counts as success; an
/// existing non-repo directory is an error.
pub fn clone_repo(
    url: &str,
    name: Option<&str>,
    repos_base: &Path,
    verbose: u8,
) -> Result<String> {
    if url.trim().is_empty() {
        bail!("repository URL must not be empty");
    }

    let dir_name = match name {
        Some(name) => {
            if !validate_repo_name(name) {
                bail!("invalid local directory name: '{name}'");
            }
            name.to_string()
        }
        None => repo_name_from_url(url)
            .context("could not derive a directory name from the URL; pass --name")?,
    };

    let target = repos_base.join(&dir_name);
    if target.exists() {
        if is_git_repo(&target) {
            println!(
                "{}",
                format!("'{dir_name}' already exists and is a git repository").yellow()
            );
            return Ok(dir_name);
        }
        bail!(
            "'{}' already exists but is not a git repository",
            target.display()
        );
    }

    std::fs::create_dir_all(repos_base)
        .with_context(|| format!("Failed to create {}", repos_base.display()))?;

    println!("Cloning {} into {}...", url.cyan(), target.display());
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg(url).arg(&target);
    if verbose == 0 {
        cmd.arg("--quiet");
    }
    let output = cmd.output().context("Failed to run git clone")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    println!("{}", format!("Cloned as '{dir_name}'.").green());
    Ok(dir_name)
}

/// Sorted names of directories under `repos_base` that are git repositories.
pub fn list_local_repos(repos_base: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(repos_base) else {
        return Vec::new();
    };

    let mut repos: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.is_dir() && is_git_repo(&path) {
                Some(entry.file_name().to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    repos.sort();
    repos
}

/// True when `path` is inside a git work tree rooted at `path`.
pub fn is_git_repo(path: &Path) -> bool {
    let probe = Command::new("git")
        .arg("-C")
        .arg(path)
        .args(["rev-parse", "--git-dir"])
        .output();
    match probe {
        Ok(output) => output.status.success(),
        // git binary unavailable: fall back to the conventional marker.
        Err(_) => path.join(".git").exists(),
    }
}

/// Last path segment of the URL without a trailing `.git`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.trim_end_matches(".git");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn repo_name_is_derived_from_common_url_shapes() {
        assert_eq!(
            repo_name_from_url("https://github.com/acme/widget.git").as_deref(),
            Some("widget")
        );
        assert_eq!(
            repo_name_from_url("git@github.com:acme/widget.git").as_deref(),
            Some("widget")
        );
        assert_eq!(
            repo_name_from_url("https://example.com/tool/").as_deref(),
            Some("tool")
        );
        assert_eq!(repo_name_from_url("///"), None);
    }

    #[test]
    fn clone_rejects_empty_url_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(clone_repo("", None, dir.path(), 0).is_err());
        assert!(clone_repo("https://x/y.git", Some("a/b"), dir.path(), 0).is_err());
    }

    #[test]
    fn list_skips_plain_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("not-a-repo")).unwrap();
        // .git marker only; `git rev-parse` may or may not accept it, and the
        // plain dir must be excluded either way.
        let repos = list_local_repos(dir.path());
        assert!(!repos.contains(&"not-a-repo".to_string()));
    }

    #[test]
    fn list_on_missing_base_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repos = list_local_repos(&dir.path().join("absent"));
        assert!(repos.is_empty());
    }
}
