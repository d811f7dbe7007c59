//! Provenance discovery from a local git checkout.

use std::path::Path;

use git2::Repository;

use crate::core::provenance::RawProvenance;

/// Describe where the package in `dir` can be cloned from.
///
/// Returns `None` when `dir` is not inside a git work tree or the
/// repository has no `origin` remote; such packages are treated as local.
pub fn discover_provenance(dir: &Path) -> Option<RawProvenance> {
    let repo = match Repository::discover(dir) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!("no git repository above {}: {}", dir.display(), e.message());
            return None;
        }
    };

    let repo_url = {
        let remote = repo.find_remote("origin").ok()?;
        remote.url()?.to_string()
    };

    let (branch, resolved_version) = match repo.head() {
        Ok(head) => {
            let branch = if head.is_branch() {
                head.shorthand().map(str::to_string)
            } else {
                None
            };
            let commit = head.peel_to_commit().ok().map(|c| c.id().to_string());
            (branch, commit)
        }
        // Unborn HEAD: nothing committed yet.
        Err(_) => (None, None),
    };

    let sub_path = repo.workdir().and_then(|workdir| {
        let dir = dir.canonicalize().ok()?;
        let workdir = workdir.canonicalize().ok()?;
        let relative = dir.strip_prefix(&workdir).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    });

    tracing::debug!("discovered {} for {}", repo_url, dir.display());

    Some(RawProvenance {
        repo_url: Some(repo_url),
        branch,
        sub_path,
        depth: None,
        resolved_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("pkgmeta", "pkgmeta@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap()
    }

    #[test]
    fn test_discovers_remote_branch_and_sub_path() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.remote("origin", "https://example.com/org/repo.git")
            .unwrap();

        let pkg_dir = tmp.path().join("lib").join("a");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("a.x"), "x").unwrap();
        let oid = commit_all(&repo);

        let prov = discover_provenance(&pkg_dir).unwrap();
        assert_eq!(
            prov.repo_url.as_deref(),
            Some("https://example.com/org/repo.git")
        );
        assert_eq!(prov.sub_path.as_deref(), Some("lib/a"));
        assert_eq!(prov.resolved_version, Some(oid.to_string()));
        assert!(prov.branch.is_some());
    }

    #[test]
    fn test_no_origin_means_local() {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();

        assert!(discover_provenance(tmp.path()).is_none());
    }
}
