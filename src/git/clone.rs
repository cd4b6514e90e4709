use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where a repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// An existing local checkout
    Local(PathBuf),
    /// A remote URL that must be cloned first
    Remote(String),
}

/// Resolve user input as an existing local directory or a clonable URL.
pub fn resolve_location(input: &str) -> Result<RepoLocation> {
    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("Repository location is required");
    }

    let path = Path::new(input);
    if path.is_dir() {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {input}"))?;
        return Ok(RepoLocation::Local(canonical));
    }

    if is_remote_url(input) {
        return Ok(RepoLocation::Remote(input.to_string()));
    }

    anyhow::bail!("{input} is neither an existing directory nor a supported git URL")
}

fn is_remote_url(input: &str) -> bool {
    ["https://", "http://", "git://", "ssh://", "git@"]
        .iter()
        .any(|scheme| input.starts_with(scheme))
}

/// Check that `path` contains a git repository.
pub fn ensure_repository(path: &Path) -> Result<()> {
    git2::Repository::open(path)
        .with_context(|| format!("{} is not a git repository", path.display()))?;
    Ok(())
}

/// Clone a git repository to the target directory, replacing any previous
/// clone at that location.
pub fn clone_repo(url: &str, target: &Path, token: Option<&str>) -> Result<()> {
    if target.exists() {
        tracing::info!("Removing previous clone at {}", target.display());
        std::fs::remove_dir_all(target)
            .with_context(|| format!("Failed to remove {}", target.display()))?;
    }

    tracing::info!("Cloning {} into {}", url, target.display());
    let mut builder = git2::build::RepoBuilder::new();
    if let Some(token) = token {
        let token = token.to_string();
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username, _allowed| {
            git2::Cred::userpass_plaintext("x-access-token", &token)
        });
        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        builder.fetch_options(fetch);
    }

    builder
        .clone(url, target)
        .with_context(|| format!("Failed to clone {url}"))?;
    tracing::info!("Clone complete: {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_existing_directory_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let loc = resolve_location(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(loc, RepoLocation::Local(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_resolve_urls_are_remote() {
        for url in [
            "https://github.com/acme/decisions.git",
            "git@github.com:acme/decisions.git",
            "ssh://git@host/repo",
        ] {
            assert_eq!(
                resolve_location(url).unwrap(),
                RepoLocation::Remote(url.to_string())
            );
        }
    }

    #[test]
    fn test_resolve_rejects_blank_and_unknown() {
        assert!(resolve_location("   ").is_err());
        assert!(resolve_location("/definitely/not/here").is_err());
        assert!(resolve_location("file:///etc").is_err());
    }

    #[test]
    fn test_ensure_repository_rejects_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_repository(dir.path()).is_err());
        git2::Repository::init(dir.path()).unwrap();
        assert!(ensure_repository(dir.path()).is_ok());
    }
}
