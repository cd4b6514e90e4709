use std::path::Path;

/// A diagram source read straight out of a commit's tree.
#[derive(Debug, Clone)]
pub struct DiagramSource {
    /// Path of the file inside the commit tree
    pub path: String,
    pub content: Vec<u8>,
}

#[derive(Debug)]
pub enum SourceLookup {
    Found(DiagramSource),
    /// The commit exists but its tree holds no file with a matching extension
    NoSource,
    /// The hash does not resolve to a commit
    NoCommit,
}

/// What a user-supplied hash resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitLookup {
    /// Full 40-character object id of the commit
    Found(String),
    NoCommit,
    /// The prefix matches more than one object
    Ambiguous,
}

/// Resolve `hash` (any unambiguous prefix) to the full id of its commit.
pub fn resolve_commit(repo_path: &Path, hash: &str) -> Result<CommitLookup, git2::Error> {
    let repo = git2::Repository::open(repo_path)?;
    let lookup = match find_commit(&repo, hash) {
        Ok(Some(commit)) => Ok(CommitLookup::Found(commit.id().to_string())),
        Ok(None) => Ok(CommitLookup::NoCommit),
        Err(e) if e.code() == git2::ErrorCode::Ambiguous => Ok(CommitLookup::Ambiguous),
        Err(e) => Err(e),
    };
    lookup
}

fn find_commit<'r>(
    repo: &'r git2::Repository,
    hash: &str,
) -> Result<Option<git2::Commit<'r>>, git2::Error> {
    match repo
        .revparse_single(hash)
        .and_then(|obj| obj.peel_to_commit())
    {
        Ok(commit) => Ok(Some(commit)),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) if e.class() == git2::ErrorClass::Object && e.code() != git2::ErrorCode::Ambiguous => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Find the diagram source file in `hash`'s tree without touching any
/// working tree.
///
/// The first match in tree order wins; further matches are logged and ignored.
pub fn find_diagram_source(
    repo_path: &Path,
    hash: &str,
    extensions: &[String],
) -> Result<SourceLookup, git2::Error> {
    let repo = git2::Repository::open(repo_path)?;

    let Some(commit) = find_commit(&repo, hash)? else {
        return Ok(SourceLookup::NoCommit);
    };
    let tree = commit.tree()?;

    let mut matches: Vec<(String, git2::Oid)> = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return git2::TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else {
            return git2::TreeWalkResult::Ok;
        };
        if has_extension(name, extensions) {
            matches.push((format!("{root}{name}"), entry.id()));
        }
        git2::TreeWalkResult::Ok
    })?;

    let Some((path, oid)) = matches.first().cloned() else {
        return Ok(SourceLookup::NoSource);
    };
    if matches.len() > 1 {
        tracing::warn!(
            "Commit {hash} has {} diagram sources, using {path}",
            matches.len()
        );
    }

    let blob = repo.find_blob(oid)?;
    Ok(SourceLookup::Found(DiagramSource {
        path,
        content: blob.content().to_vec(),
    }))
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|want| *want == ext))
}

#[cfg(test)]
pub(crate) mod test_repo {
    //! Builds throwaway repositories with git2 so tests need no `git` binary.

    use std::path::Path;

    pub fn init(dir: &Path) -> git2::Repository {
        git2::Repository::init(dir).unwrap()
    }

    /// Commit `files` on top of HEAD and return the short hash.
    pub fn commit(repo: &git2::Repository, files: &[(&str, &str)], message: &str) -> String {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Decider", "decider@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
        oid.to_string()[..7].to_string()
    }
}
