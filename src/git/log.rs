use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::models::CommitRecord;

/// Field separator placed between hash, parents and subject.
///
/// The ASCII unit separator never appears in hashes or parent lists, and
/// splitting into at most three fields keeps it verbatim in a subject that
/// happens to contain it.
pub const FIELD_SEPARATOR: char = '\x1f';

/// Characters `git log --graph` draws in front of (or instead of) a payload.
const GRAPH_GLYPHS: &[char] = &['*', '|', '/', '\\', '_', '-'];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("history unavailable: failed to run git: {0}")]
    Unavailable(#[source] std::io::Error),
    #[error("git log failed: {0}")]
    GitFailed(String),
    #[error("git log timed out after {0:?}")]
    Timeout(Duration),
}

/// Run `git log` over every ref and parse the result, newest first.
pub async fn read_commits(
    repo_path: &Path,
    timeout: Duration,
) -> Result<Vec<CommitRecord>, IngestError> {
    let raw = read_history(repo_path, timeout).await?;
    let commits = parse_log(&raw);
    tracing::info!(
        "Ingested {} commits from {}",
        commits.len(),
        repo_path.display()
    );
    Ok(commits)
}

/// Invoke the history command and return its stdout.
pub async fn read_history(repo_path: &Path, timeout: Duration) -> Result<String, IngestError> {
    let format = format!("--pretty=format:%h{FIELD_SEPARATOR}%p{FIELD_SEPARATOR}%s");
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("-C")
        .arg(repo_path)
        .args(["log", "--all", "--graph", "--no-color"])
        .arg(format)
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(IngestError::Unavailable(e)),
        Err(_) => return Err(IngestError::Timeout(timeout)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(IngestError::GitFailed(stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse graph-annotated log text into commit records, newest first.
///
/// Continuation-only lines and lines with fewer than three fields are
/// dropped; they never fail the batch.
pub fn parse_log(raw: &str) -> Vec<CommitRecord> {
    let mut commits = Vec::new();

    for line in raw.lines() {
        let payload = strip_graph(line);
        if payload.is_empty() {
            continue;
        }

        let mut fields = payload.splitn(3, FIELD_SEPARATOR);
        let (Some(hash), Some(parents), Some(message)) =
            (fields.next(), fields.next(), fields.next())
        else {
            tracing::debug!("Skipping malformed log line: {line:?}");
            continue;
        };

        let hash = hash.trim();
        if hash.is_empty() {
            tracing::debug!("Skipping log line without hash: {line:?}");
            continue;
        }

        commits.push(CommitRecord {
            hash: hash.to_string(),
            parents: parents.split_whitespace().map(str::to_string).collect(),
            message: message.trim().to_string(),
            sequence: commits.len(),
        });
    }

    commits
}

fn strip_graph(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_whitespace() || GRAPH_GLYPHS.contains(&c))
        .trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(graph: &str, hash: &str, parents: &str, msg: &str) -> String {
        format!("{graph}{hash}{FIELD_SEPARATOR}{parents}{FIELD_SEPARATOR}{msg}")
    }

    #[test]
    fn test_parse_graph_with_merge_and_continuation() {
        let raw = [
            line("*   ", "m3rge01", "aaa1111 bbb2222", "Merge decision branches"),
            "|\\  ".to_string(),
            line("| * ", "bbb2222", "ccc3333", "In the context of caching, we decided for redis"),
            line("* | ", "aaa1111", "ccc3333", "In the context of storage, we decided for postgres"),
            "|/  ".to_string(),
            line("* ", "ccc3333", "", "Initial decision log"),
        ]
        .join("\n");

        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 4);

        assert_eq!(commits[0].hash, "m3rge01");
        assert_eq!(commits[0].parents, vec!["aaa1111", "bbb2222"]);
        assert_eq!(commits[0].message, "Merge decision branches");
        assert_eq!(commits[0].sequence, 0);

        assert_eq!(commits[1].hash, "bbb2222");
        assert_eq!(commits[1].parents, vec!["ccc3333"]);
        assert_eq!(commits[2].hash, "aaa1111");

        assert_eq!(commits[3].hash, "ccc3333");
        assert!(commits[3].parents.is_empty());
        assert_eq!(commits[3].sequence, 3);
    }

    #[test]
    fn test_parse_skips_lines_with_too_few_fields() {
        let raw = format!(
            "* abc1234{FIELD_SEPARATOR}def5678\n{}",
            line("* ", "def5678", "", "root")
        );
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, "def5678");
        assert_eq!(commits[0].sequence, 0);
    }

    #[test]
    fn test_parse_keeps_separator_inside_message() {
        let raw = line("* ", "abc1234", "", &format!("a{FIELD_SEPARATOR}b"));
        let commits = parse_log(&raw);
        assert_eq!(commits[0].message, format!("a{FIELD_SEPARATOR}b"));
    }

    #[test]
    fn test_parse_keeps_pipes_in_message() {
        let raw = line("* ", "abc1234", "", "choose A | B over C");
        let commits = parse_log(&raw);
        assert_eq!(commits[0].message, "choose A | B over C");
    }

    #[test]
    fn test_parse_trims_fields() {
        let raw = line("  *  ", "abc1234 ", "  p1   p2  ", "  spaced message  ");
        let commits = parse_log(&raw);
        assert_eq!(commits[0].hash, "abc1234");
        assert_eq!(commits[0].parents, vec!["p1", "p2"]);
        assert_eq!(commits[0].message, "spaced message");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("|\n|/\n| \\\n").is_empty());
    }

    #[test]
    fn test_parse_empty_message_is_kept() {
        let raw = line("* ", "abc1234", "", "");
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "");
    }

    #[tokio::test]
    async fn test_read_history_outside_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_history(dir.path(), Duration::from_secs(10)).await;
        assert!(result.is_err());
    }
}
