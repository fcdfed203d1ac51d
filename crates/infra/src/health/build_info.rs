use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum BuildInfoError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git exited with {status}: {stderr}")]
    Git { status: String, stderr: String },

    #[error("unexpected git output: {0}")]
    Parse(String),
}

/// Identity of the running source revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Sanitized subject line of the last commit.
    pub message: String,
    /// Author timestamp of the last commit.
    pub version: DateTime<Utc>,
}

impl BuildInfo {
    /// Read the last commit of the repository containing `dir`.
    pub async fn from_git(dir: &Path) -> Result<Self, BuildInfoError> {
        // %at = author time (unix), %f = sanitized subject
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["log", "-1", "--format=%at%n%f"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(BuildInfoError::Git {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    fn parse(stdout: &str) -> Result<Self, BuildInfoError> {
        let mut lines = stdout.lines();
        let ts = lines
            .next()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .ok_or_else(|| BuildInfoError::Parse(stdout.to_string()))?;
        let version = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| BuildInfoError::Parse(stdout.to_string()))?;
        let message = lines.next().unwrap_or_default().trim().to_string();
        Ok(Self { message, version })
    }

    /// Fallback when no repository metadata is available.
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self {
            message: "unknown".to_string(),
            version: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_and_subject() {
        let info = BuildInfo::parse("1700000000\nFix-session-cookie-path\n").unwrap();
        assert_eq!(info.version.timestamp(), 1_700_000_000);
        assert_eq!(info.message, "Fix-session-cookie-path");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(BuildInfo::parse("fatal: not a git repository"), Err(BuildInfoError::Parse(_))));
        assert!(matches!(BuildInfo::parse(""), Err(BuildInfoError::Parse(_))));
    }

    #[tokio::test]
    async fn non_repository_directory_is_an_error_not_a_panic() {
        let dir = std::env::temp_dir().join(format!("realmgate-nogit-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(BuildInfo::from_git(&dir).await.is_err());
        std::fs::remove_dir_all(dir).ok();
    }
}
