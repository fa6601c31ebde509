//! Snapshot artifact store
//!
//! Artifacts live under the backups directory, one folder per connection:
//! `<backups>/<camelCaseAlias>/<dump|schema>-DD-MM-YYYY-<unix millis>.sql`.
//! Clients refer to an artifact by its path relative to the backups root.

use super::assembler::SnapshotMode;
use crate::error::{not_found_error, validation_error, AppError};
use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// A written artifact
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// Path relative to the backups root, `/` separated
    pub file: String,
    pub bytes: usize,
    pub sha256: String,
}

/// `local_dev` -> `localDev`, `Production DB` -> `productionDb`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for (i, word) in name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }

    out
}

pub fn checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative artifact path for a snapshot taken at `now`
    pub fn artifact_name(alias: &str, mode: SnapshotMode, now: DateTime<Local>) -> String {
        let folder = match to_camel_case(alias) {
            folder if folder.is_empty() => "unknown".to_string(),
            folder => folder,
        };
        format!(
            "{}/{}-{}-{}.sql",
            folder,
            mode.file_prefix(),
            now.format("%d-%m-%Y"),
            now.timestamp_millis()
        )
    }

    /// Resolve a client supplied relative path. Absolute paths and parent
    /// components are rejected so nothing outside the root is reachable.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let path = Path::new(relative);

        if relative.trim().is_empty() {
            return Err(validation_error("Artifact path is required"));
        }

        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(validation_error(format!(
                "Artifact path '{}' must be relative to the backups directory",
                relative
            )));
        }

        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            return Err(validation_error(format!(
                "Artifact '{}' is not a .sql file",
                relative
            )));
        }

        Ok(self.root.join(path))
    }

    /// Write a snapshot body, creating the connection folder as needed
    pub async fn write(
        &self,
        alias: &str,
        mode: SnapshotMode,
        body: &str,
    ) -> Result<StoredArtifact, AppError> {
        let file = Self::artifact_name(alias, mode, Local::now());
        let path = self.resolve(&file)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;

        let artifact = StoredArtifact {
            file,
            bytes: body.len(),
            sha256: checksum(body),
        };
        info!(
            "Snapshot written to {} ({} bytes, sha256 {})",
            path.display(),
            artifact.bytes,
            artifact.sha256
        );

        Ok(artifact)
    }

    /// Read an artifact back by relative path
    pub async fn read(&self, relative: &str) -> Result<String, AppError> {
        let path = self.resolve(relative)?;

        match fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(not_found_error(format!("Artifact '{}' not found", relative)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every `.sql` artifact below the root, as sorted relative paths.
    /// A missing root means no artifacts yet.
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut found = Vec::new();

        if !fs::try_exists(&self.root).await? {
            return Ok(found);
        }

        let mut pending = vec![PathBuf::new()];
        while let Some(relative) = pending.pop() {
            let mut entries = fs::read_dir(self.root.join(&relative)).await?;

            while let Some(entry) = entries.next_entry().await? {
                let name = relative.join(entry.file_name());
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(name);
                } else if name.extension().and_then(|e| e.to_str()) == Some("sql") {
                    let parts: Vec<String> = name
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    found.push(parts.join("/"));
                }
            }
        }

        found.sort();
        debug!("Found {} artifacts under {}", found.len(), self.root.display());
        Ok(found)
    }
}
