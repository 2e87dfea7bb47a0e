use std::path::{Path, PathBuf};

use szuru_core::{Safety, SzuruClient, SzuruError};
use thiserror::Error;

use crate::discover;
use crate::failsafe;
use crate::janitor;

/// Result of attempting to place one file on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    SkippedDuplicate,
    Failed,
}

#[derive(Debug, Error)]
enum StepError {
    #[error("reading file failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("staging upload failed: {0}")]
    Stage(#[source] SzuruError),
    #[error("similarity check failed: {0}")]
    Similarity(#[source] SzuruError),
    #[error("finalizing post failed: {0}")]
    Finalize(#[source] SzuruError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub uploaded: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: UploadOutcome) {
        self.processed += 1;
        match outcome {
            UploadOutcome::Uploaded => self.uploaded += 1,
            UploadOutcome::SkippedDuplicate => self.skipped_duplicates += 1,
            UploadOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadOptions {
    pub tags: Vec<String>,
    pub safety: Safety,
    pub remove_source: bool,
    pub failsafe_dir: PathBuf,
}

/// Drives the stage -> similarity check -> finalize sequence for every
/// discovered file, one item at a time. A single item's failure is reported,
/// preserved through the failsafe path, and never halts the batch.
pub struct Uploader {
    client: SzuruClient,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(client: SzuruClient, options: UploadOptions) -> Self {
        Self { client, options }
    }

    /// Processes every media file under every root in discovery order, then
    /// sweeps each root once with the directory janitor.
    pub async fn run(&self, roots: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::default();
        for root in roots {
            let files: Vec<PathBuf> = discover::media_files(root).collect();
            if files.is_empty() {
                tracing::info!(root = %root.display(), "no media files found under root");
            } else {
                tracing::info!(
                    root = %root.display(),
                    count = files.len(),
                    "starting upload pass"
                );
            }
            for file in files {
                summary.record(self.process_file(&file).await);
            }
            janitor::sweep(root, self.client.dry_run());
        }
        summary
    }

    /// Uploads one file and applies the post-item branch: successful and
    /// duplicate items are optionally removed locally, failed items are
    /// preserved in the failsafe directory.
    pub async fn process_file(&self, path: &Path) -> UploadOutcome {
        let outcome = match self.try_upload(path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "upload failed");
                UploadOutcome::Failed
            }
        };
        match outcome {
            UploadOutcome::Uploaded | UploadOutcome::SkippedDuplicate => {
                if self.options.remove_source {
                    self.remove_file(path).await;
                }
            }
            UploadOutcome::Failed => {
                match failsafe::preserve(path, &self.options.failsafe_dir, self.client.dry_run()) {
                    Ok(dest) => tracing::info!(
                        file = %path.display(),
                        preserved = %dest.display(),
                        "failed upload preserved in failsafe directory"
                    ),
                    Err(err) => tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "failsafe preservation failed"
                    ),
                }
            }
        }
        outcome
    }

    async fn try_upload(&self, path: &Path) -> Result<UploadOutcome, StepError> {
        let content = tokio::fs::read(path).await.map_err(StepError::Read)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let token = self
            .client
            .upload_temporary(content, &file_name)
            .await
            .map_err(StepError::Stage)?;
        let search = self
            .client
            .reverse_search(&token)
            .await
            .map_err(StepError::Similarity)?;

        if let Some(existing) = search.exact_post {
            tracing::info!(
                file = %path.display(),
                post = existing.id,
                "exact match already on server, skipping"
            );
            return Ok(UploadOutcome::SkippedDuplicate);
        }

        let relations = search.similar_ids();
        let id = self
            .client
            .create_post(&token, &self.options.tags, self.options.safety, &relations)
            .await
            .map_err(StepError::Finalize)?;
        tracing::info!(
            file = %path.display(),
            post = id,
            relations = relations.len(),
            "uploaded"
        );
        Ok(UploadOutcome::Uploaded)
    }

    async fn remove_file(&self, path: &Path) {
        if self.client.dry_run().is_active() {
            return;
        }
        if let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                file = %path.display(),
                error = %err,
                "failed to remove uploaded file"
            );
        }
    }
}

/// Deletes every post in the inclusive id range, reporting and skipping
/// per-id failures. Returns the number of successful deletions.
pub async fn delete_range(client: &SzuruClient, start: u64, finish: u64) -> usize {
    let mut deleted = 0;
    for id in start..=finish {
        match client.delete_post(id).await {
            Ok(()) => deleted += 1,
            Err(err) => tracing::warn!(post = id, error = %err, "failed to delete post"),
        }
    }
    deleted
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
