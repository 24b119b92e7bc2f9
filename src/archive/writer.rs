use crate::archive::{
    archive_filename, disambiguate, extract_detail_fields, ArchiveError, Manifest, SkipReason,
    MANIFEST_FILE,
};
use crate::fetch::{FetchKind, Fetcher};
use crate::listing::DocumentReference;
use crate::storage::{ArchiveRecord, Storage};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Result of archiving one reference
#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    Archived(ArchiveRecord),
    Skipped { doc_id: String, reason: SkipReason },
}

/// What manifest recovery did at session start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Manifest lines committed to the database that were missing from it
    pub rolled_forward: u32,
    /// Manifest lines skipped because their HTML file is gone
    pub missing_files: u32,
}

pub struct ArchiveWriter {
    data_dir: PathBuf,
    manifest: Manifest,
}

impl ArchiveWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let manifest = Manifest::new(data_dir.join(MANIFEST_FILE));
        Self { data_dir, manifest }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Fetches, writes and commits one document
    pub async fn archive(
        &self,
        fetcher: &Fetcher,
        storage: &mut dyn Storage,
        reference: &DocumentReference,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let skip = |reason: SkipReason| {
            tracing::warn!("Skipping {} ({}): {}", reference.doc_id, reference.detail_url, reason);
            Ok(ArchiveOutcome::Skipped {
                doc_id: reference.doc_id.clone(),
                reason,
            })
        };

        let detail = match fetcher.fetch(&reference.detail_url, FetchKind::DetailPage).await {
            Ok(response) => response,
            Err(e) => return skip(SkipReason::FetchFailed(e)),
        };
        let html = detail.text().unwrap_or_default().to_string();

        let fields = match extract_detail_fields(&html, &detail.final_url) {
            Ok(fields) => fields,
            Err(e) => return skip(SkipReason::ParseFailed(e)),
        };

        let mut asset_note = None;
        let pdf = match fields.pdf_link.as_deref() {
            Some(link) => match fetcher.fetch(link, FetchKind::BinaryAsset).await {
                Ok(response) => Some(response.into_bytes()),
                Err(e) => {
                    let note = if e.is_oversized() {
                        format!("pdf skipped: {}", e.cause)
                    } else {
                        format!("pdf fetch failed: {}", e)
                    };
                    tracing::warn!("{}: {}", reference.doc_id, note);
                    asset_note = Some(note);
                    None
                }
            },
            None => None,
        };

        let title = if reference.title.is_empty() {
            fields.title.clone().unwrap_or_default()
        } else {
            reference.title.clone()
        };
        let date = reference.publish_date.as_deref();

        let module_dir = self.data_dir.join(&reference.module_id);
        fs::create_dir_all(&module_dir).map_err(|source| ArchiveError::Write {
            path: module_dir.clone(),
            source,
        })?;

        // Phase 1: artifacts
        let html_path = self.claim_path(
            storage,
            &reference.module_id,
            &reference.doc_id,
            &archive_filename(date, &title, "html"),
        )?;
        self.write_artifact(&html_path, html.as_bytes())?;

        let pdf_path = match pdf {
            Some(bytes) => {
                let path = self.claim_path(
                    storage,
                    &reference.module_id,
                    &reference.doc_id,
                    &archive_filename(date, &title, "pdf"),
                )?;
                self.write_artifact(&path, &bytes)?;
                Some(path)
            }
            None => None,
        };

        let record = ArchiveRecord {
            module_id: reference.module_id.clone(),
            doc_id: reference.doc_id.clone(),
            title,
            publish_date: reference.publish_date.clone(),
            source_url: reference.detail_url.clone(),
            local_html_path: html_path,
            local_pdf_path: pdf_path,
            doc_number: fields.doc_number,
            department: fields.department,
            asset_note,
            fetched_at: Utc::now(),
        };

        // Phase 2: commit log, then index
        self.manifest
            .append(&record)
            .map_err(|source| ArchiveError::Manifest {
                path: self.manifest.path().to_path_buf(),
                source,
            })?;
        storage.commit_archive(&record)?;

        tracing::info!(
            "Archived {} -> {}{}",
            record.doc_id,
            record.local_html_path,
            record
                .local_pdf_path
                .as_deref()
                .map(|p| format!(" + {}", p))
                .unwrap_or_default()
        );

        Ok(ArchiveOutcome::Archived(record))
    }

    /// Rolls manifest lines missing from the database forward into it
    pub fn recover(&self, storage: &mut dyn Storage) -> Result<RecoveryReport, ArchiveError> {
        let records = self
            .manifest
            .read_all()
            .map_err(|source| ArchiveError::Manifest {
                path: self.manifest.path().to_path_buf(),
                source,
            })?;

        let mut report = RecoveryReport::default();
        for record in records {
            if storage.is_known(&record.module_id, &record.doc_id)? {
                continue;
            }
            if !self.data_dir.join(&record.local_html_path).exists() {
                tracing::warn!(
                    "Manifest entry {}/{} points at missing file {}; not recovered",
                    record.module_id,
                    record.doc_id,
                    record.local_html_path
                );
                report.missing_files += 1;
                continue;
            }
            storage.commit_archive(&record)?;
            tracing::info!("Recovered {}/{} from manifest", record.module_id, record.doc_id);
            report.rolled_forward += 1;
        }

        Ok(report)
    }

    /// Picks the relative path for an artifact
    ///
    /// A path already owned by another committed document gets the doc id
    /// appended. A file nobody owns (left by an interrupted run) is reused.
    fn claim_path(
        &self,
        storage: &dyn Storage,
        module_id: &str,
        doc_id: &str,
        filename: &str,
    ) -> Result<String, ArchiveError> {
        let candidate = format!("{}/{}", module_id, filename);
        match storage.path_owner(module_id, &candidate)? {
            Some(owner) if owner != doc_id => {
                Ok(format!("{}/{}", module_id, disambiguate(filename, doc_id)))
            }
            _ => Ok(candidate),
        }
    }

    /// Writes `bytes` to `relative_path` via a synced temp file and rename
    fn write_artifact(&self, relative_path: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        let path = self.data_dir.join(relative_path);
        let write_err = |source: std::io::Error| ArchiveError::Write {
            path: path.clone(),
            source,
        };
        let dir = path.parent().unwrap_or(self.data_dir.as_path());

        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(bytes).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        #[cfg(unix)]
        fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(write_err)?;

        Ok(())
    }
}
