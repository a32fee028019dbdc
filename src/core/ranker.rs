use crate::core::cancel::CancellationToken;
use crate::core::histogram::{HistogramExtractor, ImageSignature};
use crate::core::report::SearchReport;
use crate::core::scanner;
use crate::core::similarity::{similarity, ScoredMatch};
use crate::diagnostics::Diagnostics;
use chrono::Local;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to write report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Order of the accepted matches before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Order in which the walk produced the files.
    #[default]
    Walk,
    /// Highest score first; ties keep walk order.
    Score,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Minimum score to accept. Not clamped: `<= 0` accepts every readable
    /// candidate and anything above 1.0 accepts none.
    pub threshold: f64,
    pub max_results: usize,
    pub order: RankOrder,
    /// Visit directory entries sorted by file name.
    pub sorted_walk: bool,
    pub persist_report: bool,
    pub report_dir: PathBuf,
}

impl SearchOptions {
    /// Negative counts from callers collapse to zero results.
    pub fn max_results_from(count: i64) -> usize {
        usize::try_from(count).unwrap_or(0)
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.30,
            max_results: 10,
            order: RankOrder::Walk,
            sorted_walk: false,
            persist_report: true,
            report_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub matches: Vec<ScoredMatch>,
    /// Where the report went, if one was written.
    pub report: Option<PathBuf>,
    /// Candidate files visited by the walk.
    pub scanned: usize,
    /// Candidates whose image could not be read.
    pub skipped: usize,
    pub cancelled: bool,
}

/// One file from the walk together with its signature. Lives only until it
/// has been scored.
struct Candidate {
    path: PathBuf,
    signature: ImageSignature,
}

impl Candidate {
    fn score_against(self, reference: &ImageSignature) -> ScoredMatch {
        ScoredMatch {
            score: similarity(reference, &self.signature),
            path: self.path,
        }
    }
}

/// Walks a folder and keeps the files whose histogram is close enough to a
/// reference image.
pub struct SimilarityRanker<D: Diagnostics> {
    extractor: HistogramExtractor,
    diagnostics: D,
    progress: ProgressBar,
}

impl<D: Diagnostics> SimilarityRanker<D> {
    pub fn new(diagnostics: D) -> Self {
        Self {
            extractor: HistogramExtractor::default(),
            diagnostics,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_extractor(mut self, extractor: HistogramExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Tick `progress` with each file as it is processed.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Search `search_root` for images similar to `reference`.
    ///
    /// An unreadable reference, an empty folder, no match above the
    /// threshold and cancellation all produce an outcome without matches.
    /// The only error is failing to write the report.
    pub fn find_similar(
        &self,
        reference: &Path,
        search_root: &Path,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        log::info!(
            "Searching {} for images similar to {} (threshold {}, count {})",
            search_root.display(),
            reference.display(),
            options.threshold,
            options.max_results
        );

        let reference_signature = match self.extractor.compute_signature(reference) {
            Ok(signature) => signature,
            Err(e) => {
                self.diagnostics.warn(&e.to_string());
                return Ok(SearchOutcome::default());
            }
        };

        let mut outcome = SearchOutcome::default();
        let mut accepted = Vec::new();

        let mut files = scanner::image_files(
            search_root,
            options.sorted_walk,
            cancel,
            &self.diagnostics as &dyn Diagnostics,
        );
        for path in files.by_ref() {
            outcome.scanned += 1;
            self.progress.set_message(path.display().to_string());
            self.progress.tick();

            let candidate = match self.extractor.compute_signature(&path) {
                Ok(signature) => Candidate { path, signature },
                Err(e) => {
                    self.diagnostics.warn(&e.to_string());
                    outcome.skipped += 1;
                    continue;
                }
            };

            let scored = candidate.score_against(&reference_signature);
            log::debug!("{} scored {:.6}", scored.path.display(), scored.score);
            if scored.score >= options.threshold {
                accepted.push(scored);
            }
        }

        if files.was_cancelled() {
            log::info!("Search cancelled after {} file(s)", outcome.scanned);
            outcome.cancelled = true;
            return Ok(outcome);
        }

        if options.order == RankOrder::Score {
            accepted.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        accepted.truncate(options.max_results);

        log::info!(
            "Scanned {} file(s), skipped {}, kept {}",
            outcome.scanned,
            outcome.skipped,
            accepted.len()
        );

        if !accepted.is_empty() && options.persist_report {
            let report = SearchReport {
                reference: reference.to_path_buf(),
                threshold: options.threshold,
                requested: options.max_results,
                matches: accepted,
            };
            let path = options
                .report_dir
                .join(SearchReport::file_name(Local::now()));
            report
                .write_file(&path)
                .map_err(|source| SearchError::Report {
                    path: path.clone(),
                    source,
                })?;
            log::info!("Similar images logged to {}", path.display());
            outcome.report = Some(path);
            accepted = report.matches;
        }

        outcome.matches = accepted;
        Ok(outcome)
    }
}
