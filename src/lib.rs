//! Find images under a folder tree whose HSV color histogram resembles a
//! reference image.

pub mod config;
pub mod core;
pub mod diagnostics;

pub use crate::core::cancel::CancellationToken;
pub use crate::core::histogram::{
    compute_signature, HistogramExtractor, ImageSignature, Normalization, SignatureError,
    SIGNATURE_LEN,
};
pub use crate::core::ranker::{
    RankOrder, SearchError, SearchOptions, SearchOutcome, SimilarityRanker,
};
pub use crate::core::report::SearchReport;
pub use crate::core::similarity::{chi_squared, similarity, ScoredMatch};
pub use crate::diagnostics::{Diagnostics, ErrorLog, LogDiagnostics, RecordingDiagnostics};
