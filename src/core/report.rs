use crate::core::similarity::ScoredMatch;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parameters and accepted matches of one search, written once as a text file.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub reference: PathBuf,
    pub threshold: f64,
    /// Number of matches that was asked for, not how many were found.
    pub requested: usize,
    pub matches: Vec<ScoredMatch>,
}

impl SearchReport {
    /// `similar-images-<DD-MM-YYYY_HH-MM-SS>.txt`
    pub fn file_name(at: DateTime<Local>) -> String {
        format!("similar-images-{}.txt", at.format("%d-%m-%Y_%H-%M-%S"))
    }

    /// Write into `dir` using the current local time for the file name.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        self.write_at(dir, Local::now())
    }

    pub fn write_at(&self, dir: &Path, at: DateTime<Local>) -> std::io::Result<PathBuf> {
        let path = dir.join(Self::file_name(at));
        self.write_file(&path)?;
        Ok(path)
    }

    /// Create (or truncate) `path` and write the report into it.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "{}", self)?;
        out.flush()
    }
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input image: {}", self.reference.display())?;
        writeln!(f, "Threshold: {:?}", self.threshold)?;
        writeln!(f, "Number of similar images: {}", self.requested)?;
        writeln!(f)?;
        writeln!(f, "Similar images:")?;
        for (i, m) in self.matches.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, m.path.display())?;
        }
        Ok(())
    }
}
