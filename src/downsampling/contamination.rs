//! Per-sample contamination fractions loaded from a two-column table.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Errors raised while loading a contamination table.
#[derive(Debug, Error)]
pub enum ContaminationError {
    /// A line did not hold exactly two non-empty tab-separated columns.
    #[error("line {line}: expected exactly two tab-delimited columns, found {found}")]
    WrongColumnCount {
        /// 1-based line number.
        line: usize,
        /// Number of non-empty columns present.
        found: usize,
    },

    /// The same sample appeared twice.
    #[error("line {line}: duplicate entry for sample {sample}")]
    DuplicateSample {
        /// 1-based line number.
        line: usize,
        /// Sample name.
        sample: String,
    },

    /// The fraction column was not a number.
    #[error("line {line}: unparsable contamination fraction {value:?}")]
    UnparsableFraction {
        /// 1-based line number.
        line: usize,
        /// Raw column text.
        value: String,
    },

    /// The fraction was outside `[0, 1]`.
    #[error("line {line}: contamination fraction {value} must be within [0, 1]")]
    FractionOutOfRange {
        /// 1-based line number.
        line: usize,
        /// Parsed fraction.
        value: f64,
    },

    /// The default fraction was outside `[0, 1]`.
    #[error("default contamination fraction {0} must be within [0, 1]")]
    InvalidDefault(f64),

    /// Reading the table failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Contamination fraction per sample, with a default for unlisted samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ContaminationTable {
    default: f64,
    fractions: HashMap<String, f64>,
}

impl ContaminationTable {
    /// A table with no entries; every sample gets `default`.
    pub fn with_default(default: f64) -> Result<Self, ContaminationError> {
        if !(0.0..=1.0).contains(&default) {
            return Err(ContaminationError::InvalidDefault(default));
        }
        Ok(Self {
            default,
            fractions: HashMap::new(),
        })
    }

    /// Parse `sample<TAB>fraction` lines.
    ///
    /// Lines are trimmed and blank lines skipped. Runs of tabs count as one
    /// separator. When `available_samples` is given, entries for other names
    /// are validated but dropped, and only kept samples are checked for
    /// duplicates.
    pub fn from_reader<B: BufRead>(
        reader: B,
        default: f64,
        available_samples: Option<&HashSet<String>>,
    ) -> Result<Self, ContaminationError> {
        let mut table = Self::with_default(default)?;
        let mut ignored = BTreeSet::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').filter(|f| !f.is_empty()).collect();
            if fields.len() != 2 {
                return Err(ContaminationError::WrongColumnCount {
                    line: line_no,
                    found: fields.len(),
                });
            }
            let (sample, raw) = (fields[0], fields[1]);
            if table.fractions.contains_key(sample) {
                return Err(ContaminationError::DuplicateSample {
                    line: line_no,
                    sample: sample.to_string(),
                });
            }

            let fraction: f64 =
                raw.trim()
                    .parse()
                    .map_err(|_| ContaminationError::UnparsableFraction {
                        line: line_no,
                        value: raw.to_string(),
                    })?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ContaminationError::FractionOutOfRange {
                    line: line_no,
                    value: fraction,
                });
            }

            match available_samples {
                Some(available) if !available.contains(sample) => {
                    ignored.insert(sample.to_string());
                }
                _ => {
                    table.fractions.insert(sample.to_string(), fraction);
                }
            }
        }

        table.log_summary(available_samples, &ignored);
        Ok(table)
    }

    /// Load a table from a file.
    pub fn from_path(
        path: impl AsRef<Path>,
        default: f64,
        available_samples: Option<&HashSet<String>>,
    ) -> Result<Self, ContaminationError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), default, available_samples)
    }

    /// Fraction for `sample`, falling back to the default.
    pub fn fraction_for(&self, sample: &str) -> f64 {
        self.fractions.get(sample).copied().unwrap_or(self.default)
    }

    /// Fraction applied to samples with no entry.
    pub fn default_fraction(&self) -> f64 {
        self.default
    }

    /// Number of samples with an explicit entry.
    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    /// Whether no sample has an explicit entry.
    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Samples with an explicit entry, sorted.
    pub fn samples(&self) -> Vec<&str> {
        let mut samples: Vec<&str> = self.fractions.keys().map(String::as_str).collect();
        samples.sort_unstable();
        samples
    }

    fn log_summary(&self, available: Option<&HashSet<String>>, ignored: &BTreeSet<String>) {
        if !self.is_empty() {
            info!(samples = ?self.samples(), "contamination fractions loaded");
            if let Some(available) = available {
                let missing: BTreeSet<&str> = available
                    .iter()
                    .map(String::as_str)
                    .filter(|s| !self.fractions.contains_key(*s))
                    .collect();
                if !missing.is_empty() {
                    info!(
                        ?missing,
                        default = self.default,
                        "samples without an entry use the default fraction"
                    );
                }
            }
        }
        if !ignored.is_empty() {
            info!(?ignored, "entries for unknown samples ignored");
        }
    }
}
