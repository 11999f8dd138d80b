use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use readcap::downsampling::{
    create_allele_biased_pileup, create_rng, ContaminationTable, DownsampleType,
    DownsamplingMethod, PerSampleDownsamplingReadsIterator, PositionalDownsamplerFactory,
    TraversalKind,
};
use readcap::genomics::{AlignedRead, PileupElement, ReadBackedPileup};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "readcap", about = "Bounded-coverage read downsampling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Downsample a synthetic coordinate-sorted read stream and report coverage.
    Simulate {
        /// Number of alignment starts.
        #[arg(long, default_value_t = 100)]
        stacks: u32,
        /// Reads per start, per sample.
        #[arg(long, default_value_t = 500)]
        reads_per_stack: usize,
        /// Reference bases covered by each read.
        #[arg(long, default_value_t = 100)]
        read_length: u32,
        /// Distance between consecutive starts.
        #[arg(long, default_value_t = 25)]
        spacing: u32,
        /// Number of samples in the stream.
        #[arg(long, default_value_t = 1)]
        samples: usize,
        /// Grouping: NONE, BY_SAMPLE or ALL_READS.
        #[arg(long = "downsampling-type")]
        kind: Option<DownsampleType>,
        /// Coverage target.
        #[arg(long)]
        dcov: Option<usize>,
        /// Retention fraction.
        #[arg(long)]
        dfrac: Option<f64>,
        /// Traversal whose safety checks apply.
        #[arg(long, value_enum, default_value_t = Traversal::Reads)]
        traversal: Traversal,
        /// Level overlapping stacks instead of capping each start alone.
        #[arg(long)]
        leveling: bool,
        /// Seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Remove a contamination fraction from a single-locus pileup.
    AlleleBias {
        /// Observed bases at the locus, e.g. `AAAAAAAAAAAAAAAAAAGG`.
        bases: String,
        /// Contamination fraction to remove.
        #[arg(long, conflicts_with = "contamination_file")]
        fraction: Option<f64>,
        /// Tab-separated `sample<TAB>fraction` table.
        #[arg(long, requires = "sample")]
        contamination_file: Option<PathBuf>,
        /// Sample to look up in the contamination table.
        #[arg(long)]
        sample: Option<String>,
        /// Seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Traversal {
    Locus,
    Reads,
}

impl From<Traversal> for TraversalKind {
    fn from(traversal: Traversal) -> Self {
        match traversal {
            Traversal::Locus => TraversalKind::Locus,
            Traversal::Reads => TraversalKind::Reads,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            stacks,
            reads_per_stack,
            read_length,
            spacing,
            samples,
            kind,
            dcov,
            dfrac,
            traversal,
            leveling,
            seed,
        } => {
            let layout = StackLayout {
                stacks,
                reads_per_stack,
                read_length,
                spacing,
                samples,
            };
            run_simulate(layout, kind, dcov, dfrac, traversal.into(), leveling, seed)?
        }
        Commands::AlleleBias {
            bases,
            fraction,
            contamination_file,
            sample,
            seed,
        } => run_allele_bias(&bases, fraction, contamination_file, sample, seed)?,
    }

    Ok(())
}

struct StackLayout {
    stacks: u32,
    reads_per_stack: usize,
    read_length: u32,
    spacing: u32,
    samples: usize,
}

impl StackLayout {
    /// Coordinates stay below `span`, so callers check that first.
    fn reads(&self) -> impl Iterator<Item = AlignedRead> + 'static {
        let sample_names: Vec<Arc<str>> = (0..self.samples)
            .map(|s| Arc::from(format!("sample{s}")))
            .collect();
        let (reads_per_stack, read_length, spacing) =
            (self.reads_per_stack, self.read_length, self.spacing);

        (0..self.stacks).flat_map(move |stack| {
            let start = stack * spacing;
            let sample_names = sample_names.clone();
            sample_names.into_iter().flat_map(move |sample| {
                (0..reads_per_stack).map(move |i| {
                    AlignedRead::new(
                        format!("{sample}:{stack}:{i}"),
                        0,
                        start,
                        start + read_length - 1,
                    )
                    .with_sample(Arc::clone(&sample))
                })
            })
        })
    }

    fn total_reads(&self) -> Result<usize> {
        (self.stacks as usize)
            .checked_mul(self.samples)
            .and_then(|n| n.checked_mul(self.reads_per_stack))
            .context("total read count overflows")
    }

    /// One past the last covered base. Bounds every coordinate `reads` produces.
    fn span(&self) -> Result<usize> {
        let span = self
            .stacks
            .saturating_sub(1)
            .checked_mul(self.spacing)
            .and_then(|last_start| last_start.checked_add(self.read_length));
        match span {
            Some(span) => Ok(span as usize),
            None => bail!(
                "{} stacks spaced {} apart with reads of length {} overflow the coordinate range",
                self.stacks,
                self.spacing,
                self.read_length
            ),
        }
    }
}

fn run_simulate(
    layout: StackLayout,
    kind: Option<DownsampleType>,
    dcov: Option<usize>,
    dfrac: Option<f64>,
    traversal: TraversalKind,
    leveling: bool,
    seed: Option<u64>,
) -> Result<()> {
    if layout.read_length == 0 || layout.samples == 0 {
        bail!("read length and sample count must be positive");
    }
    let span = layout.span()?;
    let total_reads = layout.total_reads()?;

    let method = if kind.is_none() && dcov.is_none() && dfrac.is_none() {
        DownsamplingMethod::default_for(traversal)
    } else {
        DownsamplingMethod::new(kind, dcov, dfrac).context("invalid downsampling arguments")?
    };
    method
        .check_compatibility(traversal)
        .context("downsampling method is unsafe for this traversal")?;
    info!(%method, reads = total_reads, "simulating");

    let sample_of = |read: &AlignedRead| Arc::clone(&read.sample);
    let survivors: Vec<AlignedRead> = match (leveling, method.to_coverage()) {
        (true, Some(coverage)) => {
            let by_sample = method.kind() == DownsampleType::BySample;
            let group_of = move |read: &AlignedRead| {
                if by_sample {
                    Arc::clone(&read.sample)
                } else {
                    Arc::from("")
                }
            };
            let factory = PositionalDownsamplerFactory::new(coverage, seed)?;
            PerSampleDownsamplingReadsIterator::new(layout.reads(), group_of, factory)
                .collect::<Result<_, _>>()
                .context("downsampling failed")?
        }
        (true, None) => bail!("--leveling requires a coverage target"),
        (false, _) => method
            .apply(layout.reads(), sample_of, seed)?
            .collect::<Result<_, _>>()
            .context("downsampling failed")?,
    };

    let mut depth = vec![0i64; span + 1];
    for read in &survivors {
        depth[read.start as usize] += 1;
        depth[read.end as usize + 1] -= 1;
    }
    let max_depth = depth
        .iter()
        .scan(0i64, |running, delta| {
            *running += delta;
            Some(*running)
        })
        .max()
        .unwrap_or(0);

    println!("method\t{method}");
    println!("reads\t{total_reads}");
    println!("kept\t{}", survivors.len());
    println!("discarded\t{}", total_reads - survivors.len());
    println!("max_depth\t{max_depth}");
    Ok(())
}

fn run_allele_bias(
    bases: &str,
    fraction: Option<f64>,
    contamination_file: Option<PathBuf>,
    sample: Option<String>,
    seed: Option<u64>,
) -> Result<()> {
    let fraction = match (fraction, contamination_file, sample) {
        (Some(fraction), _, _) => fraction,
        (None, Some(path), Some(sample)) => {
            let available: HashSet<String> = [sample.clone()].into_iter().collect();
            let table = ContaminationTable::from_path(&path, 0.0, Some(&available))
                .with_context(|| format!("failed to load contamination table {}", path.display()))?;
            table.fraction_for(&sample)
        }
        _ => bail!("either --fraction or --contamination-file with --sample is required"),
    };

    let elements = bases
        .bytes()
        .enumerate()
        .map(|(i, base)| {
            PileupElement::new(AlignedRead::new(format!("r{i}"), 0, 0, 0), 0, base, 30)
        })
        .collect();
    let pileup = ReadBackedPileup::new(0, 0, elements);
    let before = pileup.base_counts();

    let mut rng = create_rng(seed);
    let result = create_allele_biased_pileup(pileup, fraction, &mut rng);
    let after = result.base_counts();

    println!("fraction\t{fraction}");
    for (base, (b, a)) in ["A", "C", "G", "T"].iter().zip(before.iter().zip(after.iter())) {
        println!("{base}\t{b}\t{a}");
    }
    println!("depth\t{}", result.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(stacks: u32, spacing: u32, read_length: u32) -> StackLayout {
        StackLayout {
            stacks,
            reads_per_stack: 2,
            read_length,
            spacing,
            samples: 1,
        }
    }

    #[test]
    fn span_covers_the_last_read() {
        let layout = layout(4, 25, 100);
        assert_eq!(layout.span().unwrap(), 175);
        let last_end = layout.reads().map(|r| r.end).max().unwrap();
        assert_eq!(last_end as usize, 174);
        assert_eq!(layout.total_reads().unwrap(), 8);
    }

    #[test]
    fn oversized_layouts_are_rejected() {
        assert!(layout(u32::MAX, 2, 100).span().is_err());
        assert!(layout(2, u32::MAX, 1).span().is_err());
        assert!(layout(1, 0, u32::MAX).span().is_ok());
        assert!(layout(2, 1, u32::MAX).span().is_err());
    }
}
