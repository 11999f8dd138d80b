#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use readcap::genomics::AlignedRead;

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("READCAP_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set READCAP_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// `count` reads starting at `start` on contig 0, each covering `length` bases.
pub fn stack_of_identical_reads(count: usize, start: u32, length: u32) -> Vec<AlignedRead> {
    (0..count)
        .map(|i| AlignedRead::new(format!("s{start}l{length}r{i}"), 0, start, start + length - 1))
        .collect()
}

/// Half the reads cover `first_length` bases, the other half `second_length`.
pub fn stack_of_varying_reads(
    count: usize,
    start: u32,
    first_length: u32,
    second_length: u32,
) -> Vec<AlignedRead> {
    let mut stack = stack_of_identical_reads(count / 2, start, first_length);
    stack.extend(stack_of_identical_reads(count / 2, start, second_length));
    stack
}

/// Sizes of consecutive same-start runs, asserting the reads are sorted.
pub fn stack_sizes_verifying_sortedness(reads: &[AlignedRead]) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut iter = reads.iter();
    let Some(mut previous) = iter.next() else {
        return sizes;
    };
    let mut current = 1;

    for read in iter {
        let key = (read.contig, read.start);
        let previous_key = (previous.contig, previous.start);
        assert!(key >= previous_key, "reads out of order: {previous:?} then {read:?}");
        if key > previous_key {
            sizes.push(current);
            current = 1;
        } else {
            current += 1;
        }
        previous = read;
    }
    sizes.push(current);
    sizes
}

/// Number of reads covering `position` on contig 0.
pub fn coverage_at(reads: &[AlignedRead], position: u32) -> usize {
    reads
        .iter()
        .filter(|r| r.contig == Some(0) && r.start <= position && r.end >= position)
        .count()
}

/// Maximum per-locus coverage over contig 0.
pub fn max_coverage(reads: &[AlignedRead]) -> usize {
    let Some(last) = reads.iter().filter(|r| r.contig == Some(0)).map(|r| r.end).max() else {
        return 0;
    };
    let mut depth = vec![0i64; last as usize + 2];
    for read in reads.iter().filter(|r| r.contig == Some(0)) {
        depth[read.start as usize] += 1;
        depth[read.end as usize + 1] -= 1;
    }
    let mut running = 0i64;
    let mut max = 0i64;
    for delta in depth {
        running += delta;
        max = max.max(running);
    }
    max as usize
}
