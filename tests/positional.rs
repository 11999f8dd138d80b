mod common;

use common::{
    coverage_at, max_coverage, stack_of_identical_reads, stack_of_varying_reads,
    stack_sizes_verifying_sortedness,
};
use proptest::prelude::*;
use readcap::downsampling::{Downsampler, DownsamplingError, PositionalDownsampler};
use readcap::genomics::AlignedRead;

fn downsampler(target: usize) -> PositionalDownsampler<AlignedRead> {
    PositionalDownsampler::with_seed(target, 0x5eed).expect("positive target")
}

fn finish(mut downsampler: PositionalDownsampler<AlignedRead>) -> Vec<AlignedRead> {
    downsampler.signal_end_of_input();
    assert!(downsampler.has_finalized_items());
    assert!(!downsampler.has_pending_items());
    downsampler.consume_finalized_items()
}

#[test]
fn three_overlapping_identical_stacks() {
    let mut ds = downsampler(1000);
    for start in [1, 25, 50] {
        ds.submit_all(stack_of_identical_reads(1500, start, 100))
            .expect("sorted input");
        assert!(!ds.has_finalized_items());
        assert!(ds.has_pending_items());
    }

    let sizes = stack_sizes_verifying_sortedness(&finish(ds));
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s <= 1000));
    assert!(sizes.iter().sum::<usize>() <= 1000);
}

#[test]
fn three_non_overlapping_identical_stacks() {
    let mut ds = downsampler(1000);
    ds.submit_all(stack_of_identical_reads(1500, 1, 100))
        .expect("sorted input");
    assert!(!ds.has_finalized_items());
    ds.submit_all(stack_of_identical_reads(1500, 201, 100))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 301, 100))
        .expect("sorted input");
    assert!(ds.has_finalized_items());
    assert!(ds.has_pending_items());

    let kept = finish(ds);
    assert_eq!(stack_sizes_verifying_sortedness(&kept), vec![1000, 1000, 1000]);
}

#[test]
fn short_stack_at_beginning() {
    let mut ds = downsampler(1000);
    ds.submit_all(stack_of_identical_reads(1500, 1, 25))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 20, 100))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 50, 100))
        .expect("sorted input");

    let sizes = stack_sizes_verifying_sortedness(&finish(ds));
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s <= 1000));
    assert!(sizes[0] + sizes[1] <= 1000);
    assert!(sizes[1] + sizes[2] <= 1000);
}

#[test]
fn short_stack_in_middle() {
    let mut ds = downsampler(1000);
    ds.submit_all(stack_of_identical_reads(1500, 1, 100))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 25, 25))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 75, 100))
        .expect("sorted input");
    assert!(!ds.has_finalized_items(), "first stack still reaches position 75");

    let sizes = stack_sizes_verifying_sortedness(&finish(ds));
    assert_eq!(sizes.len(), 3);
    assert!(sizes[0] + sizes[1] <= 1000);
    assert!(sizes[0] + sizes[2] <= 1000);
}

#[test]
fn short_stack_at_end() {
    let mut ds = downsampler(1000);
    ds.submit_all(stack_of_identical_reads(1500, 1, 100))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 50, 100))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(1500, 135, 25))
        .expect("sorted input");

    let sizes = stack_sizes_verifying_sortedness(&finish(ds));
    assert_eq!(sizes.len(), 3);
    assert!(sizes[0] + sizes[1] <= 1000);
    assert!(sizes[1] + sizes[2] <= 1000);
}

#[test]
fn partially_overlapping_stacks_bound_per_locus_coverage() {
    let mut ds = downsampler(1000);
    ds.submit_all(stack_of_varying_reads(2000, 1, 100, 50))
        .expect("sorted input");
    ds.submit_all(stack_of_varying_reads(2000, 75, 100, 50))
        .expect("sorted input");
    ds.submit_all(stack_of_identical_reads(2000, 150, 100))
        .expect("sorted input");

    let kept = finish(ds);
    let sizes = stack_sizes_verifying_sortedness(&kept);
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s <= 1000));
    for position in [1, 50, 75, 100, 150, 174, 249] {
        assert!(coverage_at(&kept, position) <= 1000, "position {position}");
    }
}

#[test]
fn no_downsampling_required() {
    let mut ds = downsampler(1000);
    for start in [1, 25, 50] {
        ds.submit_all(stack_of_identical_reads(300, start, 100))
            .expect("sorted input");
    }
    let kept = finish(ds);
    assert_eq!(stack_sizes_verifying_sortedness(&kept), vec![300, 300, 300]);
}

#[test]
fn reads_of_varying_length_at_one_start() {
    let mut ds = downsampler(1000);
    let reads: Vec<AlignedRead> = (0..10)
        .map(|i| AlignedRead::new(format!("r{i}"), 0, 10, 10 + 20 * i + 9))
        .collect();
    ds.submit_all(reads).expect("sorted input");
    assert_eq!(finish(ds).len(), 10);
}

#[test]
fn disjoint_single_base_reads_are_never_discarded() {
    let mut ds = downsampler(10);
    for i in 0..1000 {
        ds.submit(AlignedRead::new(format!("r{i}"), 0, i, i))
            .expect("sorted input");
    }
    ds.signal_end_of_input();
    assert_eq!(ds.number_of_discarded_items(), 0);
    assert_eq!(ds.consume_finalized_items().len(), 1000);
}

#[test]
fn fully_overlapping_reads_are_capped() {
    let mut ds = downsampler(10);
    for i in 0..1000 {
        ds.submit(AlignedRead::new(format!("r{i}"), 0, 0, 1000))
            .expect("sorted input");
    }
    ds.signal_end_of_input();
    assert_eq!(ds.number_of_discarded_items(), 990);
    assert_eq!(ds.consume_finalized_items().len(), 10);
}

#[test]
fn more_overlapping_stacks_than_target_each_keep_a_read() {
    let mut ds = downsampler(10);
    for start in 0..30u32 {
        ds.submit_all(stack_of_identical_reads(20, start, 501 - start))
            .expect("sorted input");
    }
    ds.signal_end_of_input();
    let discarded = ds.number_of_discarded_items();
    let kept = ds.consume_finalized_items();

    let sizes = stack_sizes_verifying_sortedness(&kept);
    assert_eq!(sizes.len(), 30, "every start survives");
    assert!(sizes.iter().all(|&s| s >= 1));
    assert!(kept.iter().all(|r| r.end == 500));
    assert_eq!(kept.len() + discarded, 30 * 20);
}

#[test]
fn contig_change_finalizes_everything_behind() {
    let mut ds = downsampler(5);
    ds.submit_all(stack_of_identical_reads(20, 100, 1000))
        .expect("sorted input");
    ds.submit(AlignedRead::new("next-contig", 1, 0, 50))
        .expect("sorted input");
    assert_eq!(ds.num_open_groups(), 0);
    assert_eq!(ds.consume_finalized_items().len(), 5);
}

#[test]
fn unmapped_reads_follow_mapped_reads_untouched() {
    let mut ds = downsampler(5);
    ds.submit_all(stack_of_identical_reads(20, 1, 100))
        .expect("sorted input");
    for i in 0..50 {
        ds.submit(AlignedRead::unmapped(format!("u{i}")))
            .expect("sorted input");
    }
    let kept = finish(ds);
    assert_eq!(kept.len(), 55);
    assert!(kept[5..].iter().all(|r| r.contig.is_none()));

    let mut ds = downsampler(5);
    ds.submit(AlignedRead::unmapped("u")).expect("first read");
    let err = ds
        .submit(AlignedRead::new("late", 0, 1, 10))
        .expect_err("mapped read after unmapped");
    assert!(matches!(err, DownsamplingError::OutOfOrderSubmission { .. }));
}

#[test]
fn clear_and_reset() {
    let mut ds = downsampler(5);
    ds.submit_all(stack_of_identical_reads(20, 1, 100))
        .expect("sorted input");
    ds.submit(AlignedRead::new("a", 0, 500, 600))
        .expect("sorted input");
    assert_eq!(ds.number_of_discarded_items(), 15);

    ds.reset();
    assert_eq!(ds.number_of_discarded_items(), 0);
    assert!(ds.has_finalized_items());

    ds.clear();
    assert!(!ds.has_finalized_items());
    assert!(!ds.has_pending_items());
    ds.submit(AlignedRead::new("b", 0, 1, 10))
        .expect("cleared downsampler accepts any position");
}

proptest! {
    #[test]
    fn coverage_never_exceeds_target(
        layout in proptest::collection::vec((0u32..30, 1usize..60, 1u32..80), 1..10),
        seed in any::<u64>(),
    ) {
        let target = 20;
        let mut starts: Vec<(u32, usize, u32)> = layout;
        starts.sort_by_key(|&(start, _, _)| start);

        let mut ds = PositionalDownsampler::with_seed(target, seed).expect("positive target");
        let mut submitted = 0;
        for (start, count, length) in starts {
            ds.submit_all(stack_of_identical_reads(count, start, length)).expect("sorted input");
            submitted += count;
        }
        ds.signal_end_of_input();
        let kept = ds.consume_finalized_items();

        prop_assert_eq!(kept.len() + ds.number_of_discarded_items(), submitted);
        prop_assert!(max_coverage(&kept) <= target);
        stack_sizes_verifying_sortedness(&kept);
    }
}
