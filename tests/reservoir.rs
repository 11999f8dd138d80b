use std::collections::HashSet;

use readcap::downsampling::{Downsampler, FractionalDownsampler, ReservoirDownsampler};

#[test]
fn inclusion_frequency_is_uniform() {
    let (k, n, runs) = (5usize, 20usize, 4000u64);
    let mut inclusions = vec![0usize; n];

    for seed in 0..runs {
        let mut downsampler =
            ReservoirDownsampler::<usize>::with_seed(k, seed).expect("positive size");
        downsampler.submit_all((0..n).collect()).expect("submission");
        let sample = downsampler.consume_finalized_items();
        assert_eq!(sample.len(), k);
        for item in sample {
            inclusions[item] += 1;
        }
    }

    let expected = runs as f64 * k as f64 / n as f64;
    for (item, &count) in inclusions.iter().enumerate() {
        let deviation = (count as f64 - expected).abs();
        assert!(
            deviation < 150.0,
            "item {item} included {count} times, expected about {expected}"
        );
    }
}

#[test]
fn small_streams_are_kept_whole() {
    for n in 0..=8usize {
        let mut downsampler =
            ReservoirDownsampler::<usize>::with_seed(8, 1).expect("positive size");
        downsampler.submit_all((0..n).collect()).expect("submission");
        assert_eq!(downsampler.number_of_discarded_items(), 0);
        assert!(!downsampler.has_pending_items());

        let kept: HashSet<usize> = downsampler.consume_finalized_items().into_iter().collect();
        assert_eq!(kept, (0..n).collect());
    }
}

#[test]
fn draining_restarts_the_stream() {
    let mut downsampler = ReservoirDownsampler::with_seed(3, 9).expect("positive size");
    downsampler.submit_all((0..10).collect()).expect("submission");
    assert_eq!(downsampler.consume_finalized_items().len(), 3);
    assert_eq!(downsampler.items_seen(), 0);

    downsampler.submit_all(vec![100, 101, 102]).expect("submission");
    assert_eq!(downsampler.consume_finalized_items(), vec![100, 101, 102]);
    assert_eq!(downsampler.number_of_discarded_items(), 7);
}

#[test]
fn zero_size_is_invalid() {
    assert!(ReservoirDownsampler::<u32>::with_seed(0, 1).is_err());
}

#[test]
fn fractional_extremes() {
    let mut none = FractionalDownsampler::with_seed(0.0, 5).expect("valid fraction");
    none.submit_all((0..500).collect::<Vec<u32>>())
        .expect("submission");
    assert_eq!(none.number_of_discarded_items(), 500);
    assert!(!none.has_finalized_items());

    let mut all = FractionalDownsampler::with_seed(1.0, 5).expect("valid fraction");
    all.submit_all((0..500).collect::<Vec<u32>>())
        .expect("submission");
    assert_eq!(all.number_of_discarded_items(), 0);
    assert_eq!(all.consume_finalized_items().len(), 500);
}
