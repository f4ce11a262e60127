#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
use std::sync::Arc;

use vxdigi_algorithms::{
    ChargeDeposit, ClusterItem, Digitizer, HkSensor, SensorConfig, SizeFilter,
};
use vxdigi_core::{CellIdEncoder, LadderGeometry, DEFAULT_CELL_ID_ENCODING};

fn ladders(count: i32) -> Vec<SensorConfig> {
    (0..count)
        .map(|i| {
            SensorConfig::new()
                .with_ids(i / 4, i % 4)
                .with_dimensions(1.0, 0.5, 0.05)
                .with_pixel_size(0.025, 0.025)
                .with_segments(2, 4)
        })
        .collect()
}

/// Deterministic pseudo-random deposits: a few 2x2 blobs per ladder at
/// staggered times.
fn deposits(configs: &[SensorConfig]) -> Vec<ChargeDeposit> {
    let mut out = Vec::new();
    let mut seed = 17u64;
    for config in configs {
        for _ in 0..5 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let row = ((seed >> 33) % 18) as i32;
            let col = ((seed >> 17) % 38) as i32;
            let time = ((seed >> 45) % 6) as f64 + 0.5;
            for (dr, dc) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                out.push(ChargeDeposit::new(
                    config.layer,
                    config.ladder,
                    row + dr,
                    col + dc,
                    250.0,
                    time,
                ));
            }
        }
    }
    out.reverse();
    out
}

#[test]
fn test_parallel_matches_sequential() {
    let configs = ladders(12);
    let input = deposits(&configs);
    let ticks = 30;

    let mut digitizer = Digitizer::new(&configs, ticks).unwrap();
    let parallel = digitizer.process_event(&input).unwrap();

    let mut sequential = Vec::new();
    for config in &configs {
        let own: Vec<ChargeDeposit> = input
            .iter()
            .filter(|d| d.layer == config.layer && d.ladder == config.ladder)
            .copied()
            .collect();
        let mut sensor = HkSensor::new(config).unwrap();
        sequential.extend(sensor.run_event(&own, ticks).unwrap().hits);
    }

    assert!(!parallel.hits.is_empty());
    assert_eq!(parallel.hits, sequential);
    assert_eq!(parallel.stats.deposits, input.len());
    assert_eq!(parallel.stats.unrouted, 0);
    assert_eq!(parallel.stats.hits, parallel.hits.len());
    assert!(parallel.stats.clusters >= parallel.stats.hits);

    // Same input, same output.
    let again = digitizer.process_event(&input).unwrap();
    assert_eq!(again, parallel);
}

#[test]
fn test_hits_are_tagged_with_their_ladder() {
    let configs = ladders(8);
    let mut digitizer = Digitizer::new(&configs, 20).unwrap();
    let input = vec![
        ChargeDeposit::new(1, 2, 4, 4, 600.0, 0.0),
        ChargeDeposit::new(0, 3, 15, 30, 600.0, 1.0),
    ];
    let output = digitizer.process_event(&input).unwrap();
    assert_eq!(output.hits.len(), 2);

    let decoder = CellIdEncoder::parse(DEFAULT_CELL_ID_ENCODING).unwrap();
    let ids: Vec<(i64, i64, i64)> = output
        .hits
        .iter()
        .map(|hit| {
            (
                decoder.decode(hit.cell_id, "layer").unwrap(),
                decoder.decode(hit.cell_id, "module").unwrap(),
                decoder.decode(hit.cell_id, "sensor").unwrap(),
            )
        })
        .collect();
    // Sensor order: ladder 0/3 comes before 1/2. Tiles are 10x10.
    assert_eq!(ids, vec![(0, 3, 7), (1, 2, 0)]);
}

#[test]
fn test_shared_processor() {
    let configs = ladders(4);
    let filter = Arc::new(SizeFilter {
        min_cluster_size: 2,
        max_cluster_size: None,
    });
    let mut digitizer = Digitizer::with_processor(&configs, 20, filter).unwrap();
    let input = vec![
        ChargeDeposit::new(0, 0, 3, 3, 500.0, 0.0),
        ChargeDeposit::new(0, 1, 3, 3, 500.0, 0.0),
        ChargeDeposit::new(0, 1, 3, 4, 500.0, 0.0),
    ];
    let output = digitizer.process_event(&input).unwrap();
    assert_eq!(output.stats.clusters, 2);
    assert_eq!(output.hits.len(), 1);
    assert_eq!(output.hits[0].size, 2);

    // Closures work as processors too.
    let keep_first = |cluster: ClusterItem, _: &LadderGeometry| {
        let mut cluster = cluster;
        cluster.pixels.truncate(1);
        vec![cluster]
    };
    let mut digitizer = Digitizer::with_processor(&configs, 20, Arc::new(keep_first)).unwrap();
    let output = digitizer.process_event(&input).unwrap();
    assert_eq!(output.hits.len(), 2);
    assert!(output.hits.iter().all(|hit| hit.size == 1));
}
