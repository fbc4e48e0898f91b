//! End-to-end runs of the local statistics against on-disk weights stores.

use approx::assert_relative_eq;
use tempfile::TempDir;

use lisa_algorithms::local::{
    local_g, local_moran, GiParams, LocalMoranParams, SwmSource, WeightsSource,
};
use lisa_core::{SwmHeader, SwmReader, SwmWriter, ValueVector, WeightType};

/// Write a star store: entity 1 is the hub neighboring 2..=5, the arms
/// neighbor the hub, and a tail entity 6 hangs off arm 2.
fn write_star(dir: &TempDir, row_standard: bool) -> std::path::PathBuf {
    let path = dir.path().join("star.swm");
    let header = SwmHeader::new("OID", WeightType::ContiguityEdges, 6, row_standard);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    writer
        .write_entry(1, &[2, 3, 4, 5], &[1.0, 1.0, 1.0, 1.0])
        .unwrap();
    writer.write_entry(2, &[1, 6], &[1.0, 1.0]).unwrap();
    for arm in 3..=5 {
        writer.write_entry(arm, &[1], &[1.0]).unwrap();
    }
    writer.write_entry(6, &[2], &[1.0]).unwrap();
    writer.finish().unwrap();
    path
}

fn star_values() -> ValueVector {
    ValueVector::from_pairs(vec![
        (1, 100.0),
        (2, 1.0),
        (3, 1.0),
        (4, 1.0),
        (5, 1.0),
        (6, 1.0),
    ])
    .unwrap()
}

#[test]
fn gi_star_center_from_store() {
    let dir = TempDir::new().unwrap();
    let path = write_star(&dir, false);

    let mut source = SwmSource::open(&path).unwrap();
    let result = local_g(&star_values(), &mut source, &GiParams::default()).unwrap();

    // Every neighborhood containing the peak runs hot; the tail entity
    // sees only low values and runs cold.
    for i in 0..5 {
        assert!(result.z_scores[i] > 0.0, "entity {i} z={}", result.z_scores[i]);
    }
    assert!(result.z_scores[5] < 0.0);
    assert_eq!(result.diagnostics.num_obs, 6);
    assert_eq!(result.diagnostics.no_neighbor_count, 0);
}

#[test]
fn gi_extreme_chain_end_is_significant() {
    // A 20-entity chain of ones with value 100 at one end: the peak's
    // neighborhood (one neighbor plus itself) concentrates enough mass
    // for z = 3.0, so its analytic p clears 0.05 and it carries the
    // largest z in the run.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chain.swm");
    let header = SwmHeader::new("OID", WeightType::ContiguityEdges, 20, false);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    writer.write_entry(1, &[2], &[1.0]).unwrap();
    for id in 2..=19 {
        writer.write_entry(id, &[id - 1, id + 1], &[1.0, 1.0]).unwrap();
    }
    writer.write_entry(20, &[19], &[1.0]).unwrap();
    writer.finish().unwrap();

    let mut pairs: Vec<_> = (1..=19).map(|id| (id, 1.0)).collect();
    pairs.push((20, 100.0));
    let values = ValueVector::from_pairs(pairs).unwrap();

    let mut source = SwmSource::open(&path).unwrap();
    let result = local_g(&values, &mut source, &GiParams::default()).unwrap();

    let peak = values.order_of(20).unwrap();
    assert_relative_eq!(result.z_scores[peak], 3.0, epsilon = 1e-12);
    assert!(result.p_values[peak] < 0.05);
    for pos in 0..20 {
        if pos != peak {
            assert!(result.z_scores[pos].abs() < result.z_scores[peak]);
        }
    }
    // 99% confidence tier, hot side.
    assert_eq!(result.bins[peak], 3);
}

#[test]
fn gi_row_standardized_store_matches_binary_topology() {
    // Row standardization rescales each row; the three symmetric arms
    // (hub as their only neighbor) must share one z-score.
    let dir = TempDir::new().unwrap();
    let path = write_star(&dir, true);

    let mut source = SwmSource::open(&path).unwrap();
    assert!(source.row_standard());
    let result = local_g(&star_values(), &mut source, &GiParams::default()).unwrap();

    for arm in 3..5 {
        assert_relative_eq!(result.z_scores[arm], result.z_scores[2], epsilon = 1e-12);
    }
    assert!(result.z_scores[2] > 0.0);
    assert!(result.z_scores[5] < 0.0);
}

#[test]
fn stored_standardized_rows_sum_to_one() {
    let dir = TempDir::new().unwrap();
    let path = write_star(&dir, true);

    let mut reader = SwmReader::open(&path).unwrap();
    for entry in reader.entries() {
        let entry = entry.unwrap();
        assert_relative_eq!(entry.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn roundtrip_preserves_weights_bit_for_bit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exact.swm");
    // Values chosen to have no short binary representation.
    let weights = [0.1, 0.2 + 1e-16, std::f64::consts::PI];

    let header = SwmHeader::new("OID", WeightType::InverseDistance, 2, false);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    writer.write_entry(10, &[20, 30, 40], &weights).unwrap();
    writer.write_entry(20, &[10], &[weights[2]]).unwrap();
    writer.finish().unwrap();

    let mut reader = SwmReader::open(&path).unwrap();
    let first = reader.read_entry().unwrap();
    assert_eq!(first.neighbor_ids, vec![20, 30, 40]);
    for (read, written) in first.weights.iter().zip(&weights) {
        assert_eq!(read.to_bits(), written.to_bits());
    }
    let second = reader.read_entry().unwrap();
    assert_eq!(second.weights[0].to_bits(), weights[2].to_bits());
}

#[test]
fn undersized_store_is_rejected_before_reading() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.swm");
    let header = SwmHeader::new("OID", WeightType::ContiguityEdges, 10, false);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    for id in 1..=10 {
        writer.write_entry(id, &[(id % 10) + 1], &[1.0]).unwrap();
    }
    writer.finish().unwrap();

    let values =
        ValueVector::from_pairs((1..=12).map(|id| (id, id as f64)).collect::<Vec<_>>()).unwrap();
    let mut source = SwmSource::open(&path).unwrap();
    let err = local_g(&values, &mut source, &GiParams::default()).unwrap_err();
    assert!(matches!(
        err,
        lisa_core::Error::IncompleteWeights {
            num_obs: 12,
            store_obs: 10
        }
    ));
}

#[test]
fn missing_analysis_entity_is_a_corrupt_store() {
    // The store declares enough records, but one analysis id never
    // appears among them.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gap.swm");
    let header = SwmHeader::new("OID", WeightType::ContiguityEdges, 4, false);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    writer.write_entry(1, &[2], &[1.0]).unwrap();
    writer.write_entry(2, &[1, 3], &[1.0, 1.0]).unwrap();
    writer.write_entry(3, &[2], &[1.0]).unwrap();
    writer.write_entry(99, &[1], &[1.0]).unwrap();
    writer.finish().unwrap();

    let values =
        ValueVector::from_pairs(vec![(1, 5.0), (2, 3.0), (3, 8.0), (4, 1.0)]).unwrap();
    let mut source = SwmSource::open(&path).unwrap();
    let err = local_g(&values, &mut source, &GiParams::default()).unwrap_err();
    assert!(matches!(err, lisa_core::Error::CorruptStore(_)));
}

#[test]
fn analysis_over_a_store_subset() {
    // The store covers ids 1..=8; the analysis uses only 1..=5.
    // Out-of-set neighbors must drop out of each row silently.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subset.swm");
    let header = SwmHeader::new("OID", WeightType::ContiguityEdges, 8, true);
    let mut writer = SwmWriter::create(&path, header).unwrap();
    for id in 1i32..=8 {
        let mut neighbors = Vec::new();
        if id > 1 {
            neighbors.push(id - 1);
        }
        if id < 8 {
            neighbors.push(id + 1);
        }
        let weights = vec![1.0; neighbors.len()];
        writer.write_entry(id, &neighbors, &weights).unwrap();
    }
    writer.finish().unwrap();

    let values =
        ValueVector::from_pairs((1..=5).map(|id| (id, (id * id) as f64)).collect::<Vec<_>>())
            .unwrap();
    let mut source = SwmSource::open(&path).unwrap();
    let result = local_g(&values, &mut source, &GiParams::default()).unwrap();

    assert_eq!(result.diagnostics.num_obs, 5);
    for z in result.z_scores.iter() {
        assert!(z.is_finite());
    }
}

#[test]
fn gi_pseudo_p_with_fdr_binning() {
    let dir = TempDir::new().unwrap();
    let path = write_star(&dir, false);

    let run = |apply_fdr: bool| {
        let mut source = SwmSource::open(&path).unwrap();
        let params = GiParams {
            permutations: Some(199),
            seed: Some(9001),
            apply_fdr,
            ..GiParams::default()
        };
        local_g(&star_values(), &mut source, &params).unwrap()
    };

    let fixed = run(false);
    let corrected = run(true);
    let pseudo = fixed.pseudo_p.as_ref().unwrap();
    for p in pseudo.iter() {
        assert!(*p > 0.0 && *p <= 1.0);
    }
    // The rank correction can only tighten a bin, never widen it.
    for (a, b) in corrected.bins.iter().zip(&fixed.bins) {
        assert!(a.abs() <= b.abs());
    }
}

#[test]
fn moran_from_store_flags_the_center_outlier() {
    // The star center is a high value surrounded by lows: a negative
    // local Moran statistic.
    let dir = TempDir::new().unwrap();
    let path = write_star(&dir, false);

    let mut source = SwmSource::open(&path).unwrap();
    let result = local_moran(&star_values(), &mut source, &LocalMoranParams::default()).unwrap();

    assert!(result.moran_i[0] < 0.0);
    assert!(result.z_scores[0] < 0.0);
    // Arms neighbor the high hub while being low themselves.
    for arm in 1..5 {
        assert!(result.moran_i[arm] < 0.0);
    }
    // The low tail neighbors a low arm: local cohesion.
    assert!(result.moran_i[5] > 0.0);
}
