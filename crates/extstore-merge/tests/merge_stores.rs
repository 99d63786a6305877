use std::fs;
use std::path::Path;

use extstore_error::ExtError;
use extstore_io::{StoreReader, read_all, write_all};
use extstore_merge::{
    MergeOptions, MergeOutcome, StorePaths, merge_series_file, merge_store_files, merge_stores,
};
use extstore_types::{DatRecord, IdxRecord, build_offsets};
use proptest::prelude::*;

fn dat(pairs: &[(u32, f32)]) -> Vec<DatRecord> {
    pairs
        .iter()
        .map(|&(date, value)| DatRecord::daily(date, value))
        .collect()
}

/// Write a store holding `securities` in the given order.
fn write_store(dir: &Path, name: &str, securities: &[(u16, &str, Vec<DatRecord>)]) -> StorePaths {
    let paths = StorePaths::new(dir.join(format!("{name}.idx")), dir.join(format!("{name}.dat")));
    let idx: Vec<_> = securities
        .iter()
        .map(|(market, code, records)| {
            IdxRecord::new(*market, *code, u32::try_from(records.len()).expect("count"))
        })
        .collect();
    let all: Vec<_> = securities
        .iter()
        .flat_map(|(_, _, records)| records.iter().copied())
        .collect();
    write_all(&paths.idx, &idx).expect("write idx");
    write_all(&paths.dat, &all).expect("write dat");
    paths
}

fn history(paths: &StorePaths, code: &str) -> Vec<DatRecord> {
    StoreReader::open(&paths.idx, &paths.dat)
        .expect("open")
        .history(code)
        .expect("read")
        .expect("listed")
}

#[test]
fn overlapping_security_takes_new_values_from_common_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(
        dir.path(),
        "old",
        &[(0, "000001", dat(&[(20230101, 1.0), (20230102, 2.0), (20230103, 3.0)]))],
    );
    let new = write_store(
        dir.path(),
        "new",
        &[(0, "000001", dat(&[(20230102, 20.0), (20230104, 21.0)]))],
    );
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));

    let report = merge_stores(&old, &new, &out, &MergeOptions::default()).expect("merge");
    assert_eq!(report.securities, 1);
    assert_eq!(report.overlapping, 1);
    assert_eq!(report.total_records, 3);
    assert_eq!(
        history(&out, "000001"),
        dat(&[(20230101, 1.0), (20230102, 20.0), (20230104, 21.0)])
    );
}

#[test]
fn output_is_in_ascending_code_order_with_valid_offsets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(
        dir.path(),
        "old",
        &[
            (1, "600000", dat(&[(1, 1.0), (2, 2.0)])),
            (0, "000001", dat(&[(1, 5.0)])),
        ],
    );
    let new = write_store(
        dir.path(),
        "new",
        &[
            (0, "300750", dat(&[(2, 7.0), (3, 8.0)])),
            (1, "600000", dat(&[(2, 3.0), (3, 4.0)])),
        ],
    );
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    let report = merge_stores(&old, &new, &out, &MergeOptions::default()).expect("merge");
    assert_eq!(report.old_only, 1);
    assert_eq!(report.new_only, 1);
    assert_eq!(report.overlapping, 1);

    let idx = read_all::<IdxRecord>(&out.idx).expect("idx");
    let codes: Vec<_> = idx.iter().map(|r| r.security_code.as_str()).collect();
    assert_eq!(codes, vec!["000001", "300750", "600000"]);
    assert_eq!(idx[2].market_code, 1);

    let all = read_all::<DatRecord>(&out.dat).expect("dat");
    let offsets = build_offsets(&idx);
    assert_eq!(offsets.total_records(), all.len() as u64);
    for entry in offsets.entries() {
        let first = all[usize::try_from(entry.start_offset).expect("offset")];
        let expected = history(&out, &entry.security_code)[0];
        assert_eq!(first, expected);
    }
    assert_eq!(history(&out, "600000"), dat(&[(1, 1.0), (2, 3.0), (3, 4.0)]));
}

#[test]
fn new_only_security_is_capped_at_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0)]))]);
    let long: Vec<_> = (0..650).map(|i| DatRecord::daily(20000000 + i, 0.5)).collect();
    let short = dat(&[(5, 5.0), (6, 6.0)]);
    let new = write_store(
        dir.path(),
        "new",
        &[(0, "000777", long), (0, "000888", short)],
    );
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    let report = merge_stores(&old, &new, &out, &MergeOptions::default()).expect("merge");

    assert_eq!(report.truncated, 1);
    assert_eq!(history(&out, "000777").len(), 500);
    assert_eq!(history(&out, "000888").len(), 2);
}

#[test]
fn merging_a_store_with_itself_is_identity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = write_store(
        dir.path(),
        "s",
        &[
            (0, "000001", dat(&[(1, 1.0), (2, 2.0), (3, 3.0)])),
            (1, "600000", dat(&[(2, 9.0)])),
        ],
    );
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    merge_stores(&store, &store, &out, &MergeOptions::default()).expect("merge");
    assert_eq!(fs::read(&out.idx).expect("idx"), fs::read(&store.idx).expect("idx"));
    assert_eq!(fs::read(&out.dat).expect("dat"), fs::read(&store.dat).expect("dat"));
}

#[test]
fn disjoint_histories_fall_back_to_new() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0), (2, 2.0)]))]);
    let new = write_store(dir.path(), "new", &[(0, "000001", dat(&[(5, 5.0)]))]);
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    let report = merge_stores(&old, &new, &out, &MergeOptions::default()).expect("merge");
    assert_eq!(report.fallbacks, vec!["000001".to_owned()]);
    assert_eq!(history(&out, "000001"), dat(&[(5, 5.0)]));
}

#[test]
fn merge_in_place_over_old_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0), (2, 2.0)]))]);
    let new = write_store(dir.path(), "new", &[(0, "000001", dat(&[(2, 4.0), (3, 6.0)]))]);
    merge_store_files(
        &old.idx,
        &old.dat,
        &new.idx,
        &new.dat,
        &old.idx,
        &old.dat,
        &MergeOptions::default(),
    )
    .expect("merge");
    assert_eq!(history(&old, "000001"), dat(&[(1, 1.0), (2, 4.0), (3, 6.0)]));
}

#[test]
fn inconsistent_input_leaves_destination_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0)]))]);
    let new = write_store(dir.path(), "new", &[(0, "000001", dat(&[(1, 2.0)]))]);
    // IDX claims more records than the DAT holds
    write_all(&new.idx, &[IdxRecord::new(0, "000001", 4)]).expect("corrupt");

    let out = write_store(dir.path(), "out", &[(0, "999999", dat(&[(7, 7.0)]))]);
    let idx_before = fs::read(&out.idx).expect("idx");
    let dat_before = fs::read(&out.dat).expect("dat");

    let err = merge_stores(&old, &new, &out, &MergeOptions::default()).expect_err("inconsistent");
    assert!(matches!(err, ExtError::InconsistentTotals { .. }));
    assert_eq!(fs::read(&out.idx).expect("idx"), idx_before);
    assert_eq!(fs::read(&out.dat).expect("dat"), dat_before);
    // no staging files left behind
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 6);
}

#[test]
fn failed_idx_commit_keeps_destination_dat() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0)]))]);
    let new = write_store(dir.path(), "new", &[(0, "000001", dat(&[(1, 2.0), (2, 3.0)]))]);

    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    write_all(&out.dat, &dat(&[(7, 7.0)])).expect("seed dat");
    // a non-empty directory where the IDX should go makes the IDX rename fail
    fs::create_dir(&out.idx).expect("dir");
    fs::write(out.idx.join("keep"), b"x").expect("fill");
    let dat_before = fs::read(&out.dat).expect("dat");

    merge_stores(&old, &new, &out, &MergeOptions::default()).expect_err("idx blocked");
    assert_eq!(fs::read(&out.dat).expect("dat"), dat_before);
    assert!(out.idx.is_dir());
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 6);
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = write_store(dir.path(), "old", &[(0, "000001", dat(&[(1, 1.0)]))]);
    let new = StorePaths::new(dir.path().join("nope.idx"), dir.path().join("nope.dat"));
    let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));
    let err = merge_stores(&old, &new, &out, &MergeOptions::default()).expect_err("missing");
    assert!(matches!(err, ExtError::FileNotFound { .. }));
    assert!(!out.idx.exists());
    assert!(!out.dat.exists());
}

#[test]
fn flat_series_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("series.dat");
    write_all(&path, &dat(&[(1, 1.0), (2, 2.0), (3, 3.0)])).expect("seed");

    let summary = merge_series_file(
        &path,
        &dat(&[(3, 30.0), (4, 40.0)]),
        &path,
        &MergeOptions { retention_window: 3 },
    )
    .expect("merge");
    assert_eq!(summary.outcome, MergeOutcome::Spliced { boundary: 3 });
    assert!(summary.truncated);
    assert_eq!(summary.records, 3);
    assert_eq!(
        read_all::<DatRecord>(&path).expect("read"),
        dat(&[(2, 2.0), (3, 30.0), (4, 40.0)])
    );
}

fn history_strategy() -> impl Strategy<Value = Vec<DatRecord>> {
    proptest::collection::vec((0u32..40, -100.0f32..100.0), 0..30)
        .prop_map(|points| points.into_iter().map(|(d, v)| DatRecord::daily(d, v)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_merged_store_is_consistent(
        old_a in history_strategy(),
        old_b in history_strategy(),
        new_a in history_strategy(),
        new_c in history_strategy(),
        window in 1usize..25,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = write_store(dir.path(), "old", &[(0, "000002", old_b), (0, "000001", old_a)]);
        let new = write_store(dir.path(), "new", &[(0, "000001", new_a), (1, "600003", new_c)]);
        let out = StorePaths::new(dir.path().join("out.idx"), dir.path().join("out.dat"));

        let report = merge_stores(&old, &new, &out, &MergeOptions { retention_window: window })
            .expect("merge");

        let idx = read_all::<IdxRecord>(&out.idx).expect("idx");
        let all = read_all::<DatRecord>(&out.dat).expect("dat");
        prop_assert_eq!(build_offsets(&idx).total_records(), all.len() as u64);
        prop_assert_eq!(report.total_records, all.len() as u64);

        let mut reader = StoreReader::open(&out.idx, &out.dat).expect("open");
        for record in &idx {
            prop_assert!(record.record_count as usize <= window);
            let records = reader.history(&record.security_code).expect("read").expect("listed");
            prop_assert!(records.windows(2).all(|pair| pair[0].date < pair[1].date));
        }
    }
}
