//! Read access to one IDX + DAT pair.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use extstore_error::{ExtError, Result};
use extstore_types::{
    DatRecord, IdxRecord, OffsetEntry, OffsetIndex, build_offsets, check_layouts,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::random_access::RangeReader;
use crate::sequential::read_all;

/// One security's value on a given date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossSectionRow {
    pub security_code: String,
    pub market_code: u16,
    pub time: u32,
    pub value: f32,
}

/// An opened store: the IDX listing in memory, the DAT file behind a
/// [`RangeReader`].
///
/// Opening checks that the IDX counts add up to the number of complete DAT
/// records; a pair that disagrees is rejected.
#[derive(Debug)]
pub struct StoreReader {
    idx_path: PathBuf,
    idx: Vec<IdxRecord>,
    offsets: OffsetIndex,
    dat: RangeReader<DatRecord>,
}

impl StoreReader {
    pub fn open(idx_path: impl AsRef<Path>, dat_path: impl AsRef<Path>) -> Result<Self> {
        check_layouts()?;
        let idx_path = idx_path.as_ref();
        let idx = read_all::<IdxRecord>(idx_path)?;
        let offsets = build_offsets(&idx);
        let dat = RangeReader::<DatRecord>::open(dat_path)?;

        let declared = offsets.total_records();
        let present = dat.record_count();
        if declared != present {
            return Err(ExtError::inconsistent(format!(
                "{} declares {declared} records, {} holds {present}",
                idx_path.display(),
                dat.path().display()
            )));
        }
        info!(
            idx = %idx_path.display(),
            dat = %dat.path().display(),
            securities = idx.len(),
            records = present,
            "store opened"
        );
        Ok(Self {
            idx_path: idx_path.to_path_buf(),
            idx,
            offsets,
            dat,
        })
    }

    #[must_use]
    pub fn idx_path(&self) -> &Path {
        &self.idx_path
    }

    #[must_use]
    pub fn dat_path(&self) -> &Path {
        self.dat.path()
    }

    #[must_use]
    pub fn idx_records(&self) -> &[IdxRecord] {
        &self.idx
    }

    #[must_use]
    pub const fn offsets(&self) -> &OffsetIndex {
        &self.offsets
    }

    /// IDX entries with their start offsets, in file order.
    #[must_use]
    pub fn entries(&self) -> &[OffsetEntry] {
        self.offsets.entries()
    }

    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.offsets.total_records()
    }

    /// Records for `security_code`, or `None` if the IDX does not list it.
    pub fn history(&mut self, security_code: &str) -> Result<Option<Vec<DatRecord>>> {
        let Some(entry) = self.offsets.get(security_code) else {
            debug!(security_code, "security not in IDX");
            return Ok(None);
        };
        let (start, count) = (entry.start_offset, u64::from(entry.record_count));
        self.dat.read_range(start, count).map(Some)
    }

    /// Histories for several codes, keyed by code. Unknown codes are skipped.
    pub fn histories<I, S>(&mut self, codes: I) -> Result<BTreeMap<String, Vec<DatRecord>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = BTreeMap::new();
        for code in codes {
            let code = code.as_ref();
            match self.history(code)? {
                Some(records) => {
                    out.insert(code.to_owned(), records);
                }
                None => warn!(security_code = code, "skipping code missing from IDX"),
            }
        }
        Ok(out)
    }

    /// Every security's first record dated `date`, highest value first.
    pub fn cross_section(&mut self, date: u32) -> Result<Vec<CrossSectionRow>> {
        let blocks: Vec<_> = self
            .offsets
            .codes()
            .filter_map(|code| self.offsets.get(code))
            .map(|entry| {
                (
                    entry.security_code.clone(),
                    entry.market_code,
                    entry.start_offset,
                    u64::from(entry.record_count),
                )
            })
            .collect();

        let mut rows = Vec::new();
        for (security_code, market_code, start, count) in blocks {
            let records = self.dat.read_range(start, count)?;
            if let Some(hit) = records.iter().find(|record| record.date == date) {
                rows.push(CrossSectionRow {
                    security_code,
                    market_code,
                    time: hit.time,
                    value: hit.value,
                });
            }
        }
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        debug!(date, rows = rows.len(), "cross section built");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequential::write_all;

    fn seed(dir: &Path) -> (PathBuf, PathBuf) {
        let idx_path = dir.join("x.idx");
        let dat_path = dir.join("x.dat");
        write_all(
            &idx_path,
            &[
                IdxRecord::new(0, "000001", 2),
                IdxRecord::new(1, "600000", 3),
                IdxRecord::new(0, "000002", 1),
            ],
        )
        .expect("idx");
        write_all(
            &dat_path,
            &[
                DatRecord::daily(20230101, 1.0),
                DatRecord::daily(20230102, 2.0),
                DatRecord::daily(20230101, 5.0),
                DatRecord::daily(20230102, 6.0),
                DatRecord::daily(20230103, 7.0),
                DatRecord::daily(20230102, 9.0),
            ],
        )
        .expect("dat");
        (idx_path, dat_path)
    }

    #[test]
    fn history_by_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (idx, dat) = seed(dir.path());
        let mut store = StoreReader::open(&idx, &dat).expect("open");
        assert_eq!(store.total_records(), 6);

        let history = store.history("600000").expect("read").expect("listed");
        let dates: Vec<_> = history.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![20230101, 20230102, 20230103]);
        assert!(store.history("999999").expect("read").is_none());
    }

    #[test]
    fn histories_skip_unknown_codes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (idx, dat) = seed(dir.path());
        let mut store = StoreReader::open(&idx, &dat).expect("open");
        let map = store
            .histories(["000002", "nope", "000001"])
            .expect("read");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["000001", "000002"]);
        assert_eq!(map["000002"], vec![DatRecord::daily(20230102, 9.0)]);
    }

    #[test]
    fn cross_section_sorted_by_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (idx, dat) = seed(dir.path());
        let mut store = StoreReader::open(&idx, &dat).expect("open");
        let rows = store.cross_section(20230102).expect("cross");
        let codes: Vec<_> = rows.iter().map(|r| r.security_code.as_str()).collect();
        assert_eq!(codes, vec!["000002", "600000", "000001"]);
        assert!(store.cross_section(19990101).expect("cross").is_empty());
    }

    #[test]
    fn mismatched_totals_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (idx, dat) = seed(dir.path());
        write_all(&idx, &[IdxRecord::new(0, "000001", 7)]).expect("rewrite");
        let err = StoreReader::open(&idx, &dat).expect_err("totals differ");
        assert!(matches!(err, ExtError::InconsistentTotals { .. }));
    }
}
