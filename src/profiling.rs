//! Categorical column profiling for feature encoding.
//!
//! Scans a training CSV once and stores the distinct values of each listed
//! column as a bincode-encoded `BTreeSet<String>` named `<column>.bin`.

use crate::prelude::*;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type ValueSet = BTreeSet<String>;

pub const FEATURES: [&str; 11] = [
    "click",
    "C1",
    "C15",
    "C16",
    "C18",
    "C20",
    "banner_pos",
    "site_category",
    "app_category",
    "device_type",
    "device_conn_type",
];

pub const HOUR_FEATURE: &str = "hour";
pub const OUTPUT_DIR: &str = "sets";

/// Rows held in memory at once while scanning.
pub const CHUNK_ROWS: usize = 65_536;

/// Distinct raw values of every column in `columns`.
///
/// Fails with [`NNError::MissingColumn`] on the first column absent from the header.
pub fn unique_values<R: std::io::Read>(
    reader: csv::Reader<R>,
    columns: &[&str],
) -> Result<BTreeMap<String, ValueSet>> {
    unique_values_chunked(reader, columns, CHUNK_ROWS)
}

/// Streams the records `chunk_rows` at a time; each chunk is folded into the
/// per-column sets in parallel before the next one is read.
pub fn unique_values_chunked<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    columns: &[&str],
    chunk_rows: usize,
) -> Result<BTreeMap<String, ValueSet>> {
    let headers = reader.headers()?.clone();
    let indices = columns
        .iter()
        .map(|&name| {
            headers
                .iter()
                .position(|h| h == name)
                .map(|idx| (name, idx))
                .ok_or_else(|| NNError::MissingColumn(name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut sets: Vec<ValueSet> = vec![ValueSet::new(); indices.len()];
    let mut records = reader.into_records();
    let mut rows = 0usize;
    loop {
        let chunk = records
            .by_ref()
            .take(chunk_rows.max(1))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if chunk.is_empty() {
            break;
        }
        rows += chunk.len();

        sets.par_iter_mut()
            .zip(indices.par_iter())
            .for_each(|(set, &(_, idx))| {
                for value in chunk.iter().filter_map(|r| r.get(idx)) {
                    if !set.contains(value) {
                        set.insert(value.to_string());
                    }
                }
            });
    }
    debug!("read {} records", rows);

    Ok(indices
        .iter()
        .map(|&(name, _)| name.to_string())
        .zip(sets)
        .collect())
}

pub fn profile_csv<P: AsRef<Path>>(path: P, columns: &[&str]) -> Result<BTreeMap<String, ValueSet>> {
    unique_values(csv::Reader::from_path(path)?, columns)
}

/// Every hour of the day, `"0"` through `"23"`.
pub fn hour_values() -> ValueSet {
    (0..24).map(|h: u32| h.to_string()).collect()
}

pub fn write_value_set<P: AsRef<Path>>(dir: P, name: &str, values: &ValueSet) -> Result<PathBuf> {
    let path = dir.as_ref().join(format!("{}.bin", name));
    let encoded: Vec<u8> = bincode::serialize(values)?;
    File::create(&path)?.write_all(&encoded)?;
    Ok(path)
}

pub fn read_value_set<P: AsRef<Path>>(path: P) -> Result<ValueSet> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    Ok(bincode::deserialize(&buffer)?)
}

/// Profiles [`FEATURES`] from `input` and writes one set per column plus the hour set into `out_dir`.
pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(input: P, out_dir: Q) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    let sets = profile_csv(&input, &FEATURES)?;

    let mut written = Vec::with_capacity(sets.len() + 1);
    for (name, values) in sets.iter() {
        let path = write_value_set(&out_dir, name, values)?;
        debug!("{}: {} distinct values -> {}", name, values.len(), path.display());
        written.push(path);
    }
    written.push(write_value_set(&out_dir, HOUR_FEATURE, &hour_values())?);

    info!(
        "Read training data: {} value sets from {} in {:.2?}",
        written.len(),
        input.as_ref().display(),
        start.elapsed()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ctrkit-profiling-{}-{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn full_csv() -> String {
        let mut csv = String::from(FEATURES.join(","));
        csv.push('\n');
        for row in [
            "0,1005,320,50,1722,-1,0,28905ebd,07d7df22,1,0",
            "1,1005,320,50,1722,100084,1,28905ebd,07d7df22,1,2",
            "0,1002,300,250,2161,-1,0,f028772b,07d7df22,0,0",
        ] {
            csv.push_str(row);
            csv.push('\n');
        }
        csv
    }

    #[test]
    fn test_unique_values() {
        let data = "a,b,c\n1,x,p\n2,x,q\n1,y,p\n";
        let sets = unique_values(csv::Reader::from_reader(data.as_bytes()), &["a", "b"]).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets["a"], ValueSet::from(["1".to_string(), "2".to_string()]));
        assert_eq!(sets["b"], ValueSet::from(["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_chunked_scan_merges_across_chunks() {
        let data = "a,b\n1,x\n2,x\n1,y\n3,x\n2,z\n";
        for chunk_rows in [0, 1, 2, 4, 100] {
            let sets =
                unique_values_chunked(csv::Reader::from_reader(data.as_bytes()), &["b", "a"], chunk_rows)
                    .unwrap();
            assert_eq!(sets["a"].len(), 3, "chunk_rows {}", chunk_rows);
            assert_eq!(
                sets["b"],
                ValueSet::from(["x".to_string(), "y".to_string(), "z".to_string()])
            );
        }
    }

    #[test]
    fn test_header_only_input_gives_empty_sets() {
        let sets = unique_values(csv::Reader::from_reader("a,b\n".as_bytes()), &["a"]).unwrap();
        assert!(sets["a"].is_empty());
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "click,C1,C15,C16,C18,banner_pos\n0,1005,320,50,1722,0\n";
        match unique_values(csv::Reader::from_reader(csv.as_bytes()), &FEATURES) {
            Err(NNError::MissingColumn(name)) => assert_eq!(name, "C20"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_features_have_no_duplicates() {
        let unique: BTreeSet<_> = FEATURES.iter().collect();
        assert_eq!(unique.len(), FEATURES.len());
    }

    #[test]
    fn test_hour_values() {
        let hours = hour_values();
        assert_eq!(hours.len(), 24);
        assert!(hours.contains("0") && hours.contains("23"));
        assert!(!hours.contains("24"));
    }

    #[test]
    fn test_run_writes_one_file_per_feature() {
        let dir = temp_dir("run");
        let input = dir.join("train.csv");
        fs::write(&input, full_csv()).unwrap();
        let out = dir.join("sets");
        fs::create_dir_all(&out).unwrap();

        let written = run(&input, &out).unwrap();
        assert_eq!(written.len(), FEATURES.len() + 1);

        let clicks = read_value_set(out.join("click.bin")).unwrap();
        assert_eq!(clicks, ValueSet::from(["0".to_string(), "1".to_string()]));
        let c20 = read_value_set(out.join("C20.bin")).unwrap();
        assert_eq!(c20.len(), 2);
        assert_eq!(read_value_set(out.join("hour.bin")).unwrap(), hour_values());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_without_output_dir_fails() {
        let dir = temp_dir("no-out");
        let input = dir.join("train.csv");
        fs::write(&input, full_csv()).unwrap();

        let result = run(&input, dir.join("missing"));
        assert!(matches!(result, Err(NNError::IoError(_))));

        fs::remove_dir_all(&dir).unwrap();
    }
}
