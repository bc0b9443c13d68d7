//! Presenting sweep results
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    sweep::SweepResult,
    utils::{CommaSeparatedNoSpace, CsvField, OrElse},
};

#[derive(Debug, thiserror::Error)]
#[error("Could not write {0:?}.")]
pub(crate) struct WriteCsvError(PathBuf, #[source] io::Error);

const CSV_HEADER: [&str; 5] = [
    "name",
    "discipline",
    "total_overhead",
    "critical_overhead",
    "period",
];

/// Print `name: period` for each result. Infeasible locks are shown as `-`.
pub(crate) fn print_summary(mut out: impl Write, results: &[SweepResult]) -> io::Result<()> {
    for result in results {
        writeln!(out, "{}: {}", result.name, OrElse(result.period, "-"))?;
    }
    Ok(())
}

/// Write `results` as CSV. Infeasible locks have an empty `period` column.
/// Names are quoted where needed.
pub(crate) fn write_csv(mut out: impl Write, results: &[SweepResult]) -> io::Result<()> {
    writeln!(out, "{}", CommaSeparatedNoSpace(CSV_HEADER))?;
    for result in results {
        let overheads = result.policy.overheads();
        writeln!(
            out,
            "{}",
            CommaSeparatedNoSpace([
                CsvField(&result.name).to_string(),
                result.policy.discipline().to_string(),
                overheads.total.to_string(),
                overheads.critical.to_string(),
                OrElse(result.period, "").to_string(),
            ])
        )?;
    }
    Ok(())
}

pub(crate) fn write_csv_file(path: &Path, results: &[SweepResult]) -> Result<(), WriteCsvError> {
    log::debug!("Writing {} result(s) to '{}'", results.len(), path.display());
    let file = std::fs::File::create(path).map_err(|e| WriteCsvError(path.to_owned(), e))?;
    let mut out = io::BufWriter::new(file);
    write_csv(&mut out, results)
        .and_then(|()| out.flush())
        .map_err(|e| WriteCsvError(path.to_owned(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinrta::SpinlockPolicy;

    fn results() -> Vec<SweepResult> {
        vec![
            SweepResult {
                name: "mcslock".to_owned(),
                policy: SpinlockPolicy::fifo(148),
                period: Some(2180),
            },
            SweepResult {
                name: "biglock".to_owned(),
                policy: SpinlockPolicy::priority_fifo(9).with_critical_overhead(2),
                period: None,
            },
        ]
    }

    #[test]
    fn summary() {
        let mut out = Vec::new();
        print_summary(&mut out, &results()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "mcslock: 2180\nbiglock: -\n"
        );
    }

    #[test]
    fn csv() {
        let mut out = Vec::new();
        write_csv(&mut out, &results()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,discipline,total_overhead,critical_overhead,period\n\
             mcslock,fifo,148,0,2180\n\
             biglock,priority-fifo,9,2,\n"
        );
    }

    #[test]
    fn csv_quotes_names() {
        let results = vec![
            SweepResult {
                name: "mcs, v2".to_owned(),
                policy: SpinlockPolicy::fifo(1),
                period: Some(5),
            },
            SweepResult {
                name: "\"big\" lock".to_owned(),
                policy: SpinlockPolicy::fifo(1),
                period: None,
            },
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &results).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "name,discipline,total_overhead,critical_overhead,period\n\
             \"mcs, v2\",fifo,1,0,5\n\
             \"\"\"big\"\" lock\",fifo,1,0,\n"
        );
    }
}
