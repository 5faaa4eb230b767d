use std::path::Path;
use chrono::Utc;
use tracing::{debug, info};

use crate::model::{PipelineError, RawRecord, RecordSource, SourceInfo};

/// Columns are consumed by position: timestamp, patient_id, assessment_type,
/// created_date, score.
const COLUMN_COUNT: usize = 5;

pub struct CsvSource;

impl CsvSource {
    pub fn new() -> Self {
        Self
    }
}

impl RecordSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn parse(&self, data: &str) -> Result<Vec<RawRecord>, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers = rdr.headers().map_err(|err| PipelineError::Parse {
            row: 0,
            message: format!("unreadable header row: {}", err),
        })?;
        if headers.is_empty() {
            return Err(PipelineError::Parse { row: 0, message: "missing header row".into() });
        }
        if headers.len() != COLUMN_COUNT {
            return Err(PipelineError::Parse {
                row: 0,
                message: format!(
                    "expected {} header fields, found {}",
                    COLUMN_COUNT,
                    headers.len()
                ),
            });
        }
        debug!("csv header: {:?}", headers);

        let mut output = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let row = index + 1;
            let values = result.map_err(|err| PipelineError::Parse {
                row,
                message: err.to_string(),
            })?;
            if values.len() != COLUMN_COUNT {
                return Err(PipelineError::Parse {
                    row,
                    message: format!("expected {} fields, found {}", COLUMN_COUNT, values.len()),
                });
            }

            output.push(RawRecord {
                row,
                timestamp: values[0].to_string(),
                patient_id: values[1].to_string(),
                assessment_type: values[2].to_string(),
                created_date: values[3].to_string(),
                score: values[4].to_string(),
            });
        }

        Ok(output)
    }
}

/// Reads `path` and hands its contents to `source`.
pub fn load(
    path: &Path,
    source: &dyn RecordSource,
) -> Result<(Vec<RawRecord>, SourceInfo), PipelineError> {
    let data = std::fs::read_to_string(path).map_err(|err| PipelineError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    let rows = source.parse(&data)?;
    info!("loaded {} rows from {}", rows.len(), path.display());

    let info = SourceInfo {
        source: source.name().to_string(),
        path: path.to_path_buf(),
        rows_read: rows.len(),
        loaded_at: Utc::now(),
    };
    Ok((rows, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "date,patient_id,type,patient_date_created,score
2019-06-18T10:00:00.123456,100,gad7,2019-01-01,20
 2019-06-18T11:00:00 , 100 ,gad7,2019-01-01,5
2019-06-19T09:00:00,200,gad7,2019-02-01,12
";

    #[test]
    fn csv_rows_by_position() {
        let rows = CsvSource::new().parse(SAMPLE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].timestamp, "2019-06-18T10:00:00.123456");
        assert_eq!(rows[1].timestamp, "2019-06-18T11:00:00");
        assert_eq!(rows[1].patient_id, "100");
        assert_eq!(rows[2].assessment_type, "gad7");
        assert_eq!(rows[2].created_date, "2019-02-01");
        assert_eq!(rows[2].score, "12");
    }

    #[test]
    fn field_count_mismatch_names_row() {
        let csv = "timestamp,patient_id,assessment_type,created_date,score
2019-06-18T10:00:00,100,gad7,2019-01-01,20
2019-06-18T11:00:00,100,gad7,5
";
        match CsvSource::new().parse(csv) {
            Err(PipelineError::Parse { row, message }) => {
                assert_eq!(row, 2);
                assert!(message.contains("found 4"));
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn header_only_is_empty() {
        let rows = CsvSource::new().parse("timestamp,patient_id,assessment_type,created_date,score\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_header_is_parse_error() {
        for data in ["", "\n\n"] {
            assert!(matches!(
                CsvSource::new().parse(data),
                Err(PipelineError::Parse { row: 0, .. })
            ));
        }
    }

    #[test]
    fn short_header_is_parse_error() {
        let csv = "a\n2019-06-18T10:00:00,1,gad7,2019-01-01,3\n";
        match CsvSource::new().parse(csv) {
            Err(PipelineError::Parse { row, message }) => {
                assert_eq!(row, 0);
                assert!(message.contains("found 1"));
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let (rows, info) = load(file.path(), &CsvSource::new()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(info.rows_read, 3);
        assert_eq!(info.source, "csv");
        assert_eq!(info.path, file.path());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        match load(&path, &CsvSource::new()) {
            Err(PipelineError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other.map(|(rows, _)| rows.len())),
        }
    }
}
