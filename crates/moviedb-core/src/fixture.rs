//! Loading movie fixtures: a JSON array of movie records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::FixtureError;
use crate::number::normalize_numbers;

/// Read and validate a fixture file.
pub fn load_fixture(path: impl AsRef<Path>) -> Result<Vec<Value>, FixtureError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = parse_fixture(BufReader::new(file))?;
    debug!(path = %path.display(), records = records.len(), "fixture loaded");
    Ok(records)
}

/// Parse a fixture from any reader.
///
/// Every record must be a map with an integer `year` and a string `title`;
/// `info`, when present, must be a map. All numbers are re-encoded as exact
/// decimals.
pub fn parse_fixture(reader: impl Read) -> Result<Vec<Value>, FixtureError> {
    let doc: Value = serde_json::from_reader(reader)?;
    let Value::Array(records) = doc else {
        return Err(FixtureError::NotAnArray);
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| check_record(index, record))
        .collect()
}

fn check_record(index: usize, mut record: Value) -> Result<Value, FixtureError> {
    let invalid = |reason: String| FixtureError::InvalidRecord { index, reason };

    let Value::Object(map) = &record else {
        return Err(invalid("not a map".to_string()));
    };
    let year_is_int = map
        .get("year")
        .and_then(Value::as_i64)
        .is_some_and(|y| i32::try_from(y).is_ok());
    if !year_is_int {
        return Err(invalid("missing or non-integer 'year'".to_string()));
    }
    if !map.get("title").is_some_and(Value::is_string) {
        return Err(invalid("missing or non-string 'title'".to_string()));
    }
    if map.get("info").is_some_and(|info| !info.is_object()) {
        return Err(invalid("'info' must be a map".to_string()));
    }

    normalize_numbers(&mut record)
        .map_err(|n| invalid(format!("number {n} does not fit an exact decimal")))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_keeps_extra_attributes_and_precision() {
        let text = r#"[
            {"year": 2013, "title": "Rush",
             "info": {"rating": 8.30, "genres": ["Action", "Biography"], "rank": 2}},
            {"year": 2013, "title": "Prisoners"}
        ]"#;
        let records = parse_fixture(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["info"]["rating"].to_string(), "8.30");
        assert_eq!(records[0]["info"]["genres"][1], "Biography");
        assert!(records[1].get("info").is_none());
    }

    #[test]
    fn test_not_an_array() {
        let err = parse_fixture(r#"{"year": 2013}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, FixtureError::NotAnArray));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_fixture("[{".as_bytes()).unwrap_err();
        assert!(matches!(err, FixtureError::Json(_)));
    }

    #[test]
    fn test_invalid_records_report_index() {
        let cases = [
            r#"[{"year": 2013, "title": "ok"}, {"title": "no year"}]"#,
            r#"[{"year": 2013, "title": "ok"}, {"year": 2013.5, "title": "x"}]"#,
            r#"[{"year": 2013, "title": "ok"}, {"year": 2013, "title": 7}]"#,
            r#"[{"year": 2013, "title": "ok"}, {"year": 2013, "title": "x", "info": "bad"}]"#,
            r#"[{"year": 2013, "title": "ok"}, {"year": 2013, "title": "x", "info": {"n": 1e40}}]"#,
            r#"[{"year": 2013, "title": "ok"}, 42]"#,
        ];
        for text in cases {
            match parse_fixture(text.as_bytes()) {
                Err(FixtureError::InvalidRecord { index, .. }) => assert_eq!(index, 1, "{text}"),
                other => panic!("expected invalid record for {text}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"year": 1985, "title": "A", "info": {{"rating": 7}}}}]"#).unwrap();
        let records = load_fixture(file.path()).unwrap();
        assert_eq!(records[0]["year"].as_i64(), Some(1985));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_fixture(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io(_)));
    }
}
