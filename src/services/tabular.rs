use std::collections::HashSet;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::models::{Row, TabularDataset};

static FIELD_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\t]").unwrap());

pub fn parse_dataset(data: &Bytes, file_name: &str) -> Result<TabularDataset, ParseError> {
    let extension = file_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        // xls/xlsx uploads are read as delimited text, same as csv
        "csv" | "xls" | "xlsx" => parse_delimited(data),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_delimited(data: &Bytes) -> Result<TabularDataset, ParseError> {
    let text = String::from_utf8_lossy(data);
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or(ParseError::EmptyFile)?;
    let columns: Vec<String> = FIELD_DELIMITER
        .split(header)
        .map(|name| name.trim().to_string())
        .collect();

    let mut seen = HashSet::new();
    for name in &columns {
        if !seen.insert(name.as_str()) {
            tracing::warn!("Duplicate column name in header: {}", name);
        }
    }

    let mut rows: Vec<Row> = Vec::new();
    for line in lines {
        let fields: Vec<&str> = FIELD_DELIMITER.split(line).collect();
        let mut row = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            let value = fields.get(idx).map(|field| field.trim()).unwrap_or("");
            row.insert(name.clone(), value.to_string());
        }
        rows.push(row);
    }

    let row_count = rows.len();
    Ok(TabularDataset {
        columns,
        rows,
        row_count,
    })
}

pub fn sample_rows(dataset: &TabularDataset, count: usize) -> &[Row] {
    let end = count.min(dataset.rows.len());
    &dataset.rows[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, file_name: &str) -> Result<TabularDataset, ParseError> {
        parse_dataset(&Bytes::from(content.to_string()), file_name)
    }

    #[test]
    fn parses_a_two_row_csv() {
        let dataset = parse("id,name\n1,Alice\n2,Bob\n", "records.csv").unwrap();

        assert_eq!(dataset.columns, vec!["id", "name"]);
        assert_eq!(dataset.row_count, 2);
        assert_eq!(dataset.rows[0]["id"], "1");
        assert_eq!(dataset.rows[0]["name"], "Alice");
        assert_eq!(dataset.rows[1]["id"], "2");
        assert_eq!(dataset.rows[1]["name"], "Bob");
    }

    #[test]
    fn parses_csv_with_padding_and_truncation() {
        let dataset = parse("name,age\nBob, 31\n\nAlice,29,extra\nCarol", "people.csv").unwrap();

        assert_eq!(dataset.columns, vec!["name", "age"]);
        assert_eq!(dataset.row_count, 3);

        assert_eq!(dataset.rows[0]["name"], "Bob");
        assert_eq!(dataset.rows[0]["age"], "31");
        assert_eq!(dataset.rows[1]["name"], "Alice");
        assert_eq!(dataset.rows[1]["age"], "29");
        assert!(!dataset.rows[1].contains_key("extra"));
        assert_eq!(dataset.rows[2]["name"], "Carol");
        assert_eq!(dataset.rows[2]["age"], "");
    }

    #[test]
    fn splits_on_tabs_as_well_as_commas() {
        let dataset = parse("name\tage\nBob\t31\nAlice,29", "people.csv").unwrap();

        assert_eq!(dataset.columns, vec!["name", "age"]);
        assert_eq!(dataset.rows[0]["age"], "31");
        assert_eq!(dataset.rows[1]["name"], "Alice");
    }

    #[test]
    fn trims_header_and_field_whitespace() {
        let dataset = parse(" name , age \n Bob , 31 ", "people.csv").unwrap();

        assert_eq!(dataset.columns, vec!["name", "age"]);
        assert_eq!(dataset.rows[0]["name"], "Bob");
    }

    #[test]
    fn header_only_file_yields_zero_rows() {
        let dataset = parse("name,age\n", "people.csv").unwrap();

        assert_eq!(dataset.columns, vec!["name", "age"]);
        assert_eq!(dataset.row_count, 0);
        assert!(dataset.rows.is_empty());
    }

    #[test]
    fn rejects_empty_and_blank_files() {
        assert!(matches!(parse("", "empty.csv"), Err(ParseError::EmptyFile)));
        assert!(matches!(
            parse("\n  \n\t\n", "blank.csv"),
            Err(ParseError::EmptyFile)
        ));
    }

    #[test]
    fn rejects_unsupported_extensions() {
        for file_name in ["report.pdf", "notes.txt", "data", ""] {
            match parse("a,b\n1,2", file_name) {
                Err(ParseError::UnsupportedFormat(_)) => {}
                other => panic!("expected UnsupportedFormat for {:?}, got {:?}", file_name, other),
            }
        }
    }

    #[test]
    fn accepts_excel_extensions_as_delimited_text() {
        for file_name in ["sheet.xlsx", "sheet.xls", "SHEET.XLSX", "export.final.CSV"] {
            let dataset = parse("a,b\n1,2", file_name).unwrap();
            assert_eq!(dataset.row_count, 1);
        }
    }

    #[test]
    fn duplicate_column_keeps_last_value() {
        let dataset = parse("id,id\n1,2", "dupes.csv").unwrap();

        assert_eq!(dataset.columns, vec!["id", "id"]);
        assert_eq!(dataset.rows[0]["id"], "2");
    }

    #[test]
    fn parsing_is_deterministic() {
        let content = "name,age\nBob,31\nAlice,29";
        assert_eq!(
            parse(content, "people.csv").unwrap(),
            parse(content, "people.csv").unwrap()
        );
    }

    #[test]
    fn sample_is_a_bounded_prefix() {
        let dataset = parse("n\n1\n2\n3\n4\n5", "nums.csv").unwrap();

        assert_eq!(sample_rows(&dataset, 3).len(), 3);
        assert_eq!(sample_rows(&dataset, 3)[0]["n"], "1");
        assert_eq!(sample_rows(&dataset, 3)[2]["n"], "3");
        assert_eq!(sample_rows(&dataset, 10).len(), 5);
        assert!(sample_rows(&dataset, 0).is_empty());
    }
}
