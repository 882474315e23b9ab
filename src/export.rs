use crate::error::Result;
use crate::model::Movie;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json; charset=utf-8",
        }
    }

    pub fn render<T: Serialize>(self, records: &[T]) -> Result<String> {
        match self {
            ExportFormat::Csv => to_csv(records),
            ExportFormat::Json => to_json(records),
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Header from the first record's field names, one line per record.
/// Values are written as-is: delimiters inside values are not escaped.
pub fn to_csv<T: Serialize>(records: &[T]) -> Result<String> {
    let rows = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let headers: Vec<String> = match rows.first() {
        Some(Value::Object(fields)) => fields.keys().cloned().collect(),
        _ => return Ok(String::new()),
    };
    let mut out = headers.join(",");
    out.push_str("\r\n");
    for row in &rows {
        if let Value::Object(fields) = row {
            let line = fields.values().map(cell).collect::<Vec<_>>().join(",");
            out.push_str(&line);
        }
        out.push_str("\r\n");
    }
    Ok(out)
}

pub fn to_json<T: Serialize>(records: &[T]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn parse_import(text: &str) -> Result<Vec<Movie>> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::model::{tests::movie, Category};

    #[test]
    fn csv_layout() {
        let categories = vec![
            Category {
                id: 1,
                name: "Drama".to_owned(),
            },
            Category {
                id: 2,
                name: "Crime, Thriller".to_owned(),
            },
        ];
        let csv = to_csv(&categories).unwrap();
        assert_eq!(csv, "id,name\r\n1,Drama\r\n2,Crime, Thriller\r\n");
    }

    #[test]
    fn csv_joins_arrays() {
        let mut m = movie(1, "A", vec![1, 2]);
        m.actors = vec!["P".to_owned(), "Q".to_owned()];
        let csv = to_csv(&[m]).unwrap();
        let mut lines = csv.split("\r\n");
        assert!(lines.next().unwrap().starts_with("id,title,director,actors,category,"));
        assert!(lines.next().unwrap().starts_with("1,A,,P,Q,1,2,2020-01-01,100,7.5,"));
    }

    #[test]
    fn csv_of_nothing_is_empty() {
        assert_eq!(to_csv::<Category>(&[]).unwrap(), "");
    }

    #[test]
    fn json_is_pretty() {
        let json = ExportFormat::Json.render(&[movie(1, "A", vec![])]).unwrap();
        assert!(json.contains("\n  {\n    \"id\": 1,"));
    }

    #[test]
    fn import() {
        let text = serde_json::to_string(&vec![movie(5, "E", vec![3])]).unwrap();
        assert_eq!(parse_import(&text).unwrap()[0].id, 5);
        assert!(matches!(parse_import("{oops"), Err(CatalogError::Parse(_))));
    }
}
