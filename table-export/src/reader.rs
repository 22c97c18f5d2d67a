use harvest_core::ExportError;
use std::io::Read;
use std::path::Path;

/// A previously exported table, every cell as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportedTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExportError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.iter().map(str::to_string).collect();
        let rows = csv_reader
            .records()
            .map(|row| row.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<_, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell of `row` under `column`, if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_quoted_cells() {
        let data = "id,body\nc1,\"line one\nline two, with comma\"\nc2,\n";
        let table = ExportedTable::from_reader(data.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["id", "body"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(0, "body"), Some("line one\nline two, with comma"));
        assert_eq!(table.get(1, "body"), Some(""));
        assert_eq!(table.get(1, "missing"), None);
        assert_eq!(table.get(5, "id"), None);
    }
}
