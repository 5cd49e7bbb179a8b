use super::FieldValue;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// In-memory column store for listings read since the last flush.
///
/// The column set and order are fixed at construction; `clear` empties the
/// values but never touches the schema.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<FieldValue>>,
}

impl Table {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let columns = vec![Vec::new(); names.len()];
        Self { names, columns }
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    #[cfg(test)]
    pub fn column(&self, name: &str) -> Option<&[FieldValue]> {
        self.index_of(name).map(|i| self.columns[i].as_slice())
    }

    /// Push one value onto a named column
    pub fn append(&mut self, column: &str, value: FieldValue) -> Result<(), TableError> {
        let idx = self
            .index_of(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        self.columns[idx].push(value);
        Ok(())
    }

    /// Pad every short column with missing markers up to the longest one.
    /// Returns the resulting row count.
    pub fn align(&mut self) -> usize {
        let rows = self.max_len();
        for column in &mut self.columns {
            column.resize(rows, FieldValue::Missing);
        }
        rows
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
    }

    pub fn max_len(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Row `i` across all columns; short columns yield `Missing`
    pub fn row(&self, i: usize) -> Vec<&FieldValue> {
        self.columns
            .iter()
            .map(|column| column.get(i).unwrap_or(&FieldValue::Missing))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&FieldValue>> + '_ {
        (0..self.max_len()).map(move |i| self.row(i))
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(["a", "b", "c"])
    }

    #[test]
    fn test_align_pads_to_longest_column() {
        let mut table = sample();
        table.append("a", FieldValue::text("1")).unwrap();
        table.append("a", FieldValue::text("2")).unwrap();
        table.append("a", FieldValue::text("3")).unwrap();
        table.append("b", FieldValue::Number(1.0)).unwrap();

        let before = table.max_len();
        let rows = table.align();

        assert_eq!(rows, before);
        for name in ["a", "b", "c"] {
            assert_eq!(table.column(name).unwrap().len(), 3);
        }
        assert_eq!(table.column("b").unwrap()[2], FieldValue::Missing);
        assert_eq!(table.column("c").unwrap()[0], FieldValue::Missing);
        assert_eq!(table.rows().count(), 3);
    }

    #[test]
    fn test_clear_keeps_schema() {
        let mut table = sample();
        table.append("c", FieldValue::text("x")).unwrap();
        assert!(!table.is_empty());

        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.column_names(), &["a", "b", "c"]);
        assert_eq!(table.align(), 0);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut table = sample();
        let err = table.append("z", FieldValue::Missing).unwrap_err();
        assert_eq!(err, TableError::UnknownColumn("z".to_string()));
        assert!(table.is_empty());
    }

    #[test]
    fn test_row_reads_across_columns() {
        let mut table = sample();
        table.append("a", FieldValue::text("x")).unwrap();
        table.append("b", FieldValue::Number(2.0)).unwrap();

        let row = table.row(0);
        assert_eq!(row.len(), 3);
        assert_eq!(row[0], &FieldValue::text("x"));
        assert_eq!(row[2], &FieldValue::Missing);
    }
}
