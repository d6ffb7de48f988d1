//! Table and column metadata for the relational view of a data source.

use std::fmt::Write as _;

/// Metadata of a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Human readable description
    pub description: Option<String>,
    /// SQLite type used in the populated schema
    pub data_type: Option<String>,
    /// The column aliases the SQLite rowid
    pub rowid: bool,
}

impl ColumnMeta {
    /// An untyped column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            data_type: None,
            rowid: false,
        }
    }

    /// A column that becomes `INTEGER PRIMARY KEY` in populated tables.
    pub fn rowid(name: impl Into<String>) -> Self {
        Self {
            rowid: true,
            ..Self::new(name)
        }
    }

    /// Set the column's SQLite type.
    pub fn with_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Set the column's description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Column DDL definition.
    pub fn definition(&self) -> String {
        if self.rowid {
            return format!("{} INTEGER PRIMARY KEY", self.name);
        }
        match &self.data_type {
            Some(data_type) => format!("{} {data_type}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Metadata of a table and its place in the source's hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Table name
    pub name: String,
    /// Table of which this one holds details
    pub parent_name: Option<String>,
    /// Parent column joined with `foreign_key`
    pub primary_key: Option<String>,
    /// This table's column referring to the parent
    pub foreign_key: Option<String>,
    /// Columns in definition order
    pub columns: Vec<ColumnMeta>,
    /// Embedded SQL script run after the table is populated
    pub post_population_script: Option<String>,
    /// Field delimiter for CSV backed tables
    pub delimiter: u8,
}

impl TableMeta {
    /// A root table with the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMeta>) -> Self {
        Self {
            name: name.into(),
            parent_name: None,
            primary_key: None,
            foreign_key: None,
            columns,
            post_population_script: None,
            delimiter: b',',
        }
    }

    /// Make this a details table of `parent`, joined through
    /// `parent.primary_key = this.foreign_key`.
    pub fn with_parent(
        mut self,
        parent: impl Into<String>,
        primary_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.parent_name = Some(parent.into());
        self.primary_key = Some(primary_key.into());
        self.foreign_key = Some(foreign_key.into());
        self
    }

    /// Attach a post-population script by resource name.
    pub fn with_post_population_script(mut self, script: impl Into<String>) -> Self {
        self.post_population_script = Some(script.into());
        self
    }

    /// Set the CSV field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Ordinal of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// The column aliasing the rowid, if any.
    pub fn rowid_column(&self) -> Option<&ColumnMeta> {
        self.columns.iter().find(|column| column.rowid)
    }

    /// Names of all columns.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Return the `CREATE TABLE` statement for the table, named with the
    /// given prefix. When `columns` is given and does not contain `*`, only
    /// the listed columns are included; they appear in table order.
    pub fn table_schema(&self, prefix: &str, columns: Option<&[&str]>) -> String {
        let selected: Vec<&ColumnMeta> = match columns {
            Some(names) if !names.is_empty() && !names.contains(&"*") => self
                .columns
                .iter()
                .filter(|column| names.contains(&column.name.as_str()))
                .collect(),
            _ => self.columns.iter().collect(),
        };
        let definitions: Vec<String> = selected
            .iter()
            .map(|column| format!("  {}", column.definition()))
            .collect();
        let mut schema = String::new();
        let _ = write!(
            schema,
            "CREATE TABLE {prefix}{}(\n{}\n);\n",
            self.name,
            definitions.join(",\n")
        );
        schema
    }

    /// Return an `INSERT` statement with one placeholder per column.
    pub fn insert_statement(&self) -> String {
        let names = self.column_names().join(", ");
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!("INSERT INTO {}({names}) VALUES ({placeholders});", self.name)
    }
}

/// Build untyped columns from names.
pub fn columns(names: &[&str]) -> Vec<ColumnMeta> {
    names.iter().map(|name| ColumnMeta::new(*name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableMeta {
        TableMeta::new(
            "people",
            vec![
                ColumnMeta::rowid("id"),
                ColumnMeta::new("name"),
                ColumnMeta::new("age").with_type("INTEGER"),
            ],
        )
    }

    #[test]
    fn test_definitions() {
        let table = people();
        assert_eq!(table.columns[0].definition(), "id INTEGER PRIMARY KEY");
        assert_eq!(table.columns[1].definition(), "name");
        assert_eq!(table.columns[2].definition(), "age INTEGER");
    }

    #[test]
    fn test_table_schema() {
        let table = people();
        assert_eq!(
            table.table_schema("", None),
            "CREATE TABLE people(\n  id INTEGER PRIMARY KEY,\n  name,\n  age INTEGER\n);\n"
        );
        assert_eq!(
            table.table_schema("populated.", Some(&["age", "name"])),
            "CREATE TABLE populated.people(\n  name,\n  age INTEGER\n);\n"
        );
        assert_eq!(
            table.table_schema("", Some(&["name", "*"])),
            table.table_schema("", None)
        );
    }

    #[test]
    fn test_insert_statement() {
        assert_eq!(
            people().insert_statement(),
            "INSERT INTO people(id, name, age) VALUES (?, ?, ?);"
        );
    }

    #[test]
    fn test_lookup() {
        let table = people().with_parent("groups", "id", "group_id");
        assert_eq!(table.column_index("age"), Some(2));
        assert!(table.column("missing").is_none());
        assert_eq!(table.rowid_column().map(|c| c.name.as_str()), Some("id"));
        assert_eq!(table.parent_name.as_deref(), Some("groups"));
        assert_eq!(table.delimiter, b',');
    }
}
