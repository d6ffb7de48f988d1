//! Topological ordering of tables along the parent relation.

use std::collections::BTreeSet;

use crate::db_schema::TableMeta;

/// Return `names` ordered so that every table follows its parent.
///
/// Tables whose parent is not among `names` start the order; the children
/// of each emitted table are added as they become available. Only tables
/// listed in `names` are returned.
pub fn tsort<S: AsRef<str>>(tables: &[TableMeta], names: &[S]) -> Vec<String> {
    let wanted: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
    let relevant: Vec<&TableMeta> = tables
        .iter()
        .filter(|table| wanted.contains(table.name.as_str()))
        .collect();

    let mut todo: Vec<&str> = relevant
        .iter()
        .filter(|table| {
            table
                .parent_name
                .as_deref()
                .is_none_or(|parent| !wanted.contains(parent))
        })
        .map(|table| table.name.as_str())
        .collect();
    // Pop in definition order
    todo.reverse();

    let mut result = Vec::with_capacity(relevant.len());
    while let Some(current) = todo.pop() {
        result.push(current.to_string());
        let children: Vec<&str> = relevant
            .iter()
            .filter(|table| table.parent_name.as_deref() == Some(current))
            .map(|table| table.name.as_str())
            .collect();
        todo.extend(children.into_iter().rev());
    }
    result
}
