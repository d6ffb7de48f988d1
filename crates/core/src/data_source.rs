//! Queries and database population over a streaming data source.
//!
//! The engine never reads a whole source at once. Each container's rows are
//! materialized into plain working tables named after the source tables;
//! queries and population statements then run against those tables. The
//! columns to materialize are discovered by preparing the user's SQL against
//! an empty copy of the schema and recording the SQLite authorizer's column
//! reads.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use a3k_common::debug;
use a3k_common::{Timer, text};
use rusqlite::Connection;
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::types::Value;

use crate::db_schema::TableMeta;
use crate::error::{Error, Result};
use crate::resources::sql_script;
use crate::sql::{self, execute, quote_literal};
use crate::streaming::{Container, ContainerInfo, RowSink, StreamingSource, StreamingTable};
use crate::tsort::tsort;

/// Name under which the database being populated is attached
const POPULATED: &str = "populated";

/// Columns needed per table
type ColumnMap = BTreeMap<String, BTreeSet<String>>;

/// Receiver of query results
pub trait QueryOutput {
    /// Called once with the result column names, before the first row.
    fn columns(&mut self, names: &[String]) -> Result<()>;
    /// Called for every result row.
    fn row(&mut self, values: &[Value]) -> Result<()>;
}

/// A database attached to the working connection
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttachedDatabase {
    name: String,
    path: String,
}

impl AttachedDatabase {
    fn parse(spec: &str) -> Result<Self> {
        let invalid = || {
            Error::message(format!(
                "Invalid database specification: '{spec}'; expected name:path"
            ))
        };
        let (name, path) = spec.split_once(':').ok_or_else(invalid)?;
        if name.is_empty() || path.is_empty() || path.contains(':') {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
        })
    }

    fn attach_statement(&self) -> String {
        attach_statement(&self.path, &self.name)
    }
}

fn attach_statement(path: &str, name: &str) -> String {
    format!("ATTACH DATABASE {} AS {name}", quote_literal(path))
}

/// Index creation that avoids duplicates and can undo itself
#[derive(Debug)]
struct IndexManager {
    root_name: String,
    indexes: BTreeSet<(String, String)>,
}

impl IndexManager {
    fn new(root_name: &str) -> Self {
        Self {
            root_name: root_name.to_string(),
            indexes: BTreeSet::new(),
        }
    }

    /// Index `table(column)` unless already done. The root's temporary
    /// table is represented by `temp_matched`.
    fn create_index(&mut self, conn: &Connection, table: &str, column: &str) -> Result<()> {
        let table = if table == format!("temp_{}", self.root_name) {
            "temp_matched".to_string()
        } else {
            table.to_string()
        };
        let key = (table, column.to_string());
        if self.indexes.contains(&key) {
            return Ok(());
        }
        execute(
            conn,
            &format!("CREATE INDEX {0}_{1}_idx ON {0}({1})", key.0, key.1),
        )?;
        self.indexes.insert(key);
        Ok(())
    }

    fn drop_indexes(&mut self, conn: &Connection) -> Result<()> {
        for (table, column) in std::mem::take(&mut self.indexes) {
            execute(conn, &format!("DROP INDEX {table}_{column}_idx"))?;
        }
        Ok(())
    }
}

/// Read-only view of a source's table hierarchy
#[derive(Debug, Clone, Copy)]
struct Schema<'a> {
    tables: &'a [TableMeta],
}

impl<'a> Schema<'a> {
    fn root_name(&self) -> &'a str {
        &self.tables[0].name
    }

    fn table(&self, name: &str) -> Result<&'a TableMeta> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| Error::message(format!("Unknown table name: '{name}'.")))
    }

    /// The named tables plus every table on their paths up to the root.
    fn transitive_closure<'n, I>(&self, names: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = &'n String>,
    {
        let mut result = BTreeSet::from([self.root_name().to_string()]);
        for name in names {
            let mut current = Some(name.clone());
            while let Some(table_name) = current {
                if result.contains(&table_name) {
                    break;
                }
                current = self.table(&table_name)?.parent_name.clone();
                result.insert(table_name);
            }
        }
        Ok(result)
    }

    /// Columns of `table` in the given set, in table order.
    fn ordered_columns(&self, table: &str, columns: &BTreeSet<String>) -> Result<Vec<String>> {
        Ok(self
            .table(table)?
            .columns
            .iter()
            .filter(|c| columns.contains(&c.name))
            .map(|c| c.name.clone())
            .collect())
    }

    /// Return `INNER JOIN` clauses linking the given tables to the root.
    ///
    /// With `rename_temp` each `temp_X` table is aliased to `X`, providing
    /// the context in which user conditions are evaluated. Otherwise the
    /// joins refer to the `temp_` names and their columns get indexed.
    fn joined_tables(
        &self,
        conn: &Connection,
        names: &BTreeSet<String>,
        rename_temp: bool,
        index_manager: &mut IndexManager,
    ) -> Result<String> {
        let names: Vec<&String> = names.iter().collect();
        let sorted = tsort(self.tables, &names);
        tracing::debug!(target: debug::SORTED_TABLES, "{sorted:?}");

        let mut result = String::new();
        for table_name in &sorted {
            if table_name == self.root_name() {
                continue;
            }
            let table = self.table(table_name)?;
            let (Some(parent), Some(primary_key), Some(foreign_key)) = (
                table.parent_name.as_deref(),
                table.primary_key.as_deref(),
                table.foreign_key.as_deref(),
            ) else {
                return Err(Error::Internal(format!(
                    "Details table {table_name} lacks join metadata"
                )));
            };
            if rename_temp {
                result.push_str(&format!(
                    " INNER JOIN temp_{table_name} AS {table_name} ON {parent}.{primary_key} = {table_name}.{foreign_key}"
                ));
            } else {
                result.push_str(&format!(
                    " INNER JOIN temp_{table_name} ON temp_{parent}.{primary_key} = temp_{table_name}.{foreign_key}"
                ));
                index_manager.create_index(conn, &format!("temp_{parent}"), primary_key)?;
                index_manager.create_index(conn, &format!("temp_{table_name}"), foreign_key)?;
            }
        }
        Ok(result)
    }
}

/// What to do with every container during population
#[derive(Debug)]
struct PopulationPlan<'a> {
    schema: Schema<'a>,
    /// Populated tables in source order, with their columns in table order
    populated: Vec<(String, Vec<String>)>,
    /// Materialized tables and their columns
    materialized: BTreeMap<String, Vec<String>>,
    /// Tables the condition reads
    query_tables: BTreeSet<String>,
    condition: Option<&'a str>,
    single_table: bool,
}

impl PopulationPlan<'_> {
    fn populate_container(&self, conn: &Connection, index_manager: &mut IndexManager) -> Result<()> {
        if self.single_table {
            if let Some((table, columns)) = self.populated.first() {
                let columns = qualified_columns(table, columns);
                let condition = self.condition.unwrap_or("true");
                execute(
                    conn,
                    &format!(
                        "INSERT INTO {POPULATED}.{table} SELECT {columns} FROM {table} WHERE true AND ({condition})"
                    ),
                )?;
                tracing::debug!(target: debug::PERF, "Populate {table}");
            }
            return Ok(());
        }

        if let Some(condition) = self.condition {
            self.create_matched_tables(conn, condition, index_manager)?;
        }
        for (table, columns) in &self.populated {
            self.populate_table(conn, table, columns, index_manager)?;
        }
        index_manager.drop_indexes(conn)
    }

    /// Copy the working tables to `temp_` tables and record the root rows
    /// matching the condition in `temp_matched`.
    fn create_matched_tables(
        &self,
        conn: &Connection,
        condition: &str,
        index_manager: &mut IndexManager,
    ) -> Result<()> {
        for (table, columns) in &self.materialized {
            let mut column_list = vec!["rowid".to_string()];
            column_list.extend(columns.iter().cloned());
            execute(conn, &format!("DROP TABLE IF EXISTS temp_{table}"))?;
            execute(
                conn,
                &format!(
                    "CREATE TEMP TABLE temp_{table} AS SELECT {} FROM {table}",
                    column_list.join(", ")
                ),
            )?;
        }

        let root = self.schema.root_name();
        let query_tables = self.schema.transitive_closure(&self.query_tables)?;
        let joins = self
            .schema
            .joined_tables(conn, &query_tables, true, index_manager)?;
        execute(conn, "DROP TABLE IF EXISTS temp_matched")?;
        execute(
            conn,
            &format!(
                "CREATE TEMP TABLE temp_matched AS SELECT {root}.id, {root}.rowid FROM temp_{root} AS {root}{joins} WHERE ({condition})"
            ),
        )?;

        if tracing::enabled!(target: debug::DUMP_MATCHED, tracing::Level::DEBUG) {
            let mut stmt = conn.prepare("SELECT id, rowid FROM temp_matched")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?))
            })?;
            for row in rows {
                let (id, rowid) = row?;
                tracing::debug!(target: debug::DUMP_MATCHED, "{id:?}\t{rowid:?}");
            }
        }
        Ok(())
    }

    fn populate_table(
        &self,
        conn: &Connection,
        table: &str,
        columns: &[String],
        index_manager: &mut IndexManager,
    ) -> Result<()> {
        let column_list = qualified_columns(table, columns);
        let exists = match self.condition {
            Some(_) => {
                let root = self.schema.root_name();
                let path = self.schema.transitive_closure([&table.to_string()])?;
                index_manager.create_index(conn, &format!("temp_{table}"), "rowid")?;
                let joins = self
                    .schema
                    .joined_tables(conn, &path, false, index_manager)?;
                // Adding to the last JOIN's ON clause, rather than a WHERE,
                // lets SQLite use the indexes
                let connective = if path.len() > 1 { "AND" } else { "WHERE" };
                format!(
                    " AND EXISTS (SELECT 1 FROM temp_matched AS temp_{root}{joins} {connective} {table}.rowid = temp_{table}.rowid)"
                )
            }
            None => String::new(),
        };
        execute(
            conn,
            &format!(
                "INSERT INTO {POPULATED}.{table} SELECT {column_list} FROM {table} WHERE true{exists}"
            ),
        )?;
        tracing::debug!(target: debug::PERF, "Populate {table}");
        Ok(())
    }
}

fn qualified_columns(table: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| format!("{table}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Create the working tables and fill them with the container's rows.
fn load_container(
    conn: &Connection,
    tables: &HashMap<String, StreamingTable>,
    container: &dyn Container,
) -> Result<()> {
    for table in tables.values() {
        table.create(conn)?;
    }
    let tx = conn.unchecked_transaction()?;
    let mut sink = RowSink::new(&tx, tables);
    container.extract(&mut sink)?;
    tx.commit()?;
    Ok(())
}

fn drop_working_tables(conn: &Connection, tables: &HashMap<String, StreamingTable>) -> Result<()> {
    for table in tables.values() {
        table.drop_table(conn)?;
    }
    Ok(())
}

/// Run `query` on `conn`, sending every row to `output`.
fn run_query(conn: &Connection, query: &str, output: &mut dyn QueryOutput) -> Result<()> {
    let mut stmt = conn
        .prepare(sql::log_sql(query))
        .map_err(|e| Error::sql(query, e))?;
    let count = stmt.column_count();
    let mut rows = stmt.query([]).map_err(|e| Error::sql(query, e))?;
    while let Some(row) = rows.next().map_err(|e| Error::sql(query, e))? {
        let values = (0..count)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        output.row(&values)?;
    }
    Ok(())
}

/// Source tables `statement` opens for reading on `conn`, found through the
/// root pages of its `OpenRead` instructions in the main database.
fn opened_tables(conn: &Connection, statement: &str) -> Result<Vec<String>> {
    let mut roots = HashMap::new();
    let mut schema = conn.prepare("SELECT rootpage, name FROM main.sqlite_schema WHERE type = 'table'")?;
    let mut rows = schema.query([])?;
    while let Some(row) = rows.next()? {
        roots.insert(row.get::<_, i64>(0)?, row.get::<_, String>(1)?);
    }

    let explain = format!("EXPLAIN {statement}");
    let mut stmt = conn
        .prepare(&explain)
        .map_err(|e| Error::sql(statement, e))?;
    let mut rows = stmt.query([]).map_err(|e| Error::sql(statement, e))?;
    let mut tables = Vec::new();
    // EXPLAIN columns: addr, opcode, p1, p2 (root page), p3 (database), ...
    while let Some(row) = rows.next()? {
        let opcode: String = row.get(1)?;
        if opcode != "OpenRead" || row.get::<_, i64>(4)? != 0 {
            continue;
        }
        if let Some(name) = roots.get(&row.get::<_, i64>(3)?) {
            tables.push(name.clone());
        }
    }
    Ok(tables)
}

/// What preparing a statement against the empty schema reveals
#[derive(Debug, Default)]
struct StatementColumns {
    /// Source columns read, per table
    reads: ColumnMap,
    /// Names of the statement's result columns
    results: Vec<String>,
}

/// Query and population engine over a data source
pub struct DataSource {
    source: Box<dyn StreamingSource>,
    tables: Vec<TableMeta>,
    attached: Vec<AttachedDatabase>,
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("tables", &self.tables.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("attached", &self.attached)
            .finish()
    }
}

impl DataSource {
    /// Wrap a source, attaching the databases given as `name:path`.
    pub fn new(source: Box<dyn StreamingSource>, attach_databases: &[String]) -> Result<Self> {
        let tables = source.tables().to_vec();
        if tables.is_empty() {
            return Err(Error::Internal("Data source without tables".to_string()));
        }
        let attached = attach_databases
            .iter()
            .map(|spec| AttachedDatabase::parse(spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source,
            tables,
            attached,
        })
    }

    /// Tables of the source, root first.
    pub fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn schema(&self) -> Schema<'_> {
        Schema {
            tables: &self.tables,
        }
    }

    /// Metadata of the named table.
    pub fn table(&self, name: &str) -> Result<&TableMeta> {
        self.schema().table(name)
    }

    /// Open a working connection, in memory or as a private on-disk
    /// database, with the user's databases attached.
    fn open_working(&self, in_memory: bool) -> Result<Connection> {
        let conn = if in_memory {
            Connection::open_in_memory()?
        } else {
            Connection::open("")?
        };
        for database in &self.attached {
            execute(&conn, &database.attach_statement())?;
        }
        Ok(conn)
    }

    /// Determine the source columns `statement` reads by preparing it
    /// against an empty schema. With `unread_tables`, tables the statement
    /// opens without column reads (as in `SELECT Count(*) FROM t`) map to an
    /// empty set; otherwise they are left out.
    fn query_columns(
        &self,
        statement: &str,
        populated: Option<&Path>,
        unread_tables: bool,
    ) -> Result<StatementColumns> {
        let conn = self.open_working(true)?;
        if let Some(path) = populated {
            execute(&conn, &attach_statement(&path.to_string_lossy(), POPULATED))?;
        }
        for table in &self.tables {
            execute(
                &conn,
                &format!("CREATE TABLE {}({})", table.name, table.column_names().join(", ")),
            )?;
        }

        let known: HashSet<String> = self.tables.iter().map(|t| t.name.clone()).collect();
        let reads: Arc<Mutex<ColumnMap>> = Arc::new(Mutex::new(BTreeMap::new()));
        let collected = Arc::clone(&reads);
        conn.authorizer(Some(move |ctx: AuthContext<'_>| {
            if let AuthAction::Read {
                table_name,
                column_name,
            } = ctx.action
            {
                let is_column =
                    !column_name.is_empty() && !column_name.eq_ignore_ascii_case("rowid");
                if ctx.database_name == Some("main") && known.contains(table_name) && is_column {
                    if let Ok(mut map) = collected.lock() {
                        map.entry(table_name.to_string())
                            .or_default()
                            .insert(column_name.to_string());
                    }
                }
            }
            Authorization::Allow
        }));

        let results: Result<Vec<String>> = conn
            .prepare(sql::log_sql(statement))
            .map(|stmt| stmt.column_names().into_iter().map(String::from).collect())
            .map_err(|e| Error::sql(statement, e));
        conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
        let results = results?;

        let mut reads = reads
            .lock()
            .map_err(|_| Error::Internal("Column tracker lock poisoned".to_string()))?
            .clone();
        if unread_tables {
            for table in opened_tables(&conn, statement)? {
                reads.entry(table).or_default();
            }
        }
        tracing::debug!(target: debug::SQL, "Columns read: {reads:?}");
        Ok(StatementColumns { reads, results })
    }

    /// Build working tables for the given columns.
    fn streaming_tables(&self, columns: &ColumnMap) -> Result<HashMap<String, StreamingTable>> {
        columns
            .iter()
            .map(|(name, cols)| {
                let cols: Vec<String> = cols.iter().cloned().collect();
                Ok((name.clone(), StreamingTable::new(self.table(name)?, &cols)?))
            })
            .collect()
    }

    /// Run `query`, passing its results to `output`.
    ///
    /// With `partition` the query runs separately over each container and
    /// the result is the concatenation of the per-container results.
    /// Otherwise all containers are first loaded into a private on-disk
    /// database and the query runs once.
    pub fn query(&mut self, query: &str, partition: bool, output: &mut dyn QueryOutput) -> Result<()> {
        let timer = Timer::start("query");
        let columns = self.query_columns(query, None, true)?;
        let tables = self.streaming_tables(&columns.reads)?;
        let conn = self.open_working(partition)?;
        output.columns(&columns.results)?;

        if partition {
            self.source.stream(&mut |info, container| {
                tracing::debug!(target: debug::PROGRESS, "Container {} {}", info.id, info.name);
                load_container(&conn, &tables, container)?;
                run_query(&conn, query, output)?;
                drop_working_tables(&conn, &tables)
            })?;
        } else {
            for table in tables.values() {
                table.create(&conn)?;
            }
            self.source.stream(&mut |info, container| {
                tracing::debug!(target: debug::PROGRESS, "Container {} {}", info.id, info.name);
                let tx = conn.unchecked_transaction()?;
                let mut sink = RowSink::new(&tx, &tables);
                container.extract(&mut sink)?;
                tx.commit()?;
                Ok(())
            })?;
            timer.lap("Loading");
            run_query(&conn, query, output)?;
        }
        timer.finish();
        Ok(())
    }

    /// Resolve `table.column` and `table.*` specifications; none select
    /// every column of every table.
    fn population_columns(&self, specs: &[String]) -> Result<ColumnMap> {
        let mut result = ColumnMap::new();
        if specs.is_empty() {
            for table in &self.tables {
                result.insert(
                    table.name.clone(),
                    table.columns.iter().map(|c| c.name.clone()).collect(),
                );
            }
            return Ok(result);
        }
        for spec in specs {
            let (table_name, column_name) = spec.split_once('.').ok_or_else(|| {
                Error::message(format!(
                    "Invalid column specification: '{spec}'; expected table.column"
                ))
            })?;
            let table = self.table(table_name)?;
            let columns = result.entry(table.name.clone()).or_default();
            if column_name == "*" {
                columns.extend(table.columns.iter().map(|c| c.name.clone()));
            } else if table.column(column_name).is_some() {
                columns.insert(column_name.to_string());
            } else {
                return Err(Error::message(format!("Unknown column name: '{spec}'.")));
            }
        }
        Ok(result)
    }

    /// Populate the SQLite database at `database_path` with the specified
    /// columns of the rows satisfying `condition`.
    ///
    /// Populated tables are dropped and recreated. Details tables receive
    /// only the rows belonging to root rows that match the condition.
    pub fn populate(
        &mut self,
        database_path: &Path,
        column_specs: &[String],
        condition: Option<&str>,
    ) -> Result<()> {
        let timer = Timer::start("populate");
        let condition = condition.map(str::trim).filter(|c| !c.is_empty());
        let schema = Schema {
            tables: &self.tables,
        };

        // Create the database file if needed
        drop(Connection::open(database_path)?);

        let conn = self.open_working(true)?;
        execute(
            &conn,
            &attach_statement(&database_path.to_string_lossy(), POPULATED),
        )?;
        sql::set_fast_writing(&conn, POPULATED)?;

        let population_columns = self.population_columns(column_specs)?;
        let query_columns = match condition {
            Some(condition) => {
                let table_names: Vec<&str> = self.tables.iter().map(|t| t.name.as_str()).collect();
                let condition_query = format!(
                    "SELECT DISTINCT 1 FROM {} WHERE {condition}",
                    table_names.join(", ")
                );
                let columns = self.query_columns(&condition_query, Some(database_path), false)?;
                timer.lap("Condition parsing");
                columns.reads
            }
            None => ColumnMap::new(),
        };

        let involved: BTreeSet<String> = population_columns
            .keys()
            .chain(query_columns.keys())
            .cloned()
            .collect();
        let single_table = involved.len() == 1;

        // Tables to materialize, with the columns each needs
        let mut working_columns = ColumnMap::new();
        for (table, columns) in population_columns.iter().chain(query_columns.iter()) {
            working_columns
                .entry(table.clone())
                .or_default()
                .extend(columns.iter().cloned());
        }
        if condition.is_some() && !single_table {
            for table_name in &schema.transitive_closure(&involved)? {
                let table = schema.table(table_name)?;
                working_columns.entry(table_name.clone()).or_default();
                if let (Some(parent), Some(primary_key), Some(foreign_key)) = (
                    &table.parent_name,
                    &table.primary_key,
                    &table.foreign_key,
                ) {
                    working_columns
                        .entry(table_name.clone())
                        .or_default()
                        .insert(foreign_key.clone());
                    working_columns
                        .entry(parent.clone())
                        .or_default()
                        .insert(primary_key.clone());
                }
            }
            working_columns
                .entry(schema.root_name().to_string())
                .or_default()
                .insert("id".to_string());
        }
        let tables = self.streaming_tables(&working_columns)?;

        let mut populated = Vec::new();
        for table in &self.tables {
            if let Some(columns) = population_columns.get(&table.name) {
                populated.push((table.name.clone(), schema.ordered_columns(&table.name, columns)?));
            }
        }
        for (table_name, columns) in &populated {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            execute(&conn, &format!("DROP TABLE IF EXISTS {POPULATED}.{table_name}"))?;
            execute(
                &conn,
                &schema
                    .table(table_name)?
                    .table_schema(&format!("{POPULATED}."), Some(&columns)),
            )?;
        }
        timer.lap("Table creation");

        let mut materialized = BTreeMap::new();
        for (table, columns) in &working_columns {
            materialized.insert(table.clone(), schema.ordered_columns(table, columns)?);
        }
        let plan = PopulationPlan {
            schema,
            populated,
            materialized,
            query_tables: query_columns.keys().cloned().collect(),
            condition,
            single_table,
        };

        let mut index_manager = IndexManager::new(schema.root_name());
        let mut containers = 0_u64;
        self.source
            .stream(&mut |info: &ContainerInfo, container: &dyn Container| {
                tracing::debug!(target: debug::PROGRESS, "Container {} {}", info.id, info.name);
                load_container(&conn, &tables, container)?;
                plan.populate_container(&conn, &mut index_manager)?;
                drop_working_tables(&conn, &tables)?;
                containers += 1;
                Ok(())
            })?;
        timer.lap("Table population");
        tracing::debug!(target: debug::PROGRESS, "Populated from {containers} containers");

        execute(&conn, &format!("DETACH {POPULATED}"))?;
        drop(conn);

        for (table_name, _) in &plan.populated {
            run_post_population_script(database_path, schema.table(table_name)?)?;
        }
        timer.finish();
        Ok(())
    }
}

/// Run the table's post-population script, skipping failing statements.
fn run_post_population_script(database_path: &Path, table: &TableMeta) -> Result<()> {
    let Some(script_name) = table.post_population_script.as_deref() else {
        return Ok(());
    };
    let conn = Connection::open(database_path)?;
    let script = sql_script(script_name)?;
    for statement in text::split_sql_statements(&script) {
        match conn.execute_batch(sql::log_sql(&statement)) {
            Ok(()) => {
                tracing::debug!(target: debug::PERF, "Run {script_name} {statement}");
            }
            Err(err) => {
                tracing::warn!(
                    script = script_name,
                    error = %err,
                    "Unable to execute {statement} (Column not populated?)"
                );
            }
        }
    }
    Ok(())
}
