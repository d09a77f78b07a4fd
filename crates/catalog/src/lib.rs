//! Table and index metadata: schemas, primary keys, and the primary/
//! secondary write targets the write pipeline and operator library consume.

pub mod target;

use std::{fs, path::Path};

use ahash::RandomState;
use common::{ColumnId, DbError, DbResult, FunctionId, IndexId, SequenceId, TableId};
use hashbrown::HashMap;
use record::FieldInfo;
use serde::{Deserialize, Serialize};
use types::{FieldType, OwnedValue};
use uuid::Uuid;

pub use target::{PrimaryTarget, SecondaryTarget};

type Map<K, V> = HashMap<K, V, RandomState>;

/// Persistent catalog that stores table schemas and index metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    tables: Vec<TableMeta>,
    next_table_id: u64,
    next_index_id: u64,
    #[serde(skip)]
    #[serde(default)]
    table_name_index: Map<String, usize>,
    #[serde(skip)]
    #[serde(default)]
    table_id_index: Map<TableId, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        let mut catalog = Self {
            tables: Vec::new(),
            next_table_id: 1,
            next_index_id: 1,
            table_name_index: Map::default(),
            table_id_index: Map::default(),
        };
        catalog.rebuild_indexes();
        catalog
    }

    /// Load a catalog from disk, returning an empty catalog if the file does not exist.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&data)
            .map_err(|err| DbError::Catalog(format!("invalid catalog file: {err}")))?;
        catalog.rebuild_indexes();
        Ok(catalog)
    }

    /// Persist the catalog contents as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::Catalog(format!("serialize failed: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn table(&self, name: &str) -> DbResult<&TableMeta> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))
    }

    pub fn table_by_id(&self, id: TableId) -> DbResult<&TableMeta> {
        let idx = self
            .table_id_index
            .get(&id)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))
    }

    /// Create a new table with the provided columns and primary key
    /// ordinals, returning its identifier. `primary_key` must name at least
    /// one column; the write pipeline has no "heap table with no key"
    /// concept — every table is primary-index-organized.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<Column>,
        primary_key: Vec<ColumnId>,
    ) -> DbResult<TableId> {
        if self.table_name_index.contains_key(name) {
            return Err(DbError::Catalog(format!("table '{name}' already exists")));
        }
        if primary_key.is_empty() {
            return Err(DbError::Catalog(
                "table must declare at least one primary key column".into(),
            ));
        }
        let schema = TableSchema::try_new(columns)?;
        for &pk in &primary_key {
            if schema.columns.get(pk as usize).is_none() {
                return Err(DbError::Catalog(format!(
                    "primary key ordinal {pk} out of range"
                )));
            }
        }
        let table_id = TableId(self.next_table_id);
        self.next_table_id += 1;
        let table = TableMeta::new(table_id, name.to_string(), schema, primary_key);
        self.tables.push(table);
        self.rebuild_indexes();
        Ok(table_id)
    }

    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables.remove(idx);
        self.rebuild_indexes();
        Ok(())
    }

    /// Create a secondary index over the given table columns, returning
    /// its identifier. Primary-key-only indexes are rejected: the primary
    /// key is already the primary storage's own ordering.
    pub fn create_index(
        &mut self,
        table_name: &str,
        index_name: &str,
        columns: &[&str],
        kind: IndexKind,
        unique: bool,
    ) -> DbResult<IndexId> {
        if columns.is_empty() {
            return Err(DbError::Catalog(
                "index must reference at least one column".into(),
            ));
        }
        let resolved = {
            let table = self.table(table_name)?;
            let mut resolved = Vec::with_capacity(columns.len());
            for name in columns {
                let ordinal = table.schema.column_index(name).ok_or_else(|| {
                    DbError::Catalog(format!("unknown column '{name}' on table '{table_name}'"))
                })?;
                resolved.push(ordinal);
            }
            resolved
        };
        let index_id = IndexId(self.next_index_id);
        self.next_index_id += 1;
        let table = self.table_mut(table_name)?;
        table.add_index(IndexMeta {
            id: index_id,
            name: index_name.to_string(),
            columns: resolved,
            kind,
            unique,
            storage: StorageDescriptor::new(format!("{table_name}.{index_name}")),
        })?;
        Ok(index_id)
    }

    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> DbResult<()> {
        let table = self.table_mut(table_name)?;
        table.remove_index(index_name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.iter()
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut TableMeta> {
        let id = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables
            .get_mut(id)
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))
    }

    fn rebuild_indexes(&mut self) {
        self.table_name_index.clear();
        self.table_id_index.clear();
        for (idx, table) in self.tables.iter_mut().enumerate() {
            self.table_name_index.insert(table.name.clone(), idx);
            self.table_id_index.insert(table.id, idx);
            table.rebuild_index_lookup();
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata describing a registered table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: TableId,
    pub name: String,
    pub schema: TableSchema,
    pub primary_key: Vec<ColumnId>,
    pub storage: StorageDescriptor,
    pub indexes: Vec<IndexMeta>,
    #[serde(skip)]
    #[serde(default)]
    index_name_lookup: Map<String, usize>,
    #[serde(skip)]
    #[serde(default)]
    index_id_lookup: Map<IndexId, usize>,
}

impl TableMeta {
    fn new(id: TableId, name: String, schema: TableSchema, primary_key: Vec<ColumnId>) -> Self {
        let storage = StorageDescriptor::new(format!("{name}.primary"));
        let mut table = Self {
            id,
            name,
            schema,
            primary_key,
            storage,
            indexes: Vec::new(),
            index_name_lookup: Map::default(),
            index_id_lookup: Map::default(),
        };
        table.rebuild_index_lookup();
        table
    }

    fn add_index(&mut self, index: IndexMeta) -> DbResult<()> {
        if self.index_name_lookup.contains_key(&index.name) {
            return Err(DbError::Catalog(format!(
                "index '{}' already exists on table '{}'",
                index.name, self.name
            )));
        }
        self.indexes.push(index);
        self.rebuild_index_lookup();
        Ok(())
    }

    fn remove_index(&mut self, index_name: &str) -> DbResult<()> {
        let idx = self
            .index_name_lookup
            .get(index_name)
            .copied()
            .ok_or_else(|| {
                DbError::Catalog(format!(
                    "index '{index_name}' does not exist on table '{}'",
                    self.name
                ))
            })?;
        self.indexes.remove(idx);
        self.rebuild_index_lookup();
        Ok(())
    }

    pub fn index(&self, name: &str) -> DbResult<&IndexMeta> {
        let idx = self.index_name_lookup.get(name).copied().ok_or_else(|| {
            DbError::Catalog(format!(
                "index '{name}' does not exist on table '{}'",
                self.name
            ))
        })?;
        self.indexes
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("index '{name}' missing on '{}'", self.name)))
    }

    pub fn index_by_id(&self, id: IndexId) -> DbResult<&IndexMeta> {
        let idx = self.index_id_lookup.get(&id).copied().ok_or_else(|| {
            DbError::Catalog(format!("unknown index id {} on '{}'", id.0, self.name))
        })?;
        self.indexes.get(idx).ok_or_else(|| {
            DbError::Catalog(format!(
                "index id {} missing in table '{}'",
                id.0, self.name
            ))
        })
    }

    pub fn has_index(&self, index_name: &str) -> bool {
        self.index_name_lookup.contains_key(index_name)
    }

    pub fn indexes(&self) -> &[IndexMeta] {
        &self.indexes
    }

    fn field_info(&self, ordinal: ColumnId) -> FieldInfo {
        let col = &self.schema.columns[ordinal as usize];
        FieldInfo::new(col.ty.clone(), col.nullable)
    }

    /// The primary storage's write target: primary key columns as the key,
    /// every remaining column as the value, in schema order.
    pub fn primary_target(&self) -> PrimaryTarget {
        let value_columns: Vec<ColumnId> = (0..self.schema.columns.len() as ColumnId)
            .filter(|c| !self.primary_key.contains(c))
            .collect();
        PrimaryTarget {
            storage_name: self.storage.storage_name.clone(),
            key_fields: self.primary_key.iter().map(|&c| self.field_info(c)).collect(),
            value_fields: value_columns.iter().map(|&c| self.field_info(c)).collect(),
            key_columns: self.primary_key.clone(),
            value_columns,
        }
    }

    /// A secondary index's write target, described in [`SecondaryTarget`].
    pub fn secondary_target(&self, index_name: &str) -> DbResult<SecondaryTarget> {
        let index = self.index(index_name)?;
        let mut key_columns = index.columns.clone();
        for &pk in &self.primary_key {
            if !key_columns.contains(&pk) {
                key_columns.push(pk);
            }
        }
        Ok(SecondaryTarget {
            storage_name: index.storage.storage_name.clone(),
            unique: index.unique,
            key_fields: key_columns.iter().map(|&c| self.field_info(c)).collect(),
            key_columns,
        })
    }

    /// All secondary targets for this table, in declaration order.
    pub fn secondary_targets(&self) -> DbResult<Vec<SecondaryTarget>> {
        self.indexes
            .iter()
            .map(|idx| self.secondary_target(&idx.name))
            .collect()
    }

    fn rebuild_index_lookup(&mut self) {
        self.index_name_lookup.clear();
        self.index_id_lookup.clear();
        for (idx, index) in self.indexes.iter().enumerate() {
            self.index_name_lookup.insert(index.name.clone(), idx);
            self.index_id_lookup.insert(index.id, idx);
        }
    }
}

/// Column layout for a table, along with helpful lookup structures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub name_to_ordinal: Map<String, ColumnId>,
}

impl TableSchema {
    pub fn try_new(columns: Vec<Column>) -> DbResult<Self> {
        if columns.is_empty() {
            return Err(DbError::Catalog(
                "table must contain at least one column".into(),
            ));
        }
        if columns.len() > u16::MAX as usize {
            return Err(DbError::Catalog(
                "too many columns for a single table".into(),
            ));
        }
        let mut name_to_ordinal = Map::default();
        for (idx, column) in columns.iter().enumerate() {
            let ordinal = idx as ColumnId;
            if name_to_ordinal
                .insert(column.name.clone(), ordinal)
                .is_some()
            {
                return Err(DbError::Catalog(format!(
                    "duplicate column '{}' found while building schema",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            name_to_ordinal,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<ColumnId> {
        self.name_to_ordinal.get(name).copied()
    }

    pub fn column_type(&self, ordinal: ColumnId) -> Option<&FieldType> {
        self.columns.get(ordinal as usize).map(|c| &c.ty)
    }
}

/// The default-value policy applied when a write statement's tuple omits
/// this column.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ColumnDefault {
    /// No default: a non-nullable column without a value is a constraint
    /// violation; a nullable one gets NULL.
    Nothing,
    /// A frozen constant, copied verbatim.
    Immediate(OwnedValue),
    /// Call `sequence_manager.next(def_id, tx)` for the next value.
    Sequence(SequenceId),
    /// Evaluate a bound nullary function (e.g. `current_timestamp`).
    Function(FunctionId),
}

/// Describes a logical column within a table schema.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub default: ColumnDefault,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: FieldType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
            default: ColumnDefault::Nothing,
        }
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }
}

/// Metadata describing a secondary table index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    pub id: IndexId,
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub kind: IndexKind,
    pub unique: bool,
    pub storage: StorageDescriptor,
}

/// Supported index implementations. The KVS itself only ever sees an
/// ordered byte-key store; this distinguishes intent (future-facing
/// planner hints), not a different physical layout.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexKind {
    BTree,
    Hash,
    Bitmap,
    Trie,
}

/// Links a catalog entry (table or index) to its KVS storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub file_id: Uuid,
    pub storage_name: String,
}

impl StorageDescriptor {
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            file_id: Uuid::new_v4(),
            storage_name: storage_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use types::FieldType;

    fn sample_columns() -> Vec<Column> {
        vec![
            Column::new("id", FieldType::Int4, false),
            Column::new("name", FieldType::Character(types::LengthDetail {
                length: 64,
                varying: true,
            }), true),
            Column::new("age", FieldType::Int4, true),
        ]
    }

    #[test]
    fn create_and_lookup_table() {
        let mut catalog = Catalog::new();
        let table_id = catalog
            .create_table("users", sample_columns(), vec![0])
            .unwrap();

        assert_eq!(table_id, TableId(1));

        let table = catalog.table("users").unwrap();
        assert_eq!(table.schema.column_index("name"), Some(1));
        assert_eq!(table.schema.column_type(0), Some(&FieldType::Int4));

        let same_table = catalog.table_by_id(table_id).unwrap();
        assert_eq!(same_table.name, "users");
    }

    #[test]
    fn rejects_table_without_primary_key() {
        let mut catalog = Catalog::new();
        let err = catalog
            .create_table("users", sample_columns(), vec![])
            .unwrap_err();
        assert!(format!("{err}").contains("primary key"));
    }

    #[test]
    fn rejects_duplicate_tables() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", sample_columns(), vec![0]).unwrap();
        let err = catalog
            .create_table("users", sample_columns(), vec![0])
            .unwrap_err();
        assert!(matches!(err, DbError::Catalog(_)));
        assert!(format!("{err}").contains("already exists"));
    }

    #[test]
    fn primary_target_splits_key_and_value_columns() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", sample_columns(), vec![0]).unwrap();
        let table = catalog.table("users").unwrap();
        let target = table.primary_target();
        assert_eq!(target.key_columns, vec![0]);
        assert_eq!(target.value_columns, vec![1, 2]);
    }

    #[test]
    fn secondary_target_appends_primary_key() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", sample_columns(), vec![0]).unwrap();
        catalog
            .create_index("users", "idx_name", &["name"], IndexKind::BTree, false)
            .unwrap();
        let table = catalog.table("users").unwrap();
        let target = table.secondary_target("idx_name").unwrap();
        assert_eq!(target.key_columns, vec![1, 0]);
        assert!(!target.unique);
    }

    #[test]
    fn persistence_round_trip() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", sample_columns(), vec![0]).unwrap();
        catalog
            .create_index("users", "idx_users_name", &["name"], IndexKind::Hash, true)
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        let table = loaded.table("users").unwrap();
        assert!(table.has_index("idx_users_name"));
        assert_eq!(loaded.table_by_id(TableId(1)).unwrap().name, "users");
    }

    #[test]
    fn drop_table_removes_metadata() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", sample_columns(), vec![0]).unwrap();
        catalog.drop_table("users").unwrap();
        assert!(catalog.table("users").is_err());
    }
}
