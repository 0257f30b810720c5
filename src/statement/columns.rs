use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::catalog::{self, NativeType};
use crate::client::{ColumnFlags, Field};
use crate::types::SqlType;

/// Raw field metadata for one result plus its lazily built views.
#[derive(Debug)]
pub(crate) struct ColumnCache {
    fields: Vec<Field>,
    info: OnceLock<ColumnInfo>,
}

impl ColumnCache {
    pub(crate) fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            info: OnceLock::new(),
        }
    }

    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn info(&self) -> &ColumnInfo {
        self.info.get_or_init(|| ColumnInfo::from_fields(&self.fields))
    }
}

/// Per-column metadata of a result, indexed by column position.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    pub tables: Vec<String>,
    pub sql_types: Vec<SqlType>,
    pub native_types: Vec<NativeType>,
    pub type_names: Vec<&'static str>,
    pub nullable: Vec<bool>,
    pub lengths: Vec<u64>,
    pub max_lengths: Vec<u64>,
    /// `max(length, max_length)`.
    pub precision: Vec<u64>,
    pub scale: Vec<u8>,
    pub is_pri_key: Vec<bool>,
    /// Primary, unique, or part of a multi-column key.
    pub is_key: Vec<bool>,
    pub is_blob: Vec<bool>,
    pub is_num: Vec<bool>,
    pub is_auto_increment: Vec<bool>,
}

impl ColumnInfo {
    fn from_fields(fields: &[Field]) -> Self {
        let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let descriptors: Vec<_> = fields.iter().map(|f| catalog::lookup(f.native_type)).collect();
        let flag = |bits: u32| -> Vec<bool> { fields.iter().map(|f| f.flags.contains(bits)).collect() };

        Self {
            names: Arc::new(names),
            index: Arc::new(index),
            tables: fields.iter().map(|f| f.table.clone()).collect(),
            sql_types: descriptors.iter().map(|d| d.data_type).collect(),
            native_types: fields.iter().map(|f| f.native_type).collect(),
            type_names: descriptors.iter().map(|d| d.type_name).collect(),
            nullable: fields.iter().map(|f| !f.flags.contains(ColumnFlags::NOT_NULL)).collect(),
            lengths: fields.iter().map(|f| f.length).collect(),
            max_lengths: fields.iter().map(|f| f.max_length).collect(),
            precision: fields.iter().map(|f| f.length.max(f.max_length)).collect(),
            scale: fields.iter().map(|f| f.decimals).collect(),
            is_pri_key: flag(ColumnFlags::PRI_KEY),
            is_key: flag(ColumnFlags::PRI_KEY | ColumnFlags::UNIQUE_KEY | ColumnFlags::MULTIPLE_KEY),
            is_blob: fields
                .iter()
                .map(|f| f.native_type.is_blob() || f.flags.contains(ColumnFlags::BLOB))
                .collect(),
            is_num: descriptors.iter().map(|d| d.is_num).collect(),
            is_auto_increment: flag(ColumnFlags::AUTO_INCREMENT),
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of the column called `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn names_arc(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.names)
    }

    pub(crate) fn index_arc(&self) -> Arc<HashMap<String, usize>> {
        Arc::clone(&self.index)
    }
}
