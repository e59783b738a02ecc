//! In-memory [`RecordStore`] implementation backed by [`DashMap`].
//!
//! Each table is a `DashMap` from an encoded primary key to the item.
//! Per-key mutations go through the `DashMap` entry API, so a conditional
//! put or an update is atomic with respect to other calls on the same key.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use recordgate_core::{
    parse_input, DeleteItemInput, GetItemInput, Item, PutItemInput, ReturnValues,
    UpdateItemInput,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::storage::error::StoreError;
use crate::storage::expression::{
    apply_update, condition_holds, parse_condition, parse_projection, parse_update, Placeholders,
    Predicate,
};
use crate::storage::record_store::RecordStore;

/// Primary key layout of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Attribute holding the partition (hash) key.
    pub partition_key: String,
    /// Optional attribute holding the sort (range) key.
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Schema with only a partition key.
    #[must_use]
    pub fn partition(name: impl Into<String>) -> Self {
        Self {
            partition_key: name.into(),
            sort_key: None,
        }
    }

    /// Schema with a partition key and a sort key.
    #[must_use]
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition_key: partition.into(),
            sort_key: Some(sort.into()),
        }
    }

    fn attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        self.attributes().any(|a| a == name)
    }

    /// Encodes the key attributes of `source` into a map key.
    ///
    /// With `exact`, `source` must hold the key attributes and nothing else
    /// (a `Key` parameter); otherwise extra attributes are allowed (an `Item`).
    /// Numbers compare by value, so `1`, `1.0` and `1e0` encode alike.
    fn encode(&self, source: &Item, exact: bool) -> Result<String, StoreError> {
        let mut parts = Vec::with_capacity(2);
        for attr in self.attributes() {
            match source.get(attr) {
                Some(Value::String(s)) => parts.push(Value::String(s.clone())),
                Some(Value::Number(n)) => parts.push(canonical_number(n)),
                Some(_) => {
                    return Err(StoreError::validation(format!(
                        "One or more parameter values were invalid: Type mismatch for key {attr}"
                    )))
                }
                None => {
                    return Err(StoreError::validation(format!(
                        "One or more parameter values were invalid: Missing the key {attr} in the item"
                    )))
                }
            }
        }

        if exact && source.len() != parts.len() {
            return Err(StoreError::validation(
                "The provided key element does not match the schema",
            ));
        }

        Ok(serde_json::to_string(&parts)?)
    }
}

/// Integral numbers become `i64`/`u64` so equal values share one encoding.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn canonical_number(n: &serde_json::Number) -> Value {
    if n.is_i64() || n.is_u64() {
        return Value::Number(n.clone());
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Value::from(f as i64)
        }
        Some(f) if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 => Value::from(f as u64),
        _ => Value::Number(n.clone()),
    }
}

struct Table {
    schema: KeySchema,
    items: DashMap<String, Item>,
}

/// In-memory record store with document-client semantics.
///
/// Tables must be created up front with [`MemoryStore::create_table`];
/// calls addressing any other table fail with
/// [`StoreError::ResourceNotFound`].
pub struct MemoryStore {
    tables: DashMap<String, Arc<Table>>,
}

impl MemoryStore {
    /// Creates a store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Builder form of [`create_table`](Self::create_table).
    #[must_use]
    pub fn with_table(self, name: impl Into<String>, schema: KeySchema) -> Self {
        self.create_table(name, schema);
        self
    }

    /// Creates an empty table. Re-creating an existing table keeps its items.
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) {
        self.tables.entry(name.into()).or_insert_with(|| {
            Arc::new(Table {
                schema,
                items: DashMap::new(),
            })
        });
    }

    /// Number of items in `table`, or `None` if the table does not exist.
    #[must_use]
    pub fn item_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.items.len())
    }

    fn table(&self, name: &str) -> Result<Arc<Table>, StoreError> {
        self.tables
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| StoreError::ResourceNotFound {
                table: name.to_string(),
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_predicates(
    expr: Option<&str>,
    names: &BTreeMap<String, String>,
    values: &Item,
) -> Result<Vec<Predicate>, StoreError> {
    match expr {
        Some(expr) => parse_condition(expr, Placeholders { names, values }),
        None => Ok(Vec::new()),
    }
}

fn attributes(item: Item) -> Value {
    json!({ "Attributes": item })
}

/// Builds the `put`/`delete` response, which may only echo the old item.
fn old_item_response(
    return_values: ReturnValues,
    old: Option<Item>,
) -> Result<Value, StoreError> {
    match return_values {
        ReturnValues::None => Ok(json!({})),
        ReturnValues::AllOld => Ok(old.map_or_else(|| json!({}), attributes)),
        other => Err(StoreError::validation(format!(
            "ReturnValues can only be ALL_OLD or NONE; got {}",
            other.as_str()
        ))),
    }
}

fn pick(item: &Item, names: &[String]) -> Item {
    names
        .iter()
        .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
        .collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, payload: Item) -> Result<Value, StoreError> {
        let input: PutItemInput = parse_input(payload)?;
        let table = self.table(&input.table_name)?;
        let key = table.schema.encode(&input.item, false)?;
        let predicates = parse_predicates(
            input.condition_expression.as_deref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;
        if !matches!(input.return_values, ReturnValues::None | ReturnValues::AllOld) {
            return old_item_response(input.return_values, None);
        }

        let old = match table.items.entry(key) {
            Entry::Occupied(mut entry) => {
                if !condition_holds(&predicates, Some(entry.get())) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                Some(entry.insert(input.item))
            }
            Entry::Vacant(entry) => {
                if !condition_holds(&predicates, None) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                entry.insert(input.item);
                None
            }
        };

        debug!(table = %input.table_name, replaced = old.is_some(), "put item");
        old_item_response(input.return_values, old)
    }

    async fn get(&self, payload: Item) -> Result<Value, StoreError> {
        let input: GetItemInput = parse_input(payload)?;
        let table = self.table(&input.table_name)?;
        let key = table.schema.encode(&input.key, true)?;
        let projection = input
            .projection_expression
            .as_deref()
            .map(|expr| parse_projection(expr, &input.expression_attribute_names))
            .transpose()?;

        let item = table.items.get(&key).map(|entry| match &projection {
            Some(names) => pick(entry.value(), names),
            None => entry.value().clone(),
        });

        Ok(match item {
            Some(item) => json!({ "Item": item }),
            None => json!({}),
        })
    }

    async fn update(&self, payload: Item) -> Result<Value, StoreError> {
        let input: UpdateItemInput = parse_input(payload)?;
        let table = self.table(&input.table_name)?;
        let key = table.schema.encode(&input.key, true)?;
        let placeholders = Placeholders {
            names: &input.expression_attribute_names,
            values: &input.expression_attribute_values,
        };
        let actions = match input.update_expression.as_deref() {
            Some(expr) => parse_update(expr, placeholders)?,
            None => Vec::new(),
        };
        if let Some(action) = actions
            .iter()
            .find(|a| table.schema.is_key_attribute(a.attribute()))
        {
            return Err(StoreError::validation(format!(
                "One or more parameter values were invalid: Cannot update attribute {}. This attribute is part of the key",
                action.attribute()
            )));
        }
        let predicates = parse_predicates(
            input.condition_expression.as_deref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;

        let (old, new) = match table.items.entry(key) {
            Entry::Occupied(mut entry) => {
                if !condition_holds(&predicates, Some(entry.get())) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                let new = apply_update(&actions, entry.get())?;
                let old = entry.insert(new.clone());
                (Some(old), new)
            }
            Entry::Vacant(entry) => {
                if !condition_holds(&predicates, None) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                let new = apply_update(&actions, &input.key)?;
                entry.insert(new.clone());
                (None, new)
            }
        };

        debug!(table = %input.table_name, created = old.is_none(), "updated item");

        let touched: Vec<String> = actions.iter().map(|a| a.attribute().to_string()).collect();
        Ok(match input.return_values {
            ReturnValues::None => json!({}),
            ReturnValues::AllOld => old.map_or_else(|| json!({}), attributes),
            ReturnValues::AllNew => attributes(new),
            ReturnValues::UpdatedOld => {
                let picked = old.map(|o| pick(&o, &touched)).unwrap_or_default();
                if picked.is_empty() {
                    json!({})
                } else {
                    attributes(picked)
                }
            }
            ReturnValues::UpdatedNew => {
                let picked = pick(&new, &touched);
                if picked.is_empty() {
                    json!({})
                } else {
                    attributes(picked)
                }
            }
        })
    }

    async fn delete(&self, payload: Item) -> Result<Value, StoreError> {
        let input: DeleteItemInput = parse_input(payload)?;
        let table = self.table(&input.table_name)?;
        let key = table.schema.encode(&input.key, true)?;
        let predicates = parse_predicates(
            input.condition_expression.as_deref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;
        if !matches!(input.return_values, ReturnValues::None | ReturnValues::AllOld) {
            return old_item_response(input.return_values, None);
        }

        let old = match table.items.entry(key) {
            Entry::Occupied(entry) => {
                if !condition_holds(&predicates, Some(entry.get())) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                Some(entry.remove())
            }
            Entry::Vacant(_) => {
                if !condition_holds(&predicates, None) {
                    return Err(StoreError::ConditionalCheckFailed);
                }
                None
            }
        };

        debug!(table = %input.table_name, removed = old.is_some(), "deleted item");
        old_item_response(input.return_values, old)
    }
}
