//! The registration pipeline: payload validation, idempotent upsert,
//! id resolution, and cartesian junction population, all inside the
//! caller's transaction.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension, Transaction};
use serde::Deserialize;
use thiserror::Error;

use crate::schema::{EntityDef, KeyDef, LinkDef, SchemaRegistry};

#[derive(Debug, Error)]
pub enum RegisterError {
    /// Payload shape error or duplicate unique-field value in one array.
    #[error("{0}")]
    Invalid(String),
    /// Per-field messages collected across all rows of one entity.
    #[error("row validation failed")]
    RowValidation(Vec<String>),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

/// A record headed for one table: column name paired with its value.
#[derive(Debug, Clone)]
pub struct Record {
    values: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new(values: Vec<(&'static str, Value)>) -> Self {
        Record { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(c, _)| *c)
    }

    fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, v)| v)
    }
}

/// A record as it exists after upsert, surrogate id populated.
#[derive(Debug)]
pub struct PersistedRecord {
    pub id: i64,
    pub record: Record,
}

/// Register payloads accept a single record or an array of records per
/// key; the shape is normalized to a list right here at the boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<serde_json::Value>),
    One(serde_json::Value),
}

impl OneOrMany {
    fn into_list(self) -> (Vec<serde_json::Value>, bool) {
        match self {
            OneOrMany::Many(items) => (items, true),
            OneOrMany::One(item) => (vec![item], false),
        }
    }
}

/// The four normalized sub-bodies of a register payload, values passed
/// through unchanged.
#[derive(Debug)]
pub struct RegisterBodies {
    pub teacher: Vec<serde_json::Value>,
    pub students: Vec<serde_json::Value>,
    pub subject: Vec<serde_json::Value>,
    pub class: Vec<serde_json::Value>,
}

fn mandatory() -> RegisterError {
    RegisterError::Invalid("All inputs are mandatory!".to_string())
}

/// Check the payload has exactly the four expected keys and that no array
/// value repeats its entity's unique field. Returns the sub-bodies
/// unchanged apart from one-or-many normalization.
pub fn validate_register_body(
    schema: &SchemaRegistry,
    params: &serde_json::Value,
) -> Result<RegisterBodies, RegisterError> {
    let obj = params.as_object().ok_or_else(mandatory)?;
    if obj.len() != 4 {
        return Err(mandatory());
    }

    let mut lists: Vec<Vec<serde_json::Value>> = Vec::with_capacity(4);
    for def in schema.entities() {
        let value = obj.get(def.payload_key).ok_or_else(mandatory)?;
        let shape: OneOrMany =
            serde_json::from_value(value.clone()).map_err(|_| mandatory())?;
        let (records, was_array) = shape.into_list();

        // Only arrays can carry duplicates; a single record is trivially
        // safe. Missing values all key as null, which matches too.
        if was_array {
            let mut seen = HashSet::new();
            for rec in &records {
                let key = rec
                    .get(def.unique_field)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null)
                    .to_string();
                if !seen.insert(key) {
                    return Err(RegisterError::Invalid(format!(
                        "Duplicate value found for key '{}' on field '{}'",
                        def.payload_key, def.unique_field
                    )));
                }
            }
        }
        lists.push(records);
    }

    let mut lists = lists.into_iter();
    Ok(RegisterBodies {
        teacher: lists.next().unwrap_or_default(),
        students: lists.next().unwrap_or_default(),
        subject: lists.next().unwrap_or_default(),
        class: lists.next().unwrap_or_default(),
    })
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Convert raw payload rows into typed records, collecting every field
/// violation across every row. Any message fails the whole batch.
pub fn to_records(
    def: &EntityDef,
    rows: &[serde_json::Value],
) -> Result<Vec<Record>, RegisterError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut errors: Vec<String> = Vec::new();

    for row in rows {
        let Some(obj) = row.as_object() else {
            errors.push(format!(
                "Validation error: {} record must be an object",
                def.model
            ));
            continue;
        };

        let mut values = Vec::with_capacity(def.fields.len());
        for field in def.fields {
            match obj.get(field.field) {
                None | Some(serde_json::Value::Null) => {
                    if field.required {
                        errors.push(format!(
                            "notNull Violation: {}.{} cannot be null",
                            def.model, field.field
                        ));
                    }
                }
                Some(serde_json::Value::String(s)) => {
                    if let Some((min, max)) = field.len {
                        let n = s.chars().count();
                        if n < min || n > max {
                            errors.push(format!(
                                "Validation error: {}.{} must be between {} and {} characters",
                                def.model, field.field, min, max
                            ));
                            continue;
                        }
                    }
                    if field.email && !looks_like_email(s) {
                        errors.push(format!(
                            "Validation error: {}.{} is not a valid email address",
                            def.model, field.field
                        ));
                        continue;
                    }
                    values.push((field.column, Value::Text(s.clone())));
                }
                Some(_) => {
                    errors.push(format!(
                        "Validation error: {}.{} must be a string",
                        def.model, field.field
                    ));
                }
            }
        }
        records.push(Record::new(values));
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(RegisterError::RowValidation(errors))
    }
}

/// Insert each record, or update the non-key columns of the first existing
/// row whose values match the conflict key. Returns persisted records in
/// input order.
pub fn upsert(
    tx: &Transaction,
    table: &str,
    records: &[Record],
    conflict: &KeyDef,
) -> Result<Vec<PersistedRecord>, rusqlite::Error> {
    let match_clause = conflict
        .columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let select_sql = format!("SELECT id FROM {table} WHERE {match_clause}");

    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        let key_values: Vec<Value> = conflict
            .columns
            .iter()
            .map(|c| rec.get(c).cloned().unwrap_or(Value::Null))
            .collect();

        let existing: Option<i64> = tx
            .query_row(&select_sql, params_from_iter(key_values.iter()), |r| {
                r.get(0)
            })
            .optional()?;

        let id = match existing {
            Some(id) => {
                let updates: Vec<(&str, &Value)> = rec
                    .values
                    .iter()
                    .filter(|(c, _)| !conflict.columns.contains(c))
                    .map(|(c, v)| (*c, v))
                    .collect();
                if !updates.is_empty() {
                    let set_clause = updates
                        .iter()
                        .map(|(c, _)| format!("{c} = ?"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let mut params: Vec<&Value> =
                        updates.iter().map(|(_, v)| *v).collect();
                    let id_value = Value::Integer(id);
                    params.push(&id_value);
                    tx.execute(
                        &format!("UPDATE {table} SET {set_clause} WHERE id = ?"),
                        params_from_iter(params),
                    )?;
                }
                id
            }
            None => {
                let columns = rec.columns().collect::<Vec<_>>().join(", ");
                let placeholders = rec
                    .columns()
                    .map(|_| "?")
                    .collect::<Vec<_>>()
                    .join(", ");
                tx.execute(
                    &format!("INSERT INTO {table}({columns}) VALUES({placeholders})"),
                    params_from_iter(rec.values()),
                )?;
                tx.last_insert_rowid()
            }
        };

        out.push(PersistedRecord {
            id,
            record: rec.clone(),
        });
    }
    Ok(out)
}

/// Look up the surrogate ids of rows matching any input record on the
/// given key: conjunction over key columns per record, disjunction across
/// records. Output order follows the store, not the input, and a broad
/// filter can over-match; callers only pass records they wrote earlier in
/// the same transaction.
pub fn resolve_ids(
    tx: &Transaction,
    table: &str,
    records: &[Record],
    key: &KeyDef,
) -> Result<Vec<i64>, rusqlite::Error> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let per_record = format!(
        "({})",
        key.columns
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ")
    );
    let filter = vec![per_record; records.len()].join(" OR ");
    let params: Vec<Value> = records
        .iter()
        .flat_map(|rec| {
            key.columns
                .iter()
                .map(|c| rec.get(c).cloned().unwrap_or(Value::Null))
        })
        .collect();

    let mut stmt = tx.prepare(&format!("SELECT id FROM {table} WHERE {filter}"))?;
    let ids = stmt
        .query_map(params_from_iter(params.iter()), |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Full cross product of two id lists as link records, row-major: the
/// outer loop walks `ids_a`, the inner loop `ids_b`.
pub fn cross_link(
    ids_a: &[i64],
    ids_b: &[i64],
    fk_a: &'static str,
    fk_b: &'static str,
) -> Vec<Record> {
    let mut rows = Vec::with_capacity(ids_a.len() * ids_b.len());
    for &a in ids_a {
        for &b in ids_b {
            rows.push(Record::new(vec![
                (fk_a, Value::Integer(a)),
                (fk_b, Value::Integer(b)),
            ]));
        }
    }
    rows
}

/// Upsert the cross product of two id lists into a junction table, keyed
/// on the foreign-key pair so re-registration does not duplicate links.
pub fn populate_junction(
    tx: &Transaction,
    link: &LinkDef,
    ids_a: &[i64],
    ids_b: &[i64],
) -> Result<Vec<PersistedRecord>, rusqlite::Error> {
    let rows = cross_link(ids_a, ids_b, link.fk_a, link.fk_b);
    upsert(tx, link.table, &rows, &link.conflict_key)
}

fn upsert_entity(
    tx: &Transaction,
    def: &EntityDef,
    rows: &[serde_json::Value],
) -> Result<Vec<Record>, RegisterError> {
    let records = to_records(def, rows)?;
    upsert(tx, def.table, &records, &def.update_key)?;
    Ok(records)
}

/// The whole registration sequence. Runs inside the caller's transaction;
/// the caller commits on `Ok` and rolls back on any error.
pub fn register(
    tx: &Transaction,
    schema: &SchemaRegistry,
    params: &serde_json::Value,
) -> Result<(), RegisterError> {
    let bodies = validate_register_body(schema, params)?;

    // Primary entities update-match on name; the business-unique columns
    // (email/code) stay guarded by the schema's UNIQUE constraints.
    let teachers = upsert_entity(tx, &schema.teacher, &bodies.teacher)?;
    let students = upsert_entity(tx, &schema.student, &bodies.students)?;
    let subjects = upsert_entity(tx, &schema.subject, &bodies.subject)?;
    let classes = upsert_entity(tx, &schema.class, &bodies.class)?;

    let subject_ids = resolve_ids(tx, schema.subject.table, &subjects, &schema.subject.unique_key)?;
    let class_ids = resolve_ids(tx, schema.class.table, &classes, &schema.class.unique_key)?;

    let subject_classes =
        populate_junction(tx, &schema.subject_class, &subject_ids, &class_ids)?;
    let subject_class_rows: Vec<Record> = subject_classes
        .into_iter()
        .map(|p| p.record)
        .collect();
    let subject_class_ids = resolve_ids(
        tx,
        schema.subject_class.table,
        &subject_class_rows,
        &schema.subject_class.conflict_key,
    )?;

    let teacher_ids = resolve_ids(tx, schema.teacher.table, &teachers, &schema.teacher.unique_key)?;
    populate_junction(
        tx,
        &schema.teacher_subject_class,
        &teacher_ids,
        &subject_class_ids,
    )?;

    let student_ids = resolve_ids(tx, schema.student.table, &students, &schema.student.unique_key)?;
    populate_junction(
        tx,
        &schema.student_subject_class,
        &student_ids,
        &subject_class_ids,
    )?;

    Ok(())
}
