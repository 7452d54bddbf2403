use rusqlite::Connection;
use std::path::Path;

use crate::schema::{EntityDef, LinkDef, SchemaRegistry};

pub fn open_db(workspace: &Path, schema: &SchemaRegistry) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("roster.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_tables(&conn, schema)?;
    Ok(conn)
}

/// Create all tables and indexes described by the registry. Idempotent;
/// split out from [`open_db`] so tests can run against an in-memory
/// connection.
pub fn create_tables(conn: &Connection, schema: &SchemaRegistry) -> anyhow::Result<()> {
    for def in schema.entities() {
        conn.execute(&entity_ddl(def), [])?;
    }
    for link in schema.links() {
        conn.execute(&link_ddl(link), [])?;
        for fk in [link.fk_a, link.fk_b] {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                    link.table, fk, link.table, fk
                ),
                [],
            )?;
        }
    }
    Ok(())
}

fn entity_ddl(def: &EntityDef) -> String {
    let mut parts = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for f in def.fields {
        let mut col = format!("{} TEXT", f.column);
        if f.required {
            col.push_str(" NOT NULL");
        }
        parts.push(col);
    }
    parts.push(format!("UNIQUE({})", def.unique_key.columns.join(", ")));
    format!(
        "CREATE TABLE IF NOT EXISTS {}({})",
        def.table,
        parts.join(", ")
    )
}

fn link_ddl(link: &LinkDef) -> String {
    // No UNIQUE on the foreign-key pair: link idempotency is the upsert
    // conflict key's job, not the schema's.
    format!(
        "CREATE TABLE IF NOT EXISTS {table}(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {fk_a} INTEGER NOT NULL,
            {fk_b} INTEGER NOT NULL,
            FOREIGN KEY({fk_a}) REFERENCES {ref_a}(id),
            FOREIGN KEY({fk_b}) REFERENCES {ref_b}(id)
        )",
        table = link.table,
        fk_a = link.fk_a,
        fk_b = link.fk_b,
        ref_a = link.references_a,
        ref_b = link.references_b,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::REGISTRY;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .expect("prepare");
        stmt.query_map([], |r| r.get::<_, String>(0))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect")
    }

    #[test]
    fn create_tables_is_idempotent_and_covers_registry() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        create_tables(&conn, &REGISTRY).expect("first create");
        create_tables(&conn, &REGISTRY).expect("second create");

        let names = table_names(&conn);
        for def in REGISTRY.entities() {
            assert!(names.iter().any(|n| n == def.table), "missing {}", def.table);
        }
        for link in REGISTRY.links() {
            assert!(
                names.iter().any(|n| n == link.table),
                "missing {}",
                link.table
            );
        }
    }

    #[test]
    fn subject_class_pair_is_not_schema_unique() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        create_tables(&conn, &REGISTRY).expect("create");
        conn.execute(
            "INSERT INTO subjects(name, subject_code) VALUES('English', 'ENG')",
            [],
        )
        .expect("subject");
        conn.execute(
            "INSERT INTO classes(name, class_code) VALUES('P1-1 Int', 'P1-1')",
            [],
        )
        .expect("class");
        // Raw duplicate inserts must both succeed; only the upsert layer
        // keeps registrations from duplicating links.
        conn.execute(
            "INSERT INTO subject_classes(subject_id, class_id) VALUES(1, 1)",
            [],
        )
        .expect("first link");
        conn.execute(
            "INSERT INTO subject_classes(subject_id, class_id) VALUES(1, 1)",
            [],
        )
        .expect("second link");
    }
}
