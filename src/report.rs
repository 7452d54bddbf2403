use rusqlite::Connection;
use serde::Serialize;

/// One subject a teacher teaches and how many classes carry it.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WorkloadEntry {
    #[serde(rename = "subjectCode")]
    pub subject_code: String,
    #[serde(rename = "subjectName")]
    pub subject_name: String,
    #[serde(rename = "numberOfClasses")]
    pub number_of_classes: i64,
}

/// Per-teacher workload: for every teacher, the subjects they teach with
/// the count of subject-class links per subject, in first-encountered
/// order. Every teacher appears, linked or not. Plain read, no
/// transaction.
pub fn workload_report(conn: &Connection) -> anyhow::Result<Vec<(String, Vec<WorkloadEntry>)>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, s.subject_code, s.name
         FROM teachers t
         LEFT JOIN teacher_subject_classes tsc ON tsc.teacher_id = t.id
         LEFT JOIN subject_classes sc ON sc.id = tsc.subject_class_id
         LEFT JOIN subjects s ON s.id = sc.subject_id
         ORDER BY t.id, tsc.id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let teacher_id: i64 = row.get(0)?;
            let teacher_name: String = row.get(1)?;
            let subject_code: Option<String> = row.get(2)?;
            let subject_name: Option<String> = row.get(3)?;
            Ok((teacher_id, teacher_name, subject_code, subject_name))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut report: Vec<(String, Vec<WorkloadEntry>)> = Vec::new();
    let mut current: Option<i64> = None;

    for (teacher_id, teacher_name, subject_code, subject_name) in rows {
        if current != Some(teacher_id) {
            report.push((teacher_name, Vec::new()));
            current = Some(teacher_id);
        }
        let entries = &mut report
            .last_mut()
            .expect("teacher pushed above")
            .1;

        // Unlinked teachers come through as a single all-NULL join row.
        let (Some(code), Some(name)) = (subject_code, subject_name) else {
            continue;
        };

        // Grouping key is the (code, name) pair; linear scan keeps the
        // first-encountered order.
        match entries
            .iter_mut()
            .find(|e| e.subject_code == code && e.subject_name == name)
        {
            Some(entry) => entry.number_of_classes += 1,
            None => entries.push(WorkloadEntry {
                subject_code: code,
                subject_name: name,
                number_of_classes: 1,
            }),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::register;
    use crate::schema::REGISTRY;
    use crate::db;
    use serde_json::json;

    fn mem_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute("PRAGMA foreign_keys = ON", []).expect("pragma");
        db::create_tables(&conn, &REGISTRY).expect("create tables");
        conn
    }

    fn run_register(conn: &Connection, body: &serde_json::Value) {
        let tx = conn.unchecked_transaction().expect("tx");
        register(&tx, &REGISTRY, body).expect("register");
        tx.commit().expect("commit");
    }

    #[test]
    fn counts_classes_per_subject_per_teacher() {
        let conn = mem_db();
        run_register(
            &conn,
            &json!({
                "teacher": { "name": "Teacher 1", "email": "teacher1@gmail.com" },
                "students": { "name": "Student 1", "email": "student1@gmail.com" },
                "subject": [
                    { "name": "English", "subjectCode": "ENG" },
                    { "name": "Maths", "subjectCode": "MATH" }
                ],
                "class": [
                    { "name": "P1-1 Int", "classCode": "P1-1" },
                    { "name": "P1-2 Int", "classCode": "P1-2" }
                ]
            }),
        );

        let report = workload_report(&conn).expect("report");
        assert_eq!(report.len(), 1);
        let (teacher, entries) = &report[0];
        assert_eq!(teacher, "Teacher 1");
        assert_eq!(
            entries,
            &vec![
                WorkloadEntry {
                    subject_code: "ENG".into(),
                    subject_name: "English".into(),
                    number_of_classes: 2,
                },
                WorkloadEntry {
                    subject_code: "MATH".into(),
                    subject_name: "Maths".into(),
                    number_of_classes: 2,
                },
            ]
        );
    }

    #[test]
    fn every_registered_teacher_gets_the_cross_product() {
        let conn = mem_db();
        run_register(
            &conn,
            &json!({
                "teacher": [
                    { "name": "Teacher 1", "email": "teacher1@gmail.com" },
                    { "name": "Teacher 2", "email": "teacher2@gmail.com" }
                ],
                "students": { "name": "Student 1", "email": "student1@gmail.com" },
                "subject": [
                    { "name": "English", "subjectCode": "ENG" },
                    { "name": "Maths", "subjectCode": "MATH" }
                ],
                "class": { "name": "P1-1 Int", "classCode": "P1-1" }
            }),
        );

        let report = workload_report(&conn).expect("report");
        assert_eq!(report.len(), 2);
        for (_, entries) in &report {
            assert_eq!(entries.len(), 2);
            assert!(entries.iter().all(|e| e.number_of_classes == 1));
        }
    }

    #[test]
    fn unlinked_teacher_appears_with_empty_workload() {
        let conn = mem_db();
        conn.execute(
            "INSERT INTO teachers(name, email) VALUES('Teacher 1', 'teacher1@gmail.com')",
            [],
        )
        .expect("insert teacher");

        let report = workload_report(&conn).expect("report");
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, "Teacher 1");
        assert!(report[0].1.is_empty());
    }
}
