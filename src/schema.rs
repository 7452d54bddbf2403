//! Tables, columns, keys, and relations described as plain data.
//!
//! The whole schema lives in one immutable [`SchemaRegistry`] that `main`
//! hands explicitly to the storage layer and the registration pipeline.
//! DDL is generated from these descriptors, so they are the single source
//! of truth for table and column names.

/// One payload field of a primary entity and the column it maps to.
#[derive(Debug)]
pub struct FieldDef {
    /// Wire name in request payloads (camelCase, e.g. `subjectCode`).
    pub field: &'static str,
    /// Column name in SQLite (snake_case).
    pub column: &'static str,
    pub required: bool,
    /// Inclusive character-length bounds, when constrained.
    pub len: Option<(usize, usize)>,
    /// Field must look like an email address.
    pub email: bool,
}

/// An ordered set of columns used to match rows (single or composite).
#[derive(Debug)]
pub struct KeyDef {
    pub columns: &'static [&'static str],
}

/// A primary entity: teacher, student, subject, or class.
#[derive(Debug)]
pub struct EntityDef {
    /// Top-level key in the register payload (`students` is plural).
    pub payload_key: &'static str,
    /// Singular model name used in validation messages.
    pub model: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    /// Wire name of the business-unique field, for duplicate checks.
    pub unique_field: &'static str,
    /// Business-unique key, used for id resolution.
    pub unique_key: KeyDef,
    /// Conflict key the register pipeline matches on when upserting.
    /// This is `name` for every primary entity while the business-unique
    /// column stays under a schema UNIQUE constraint; both keys are kept
    /// explicit here so the policy is visible in one place.
    pub update_key: KeyDef,
}

/// A junction table linking two surrogate-id columns.
#[derive(Debug)]
pub struct LinkDef {
    pub table: &'static str,
    pub fk_a: &'static str,
    pub references_a: &'static str,
    pub fk_b: &'static str,
    pub references_b: &'static str,
    /// Composite conflict key used when upserting link rows. The pair is
    /// deliberately NOT unique at the schema level; only this key keeps
    /// repeated registrations from duplicating links.
    pub conflict_key: KeyDef,
}

#[derive(Debug)]
pub struct SchemaRegistry {
    pub teacher: EntityDef,
    pub student: EntityDef,
    pub subject: EntityDef,
    pub class: EntityDef,
    pub subject_class: LinkDef,
    pub teacher_subject_class: LinkDef,
    pub student_subject_class: LinkDef,
}

impl SchemaRegistry {
    pub fn entities(&self) -> [&EntityDef; 4] {
        [&self.teacher, &self.student, &self.subject, &self.class]
    }

    pub fn links(&self) -> [&LinkDef; 3] {
        [
            &self.subject_class,
            &self.teacher_subject_class,
            &self.student_subject_class,
        ]
    }
}

const NAME_FIELD: FieldDef = FieldDef {
    field: "name",
    column: "name",
    required: true,
    len: Some((1, 100)),
    email: false,
};

const EMAIL_FIELD: FieldDef = FieldDef {
    field: "email",
    column: "email",
    required: true,
    len: None,
    email: true,
};

pub static REGISTRY: SchemaRegistry = SchemaRegistry {
    teacher: EntityDef {
        payload_key: "teacher",
        model: "teacher",
        table: "teachers",
        fields: &[NAME_FIELD, EMAIL_FIELD],
        unique_field: "email",
        unique_key: KeyDef { columns: &["email"] },
        update_key: KeyDef { columns: &["name"] },
    },
    student: EntityDef {
        payload_key: "students",
        model: "student",
        table: "students",
        fields: &[NAME_FIELD, EMAIL_FIELD],
        unique_field: "email",
        unique_key: KeyDef { columns: &["email"] },
        update_key: KeyDef { columns: &["name"] },
    },
    subject: EntityDef {
        payload_key: "subject",
        model: "subject",
        table: "subjects",
        fields: &[
            NAME_FIELD,
            FieldDef {
                field: "subjectCode",
                column: "subject_code",
                required: true,
                len: Some((1, 100)),
                email: false,
            },
        ],
        unique_field: "subjectCode",
        unique_key: KeyDef {
            columns: &["subject_code"],
        },
        update_key: KeyDef { columns: &["name"] },
    },
    class: EntityDef {
        payload_key: "class",
        model: "class",
        table: "classes",
        fields: &[
            NAME_FIELD,
            FieldDef {
                field: "classCode",
                column: "class_code",
                required: true,
                len: Some((1, 100)),
                email: false,
            },
        ],
        unique_field: "classCode",
        unique_key: KeyDef {
            columns: &["class_code"],
        },
        update_key: KeyDef { columns: &["name"] },
    },
    subject_class: LinkDef {
        table: "subject_classes",
        fk_a: "subject_id",
        references_a: "subjects",
        fk_b: "class_id",
        references_b: "classes",
        conflict_key: KeyDef {
            columns: &["subject_id", "class_id"],
        },
    },
    teacher_subject_class: LinkDef {
        table: "teacher_subject_classes",
        fk_a: "teacher_id",
        references_a: "teachers",
        fk_b: "subject_class_id",
        references_b: "subject_classes",
        conflict_key: KeyDef {
            columns: &["teacher_id", "subject_class_id"],
        },
    },
    student_subject_class: LinkDef {
        table: "student_subject_classes",
        fk_a: "student_id",
        references_a: "students",
        fk_b: "subject_class_id",
        references_b: "subject_classes",
        conflict_key: KeyDef {
            columns: &["student_id", "subject_class_id"],
        },
    },
};
