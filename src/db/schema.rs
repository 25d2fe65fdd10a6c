//! Declarative table definitions for the `core` schema.
//!
//! Each entity's relational shape is described by a plain [`TableDef`]
//! constant: columns with their types and constraints, foreign keys, and the
//! relations other entities hold to it. The Postgres backend builds its select
//! lists from these definitions, and the integration tests compare them with
//! the live schema produced by the migrations. Nothing here ever mutates a
//! database; schema changes only happen through `db::migrations`.

use std::collections::HashSet;

pub const CORE_SCHEMA: &str = "core";
pub const DISCOVERY_SCHEMA: &str = "discovery_source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Varchar(Option<u16>),
    VarcharArray(u16),
    Boolean,
    DoublePrecision,
}

impl ColumnType {
    /// Type name as reported by `information_schema.columns.data_type`.
    pub fn information_schema_name(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Varchar(_) => "character varying",
            Self::VarcharArray(_) => "ARRAY",
            Self::Boolean => "boolean",
            Self::DoublePrecision => "double precision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    None,
    GeneratedUuid,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub default: ColumnDefault,
}

impl ColumnDef {
    const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            unique: false,
            default: ColumnDefault::None,
        }
    }

    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn generated(mut self) -> Self {
        self.default = ColumnDefault::GeneratedUuid;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    NoAction,
    Cascade,
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyDef {
    pub columns: &'static [&'static str],
    pub references_table: &'static str,
    pub references_columns: &'static [&'static str],
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToOne,
    OneToMany,
    ManyToMany { join_table: &'static str },
}

/// A navigable relation from one entity to another.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub schema: &'static str,
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKeyDef],
    pub relations: &'static [RelationDef],
}

impl TableDef {
    /// Fully quoted `"schema"."table"`; `user` is a reserved word.
    pub fn qualified_name(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.name)
    }

    /// Quoted, comma-separated column list in declaration order.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("\"{}\"", column.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Tables this one holds foreign keys into, excluding itself.
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references_table)
            .filter(move |table| *table != self.name)
    }
}

const ID: ColumnDef = ColumnDef::new("id", ColumnType::Uuid).generated();
const WORKSPACE_FK_COLUMN: ColumnDef = ColumnDef::new("workspace_id", ColumnType::Uuid).nullable();

const WORKSPACE_FK: ForeignKeyDef = ForeignKeyDef {
    columns: &["workspace_id"],
    references_table: "user",
    references_columns: &["workspace_id"],
    on_delete: OnDelete::NoAction,
};

const OWNER: RelationDef = RelationDef {
    name: "user",
    kind: RelationKind::ManyToOne,
    target: "user",
};

pub const USER: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "user",
    columns: &[
        ID,
        ColumnDef::new("name", ColumnType::Varchar(Some(255))),
        ColumnDef::new("email", ColumnType::Varchar(Some(320))).unique(),
        ColumnDef::new("profile_picture", ColumnType::Varchar(Some(500))).nullable(),
        ColumnDef::new("workspace_id", ColumnType::Uuid)
            .unique()
            .generated(),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    relations: &[
        RelationDef {
            name: "clients",
            kind: RelationKind::OneToMany,
            target: "client",
        },
        RelationDef {
            name: "projects",
            kind: RelationKind::OneToMany,
            target: "project",
        },
        RelationDef {
            name: "tasks",
            kind: RelationKind::OneToMany,
            target: "task",
        },
        RelationDef {
            name: "tags",
            kind: RelationKind::OneToMany,
            target: "tag",
        },
    ],
};

pub const CLIENT: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "client",
    columns: &[
        ID,
        ColumnDef::new("name", ColumnType::Varchar(Some(255))),
        ColumnDef::new("currency", ColumnType::Varchar(Some(10))),
        ColumnDef::new("notes", ColumnType::Varchar(Some(255))),
        ColumnDef::new("payment_method", ColumnType::Varchar(Some(255))),
        ColumnDef::new("emails", ColumnType::VarcharArray(320)),
        ColumnDef::new("preference_channel", ColumnType::Varchar(Some(255))),
        WORKSPACE_FK_COLUMN,
    ],
    primary_key: &["id"],
    foreign_keys: &[WORKSPACE_FK],
    relations: &[
        OWNER,
        RelationDef {
            name: "projects",
            kind: RelationKind::OneToMany,
            target: "project",
        },
    ],
};

pub const PROJECT: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "project",
    columns: &[
        ID,
        ColumnDef::new("name", ColumnType::Varchar(Some(255))),
        ColumnDef::new("hourly_rate", ColumnType::DoublePrecision).nullable(),
        WORKSPACE_FK_COLUMN,
        ColumnDef::new("client_id", ColumnType::Uuid).nullable(),
    ],
    primary_key: &["id"],
    foreign_keys: &[
        WORKSPACE_FK,
        ForeignKeyDef {
            columns: &["client_id"],
            references_table: "client",
            references_columns: &["id"],
            on_delete: OnDelete::NoAction,
        },
        ForeignKeyDef {
            columns: &["client_id", "workspace_id"],
            references_table: "client",
            references_columns: &["id", "workspace_id"],
            on_delete: OnDelete::NoAction,
        },
    ],
    relations: &[
        OWNER,
        RelationDef {
            name: "client",
            kind: RelationKind::ManyToOne,
            target: "client",
        },
        RelationDef {
            name: "tasks",
            kind: RelationKind::OneToMany,
            target: "task",
        },
        RelationDef {
            name: "tags",
            kind: RelationKind::ManyToMany {
                join_table: "project_tag",
            },
            target: "tag",
        },
    ],
};

pub const TASK: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "task",
    columns: &[
        ID,
        ColumnDef::new("name", ColumnType::Varchar(None)),
        ColumnDef::new("is_billable", ColumnType::Boolean),
        WORKSPACE_FK_COLUMN,
        ColumnDef::new("project_id", ColumnType::Uuid).nullable(),
    ],
    primary_key: &["id"],
    foreign_keys: &[
        WORKSPACE_FK,
        ForeignKeyDef {
            columns: &["project_id"],
            references_table: "project",
            references_columns: &["id"],
            on_delete: OnDelete::NoAction,
        },
        ForeignKeyDef {
            columns: &["project_id", "workspace_id"],
            references_table: "project",
            references_columns: &["id", "workspace_id"],
            on_delete: OnDelete::NoAction,
        },
    ],
    relations: &[
        OWNER,
        RelationDef {
            name: "project",
            kind: RelationKind::ManyToOne,
            target: "project",
        },
    ],
};

pub const TAG: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "tag",
    columns: &[
        ID,
        ColumnDef::new("name", ColumnType::Varchar(Some(20))),
        ColumnDef::new("color", ColumnType::Varchar(Some(30))),
        WORKSPACE_FK_COLUMN,
    ],
    primary_key: &["id"],
    foreign_keys: &[WORKSPACE_FK],
    relations: &[
        OWNER,
        RelationDef {
            name: "projects",
            kind: RelationKind::ManyToMany {
                join_table: "project_tag",
            },
            target: "project",
        },
    ],
};

/// Join table for the project/tag many-to-many relation.
pub const PROJECT_TAG: TableDef = TableDef {
    schema: CORE_SCHEMA,
    name: "project_tag",
    columns: &[
        ColumnDef::new("project_id", ColumnType::Uuid),
        ColumnDef::new("tag_id", ColumnType::Uuid),
    ],
    primary_key: &["project_id", "tag_id"],
    foreign_keys: &[
        ForeignKeyDef {
            columns: &["project_id"],
            references_table: "project",
            references_columns: &["id"],
            on_delete: OnDelete::Cascade,
        },
        ForeignKeyDef {
            columns: &["tag_id"],
            references_table: "tag",
            references_columns: &["id"],
            on_delete: OnDelete::NoAction,
        },
    ],
    relations: &[],
};

/// Every table in the `core` schema.
pub const CORE_TABLES: &[TableDef] = &[USER, CLIENT, PROJECT, TASK, TAG, PROJECT_TAG];

/// Orders tables so every table comes after the tables it references.
///
/// Returns `None` if the foreign keys form a cycle or reference a table that
/// is not in `tables`.
pub fn create_order(tables: &[TableDef]) -> Option<Vec<&'static str>> {
    let known: HashSet<&str> = tables.iter().map(|t| t.name).collect();
    if tables
        .iter()
        .flat_map(|t| t.dependencies())
        .any(|dep| !known.contains(dep))
    {
        return None;
    }

    let mut placed: Vec<&'static str> = Vec::with_capacity(tables.len());
    let mut remaining: Vec<&TableDef> = tables.iter().collect();
    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|table| {
            let ready = table.dependencies().all(|dep| placed.contains(&dep));
            if ready {
                placed.push(table.name);
            }
            !ready
        });
        if remaining.len() == before {
            return None;
        }
    }
    Some(placed)
}

/// Teardown order: children before the parents they reference.
pub fn drop_order(tables: &[TableDef]) -> Option<Vec<&'static str>> {
    create_order(tables).map(|mut order| {
        order.reverse();
        order
    })
}
