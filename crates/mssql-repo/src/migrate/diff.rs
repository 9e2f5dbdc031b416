//! Schema diffing: compares a desired table against its live counterpart and
//! emits the reconciliation operations as pure data.
//!
//! The per-column decision over (type sameness, default sameness, live
//! default presence) follows a fixed table:
//!
//! | typeSame | defaultSame | liveHasDefault | emitted                     |
//! |----------|-------------|----------------|-----------------------------|
//! | yes      | yes         | any            | nothing                     |
//! | yes      | no          | yes            | drop default, add default   |
//! | yes      | no          | no             | add default                 |
//! | no       | yes         | yes            | drop, alter, add default    |
//! | no       | yes         | no             | alter                       |
//! | no       | no          | yes            | drop, alter, add default    |
//! | no       | no          | no             | alter, add default          |
//!
//! An "add default" row is only realized when the desired column actually
//! carries a default expression. Default-text comparison strips one
//! parenthesis wrapper from each side and ignores case, like every name
//! comparison here.

use crate::core::identifier::{is_same, normalize_default};
use crate::schema::types::{ColumnSchema, TableSchema};

/// One reconciliation operation. Pure data until rendered by the script
/// writer.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp {
    CreateSchema {
        schema: String,
    },
    CreateTable {
        table: TableSchema,
    },
    AddColumn {
        schema: String,
        table: String,
        column: ColumnSchema,
    },
    AlterColumnType {
        schema: String,
        table: String,
        column: ColumnSchema,
    },
    DropDefaultConstraint {
        schema: String,
        table: String,
        column: String,
    },
    AddDefaultConstraint {
        schema: String,
        table: String,
        column: String,
        default_text: String,
    },
    SetDescription {
        scope: DescriptionScope,
        text: String,
    },
}

/// Where a description extended property attaches.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptionScope {
    Schema {
        schema: String,
    },
    Table {
        schema: String,
        table: String,
    },
    Column {
        schema: String,
        table: String,
        column: String,
    },
}

/// The operations for one table, grouped so they serialize in a safe order:
/// schema creation first, then constraint drops, then the table or column
/// changes, then new constraints, then descriptions.
#[derive(Debug, Default)]
pub struct TablePlan {
    pub create_schema: Option<DiffOp>,
    pub drop_constraints: Vec<DiffOp>,
    pub create_table: Option<DiffOp>,
    pub update_columns: Vec<DiffOp>,
    pub update_constraints: Vec<DiffOp>,
    pub set_descriptions: Vec<DiffOp>,
}

impl TablePlan {
    pub fn is_empty(&self) -> bool {
        self.create_schema.is_none()
            && self.drop_constraints.is_empty()
            && self.create_table.is_none()
            && self.update_columns.is_empty()
            && self.update_constraints.is_empty()
            && self.set_descriptions.is_empty()
    }

    /// Flatten into emission order.
    pub fn into_ops(self) -> Vec<DiffOp> {
        let mut ops = Vec::new();
        ops.extend(self.create_schema);
        ops.extend(self.drop_constraints);
        ops.extend(self.create_table);
        ops.extend(self.update_columns);
        ops.extend(self.update_constraints);
        // Relation operations would slot in here once FK generation exists.
        ops.extend(self.set_descriptions);
        ops
    }
}

fn defaults_same(desired: Option<&str>, live: Option<&str>) -> bool {
    let desired = normalize_default(desired);
    let live = normalize_default(live);
    is_same(desired.as_deref(), live.as_deref())
}

/// Plan the reconciliation of one desired table.
///
/// `live` is the catalog's view of the same table (matched by schema and
/// name, case-insensitively) or `None` when the table does not exist yet;
/// `known_schemas` gates the CreateSchema operation. Reconciling primary
/// keys and unique groups of an existing table is not implemented; only
/// table creation carries them.
pub fn plan_table(
    desired: &TableSchema,
    live: Option<&TableSchema>,
    known_schemas: &[String],
) -> TablePlan {
    let mut plan = TablePlan::default();
    let schema = &desired.schema;
    let table = &desired.name;

    if !known_schemas.iter().any(|s| s.eq_ignore_ascii_case(schema)) {
        plan.create_schema = Some(DiffOp::CreateSchema {
            schema: schema.clone(),
        });
    }

    for column in &desired.columns {
        let live_column = live.and_then(|t| t.column(&column.name));

        if let Some(text) = &column.description {
            let live_text = live_column.and_then(|c| c.description.as_deref());
            if !is_same(Some(text), live_text) {
                plan.set_descriptions.push(DiffOp::SetDescription {
                    scope: DescriptionScope::Column {
                        schema: schema.clone(),
                        table: table.clone(),
                        column: column.name.clone(),
                    },
                    text: text.clone(),
                });
            }
        }

        if live.is_none() {
            continue;
        }

        let Some(live_column) = live_column else {
            plan.update_columns.push(DiffOp::AddColumn {
                schema: schema.clone(),
                table: table.clone(),
                column: column.clone(),
            });
            continue;
        };

        let type_same = is_same(Some(&column.type_text), Some(&live_column.type_text))
            && column.nullable == live_column.nullable;
        let default_same =
            defaults_same(column.default_text.as_deref(), live_column.default_text.as_deref());
        let live_has_default = live_column.default_text.is_some();

        if type_same && default_same {
            continue;
        }

        if live_has_default {
            plan.drop_constraints.push(DiffOp::DropDefaultConstraint {
                schema: schema.clone(),
                table: table.clone(),
                column: column.name.clone(),
            });
        }

        if !type_same {
            plan.update_columns.push(DiffOp::AlterColumnType {
                schema: schema.clone(),
                table: table.clone(),
                column: column.clone(),
            });
        }

        if type_same || !default_same || live_has_default {
            if let Some(default_text) = &column.default_text {
                plan.update_constraints.push(DiffOp::AddDefaultConstraint {
                    schema: schema.clone(),
                    table: table.clone(),
                    column: column.name.clone(),
                    default_text: default_text.clone(),
                });
            }
        }
    }

    if live.is_none() {
        plan.create_table = Some(DiffOp::CreateTable {
            table: desired.clone(),
        });
    }

    if let Some(text) = &desired.description {
        let live_text = live.and_then(|t| t.description.as_deref());
        if !is_same(Some(text), live_text) {
            plan.set_descriptions.push(DiffOp::SetDescription {
                scope: DescriptionScope::Table {
                    schema: schema.clone(),
                    table: table.clone(),
                },
                text: text.clone(),
            });
        }
    }

    plan
}
