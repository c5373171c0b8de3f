//! Schema document rendering.
//!
//! [`describe_schema`] turns a snapshot into the markdown-like document
//! that becomes the generator's grounding context. It is a pure function:
//! the same snapshot always yields the same bytes, which keeps prompt
//! construction reproducible and testable.

use crate::models::{ColumnEntry, SchemaSnapshot};

/// Render a snapshot as a schema document.
pub fn describe_schema(snapshot: &SchemaSnapshot) -> String {
    let mut doc = String::from("# Database Schema\n\n");

    for table in &snapshot.tables {
        doc.push_str(&format!("## Table: {}\n", table.name));
        doc.push_str(&format!("Schema: {}\n", table.schema));

        if let Some(rc) = snapshot.row_count_for(&table.schema, &table.name) {
            if rc.error.is_none() {
                doc.push_str(&format!("Row Count: {}\n", rc.count));
            }
        }

        doc.push_str("\n### Columns:\n");
        for col in snapshot.columns_for(&table.schema, &table.name) {
            doc.push_str(&format!("- **{}** ({})", col.name, render_type(col)));
            if col.is_primary_key {
                doc.push_str(" [PRIMARY KEY]");
            }
            if !col.nullable {
                doc.push_str(" [NOT NULL]");
            }
            if let Some(default) = &col.default_value {
                doc.push_str(&format!(" [DEFAULT: {}]", default));
            }
            doc.push('\n');
        }

        let relationships: Vec<_> = snapshot
            .relationships_for(&table.schema, &table.name)
            .collect();
        if !relationships.is_empty() {
            doc.push_str("\n### Foreign Keys:\n");
            for rel in relationships {
                doc.push_str(&format!(
                    "- {} -> {}.{}.{}\n",
                    rel.column, rel.foreign_schema, rel.foreign_table, rel.foreign_column
                ));
            }
        }

        let indexes: Vec<_> = snapshot.indexes_for(&table.schema, &table.name).collect();
        if !indexes.is_empty() {
            doc.push_str("\n### Indexes:\n");
            for idx in indexes {
                doc.push_str(&format!("- {}\n", idx.index_name));
            }
        }

        doc.push_str("\n---\n\n");
    }

    doc
}

/// Column type with length or precision appended when the catalog reports
/// one: `varchar(255)`, `numeric(10,2)`.
fn render_type(col: &ColumnEntry) -> String {
    if let Some(len) = col.max_length {
        return format!("{}({})", col.data_type, len);
    }
    let is_exact_numeric = col.data_type.eq_ignore_ascii_case("numeric")
        || col.data_type.eq_ignore_ascii_case("decimal");
    if is_exact_numeric {
        if let (Some(p), Some(s)) = (col.numeric_precision, col.numeric_scale) {
            return format!("{}({},{})", col.data_type, p, s);
        }
    }
    col.data_type.clone()
}
