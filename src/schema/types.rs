use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Catalog snapshot: every public-schema table plus the flat list of
/// foreign-key edges between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub tables: BTreeMap<String, TableSchema>,
    pub relations: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Columns in `ordinal_position` order
    pub columns: Vec<ColumnSchema>,
    /// Primary-key columns in key order, empty if the table has no PK
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// One entry per unique constraint, columns in constraint order
    #[serde(default)]
    pub unique_constraints: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub generated: bool,
}

/// A single-column foreign-key edge. `from` is the referencing side,
/// `to` the referenced side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl TableSchema {
    /// Column projection for export and COPY column lists. Generated columns
    /// are recomputed by the database on restore and must not appear here.
    pub fn include_cols(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.generated)
            .map(|c| c.name.clone())
            .collect()
    }
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, generated: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            generated,
        }
    }

    #[test]
    fn test_include_cols_skips_generated() {
        let table = TableSchema {
            name: "invoice".to_string(),
            columns: vec![
                col("id", false),
                col("net", false),
                col("vat", false),
                col("gross", true),
            ],
            primary_key: vec!["id".to_string()],
            unique_constraints: vec![],
        };

        assert_eq!(table.include_cols(), vec!["id", "net", "vat"]);
    }

    #[test]
    fn test_include_cols_preserves_ordinal_order() {
        let table = TableSchema {
            name: "t".to_string(),
            columns: vec![col("z", false), col("a", false), col("m", false)],
            ..Default::default()
        };

        assert_eq!(table.include_cols(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_schema_json_round_trip() {
        let mut schema = Schema::default();
        schema.tables.insert(
            "company".to_string(),
            TableSchema {
                name: "company".to_string(),
                columns: vec![col("id", false), col("name", false)],
                primary_key: vec!["id".to_string()],
                unique_constraints: vec![vec!["name".to_string()]],
            },
        );
        schema.relations.push(ForeignKey {
            from_table: "website".to_string(),
            from_column: "company_id".to_string(),
            to_table: "company".to_string(),
            to_column: "id".to_string(),
        });

        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();

        assert_eq!(back.tables.len(), 1);
        assert_eq!(back.tables["company"].primary_key, vec!["id"]);
        assert_eq!(back.relations, schema.relations);
    }
}
