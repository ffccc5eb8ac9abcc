use std::collections::BTreeMap;

use tokio_postgres::Client;

use crate::error::{SubsetError, SubsetResult};
use crate::schema::types::{ColumnSchema, ForeignKey, Schema, TableSchema};

/// Read the live catalog into a [`Schema`].
///
/// Only the public namespace is inspected. Tables that participate in no
/// foreign key at all are still returned so the graph builder can include
/// them as isolated nodes.
pub async fn read_schema(client: &Client) -> SubsetResult<Schema> {
    let mut tables = get_tables(client).await?;
    let relations = get_foreign_keys(client).await?;

    for (table, columns) in get_primary_keys(client).await? {
        if let Some(t) = tables.get_mut(&table) {
            t.primary_key = columns;
        }
    }
    for (table, constraints) in get_unique_constraints(client).await? {
        if let Some(t) = tables.get_mut(&table) {
            t.unique_constraints = constraints;
        }
    }

    Ok(Schema { tables, relations })
}

async fn get_tables(client: &Client) -> SubsetResult<BTreeMap<String, TableSchema>> {
    let query = "
        SELECT
            t.table_name,
            c.column_name,
            CASE WHEN c.generation_expression != '' THEN true ELSE false END AS is_generated
        FROM information_schema.tables t
             JOIN information_schema.columns c ON c.table_name = t.table_name
        WHERE t.table_schema = 'public' AND c.table_schema = 'public'
        ORDER BY t.table_name, c.ordinal_position";

    let rows = client
        .query(query, &[])
        .await
        .map_err(|e| SubsetError::catalog("tables and columns", e))?;

    let mut tables: BTreeMap<String, TableSchema> = BTreeMap::new();
    for row in rows {
        let table: String = row
            .try_get(0)
            .map_err(|e| SubsetError::catalog("tables and columns", e))?;
        let column: String = row
            .try_get(1)
            .map_err(|e| SubsetError::catalog("tables and columns", e))?;
        let generated: bool = row
            .try_get(2)
            .map_err(|e| SubsetError::catalog("tables and columns", e))?;

        tables
            .entry(table.clone())
            .or_insert_with(|| TableSchema {
                name: table,
                ..Default::default()
            })
            .columns
            .push(ColumnSchema {
                name: column,
                generated,
            });
    }

    Ok(tables)
}

async fn get_foreign_keys(client: &Client) -> SubsetResult<Vec<ForeignKey>> {
    let query = "
        SELECT
            tc.table_name,
            kcu.column_name,
            ccu.table_name AS foreign_table_name,
            ccu.column_name AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public'";

    let rows = client
        .query(query, &[])
        .await
        .map_err(|e| SubsetError::catalog("foreign keys", e))?;

    let mut relations = Vec::with_capacity(rows.len());
    for row in rows {
        relations.push(ForeignKey {
            from_table: row
                .try_get(0)
                .map_err(|e| SubsetError::catalog("foreign keys", e))?,
            from_column: row
                .try_get(1)
                .map_err(|e| SubsetError::catalog("foreign keys", e))?,
            to_table: row
                .try_get(2)
                .map_err(|e| SubsetError::catalog("foreign keys", e))?,
            to_column: row
                .try_get(3)
                .map_err(|e| SubsetError::catalog("foreign keys", e))?,
        });
    }

    Ok(relations)
}

async fn get_primary_keys(client: &Client) -> SubsetResult<BTreeMap<String, Vec<String>>> {
    let query = "
        SELECT tc.table_name, kcu.column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
        WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public'
        ORDER BY tc.table_name, kcu.ordinal_position";

    let rows = client
        .query(query, &[])
        .await
        .map_err(|e| SubsetError::catalog("primary keys", e))?;

    let mut keys: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let table: String = row
            .try_get(0)
            .map_err(|e| SubsetError::catalog("primary keys", e))?;
        let column: String = row
            .try_get(1)
            .map_err(|e| SubsetError::catalog("primary keys", e))?;
        keys.entry(table).or_default().push(column);
    }

    Ok(keys)
}

async fn get_unique_constraints(
    client: &Client,
) -> SubsetResult<BTreeMap<String, Vec<Vec<String>>>> {
    let query = "
        SELECT tc.table_name, tc.constraint_name, kcu.column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
        WHERE tc.constraint_type = 'UNIQUE' AND tc.table_schema = 'public'
        ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position";

    let rows = client
        .query(query, &[])
        .await
        .map_err(|e| SubsetError::catalog("unique constraints", e))?;

    // Group columns per constraint, keeping constraint_name order so the
    // "first unique constraint" is stable across runs.
    let mut constraints: BTreeMap<String, Vec<Vec<String>>> = BTreeMap::new();
    let mut current: Option<(String, String)> = None;
    for row in rows {
        let table: String = row
            .try_get(0)
            .map_err(|e| SubsetError::catalog("unique constraints", e))?;
        let constraint: String = row
            .try_get(1)
            .map_err(|e| SubsetError::catalog("unique constraints", e))?;
        let column: String = row
            .try_get(2)
            .map_err(|e| SubsetError::catalog("unique constraints", e))?;

        let groups = constraints.entry(table.clone()).or_default();
        if current.as_ref() != Some(&(table.clone(), constraint.clone())) {
            groups.push(Vec::new());
            current = Some((table, constraint));
        }
        if let Some(last) = groups.last_mut() {
            last.push(column);
        }
    }

    Ok(constraints)
}
