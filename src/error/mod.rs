use std::fmt;

/// Main error type for pg_subset
#[derive(Debug, Clone, PartialEq)]
pub enum SubsetError {
    // ============ Configuration ============
    /// Missing or contradictory command-line flags, caught before any
    /// database activity
    Config {
        reason: String,
    },

    // ============ Planning ============
    /// The requested root table does not exist in the schema
    UnknownRootTable {
        table: String,
    },

    /// The export planner deadlocked: the remaining tables form a
    /// foreign-key cycle that cannot be filtered outward from the root
    UnresolvableExportOrder {
        remaining: Vec<String>,
        root: String,
    },

    /// The import planner deadlocked on a foreign-key cycle
    ImportOrderCycle {
        remaining: Vec<String>,
    },

    /// Upsert mode was requested but at least one table has neither a
    /// primary key nor a unique constraint
    UpsertNotAvailable {
        tables: Vec<String>,
    },

    // ============ I/O and database ============
    /// Connecting to the database failed
    Connection {
        error: String,
    },

    /// A catalog query failed
    Catalog {
        operation: String,
        error: String,
    },

    /// A DDL, DML or COPY statement failed
    Execution {
        statement: String,
        error: String,
    },

    /// JSON artifact serialization/deserialization failed
    Serialization {
        message: String,
    },

    /// File or directory operation failed
    Io {
        path: String,
        error: String,
    },

    /// The run was cancelled by an external signal
    Cancelled,
}

impl SubsetError {
    pub fn catalog(operation: impl Into<String>, error: impl fmt::Display) -> Self {
        SubsetError::Catalog {
            operation: operation.into(),
            error: error.to_string(),
        }
    }

    pub fn execution(statement: impl Into<String>, error: impl fmt::Display) -> Self {
        SubsetError::Execution {
            statement: statement.into(),
            error: error.to_string(),
        }
    }

    pub fn io(path: impl fmt::Display, error: impl fmt::Display) -> Self {
        SubsetError::Io {
            path: path.to_string(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for SubsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SubsetError::*;
        match self {
            Config { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
            UnknownRootTable { table } => {
                write!(f, "root table '{}' not found in schema", table)
            }
            UnresolvableExportOrder { remaining, root } => {
                write!(
                    f,
                    "cannot determine export order for tables: {} \
                     (circular FK references prevent proper filtering from root '{}')",
                    remaining.join(", "),
                    root
                )
            }
            ImportOrderCycle { remaining } => {
                write!(f, "cycle detected among tables: {}", remaining.join(", "))
            }
            UpsertNotAvailable { tables } => {
                write!(
                    f,
                    "upsert requested but no primary key or unique constraint exists on: {}",
                    tables.join(", ")
                )
            }
            Connection { error } => {
                write!(f, "connecting to database: {}", error)
            }
            Catalog { operation, error } => {
                write!(f, "catalog query '{}' failed: {}", operation, error)
            }
            Execution { statement, error } => {
                write!(f, "execute statement failed: {}\nStatement: {}", error,
                       if statement.len() > 200 { &statement[..200] } else { statement })
            }
            Serialization { message } => {
                write!(f, "serialization error: {}", message)
            }
            Io { path, error } => {
                write!(f, "i/o error on '{}': {}", path, error)
            }
            Cancelled => {
                write!(f, "aborted")
            }
        }
    }
}

impl std::error::Error for SubsetError {}

/// Result type for pg_subset operations
pub type SubsetResult<T> = Result<T, SubsetError>;

impl From<serde_json::Error> for SubsetError {
    fn from(e: serde_json::Error) -> Self {
        SubsetError::Serialization {
            message: format!("JSON serialization error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_root_table_message() {
        let err = SubsetError::UnknownRootTable {
            table: "accounts".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("accounts"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_unresolvable_export_order_message() {
        let err = SubsetError::UnresolvableExportOrder {
            remaining: vec!["a".to_string(), "b".to_string()],
            root: "a".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("a, b"));
        assert!(msg.contains("root 'a'"));
    }

    #[test]
    fn test_execution_message_truncates_statement() {
        let err = SubsetError::execution("SELECT ".repeat(100), "boom");

        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.len() < 300);
    }

    #[test]
    fn test_upsert_not_available_lists_tables() {
        let err = SubsetError::UpsertNotAvailable {
            tables: vec!["audit_log".to_string()],
        };

        assert!(err.to_string().contains("audit_log"));
    }
}
