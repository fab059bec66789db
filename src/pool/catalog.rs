//! Classification of DuckDB error messages.
//!
//! DuckDB reports failures as `"<Type> Error: <detail>"`. The header is
//! parsed into an [`ErrorClass`]; [`CatalogOutcome`] then narrows it to what
//! table registration needs to decide between retrying, succeeding and
//! giving up.

/// Error family named in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Catalog,
    TransactionContext,
    Constraint,
    Conversion,
    Parser,
    Binder,
    Io,
    Fatal,
    Other,
}

impl ErrorClass {
    /// Split a backend message into its class and detail.
    pub fn parse(message: &str) -> (Self, &str) {
        let Some((header, detail)) = message.split_once(" Error: ") else {
            return (ErrorClass::Other, message);
        };
        // Wrapped errors may prefix the header with context.
        let header = header.rsplit(": ").next().unwrap_or(header).trim();
        let class = match header.to_ascii_lowercase().as_str() {
            "catalog" => ErrorClass::Catalog,
            "transactioncontext" | "transaction" => ErrorClass::TransactionContext,
            "constraint" => ErrorClass::Constraint,
            "conversion" => ErrorClass::Conversion,
            "parser" => ErrorClass::Parser,
            "binder" => ErrorClass::Binder,
            "io" => ErrorClass::Io,
            "fatal" => ErrorClass::Fatal,
            _ => ErrorClass::Other,
        };
        (class, detail)
    }
}

/// What a failed catalog write means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOutcome {
    /// Concurrent catalog write; retry with backoff.
    Conflict,
    /// Another session created the object first.
    AlreadyExists,
    /// `ROLLBACK` outside a transaction.
    NoActiveTransaction,
    Other,
}

impl CatalogOutcome {
    pub fn classify(message: &str) -> Self {
        let (class, detail) = ErrorClass::parse(message);
        let detail = detail.to_ascii_lowercase();
        match class {
            _ if detail.contains("write-write conflict") => CatalogOutcome::Conflict,
            ErrorClass::TransactionContext if detail.contains("conflict") => {
                CatalogOutcome::Conflict
            }
            ErrorClass::TransactionContext if detail.contains("no transaction is active") => {
                CatalogOutcome::NoActiveTransaction
            }
            ErrorClass::Catalog if detail.contains("already exists") => {
                CatalogOutcome::AlreadyExists
            }
            _ => CatalogOutcome::Other,
        }
    }

    pub fn of(error: &duckdb::Error) -> Self {
        Self::classify(&error.to_string())
    }
}
