//! # tabquery
//!
//! Query in-memory tables with SQL on a pooled, file-backed DuckDB database.
//!
//! - [`pool`]: bounded session pool, idempotent table registration, queries
//! - [`transform`]: declarative column transformations rendered as SQL
//! - [`sanitizer`]: read-only admission gate and identifier sanitizers
//! - [`engine`]: runs model-generated SQL behind the gate
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tabquery::prelude::*;
//! use std::sync::Arc;
//!
//! let pool = ConnectionPool::open(PoolConfig::default().pool_size(4))?;
//! let engine = Engine::new(Arc::new(pool));
//!
//! let sales = Table::new(["region", "amount"])
//!     .row([Value::from("north"), Value::from(10)])
//!     .row([Value::from("south"), Value::from(32)]);
//! engine.register("sales", &sales)?;
//!
//! let sql = engine
//!     .query_builder("sales")
//!     .column("region")
//!     .transformations([Transformation::on(TransformationKind::ToUppercase, "region")])
//!     .build();
//! let result = engine.run_generated(&sql)?;
//! assert_eq!(result.len(), 2);
//! # Ok::<(), TabError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod query_builder;
pub mod sanitizer;
pub mod table;
pub mod transform;
pub mod transpiler;

pub mod prelude {
    pub use crate::config::{PoolConfig, RetryPolicy};
    pub use crate::engine::{Engine, Llm, extract_sql};
    pub use crate::error::*;
    pub use crate::pool::{ConnectionPool, PooledConnection};
    pub use crate::query_builder::QueryBuilder;
    pub use crate::sanitizer::{ensure_safe, is_sql_query, is_sql_query_safe};
    pub use crate::table::{ColumnType, Table, Value};
    pub use crate::transform::{
        Transformation, TransformationKind, TransformationParams, TransformationRegistry,
    };
    pub use crate::transpiler::{Dialect, Transpiler};
}

pub use error::{TabError, TabResult};
pub use pool::ConnectionPool;
pub use transform::TransformationRegistry;
