pub mod duckdb;
pub mod mysql;
pub mod postgres;
