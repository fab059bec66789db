//! Column transformations rendered as SQL expressions.
//!
//! A dataset schema declares transformations per column; the registry folds
//! them over a column expression in declared order:
//!
//! ```
//! use tabquery::transform::{Transformation, TransformationKind, TransformationRegistry};
//!
//! let registry = TransformationRegistry::default();
//! let list = vec![
//!     Transformation::on(TransformationKind::Strip, "email"),
//!     Transformation::on(TransformationKind::ToLowercase, "email"),
//! ];
//! assert_eq!(registry.apply_transformations("email", &list), "LOWER(TRIM(email))");
//! ```

pub mod registry;
pub mod types;

pub use registry::{EMAIL_PATTERN, TransformationRegistry};
pub use types::{Transformation, TransformationKind, TransformationParams};
