//! # Query Compilation
//!
//! Everything between a raw listing request and the store:
//!
//! - [`filter`] - the predicate AST and the `[operator:]value` parser
//! - [`sort`] - sort descriptors resolved against a schema
//! - [`cursor`] - keyset predicates for `afterID` pagination
//! - [`params`] - splitting a query string into filter, sort and page
//! - [`eval`] - interpretation of the AST over in-memory documents
//! - [`sql`] - lowering of the AST to parameterized SQLite

pub mod cursor;
pub mod eval;
pub mod filter;
pub mod params;
pub mod sort;
pub mod sql;

pub use cursor::keyset_after;
pub use filter::{parse_filter, CompareOp, Expr, Filter};
pub use params::ListRequest;
pub use sort::{parse_sort, Sort, SortKey};
