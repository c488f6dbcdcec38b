//! Tessera structure walker.
//!
//! Validates and transforms nested JSON documents against policy documents.
//! A policy level mixes governance directives (`VERIFY`, `ADD`, `PUT`,
//! `REPLACE`, `UNIQUE`, `REMOVE`, `NECESSARY`, `DISALLOW`) with the fields and
//! nested objects it allows. Walking a level:
//!
//! 1. strips the directives from the policy
//! 2. removes and requires fields
//! 3. recurses into nested objects and lists through a [`ParseVisitor`]
//! 4. rejects disallowed fields and undeclared nested objects
//! 5. applies VERIFY, ADD, PUT and REPLACE, then the UNIQUE checks
//!
//! Conditions that cannot be decided in memory are resolved by a probe query
//! through a [`SqlCreator`]; UNIQUE goes through a [`UniqueChecker`]. Both are
//! supplied by an adapter crate.
//!
//! ```ignore
//! let walker = StructureWalker::new(StructureConfig::default())
//!     .with_sql_creator(Arc::new(creator))
//!     .with_unique_checker(Arc::new(checker));
//! let request = walker
//!     .parse_request(RequestMethod::Put, "Request", Some(policy), Some(payload))
//!     .await?;
//! ```

pub mod error;
pub mod logic;
pub mod matcher;
pub mod operation;
pub mod pattern;
pub mod probe;
pub mod request;
pub mod unique;
pub mod verify;
pub mod walker;

pub use error::{StructureError, StructureErrorKind};
pub use logic::{Combinator, ConditionKind, Logic};
pub use operation::Operation;
pub use pattern::PatternCache;
pub use probe::{
    CompareOp, ProbeCondition, RangeClause, SqlConfig, SqlCreator, SqlExecutor, SqlProber,
    WhereClause,
};
pub use request::{RequestVisitor, verify_id};
pub use unique::UniqueChecker;
pub use verify::ConditionEvaluator;
pub use walker::{Directives, Disallow, NoopVisitor, ParseVisitor, StructureWalker};
