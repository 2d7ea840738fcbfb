//! Expression model shared by both backends: document paths, conditions,
//! key conditions, update actions, projections, and their rendering into
//! the service's expression strings.

pub mod condition;
pub mod key;
pub mod path;
pub mod projection;
pub mod render;
pub mod update;

pub use condition::{Comparator, Condition, Operand};
pub use key::{KeyCondition, SortKeyCondition};
pub use path::{AttrPath, PathSegment};
pub use projection::apply_projection;
pub use render::ExpressionContext;
pub use update::{UpdateAction, apply_updates, updated_paths, validate_updates};
