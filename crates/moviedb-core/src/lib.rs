//! # moviedb
//!
//! A movie catalogue on top of a DynamoDB-style key-value service.
//!
//! Movies are keyed by `year` (partition) and `title` (sort) and carry a
//! nested `info` document. [`table::MovieTable`] exposes the catalogue
//! operations (create, bulk load, put, get, update, conditional remove,
//! conditional delete, query, paginated scan) against any
//! [`service::ItemService`]: the real service through
//! [`dynamo::DynamoDbService`], or an in-process emulation through
//! [`memory::MemoryService`].
//!
//! Ratings are exact decimals end to end: `serde_json` keeps number text
//! verbatim and comparisons go through `rust_decimal`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use moviedb_core::memory::MemoryService;
//! use moviedb_core::table::{MovieTable, TableConfig};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> moviedb_core::error::Result<()> {
//! let table = MovieTable::new(Arc::new(MemoryService::new()), TableConfig::default());
//! table.create_table().await?;
//!
//! table
//!     .put_movie("The Big New Movie", 2015, "Nothing happens at all.", Decimal::ZERO)
//!     .await?;
//! let movie = table.get_movie("The Big New Movie", 2015).await?;
//! assert!(movie.is_some());
//! # Ok(())
//! # }
//! ```

pub mod dynamo;
pub mod error;
pub mod expr;
pub mod fixture;
pub mod memory;
pub mod movie;
pub mod number;
pub mod service;
pub mod table;
pub mod types;

pub use error::{Error, Result, ServiceError};
pub use movie::{Movie, MovieInfo, MovieKey};
pub use table::{Conditional, MovieTable, TableConfig};
