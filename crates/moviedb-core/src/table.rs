//! The movie table façade.
//!
//! [`MovieTable`] turns each movie operation into one request (or, for
//! query and scan, a sequence of paged requests) against an
//! [`ItemService`]. It holds no mutable state; the service handle and the
//! table configuration are passed in at construction.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, ServiceError};
use crate::expr::{AttrPath, Condition, KeyCondition, Operand, UpdateAction};
use crate::movie::{Movie, MovieKey};
use crate::number::{decimal_to_value, normalize_numbers};
use crate::service::{
    DeleteItemInput, GetItemInput, ItemService, PutItemInput, QueryInput, ScanInput,
    TableDescription, UpdateItemInput, WriteOutput,
};
use crate::types::{ReturnValues, ScalarType, TableSchema, TableStatus};

pub const DEFAULT_TABLE_NAME: &str = "movies";
pub const DEFAULT_CAPACITY: i64 = 10;

/// Table name and provisioned capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub read_capacity: i64,
    pub write_capacity: i64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            read_capacity: DEFAULT_CAPACITY,
            write_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    pub fn capacity(mut self, read: i64, write: i64) -> Self {
        self.read_capacity = read;
        self.write_capacity = write;
        self
    }

    /// Partition key `year` (number), sort key `title` (string).
    pub fn schema(&self) -> TableSchema {
        TableSchema::new(self.table_name.as_str())
            .partition_key("year", ScalarType::N)
            .sort_key("title", ScalarType::S)
            .throughput(self.read_capacity, self.write_capacity)
    }
}

/// Outcome of a conditional write. A failed condition is an expected result,
/// not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional<T> {
    Applied(T),
    ConditionFailed { message: String },
}

impl<T> Conditional<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Conditional::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Conditional::Applied(v) => Some(v),
            Conditional::ConditionFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pages: usize,
    pub items: usize,
}

pub struct MovieTable {
    service: Arc<dyn ItemService>,
    config: TableConfig,
}

impl MovieTable {
    pub fn new(service: Arc<dyn ItemService>, config: TableConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    // -----------------------------------------------------------------------
    // Table lifecycle
    // -----------------------------------------------------------------------

    /// Create the movie table from [`TableConfig::schema`].
    pub async fn create_table(&self) -> Result<TableStatus> {
        self.create_table_with(&self.config.schema()).await
    }

    /// Create a table from an explicit schema. The schema is validated
    /// before any request is sent.
    pub async fn create_table_with(&self, schema: &TableSchema) -> Result<TableStatus> {
        schema.validate()?;
        let status = self.service.create_table(schema).await?;
        info!(table = %schema.name, %status, "table created");
        Ok(status)
    }

    pub async fn describe_table(&self) -> Result<TableDescription> {
        Ok(self.service.describe_table(self.table_name()).await?)
    }

    /// Poll `describe_table` until the table reports ACTIVE.
    pub async fn wait_until_active(&self, poll: Duration, max_attempts: u32) -> Result<()> {
        for attempt in 1..=max_attempts {
            let desc = self.describe_table().await?;
            if desc.status == TableStatus::Active {
                return Ok(());
            }
            debug!(table = %self.table_name(), status = %desc.status, attempt, "waiting for table");
            tokio::time::sleep(poll).await;
        }
        Err(ServiceError::new(
            "WaiterTimeout",
            format!(
                "table {} not ACTIVE after {max_attempts} attempts",
                self.table_name()
            ),
        )
        .into())
    }

    pub async fn delete_table(&self) -> Result<TableStatus> {
        let status = self.service.delete_table(self.table_name()).await?;
        info!(table = %self.table_name(), %status, "table deleted");
        Ok(status)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn load_movies(&self, records: &[Value]) -> Result<LoadSummary> {
        self.load_movies_with(records, |_| {}).await
    }

    /// Write every record unconditionally, in order. Not transactional: on
    /// failure the records already written stay, and the error reports how
    /// many there were.
    pub async fn load_movies_with(
        &self,
        records: &[Value],
        mut on_progress: impl FnMut(&MovieKey),
    ) -> Result<LoadSummary> {
        for (loaded, record) in records.iter().enumerate() {
            let partial = |source: ServiceError| Error::PartialLoad { loaded, source };

            let key = record_key(record).map_err(partial)?;
            let mut item = record.clone();
            normalize_numbers(&mut item).map_err(|n| {
                partial(ServiceError::validation(format!(
                    "number {n} does not fit an exact decimal"
                )))
            })?;

            info!(year = key.year, title = %key.title, "adding movie");
            self.service
                .put_item(PutItemInput {
                    table_name: self.config.table_name.clone(),
                    item,
                    condition: None,
                    return_values: ReturnValues::None,
                })
                .await
                .map_err(partial)?;
            on_progress(&key);
        }
        Ok(LoadSummary {
            loaded: records.len(),
        })
    }

    /// Unconditional overwrite of a whole movie.
    pub async fn put_movie(
        &self,
        title: &str,
        year: i32,
        plot: &str,
        rating: Decimal,
    ) -> Result<WriteOutput> {
        let item = json!({
            "year": year,
            "title": title,
            "info": {"plot": plot, "rating": rating_value(rating)?},
        });
        info!(year, title, "putting movie");
        Ok(self
            .service
            .put_item(PutItemInput {
                table_name: self.config.table_name.clone(),
                item,
                condition: None,
                return_values: ReturnValues::None,
            })
            .await?)
    }

    /// Replace rating, plot and actors. Returns the updated values.
    pub async fn update_movie(
        &self,
        title: &str,
        year: i32,
        rating: Decimal,
        plot: &str,
        actors: &[String],
    ) -> Result<Option<Value>> {
        let info = AttrPath::new("info");
        let out = self
            .service
            .update_item(UpdateItemInput {
                table_name: self.config.table_name.clone(),
                key: MovieKey::new(title, year).to_key(),
                actions: vec![
                    UpdateAction::set(info.clone().key("rating"), rating_value(rating)?),
                    UpdateAction::set(info.clone().key("plot"), Value::from(plot)),
                    UpdateAction::set(info.key("actors"), json!(actors)),
                ],
                condition: None,
                return_values: ReturnValues::UpdatedNew,
            })
            .await?;
        info!(year, title, "movie updated");
        Ok(out.attributes)
    }

    /// Remove the first actor, but only if the movie lists at least
    /// `min_actors` actors.
    pub async fn remove_first_actor(
        &self,
        title: &str,
        year: i32,
        min_actors: usize,
    ) -> Result<Conditional<Option<Value>>> {
        let actors = AttrPath::new("info").key("actors");
        let result = self
            .service
            .update_item(UpdateItemInput {
                table_name: self.config.table_name.clone(),
                key: MovieKey::new(title, year).to_key(),
                actions: vec![UpdateAction::remove(actors.clone().index(0))],
                condition: Some(Condition::ge(Operand::size(actors), json!(min_actors))),
                return_values: ReturnValues::UpdatedNew,
            })
            .await
            .map(|out| out.attributes);
        conditional(title, year, result)
    }

    /// Delete the movie if its rating is at most `rating` (inclusive).
    pub async fn delete_underrated_movie(
        &self,
        title: &str,
        year: i32,
        rating: Decimal,
    ) -> Result<Conditional<()>> {
        let result = self
            .service
            .delete_item(DeleteItemInput {
                table_name: self.config.table_name.clone(),
                key: MovieKey::new(title, year).to_key(),
                condition: Some(Condition::le(
                    AttrPath::new("info").key("rating"),
                    rating_value(rating)?,
                )),
                return_values: ReturnValues::None,
            })
            .await
            .map(|_| ());
        conditional(title, year, result)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_movie(&self, title: &str, year: i32) -> Result<Option<Movie>> {
        let item = self
            .service
            .get_item(GetItemInput {
                table_name: self.config.table_name.clone(),
                key: MovieKey::new(title, year).to_key(),
                projection: Vec::new(),
                consistent_read: false,
            })
            .await?;
        Ok(item.as_ref().map(Movie::from_item).transpose()?)
    }

    /// Every movie released in `year`, ordered by title.
    pub async fn query_movies(&self, year: i32) -> Result<Vec<Movie>> {
        let mut input = QueryInput::new(
            self.config.table_name.as_str(),
            KeyCondition::partition("year", json!(year)),
        );
        let mut movies = Vec::new();
        loop {
            let page = self.service.query(input.clone()).await?;
            for item in &page.items {
                movies.push(Movie::from_item(item)?);
            }
            match page.last_evaluated_key {
                Some(key) => input.exclusive_start_key = Some(key),
                None => break,
            }
        }
        debug!(year, count = movies.len(), "query complete");
        Ok(movies)
    }

    /// Scan for movies released within `years`, handing each to `visit` as
    /// its page arrives. Items carry only year, title and rating.
    pub async fn scan_movies(
        &self,
        years: RangeInclusive<i32>,
        mut visit: impl FnMut(&Movie),
    ) -> Result<ScanSummary> {
        let mut pages = self.scan_pages(years)?;
        let mut summary = ScanSummary::default();
        while let Some(movies) = pages.next_page().await? {
            summary.pages += 1;
            summary.items += movies.len();
            movies.iter().for_each(&mut visit);
        }
        Ok(summary)
    }

    /// The same scan as [`MovieTable::scan_movies`], one page at a time.
    /// An empty range (`start > end`) is rejected before any request.
    pub fn scan_pages(&self, years: RangeInclusive<i32>) -> Result<ScanPages<'_>> {
        let (start, end) = years.into_inner();
        if start > end {
            return Err(ServiceError::validation(format!(
                "invalid year range {start}..={end}: lower bound is greater than upper bound"
            ))
            .into());
        }
        let mut input = ScanInput::new(self.config.table_name.as_str());
        input.filter = Some(Condition::between(
            AttrPath::new("year"),
            json!(start),
            json!(end),
        ));
        input.projection = vec![
            AttrPath::new("year"),
            AttrPath::new("title"),
            AttrPath::new("info").key("rating"),
        ];
        Ok(ScanPages {
            table: self,
            input,
            pages: 0,
            done: false,
        })
    }
}

/// Cursor over the pages of a year-range scan.
pub struct ScanPages<'a> {
    table: &'a MovieTable,
    input: ScanInput,
    pages: usize,
    done: bool,
}

impl ScanPages<'_> {
    /// Fetch the next page, or `None` once the service has no continuation
    /// token left. A page may be empty when the filter rejected every item
    /// the service evaluated.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Movie>>> {
        if self.done {
            return Ok(None);
        }
        let page = self.table.service.scan(self.input.clone()).await?;
        self.pages += 1;
        self.done = page.last_evaluated_key.is_none();
        self.input.exclusive_start_key = page.last_evaluated_key;

        let movies = page
            .items
            .iter()
            .map(Movie::from_item)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(
            page = self.pages,
            items = movies.len(),
            scanned = page.scanned_count,
            "scan page"
        );
        Ok(Some(movies))
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }
}

fn rating_value(rating: Decimal) -> std::result::Result<Value, ServiceError> {
    decimal_to_value(rating)
        .map_err(|e| ServiceError::validation(format!("rating {rating} is not a JSON number: {e}")))
}

fn record_key(record: &Value) -> std::result::Result<MovieKey, ServiceError> {
    let year = record
        .get("year")
        .and_then(Value::as_i64)
        .and_then(|y| i32::try_from(y).ok());
    let title = record.get("title").and_then(Value::as_str);
    match (year, title) {
        (Some(year), Some(title)) => Ok(MovieKey::new(title, year)),
        _ => Err(ServiceError::validation(
            "movie record needs an integer year and a string title",
        )),
    }
}

fn conditional<T>(
    title: &str,
    year: i32,
    result: std::result::Result<T, ServiceError>,
) -> Result<Conditional<T>> {
    match result {
        Ok(v) => Ok(Conditional::Applied(v)),
        Err(e) if e.is_condition_failed() => {
            warn!(year, title, code = %e.code, message = %e.message, "condition not met");
            Ok(Conditional::ConditionFailed { message: e.message })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_schema() {
        let config = TableConfig::default();
        assert_eq!(config.table_name, "movies");
        let schema = config.schema();
        assert_eq!(schema.validate(), Ok(()));
        assert_eq!(schema.partition_key_def().unwrap().name, "year");
        assert_eq!(schema.sort_key_def().unwrap().key_type, ScalarType::S);
        assert_eq!(schema.throughput.read_capacity_units, 10);
    }

    #[test]
    fn test_record_key() {
        assert_eq!(
            record_key(&json!({"year": 2013, "title": "Rush"})).unwrap(),
            MovieKey::new("Rush", 2013)
        );
        assert!(record_key(&json!({"year": "2013", "title": "Rush"})).is_err());
        assert!(record_key(&json!({"year": 2013})).is_err());
    }

    #[test]
    fn test_conditional_split() {
        let ok: Conditional<()> = conditional("t", 1, Ok(())).unwrap();
        assert!(ok.is_applied());

        let failed: Conditional<()> =
            conditional("t", 1, Err(ServiceError::condition_failed())).unwrap();
        assert_eq!(
            failed,
            Conditional::ConditionFailed {
                message: "The conditional request failed".to_string()
            }
        );

        let err = conditional::<()>("t", 1, Err(ServiceError::table_not_found("movies")))
            .unwrap_err();
        assert_eq!(err.service_code(), Some(ServiceError::RESOURCE_NOT_FOUND));
    }
}
