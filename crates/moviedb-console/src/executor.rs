use std::path::Path;
use std::time::Duration;

use moviedb_core::fixture::load_fixture;
use moviedb_core::service::TableDescription;
use moviedb_core::{Conditional, Error, Movie, MovieTable};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::commands::Command;
use crate::display::{self, OutputMode};

/// Interval between table status polls after CREATE TABLE.
pub const WAIT_POLL: Duration = Duration::from_secs(2);
/// Status polls before CREATE TABLE gives up waiting.
pub const WAIT_ATTEMPTS: u32 = 30;

/// Structured result from executing a command.
#[derive(Debug)]
pub enum CommandResult {
    /// Mutation succeeded (CREATE TABLE, DROP TABLE, LOAD, PUT, DELETE).
    Ok(String),
    /// Single movie returned (GET).
    Movie(Option<Movie>),
    /// Attributes returned by a write (UPDATE, REMOVE ACTOR).
    Attributes(Option<Value>),
    /// A conditional write was rejected. Not an error.
    ConditionFailed(String),
    /// Table metadata (DESCRIBE TABLE).
    Table(TableDescription),
    /// Multiple movies returned (QUERY, SCAN in JSON mode). `pages` is set
    /// for scans.
    Movies {
        movies: Vec<Movie>,
        pages: Option<usize>,
    },
    /// A scan whose movies were already printed as they arrived.
    Scanned { count: usize, pages: usize },
    /// Help text (optional topic for per-command help).
    Help(Option<String>),
    /// Exit signal.
    Exit,
}

/// Execute a parsed command against the session's table.
///
/// In pretty mode SCAN prints each movie as its page arrives; JSON mode
/// collects them so the result is a single object.
pub fn execute(
    table: &MovieTable,
    rt: &Runtime,
    cmd: Command,
    mode: &OutputMode,
) -> Result<CommandResult, Error> {
    match cmd {
        Command::CreateTable {
            read_capacity,
            write_capacity,
        } => exec_create_table(table, rt, read_capacity, write_capacity),
        Command::DropTable => exec_drop_table(table, rt),
        Command::DescribeTable => Ok(CommandResult::Table(rt.block_on(table.describe_table())?)),
        Command::Load { path } => exec_load(table, rt, &path),
        Command::Put {
            year,
            title,
            rating,
            plot,
        } => exec_put(table, rt, year, &title, rating, &plot),
        Command::Get { year, title } => Ok(CommandResult::Movie(
            rt.block_on(table.get_movie(&title, year))?,
        )),
        Command::Update {
            year,
            title,
            rating,
            plot,
            actors,
        } => {
            let attrs = rt.block_on(table.update_movie(&title, year, rating, &plot, &actors))?;
            Ok(CommandResult::Attributes(attrs))
        }
        Command::RemoveActor {
            year,
            title,
            min_actors,
        } => {
            let outcome = rt.block_on(table.remove_first_actor(&title, year, min_actors))?;
            Ok(match outcome {
                Conditional::Applied(attrs) => CommandResult::Attributes(attrs),
                Conditional::ConditionFailed { message } => CommandResult::ConditionFailed(message),
            })
        }
        Command::Delete {
            year,
            title,
            max_rating,
        } => exec_delete(table, rt, year, &title, max_rating),
        Command::Query { year } => {
            let movies = rt.block_on(table.query_movies(year))?;
            Ok(CommandResult::Movies {
                movies,
                pages: None,
            })
        }
        Command::Scan { from, to } => exec_scan(table, rt, from, to, mode),
        Command::Help(topic) => Ok(CommandResult::Help(topic)),
        Command::Exit => Ok(CommandResult::Exit),
    }
}

fn exec_create_table(
    table: &MovieTable,
    rt: &Runtime,
    read_capacity: Option<i64>,
    write_capacity: Option<i64>,
) -> Result<CommandResult, Error> {
    let config = table.config();
    let config = config.clone().capacity(
        read_capacity.unwrap_or(config.read_capacity),
        write_capacity.unwrap_or(config.write_capacity),
    );
    rt.block_on(async {
        table.create_table_with(&config.schema()).await?;
        table.wait_until_active(WAIT_POLL, WAIT_ATTEMPTS).await
    })?;
    Ok(CommandResult::Ok(format!(
        "Table '{}' is ACTIVE.",
        table.table_name()
    )))
}

fn exec_drop_table(table: &MovieTable, rt: &Runtime) -> Result<CommandResult, Error> {
    let status = rt.block_on(table.delete_table())?;
    Ok(CommandResult::Ok(format!(
        "Table '{}' dropped ({status}).",
        table.table_name()
    )))
}

fn exec_load(table: &MovieTable, rt: &Runtime, path: &Path) -> Result<CommandResult, Error> {
    let records = load_fixture(path)?;
    let summary = rt.block_on(table.load_movies(&records))?;
    Ok(CommandResult::Ok(format!(
        "Loaded {} movie(s) from {}.",
        summary.loaded,
        path.display()
    )))
}

fn exec_put(
    table: &MovieTable,
    rt: &Runtime,
    year: i32,
    title: &str,
    rating: Decimal,
    plot: &str,
) -> Result<CommandResult, Error> {
    rt.block_on(table.put_movie(title, year, plot, rating))?;
    Ok(CommandResult::Ok("OK".to_string()))
}

fn exec_delete(
    table: &MovieTable,
    rt: &Runtime,
    year: i32,
    title: &str,
    max_rating: Decimal,
) -> Result<CommandResult, Error> {
    let outcome = rt.block_on(table.delete_underrated_movie(title, year, max_rating))?;
    Ok(match outcome {
        Conditional::Applied(()) => CommandResult::Ok(format!("Deleted {title} ({year}).")),
        Conditional::ConditionFailed { message } => CommandResult::ConditionFailed(message),
    })
}

fn exec_scan(
    table: &MovieTable,
    rt: &Runtime,
    from: i32,
    to: i32,
    mode: &OutputMode,
) -> Result<CommandResult, Error> {
    match mode {
        OutputMode::Pretty => {
            let mut count = 0;
            let summary = rt.block_on(table.scan_movies(from..=to, |m| {
                count += 1;
                display::print_movie(m);
            }))?;
            Ok(CommandResult::Scanned {
                count,
                pages: summary.pages,
            })
        }
        OutputMode::Json => {
            let mut movies = Vec::new();
            let summary = rt.block_on(table.scan_movies(from..=to, |m| movies.push(m.clone())))?;
            Ok(CommandResult::Movies {
                movies,
                pages: Some(summary.pages),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use moviedb_core::TableConfig;
    use moviedb_core::memory::MemoryService;

    use crate::parser::parse;

    fn setup() -> (Runtime, MovieTable) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let service = MemoryService::new().with_page_size(2);
        let table = MovieTable::new(Arc::new(service), TableConfig::default());
        (rt, table)
    }

    fn run(table: &MovieTable, rt: &Runtime, line: &str) -> CommandResult {
        execute(table, rt, parse(line).unwrap(), &OutputMode::Json).unwrap()
    }

    #[test]
    fn test_create_put_get() {
        let (rt, table) = setup();
        assert!(matches!(run(&table, &rt, "CREATE TABLE"), CommandResult::Ok(_)));
        run(&table, &rt, r#"PUT 2015 "The Big New Movie" RATING 0 PLOT "Nothing happens at all.""#);

        match run(&table, &rt, r#"GET 2015 "The Big New Movie""#) {
            CommandResult::Movie(Some(movie)) => {
                assert_eq!(movie.info.plot.as_deref(), Some("Nothing happens at all."));
                assert_eq!(movie.info.rating, Some(Decimal::ZERO));
            }
            _ => panic!("Expected a movie"),
        }
    }

    #[test]
    fn test_get_missing_table_is_error() {
        let (rt, table) = setup();
        let err = execute(&table, &rt, parse("GET 2015 x").unwrap(), &OutputMode::Json).unwrap_err();
        assert_eq!(err.service_code(), Some("ResourceNotFoundException"));
    }

    #[test]
    fn test_remove_actor_condition_failed() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        // Nested SET paths need `info` to exist, so the item is put first.
        run(&table, &rt, "PUT 2015 Heat RATING 5");
        run(
            &table,
            &rt,
            r#"UPDATE 2015 Heat RATING 5.5 PLOT "p" ACTORS ["Larry", "Moe"]"#,
        );
        assert!(matches!(
            run(&table, &rt, "REMOVE ACTOR 2015 Heat MIN 3"),
            CommandResult::ConditionFailed(_)
        ));
        assert!(matches!(
            run(&table, &rt, "REMOVE ACTOR 2015 Heat MIN 2"),
            CommandResult::Attributes(Some(_))
        ));
    }

    #[test]
    fn test_delete_underrated() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        run(&table, &rt, "PUT 2015 Heat RATING 5.5");
        assert!(matches!(
            run(&table, &rt, "DELETE 2015 Heat IF RATING <= 5"),
            CommandResult::ConditionFailed(_)
        ));
        assert!(matches!(
            run(&table, &rt, "DELETE 2015 Heat IF RATING <= 5.5"),
            CommandResult::Ok(_)
        ));
        assert!(matches!(
            run(&table, &rt, "GET 2015 Heat"),
            CommandResult::Movie(None)
        ));
    }

    #[test]
    fn test_query_and_scan() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        for (year, title) in [(1985, "Witness"), (1985, "Brazil"), (1986, "Aliens"), (1990, "Ghost")] {
            run(&table, &rt, &format!(r#"PUT {year} "{title}" RATING 7"#));
        }

        match run(&table, &rt, "QUERY 1985") {
            CommandResult::Movies { movies, pages } => {
                let titles: Vec<_> = movies.iter().map(|m| m.title.as_str()).collect();
                assert_eq!(titles, vec!["Brazil", "Witness"]);
                assert!(pages.is_none());
            }
            _ => panic!("Expected movies"),
        }

        match run(&table, &rt, "SCAN 1985 1986") {
            CommandResult::Movies { movies, pages } => {
                assert_eq!(movies.len(), 3);
                assert_eq!(pages, Some(2));
            }
            _ => panic!("Expected movies"),
        }

        let scan = parse("SCAN 1985 1986").unwrap();
        match execute(&table, &rt, scan, &OutputMode::Pretty).unwrap() {
            CommandResult::Scanned { count, pages } => {
                assert_eq!(count, 3);
                assert_eq!(pages, 2);
            }
            other => panic!("Expected a streamed scan, got {other:?}"),
        }
    }

    #[test]
    fn test_update_missing_movie_is_validation_error() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        let update = parse(r#"UPDATE 2015 Heat RATING 5.5 PLOT "p" ACTORS ["Larry"]"#).unwrap();
        let err = execute(&table, &rt, update, &OutputMode::Json).unwrap_err();
        assert_eq!(err.service_code(), Some("ValidationException"));
    }

    #[test]
    fn test_scan_reversed_range_is_error() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        // The parser refuses this range; the table must too.
        let scan = Command::Scan {
            from: 1990,
            to: 1985,
        };
        let err = execute(&table, &rt, scan, &OutputMode::Pretty).unwrap_err();
        assert_eq!(err.service_code(), Some("ValidationException"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE");
        let dir = tempfile::tempdir().unwrap();
        let line = format!(r#"LOAD "{}""#, dir.path().join("none.json").display());
        let err = execute(&table, &rt, parse(&line).unwrap(), &OutputMode::Json).unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }

    #[test]
    fn test_describe_reports_schema() {
        let (rt, table) = setup();
        run(&table, &rt, "CREATE TABLE RCU 5 WCU 7");
        match run(&table, &rt, "DESCRIBE TABLE") {
            CommandResult::Table(desc) => {
                assert_eq!(desc.name, "movies");
                let schema = desc.schema.unwrap();
                assert_eq!(schema.throughput.read_capacity_units, 5);
                assert_eq!(schema.throughput.write_capacity_units, 7);
            }
            _ => panic!("Expected table description"),
        }
    }
}
