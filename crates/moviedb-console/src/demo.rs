//! The scripted walkthrough run by `moviedb demo`.

use std::path::Path;

use moviedb_core::fixture::load_fixture;
use moviedb_core::{Conditional, Error, MovieTable, ServiceError};
use rust_decimal::Decimal;
use tokio::runtime::Runtime;

use crate::display::{print_item, print_movie, print_movie_count, print_movies, print_not_found};
use crate::executor::{WAIT_ATTEMPTS, WAIT_POLL};

const NEW_TITLE: &str = "The Big New Movie";
const NEW_YEAR: i32 = 2015;
const QUERY_YEAR: i32 = 1985;
const SCAN_YEARS: (i32, i32) = (2009, 2012);

/// Run every catalogue operation once, in order, printing what happens.
pub fn run_demo(table: &MovieTable, rt: &Runtime, fixture: &Path) -> Result<(), Error> {
    step("Creating table");
    match rt.block_on(table.create_table()) {
        Ok(status) => println!("Table status: {status}"),
        Err(e) if e.service_code() == Some(ServiceError::RESOURCE_IN_USE) => {
            println!("Table '{}' already exists.", table.table_name());
        }
        Err(e) => return Err(e),
    }
    rt.block_on(table.wait_until_active(WAIT_POLL, WAIT_ATTEMPTS))?;
    println!("Table '{}' is ACTIVE.", table.table_name());

    step(&format!("Loading movies from {}", fixture.display()));
    let records = load_fixture(fixture)?;
    let summary = rt.block_on(
        table.load_movies_with(&records, |key| println!("Adding movie: {key}")),
    )?;
    println!("Loaded {} movie(s).", summary.loaded);

    step("Putting a new movie");
    rt.block_on(table.put_movie(NEW_TITLE, NEW_YEAR, "Nothing happens at all.", Decimal::ZERO))?;
    println!("Put {NEW_TITLE} ({NEW_YEAR}).");

    step("Getting it back");
    match rt.block_on(table.get_movie(NEW_TITLE, NEW_YEAR))? {
        Some(movie) => print_item(&movie.to_item()?),
        None => print_not_found(),
    }

    step("Updating rating, plot and actors");
    let actors = ["Larry", "Moe", "Curly"].map(String::from);
    let updated = rt.block_on(table.update_movie(
        NEW_TITLE,
        NEW_YEAR,
        Decimal::new(55, 1),
        "Everything happens all at once.",
        &actors,
    ))?;
    if let Some(attrs) = updated {
        print_item(&attrs);
    }

    step("Removing the first actor when there are at least 3");
    for _ in 0..2 {
        match rt.block_on(table.remove_first_actor(NEW_TITLE, NEW_YEAR, 3))? {
            Conditional::Applied(Some(attrs)) => print_item(&attrs),
            Conditional::Applied(None) => println!("Removed."),
            Conditional::ConditionFailed { message } => println!("Condition not met: {message}"),
        }
    }

    step("Deleting the movie if rated 5 or lower, then 10 or lower");
    for threshold in [5, 10] {
        match rt.block_on(table.delete_underrated_movie(
            NEW_TITLE,
            NEW_YEAR,
            Decimal::from(threshold),
        ))? {
            Conditional::Applied(()) => println!("Deleted {NEW_TITLE} ({NEW_YEAR})."),
            Conditional::ConditionFailed { message } => {
                println!("Kept (rating <= {threshold} not met): {message}");
            }
        }
    }

    step(&format!("Querying movies from {QUERY_YEAR}"));
    let movies = rt.block_on(table.query_movies(QUERY_YEAR))?;
    print_movies(&movies, None);

    let (from, to) = SCAN_YEARS;
    step(&format!("Scanning for movies from {from} to {to}"));
    let mut found = 0;
    let summary = rt.block_on(table.scan_movies(from..=to, |m| {
        found += 1;
        print_movie(m);
    }))?;
    print_movie_count(found, Some(summary.pages));

    Ok(())
}

fn step(title: &str) {
    println!();
    println!("--- {title} ---");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use moviedb_core::TableConfig;
    use moviedb_core::memory::MemoryService;

    fn sample_fixture() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/moviedata.json")
    }

    #[test]
    fn test_demo_runs_against_memory_backend() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let table = MovieTable::new(
            Arc::new(MemoryService::new().with_page_size(4)),
            TableConfig::default(),
        );
        run_demo(&table, &rt, &sample_fixture()).unwrap();

        // The new movie was deleted on the second threshold.
        assert!(rt.block_on(table.get_movie(NEW_TITLE, NEW_YEAR)).unwrap().is_none());
        assert_eq!(rt.block_on(table.query_movies(QUERY_YEAR)).unwrap().len(), 3);
    }

    #[test]
    fn test_demo_tolerates_existing_table() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let table = MovieTable::new(Arc::new(MemoryService::new()), TableConfig::default());
        rt.block_on(table.create_table()).unwrap();
        run_demo(&table, &rt, &sample_fixture()).unwrap();
    }

    #[test]
    fn test_demo_missing_fixture() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let table = MovieTable::new(Arc::new(MemoryService::new()), TableConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = run_demo(&table, &rt, &dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }
}
