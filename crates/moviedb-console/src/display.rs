use moviedb_core::Movie;
use moviedb_core::service::TableDescription;
use serde_json::{Value, json};

use crate::executor::CommandResult;

/// Output mode for rendering command results.
pub enum OutputMode {
    /// Human-readable pretty-printed output.
    Pretty,
    /// Machine-parseable JSON (one JSON object per result on stdout).
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Pretty
        }
    }
}

/// Render a command result to stdout in the given mode.
///
/// Returns `true` to continue execution, `false` to signal exit.
pub fn render(result: &CommandResult, mode: &OutputMode) -> bool {
    match result {
        CommandResult::Ok(msg) => match mode {
            OutputMode::Pretty => print_ok(msg),
            OutputMode::Json => println!("{}", json!({"ok": true, "message": msg})),
        },
        CommandResult::Movie(movie) => match mode {
            OutputMode::Pretty => match movie {
                Some(m) => match m.to_item() {
                    Ok(item) => print_item(&item),
                    Err(e) => print_error(&e),
                },
                None => print_not_found(),
            },
            OutputMode::Json => match movie {
                Some(m) => match m.to_item() {
                    Ok(item) => println!("{}", json!({"found": true, "item": item})),
                    Err(e) => render_error(&e, mode),
                },
                None => println!("{}", json!({"found": false})),
            },
        },
        CommandResult::Attributes(attrs) => match mode {
            OutputMode::Pretty => match attrs {
                Some(v) => print_item(v),
                None => print_ok("OK"),
            },
            OutputMode::Json => println!("{}", json!({"ok": true, "attributes": attrs})),
        },
        CommandResult::ConditionFailed(msg) => match mode {
            OutputMode::Pretty => println!("Condition not met: {msg}"),
            OutputMode::Json => println!("{}", json!({"ok": false, "condition_failed": msg})),
        },
        CommandResult::Table(desc) => match mode {
            OutputMode::Pretty => print_table_description(desc),
            OutputMode::Json => println!("{}", table_description_json(desc)),
        },
        CommandResult::Movies { movies, pages } => match mode {
            OutputMode::Pretty => print_movies(movies, *pages),
            OutputMode::Json => {
                let items: Result<Vec<Value>, _> = movies.iter().map(Movie::to_item).collect();
                match items {
                    Ok(items) => println!(
                        "{}",
                        json!({
                            "items": items,
                            "count": items.len(),
                            "pages": pages,
                        })
                    ),
                    Err(e) => render_error(&e, mode),
                }
            }
        },
        CommandResult::Scanned { count, pages } => match mode {
            OutputMode::Pretty => print_movie_count(*count, Some(*pages)),
            OutputMode::Json => println!("{}", json!({"count": count, "pages": pages})),
        },
        CommandResult::Help(topic) => match mode {
            OutputMode::Pretty => render_help_pretty(topic.as_deref()),
            OutputMode::Json => render_help_json(topic.as_deref()),
        },
        CommandResult::Exit => return false,
    }
    true
}

/// Render an error in the given mode (always to stderr).
pub fn render_error(err: &dyn std::fmt::Display, mode: &OutputMode) {
    match mode {
        OutputMode::Pretty => print_error(err),
        OutputMode::Json => {
            eprintln!("{}", json!({"error": err.to_string()}));
        }
    }
}

// ---- Pretty-print helpers ----

/// Pretty-print a single item with 2-space indentation.
pub fn print_item(item: &Value) {
    match serde_json::to_string_pretty(item) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Error formatting item: {e}"),
    }
}

pub fn print_not_found() {
    println!("Movie not found.");
}

/// One line per movie, then the count.
pub fn print_movies(movies: &[Movie], pages: Option<usize>) {
    movies.iter().for_each(print_movie);
    print_movie_count(movies.len(), pages);
}

/// Key, then rating when known.
pub fn print_movie(movie: &Movie) {
    match movie.info.rating {
        Some(rating) => println!("  {}  rating {rating}", movie.key()),
        None => println!("  {}", movie.key()),
    }
}

pub fn print_movie_count(n: usize, pages: Option<usize>) {
    match pages {
        Some(pages) => println!("Returned {n} movie(s) in {pages} page(s)."),
        None => println!("Returned {n} movie(s)."),
    }
}

fn print_table_description(desc: &TableDescription) {
    println!("Table: {}", desc.name);
    println!("  Status:        {}", desc.status);
    if let Some(count) = desc.item_count {
        println!("  Item count:    {count}");
    }
    let Some(schema) = &desc.schema else {
        return;
    };
    match schema.partition_key_def() {
        Some(pk) => println!("  Partition key: {} ({})", pk.name, pk.key_type),
        None => println!("  Partition key: (none)"),
    }
    match schema.sort_key_def() {
        Some(sk) => println!("  Sort key:      {} ({})", sk.name, sk.key_type),
        None => println!("  Sort key:      (none)"),
    }
    println!(
        "  Capacity:      {} read / {} write",
        schema.throughput.read_capacity_units, schema.throughput.write_capacity_units
    );
}

fn table_description_json(desc: &TableDescription) -> Value {
    let key = |def: Option<moviedb_core::types::KeyDefinition>| {
        def.map(|d| json!({"name": d.name, "type": d.key_type.as_str()}))
    };
    let schema = desc.schema.as_ref().map(|s| {
        json!({
            "partition_key": key(s.partition_key_def()),
            "sort_key": key(s.sort_key_def()),
            "read_capacity": s.throughput.read_capacity_units,
            "write_capacity": s.throughput.write_capacity_units,
        })
    });
    json!({
        "name": desc.name,
        "status": desc.status.as_str(),
        "item_count": desc.item_count,
        "schema": schema,
    })
}

/// Print a success message.
pub fn print_ok(msg: &str) {
    println!("{msg}");
}

/// Print an error message to stderr.
pub fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("Error: {err}");
}

// ---------------------------------------------------------------------------
// Structured per-command help
// ---------------------------------------------------------------------------

struct CommandHelp {
    name: &'static str,
    summary: &'static str,
    syntax: &'static str,
    details: &'static str,
    examples: &'static [&'static str],
}

/// Lookup keys (lowercase) that select this command's help.
fn topic_keys(cmd: &CommandHelp) -> &'static [&'static str] {
    match cmd.name {
        "CREATE TABLE" => &["create table", "create"],
        "DROP TABLE" => &["drop table", "drop"],
        "DESCRIBE TABLE" => &["describe table", "describe"],
        "LOAD" => &["load"],
        "PUT" => &["put"],
        "GET" => &["get"],
        "UPDATE" => &["update"],
        "REMOVE ACTOR" => &["remove actor", "remove"],
        "DELETE" => &["delete"],
        "QUERY" => &["query"],
        "SCAN" => &["scan"],
        "HELP" => &["help"],
        "EXIT / QUIT" => &["exit", "quit"],
        _ => &[],
    }
}

const COMMANDS: &[CommandHelp] = &[
    // -- Table Management --
    CommandHelp {
        name: "CREATE TABLE",
        summary: "Create the movie table and wait until it is ACTIVE",
        syntax: "CREATE TABLE [RCU <n>] [WCU <n>]",
        details: "\
The table is keyed by year (NUMBER, partition key) and title (STRING, sort \
key). Provisioned read and write capacity default to 10 units each.",
        examples: &["CREATE TABLE", "CREATE TABLE RCU 5 WCU 5"],
    },
    CommandHelp {
        name: "DROP TABLE",
        summary: "Delete the movie table and all its data",
        syntax: "DROP TABLE",
        details: "Permanently removes the table and every movie it contains.",
        examples: &["DROP TABLE"],
    },
    CommandHelp {
        name: "DESCRIBE TABLE",
        summary: "Show the table's status, key schema and capacity",
        syntax: "DESCRIBE TABLE",
        details: "",
        examples: &["DESCRIBE TABLE"],
    },
    CommandHelp {
        name: "LOAD",
        summary: "Bulk-load movies from a JSON fixture file",
        syntax: "LOAD <path>",
        details: "\
The file holds a JSON array of movie records, each with an integer year, a \
string title and an optional info map. Records are written in order with \
unconditional puts. If a write fails, the movies written before it stay.",
        examples: &["LOAD data/moviedata.json", "LOAD \"my movies.json\""],
    },
    // -- Data Operations --
    CommandHelp {
        name: "PUT",
        summary: "Write a movie, replacing any existing one",
        syntax: "PUT <year> \"<title>\" RATING <n> [PLOT \"<text>\"]",
        details: "Ratings are stored as exact decimals.",
        examples: &["PUT 2015 \"The Big New Movie\" RATING 0 PLOT \"Nothing happens at all.\""],
    },
    CommandHelp {
        name: "GET",
        summary: "Retrieve a movie by year and title",
        syntax: "GET <year> \"<title>\"",
        details: "Titles without spaces may be written without quotes.",
        examples: &["GET 2015 \"The Big New Movie\"", "GET 2010 Inception"],
    },
    CommandHelp {
        name: "UPDATE",
        summary: "Set a movie's rating, plot and actors",
        syntax: "UPDATE <year> \"<title>\" RATING <n> PLOT \"<text>\" ACTORS [\"<name>\", ...]",
        details: "\
All three clauses are required. Prints the updated attributes. Updating a \
movie that does not exist creates it.",
        examples: &[
            "UPDATE 2015 \"The Big New Movie\" RATING 5.5 PLOT \"Everything happens all at once.\" ACTORS [\"Larry\", \"Moe\", \"Curly\"]",
        ],
    },
    CommandHelp {
        name: "REMOVE ACTOR",
        summary: "Remove the first actor if the movie has enough actors",
        syntax: "REMOVE ACTOR <year> \"<title>\" MIN <n>",
        details: "\
Removes info.actors[0] only when the movie lists at least <n> actors. When \
the condition is not met nothing changes and a notice is printed.",
        examples: &["REMOVE ACTOR 2015 \"The Big New Movie\" MIN 3"],
    },
    CommandHelp {
        name: "DELETE",
        summary: "Delete a movie if its rating is at most a threshold",
        syntax: "DELETE <year> \"<title>\" IF RATING <= <n>",
        details: "\
The comparison is inclusive. A movie rated above the threshold, or without \
a rating, is kept and a notice is printed.",
        examples: &["DELETE 2015 \"The Big New Movie\" IF RATING <= 5"],
    },
    // -- Query & Scan --
    CommandHelp {
        name: "QUERY",
        summary: "List every movie released in a year",
        syntax: "QUERY <year>",
        details: "Movies are listed in title order. All result pages are fetched.",
        examples: &["QUERY 1985"],
    },
    CommandHelp {
        name: "SCAN",
        summary: "List movies released within a range of years",
        syntax: "SCAN <from-year> <to-year>",
        details: "\
Both bounds are inclusive. The scan reads the whole table page by page and \
reports how many pages it took. Only year, title and rating are fetched.",
        examples: &["SCAN 1950 1959"],
    },
    // -- Other --
    CommandHelp {
        name: "HELP",
        summary: "Show the command overview or help for one command",
        syntax: "HELP [command]",
        details: "",
        examples: &["HELP", "HELP REMOVE ACTOR"],
    },
    CommandHelp {
        name: "EXIT / QUIT",
        summary: "Exit the console",
        syntax: "EXIT",
        details: "",
        examples: &["EXIT", "QUIT"],
    },
];

fn find_command(topic: &str) -> Option<&'static CommandHelp> {
    let lower = topic.to_lowercase();
    COMMANDS
        .iter()
        .find(|cmd| topic_keys(cmd).iter().any(|k| *k == lower))
}

fn render_help_pretty(topic: Option<&str>) {
    match topic {
        None => print_help_overview(),
        Some(t) => match find_command(t) {
            Some(cmd) => print_command_help(cmd),
            None => {
                println!("Unknown help topic '{t}'. Type HELP to see available commands.");
            }
        },
    }
}

fn print_help_overview() {
    println!("moviedb console: command reference");
    println!();
    println!("  Table Management");
    println!("    CREATE TABLE   Create the movie table and wait until it is ACTIVE");
    println!("    DROP TABLE     Delete the movie table and all its data");
    println!("    DESCRIBE TABLE Show the table's status, key schema and capacity");
    println!("    LOAD           Bulk-load movies from a JSON fixture file");
    println!();
    println!("  Data Operations");
    println!("    PUT            Write a movie, replacing any existing one");
    println!("    GET            Retrieve a movie by year and title");
    println!("    UPDATE         Set a movie's rating, plot and actors");
    println!("    REMOVE ACTOR   Remove the first actor if the movie has enough actors");
    println!("    DELETE         Delete a movie if its rating is at most a threshold");
    println!();
    println!("  Query & Scan");
    println!("    QUERY          List every movie released in a year");
    println!("    SCAN           List movies released within a range of years");
    println!();
    println!("  Other");
    println!("    HELP [command] Show this overview, or detailed help for a command");
    println!("    EXIT / QUIT    Exit the console");
    println!();
    println!("Type HELP <command> for detailed usage and examples.");
}

fn print_command_help(cmd: &CommandHelp) {
    println!("{}: {}", cmd.name, cmd.summary);
    println!();
    println!("Syntax:");
    println!("  {}", cmd.syntax);
    if !cmd.details.is_empty() {
        println!();
        println!("{}", cmd.details);
    }
    if !cmd.examples.is_empty() {
        println!();
        println!("Examples:");
        for ex in cmd.examples {
            println!("  {ex}");
        }
    }
}

fn render_help_json(topic: Option<&str>) {
    match topic {
        None => {
            let commands: Vec<Value> = COMMANDS
                .iter()
                .map(|cmd| json!({"name": cmd.name, "summary": cmd.summary}))
                .collect();
            println!("{}", json!({ "commands": commands }));
        }
        Some(t) => match find_command(t) {
            Some(cmd) => {
                println!(
                    "{}",
                    json!({
                        "command": cmd.name,
                        "summary": cmd.summary,
                        "syntax": cmd.syntax,
                        "details": cmd.details,
                        "examples": cmd.examples,
                    })
                );
            }
            None => {
                eprintln!("{}", json!({"error": format!("Unknown help topic '{t}'")}));
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_a_topic() {
        for cmd in COMMANDS {
            assert!(!topic_keys(cmd).is_empty(), "{} has no help topic", cmd.name);
        }
    }

    #[test]
    fn test_find_command_aliases() {
        assert_eq!(find_command("REMOVE ACTOR").unwrap().name, "REMOVE ACTOR");
        assert_eq!(find_command("remove").unwrap().name, "REMOVE ACTOR");
        assert_eq!(find_command("quit").unwrap().name, "EXIT / QUIT");
        assert!(find_command("frobnicate").is_none());
    }

    #[test]
    fn test_render_exit_stops() {
        assert!(!render(&CommandResult::Exit, &OutputMode::Pretty));
        assert!(render(&CommandResult::Ok("OK".into()), &OutputMode::Json));
        assert!(render(
            &CommandResult::Scanned { count: 3, pages: 2 },
            &OutputMode::Pretty
        ));
    }
}
