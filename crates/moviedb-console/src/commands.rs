use std::path::PathBuf;

use rust_decimal::Decimal;

/// A parsed console command. Every command targets the session's table.
#[derive(Debug, PartialEq)]
pub enum Command {
    CreateTable {
        read_capacity: Option<i64>,
        write_capacity: Option<i64>,
    },
    DropTable,
    DescribeTable,
    Load {
        path: PathBuf,
    },
    Put {
        year: i32,
        title: String,
        rating: Decimal,
        plot: String,
    },
    Get {
        year: i32,
        title: String,
    },
    Update {
        year: i32,
        title: String,
        rating: Decimal,
        plot: String,
        actors: Vec<String>,
    },
    RemoveActor {
        year: i32,
        title: String,
        min_actors: usize,
    },
    Delete {
        year: i32,
        title: String,
        max_rating: Decimal,
    },
    Query {
        year: i32,
    },
    Scan {
        from: i32,
        to: i32,
    },
    Help(Option<String>),
    Exit,
}
