use std::path::PathBuf;

use moviedb_core::number::parse_decimal;
use rust_decimal::Decimal;

use crate::commands::Command;

/// Split an input line into tokens.
///
/// Handles:
/// - JSON arrays `[...]` as single tokens (with nested bracket/string tracking)
/// - Double-quoted strings `"..."` as single tokens, quotes included
/// - The comparison operators `<=`, `>=`, `<`, `>` as standalone tokens
/// - Everything else split on whitespace
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        // JSON array.
        if chars[i] == '[' {
            let start = i;
            let mut depth = 0;
            let mut in_string = false;
            loop {
                if i >= len {
                    return Err("Unterminated JSON array".to_string());
                }
                let c = chars[i];
                if in_string {
                    if c == '\\' {
                        i += 1;
                    } else if c == '"' {
                        in_string = false;
                    }
                } else {
                    match c {
                        '"' => in_string = true,
                        '[' => depth += 1,
                        ']' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            continue;
        }

        // Quoted string.
        if chars[i] == '"' {
            let start = i;
            i += 1;
            while i < len && chars[i] != '"' {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= len {
                return Err("Unterminated quoted string".to_string());
            }
            i += 1;
            tokens.push(chars[start..i].iter().collect());
            continue;
        }

        if chars[i] == '<' || chars[i] == '>' {
            if i + 1 < len && chars[i + 1] == '=' {
                tokens.push(chars[i..i + 2].iter().collect());
                i += 2;
            } else {
                tokens.push(chars[i].to_string());
                i += 1;
            }
            continue;
        }

        let start = i;
        while i < len
            && !chars[i].is_whitespace()
            && chars[i] != '"'
            && chars[i] != '['
            && chars[i] != '<'
            && chars[i] != '>'
        {
            i += 1;
        }
        if i > start {
            tokens.push(chars[start..i].iter().collect());
        }
    }

    Ok(tokens)
}

/// Strip the quotes from a quoted token, resolving JSON escapes. Bare words
/// are returned as they are.
fn parse_text(token: &str) -> Result<String, String> {
    if token.starts_with('"') {
        serde_json::from_str::<String>(token).map_err(|e| format!("Invalid string {token}: {e}"))
    } else {
        Ok(token.to_string())
    }
}

fn parse_year(token: &str) -> Result<i32, String> {
    token
        .parse::<i32>()
        .map_err(|_| format!("Invalid year '{token}'. Expected an integer."))
}

fn parse_rating(token: &str) -> Result<Decimal, String> {
    parse_decimal(token).ok_or_else(|| format!("Invalid rating '{token}'. Expected a number."))
}

fn parse_actors(token: &str) -> Result<Vec<String>, String> {
    if !token.starts_with('[') {
        return Err(format!(
            "Expected a JSON array of names after ACTORS, got '{token}'"
        ));
    }
    serde_json::from_str::<Vec<String>>(token)
        .map_err(|e| format!("Invalid ACTORS list: {e}"))
}

fn parse_capacity(token: Option<&String>, keyword: &str) -> Result<i64, String> {
    let token = token.ok_or_else(|| format!("{keyword} requires a number"))?;
    token
        .parse::<i64>()
        .map_err(|_| format!("Invalid {keyword} value '{token}'"))
}

/// The value following a clause keyword at `tokens[i]`.
fn clause_value<'a>(tokens: &'a [String], i: usize) -> Result<&'a str, String> {
    tokens
        .get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", tokens[i].to_uppercase()))
}

/// Parse an input line into a [`Command`].
pub fn parse(input: &str) -> Result<Command, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty command".to_string());
    }

    match tokens[0].to_uppercase().as_str() {
        "CREATE" => parse_create_table(&tokens),
        "DROP" => parse_table_keyword(&tokens, "DROP", Command::DropTable),
        "DESCRIBE" => parse_table_keyword(&tokens, "DESCRIBE", Command::DescribeTable),
        "LOAD" => parse_load(&tokens),
        "PUT" => parse_put(&tokens),
        "GET" => parse_get(&tokens),
        "UPDATE" => parse_update(&tokens),
        "REMOVE" => parse_remove_actor(&tokens),
        "DELETE" => parse_delete(&tokens),
        "QUERY" => parse_query(&tokens),
        "SCAN" => parse_scan(&tokens),
        "HELP" => {
            let topic = if tokens.len() > 1 {
                Some(tokens[1..].join(" "))
            } else {
                None
            };
            Ok(Command::Help(topic))
        }
        "EXIT" | "QUIT" => Ok(Command::Exit),
        _ => Err(format!("Unknown command '{}'", tokens[0])),
    }
}

/// CREATE TABLE [RCU <n>] [WCU <n>]
fn parse_create_table(tokens: &[String]) -> Result<Command, String> {
    if tokens.len() < 2 || tokens[1].to_uppercase() != "TABLE" {
        return Err(
            "Usage: CREATE TABLE [RCU <n>] [WCU <n>]  (Type HELP CREATE TABLE for details)"
                .to_string(),
        );
    }

    let mut read_capacity = None;
    let mut write_capacity = None;
    let mut i = 2;
    while i < tokens.len() {
        match tokens[i].to_uppercase().as_str() {
            "RCU" => read_capacity = Some(parse_capacity(tokens.get(i + 1), "RCU")?),
            "WCU" => write_capacity = Some(parse_capacity(tokens.get(i + 1), "WCU")?),
            _ => return Err(format!("Unexpected token '{}' in CREATE TABLE", tokens[i])),
        }
        i += 2;
    }

    Ok(Command::CreateTable {
        read_capacity,
        write_capacity,
    })
}

/// DROP TABLE | DESCRIBE TABLE
fn parse_table_keyword(tokens: &[String], verb: &str, cmd: Command) -> Result<Command, String> {
    if tokens.len() != 2 || tokens[1].to_uppercase() != "TABLE" {
        return Err(format!(
            "Usage: {verb} TABLE  (Type HELP {verb} TABLE for details)"
        ));
    }
    Ok(cmd)
}

/// LOAD <path>
fn parse_load(tokens: &[String]) -> Result<Command, String> {
    if tokens.len() != 2 {
        return Err("Usage: LOAD <path>  (Type HELP LOAD for details)".to_string());
    }
    Ok(Command::Load {
        path: PathBuf::from(parse_text(&tokens[1])?),
    })
}

/// Leading `<year> <title>` shared by the item commands.
fn parse_movie_key(tokens: &[String], start: usize, usage: &str) -> Result<(i32, String), String> {
    if tokens.len() < start + 2 {
        return Err(usage.to_string());
    }
    Ok((parse_year(&tokens[start])?, parse_text(&tokens[start + 1])?))
}

/// PUT <year> <title> RATING <n> [PLOT <text>]
fn parse_put(tokens: &[String]) -> Result<Command, String> {
    const USAGE: &str =
        "Usage: PUT <year> \"<title>\" RATING <n> [PLOT \"<text>\"]  (Type HELP PUT for details)";
    let (year, title) = parse_movie_key(tokens, 1, USAGE)?;

    let mut rating = None;
    let mut plot = String::new();
    let mut i = 3;
    while i < tokens.len() {
        match tokens[i].to_uppercase().as_str() {
            "RATING" => rating = Some(parse_rating(clause_value(tokens, i)?)?),
            "PLOT" => plot = parse_text(clause_value(tokens, i)?)?,
            _ => return Err(format!("Unexpected token '{}' in PUT", tokens[i])),
        }
        i += 2;
    }

    let rating = rating.ok_or_else(|| USAGE.to_string())?;
    Ok(Command::Put {
        year,
        title,
        rating,
        plot,
    })
}

/// GET <year> <title>
fn parse_get(tokens: &[String]) -> Result<Command, String> {
    const USAGE: &str = "Usage: GET <year> \"<title>\"  (Type HELP GET for details)";
    let (year, title) = parse_movie_key(tokens, 1, USAGE)?;
    if tokens.len() > 3 {
        return Err(format!("Unexpected token '{}' in GET", tokens[3]));
    }
    Ok(Command::Get { year, title })
}

/// UPDATE <year> <title> RATING <n> PLOT <text> ACTORS [..]
fn parse_update(tokens: &[String]) -> Result<Command, String> {
    const USAGE: &str = "Usage: UPDATE <year> \"<title>\" RATING <n> PLOT \"<text>\" ACTORS [\"<name>\", ...]  (Type HELP UPDATE for details)";
    let (year, title) = parse_movie_key(tokens, 1, USAGE)?;

    let mut rating = None;
    let mut plot = None;
    let mut actors = None;
    let mut i = 3;
    while i < tokens.len() {
        match tokens[i].to_uppercase().as_str() {
            "RATING" => rating = Some(parse_rating(clause_value(tokens, i)?)?),
            "PLOT" => plot = Some(parse_text(clause_value(tokens, i)?)?),
            "ACTORS" => actors = Some(parse_actors(clause_value(tokens, i)?)?),
            _ => return Err(format!("Unexpected token '{}' in UPDATE", tokens[i])),
        }
        i += 2;
    }

    match (rating, plot, actors) {
        (Some(rating), Some(plot), Some(actors)) => Ok(Command::Update {
            year,
            title,
            rating,
            plot,
            actors,
        }),
        _ => Err(USAGE.to_string()),
    }
}

/// REMOVE ACTOR <year> <title> MIN <n>
fn parse_remove_actor(tokens: &[String]) -> Result<Command, String> {
    const USAGE: &str =
        "Usage: REMOVE ACTOR <year> \"<title>\" MIN <n>  (Type HELP REMOVE ACTOR for details)";
    if tokens.len() != 6
        || tokens[1].to_uppercase() != "ACTOR"
        || tokens[4].to_uppercase() != "MIN"
    {
        return Err(USAGE.to_string());
    }
    let (year, title) = parse_movie_key(tokens, 2, USAGE)?;
    let min_actors = tokens[5]
        .parse::<usize>()
        .map_err(|_| format!("Invalid MIN value '{}'", tokens[5]))?;
    Ok(Command::RemoveActor {
        year,
        title,
        min_actors,
    })
}

/// DELETE <year> <title> IF RATING <= <n>
fn parse_delete(tokens: &[String]) -> Result<Command, String> {
    const USAGE: &str =
        "Usage: DELETE <year> \"<title>\" IF RATING <= <n>  (Type HELP DELETE for details)";
    if tokens.len() != 7
        || tokens[3].to_uppercase() != "IF"
        || tokens[4].to_uppercase() != "RATING"
    {
        return Err(USAGE.to_string());
    }
    if tokens[5] != "<=" {
        return Err(format!(
            "Only '<=' is supported in DELETE conditions, got '{}'",
            tokens[5]
        ));
    }
    let (year, title) = parse_movie_key(tokens, 1, USAGE)?;
    Ok(Command::Delete {
        year,
        title,
        max_rating: parse_rating(&tokens[6])?,
    })
}

/// QUERY <year>
fn parse_query(tokens: &[String]) -> Result<Command, String> {
    if tokens.len() != 2 {
        return Err("Usage: QUERY <year>  (Type HELP QUERY for details)".to_string());
    }
    Ok(Command::Query {
        year: parse_year(&tokens[1])?,
    })
}

/// SCAN <from> <to>
fn parse_scan(tokens: &[String]) -> Result<Command, String> {
    if tokens.len() != 3 {
        return Err("Usage: SCAN <from-year> <to-year>  (Type HELP SCAN for details)".to_string());
    }
    let from = parse_year(&tokens[1])?;
    let to = parse_year(&tokens[2])?;
    if from > to {
        return Err(format!("Empty year range {from}..{to}"));
    }
    Ok(Command::Scan { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tokenizer
    // -----------------------------------------------------------------------

    #[test]
    fn test_tokenize_quoted_and_array() {
        let tokens =
            tokenize(r#"UPDATE 2015 "The Big New Movie" ACTORS ["Larry", "Moe"]"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                "UPDATE",
                "2015",
                "\"The Big New Movie\"",
                "ACTORS",
                "[\"Larry\", \"Moe\"]"
            ]
        );
    }

    #[test]
    fn test_tokenize_operator_without_spaces() {
        let tokens = tokenize(r#"DELETE 2015 Drive IF RATING<=5"#).unwrap();
        assert_eq!(tokens[5], "<=");
        assert_eq!(tokens[6], "5");
    }

    #[test]
    fn test_tokenize_unterminated() {
        assert!(tokenize(r#"GET 2015 "open"#).is_err());
        assert!(tokenize(r#"UPDATE 2015 x ACTORS ["a""#).is_err());
    }

    #[test]
    fn test_empty_command() {
        assert!(parse("   ").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = parse("FROB 1").unwrap_err();
        assert!(err.contains("Unknown command"));
    }

    // -----------------------------------------------------------------------
    // Table management
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_table_defaults() {
        let cmd = parse("create table").unwrap();
        assert_eq!(
            cmd,
            Command::CreateTable {
                read_capacity: None,
                write_capacity: None
            }
        );
    }

    #[test]
    fn test_create_table_capacity() {
        let cmd = parse("CREATE TABLE WCU 5 RCU 20").unwrap();
        assert_eq!(
            cmd,
            Command::CreateTable {
                read_capacity: Some(20),
                write_capacity: Some(5)
            }
        );
    }

    #[test]
    fn test_create_table_bad_capacity() {
        assert!(parse("CREATE TABLE RCU many").is_err());
        assert!(parse("CREATE TABLE RCU").is_err());
        assert!(parse("CREATE movies").is_err());
    }

    #[test]
    fn test_drop_and_describe() {
        assert_eq!(parse("DROP TABLE").unwrap(), Command::DropTable);
        assert_eq!(parse("describe table").unwrap(), Command::DescribeTable);
        assert!(parse("DROP TABLE movies").is_err());
    }

    #[test]
    fn test_load_quoted_path() {
        let cmd = parse(r#"LOAD "data/movie data.json""#).unwrap();
        assert_eq!(
            cmd,
            Command::Load {
                path: PathBuf::from("data/movie data.json")
            }
        );
    }

    // -----------------------------------------------------------------------
    // PUT / GET
    // -----------------------------------------------------------------------

    #[test]
    fn test_put_with_plot() {
        let cmd = parse(r#"PUT 2015 "The Big New Movie" RATING 0 PLOT "Nothing happens at all.""#)
            .unwrap();
        assert_eq!(
            cmd,
            Command::Put {
                year: 2015,
                title: "The Big New Movie".to_string(),
                rating: Decimal::ZERO,
                plot: "Nothing happens at all.".to_string(),
            }
        );
    }

    #[test]
    fn test_put_requires_rating() {
        let err = parse(r#"PUT 2015 "x" PLOT "y""#).unwrap_err();
        assert!(err.starts_with("Usage: PUT"));
    }

    #[test]
    fn test_put_keeps_rating_precision() {
        match parse("PUT 2015 Heat RATING 5.50").unwrap() {
            Command::Put { rating, .. } => assert_eq!(rating.to_string(), "5.50"),
            other => panic!("Expected Put, got {other:?}"),
        }
    }

    #[test]
    fn test_get_bare_title() {
        let cmd = parse("GET 2010 Inception").unwrap();
        assert_eq!(
            cmd,
            Command::Get {
                year: 2010,
                title: "Inception".to_string()
            }
        );
    }

    #[test]
    fn test_get_escaped_title() {
        match parse(r#"GET 2010 "Say \"Hi\"""#).unwrap() {
            Command::Get { title, .. } => assert_eq!(title, "Say \"Hi\""),
            other => panic!("Expected Get, got {other:?}"),
        }
    }

    #[test]
    fn test_get_bad_year() {
        let err = parse("GET twenty Inception").unwrap_err();
        assert!(err.contains("Invalid year"));
    }

    // -----------------------------------------------------------------------
    // UPDATE / REMOVE ACTOR
    // -----------------------------------------------------------------------

    #[test]
    fn test_update_all_clauses() {
        let cmd = parse(
            r#"UPDATE 2015 "The Big New Movie" RATING 5.5 PLOT "Everything happens all at once." ACTORS ["Larry", "Moe", "Curly"]"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::Update {
                year: 2015,
                title: "The Big New Movie".to_string(),
                rating: dec("5.5"),
                plot: "Everything happens all at once.".to_string(),
                actors: vec!["Larry".into(), "Moe".into(), "Curly".into()],
            }
        );
    }

    #[test]
    fn test_update_missing_clause() {
        let err = parse(r#"UPDATE 2015 x RATING 5 PLOT "p""#).unwrap_err();
        assert!(err.starts_with("Usage: UPDATE"));
    }

    #[test]
    fn test_update_actors_not_strings() {
        let err = parse(r#"UPDATE 2015 x RATING 5 PLOT p ACTORS [1, 2]"#).unwrap_err();
        assert!(err.contains("ACTORS"));
    }

    #[test]
    fn test_remove_actor() {
        let cmd = parse(r#"REMOVE ACTOR 2015 "The Big New Movie" MIN 3"#).unwrap();
        assert_eq!(
            cmd,
            Command::RemoveActor {
                year: 2015,
                title: "The Big New Movie".to_string(),
                min_actors: 3
            }
        );
    }

    #[test]
    fn test_remove_actor_bad_min() {
        assert!(parse("REMOVE ACTOR 2015 x MIN -1").is_err());
        assert!(parse("REMOVE 2015 x MIN 3").is_err());
    }

    // -----------------------------------------------------------------------
    // DELETE
    // -----------------------------------------------------------------------

    #[test]
    fn test_delete_condition() {
        let cmd = parse(r#"DELETE 2015 "The Big New Movie" IF RATING <= 5"#).unwrap();
        assert_eq!(
            cmd,
            Command::Delete {
                year: 2015,
                title: "The Big New Movie".to_string(),
                max_rating: dec("5")
            }
        );
    }

    #[test]
    fn test_delete_rejects_other_operators() {
        let err = parse("DELETE 2015 x IF RATING < 5").unwrap_err();
        assert!(err.contains("'<='"));
    }

    #[test]
    fn test_delete_requires_condition() {
        let err = parse("DELETE 2015 x").unwrap_err();
        assert!(err.starts_with("Usage: DELETE"));
    }

    // -----------------------------------------------------------------------
    // QUERY / SCAN / HELP / EXIT
    // -----------------------------------------------------------------------

    #[test]
    fn test_query() {
        assert_eq!(parse("QUERY 1985").unwrap(), Command::Query { year: 1985 });
        assert!(parse("QUERY").is_err());
    }

    #[test]
    fn test_scan_range() {
        assert_eq!(
            parse("SCAN 1950 1959").unwrap(),
            Command::Scan {
                from: 1950,
                to: 1959
            }
        );
    }

    #[test]
    fn test_scan_inverted_range() {
        assert!(parse("SCAN 1959 1950").is_err());
    }

    #[test]
    fn test_help_topic() {
        assert_eq!(parse("HELP").unwrap(), Command::Help(None));
        assert_eq!(
            parse("help remove actor").unwrap(),
            Command::Help(Some("remove actor".to_string()))
        );
    }

    #[test]
    fn test_exit_and_quit() {
        assert_eq!(parse("exit").unwrap(), Command::Exit);
        assert_eq!(parse("QUIT").unwrap(), Command::Exit);
    }
}
