//! Command-line front end for statelex.
//!
//! Usage:
//!   statelex `<grammar.json>` [`<input>` | -] [--config `<file>`] [--format plain|json]
//!            [--coalesce] [--show-skipped]
//!
//! Tokenizes the input (stdin when absent or `-`) with a JSON rule table and
//! prints one token per line, or a JSON array.
//!
//! Input that is not valid UTF-8 is repaired first: each invalid sequence
//! becomes U+FFFD. Reported offsets refer to the repaired text.

use std::{
    fs,
    io::{self, BufWriter, Read, Write},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use statelex::{
    config::config::{Loader, OutputFormat, Settings},
    errors::errors::{ConfigurationError, ErrorTip},
    lexer::{lexer::Segment, tokens::TokenKind},
    line_at_offset,
    loader::loader::from_json,
};

fn cli() -> Command {
    Command::new("statelex")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Tokenize text with a state-machine rule table")
        .arg_required_else_help(true)
        .arg(
            Arg::new("grammar")
                .help("Path to the JSON rule table")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("input")
                .help("File to tokenize, or - for stdin")
                .default_value("-")
                .index(2),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML settings file layered over the defaults"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format")
                .value_parser(["plain", "json"]),
        )
        .arg(
            Arg::new("coalesce")
                .long("coalesce")
                .help("Merge adjacent tokens of the same kind")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-skipped")
                .long("show-skipped")
                .help("Also print input consumed without a token")
                .action(ArgAction::SetTrue),
        )
}

fn settings(matches: &ArgMatches) -> Result<Settings> {
    let mut loader = Loader::new().with_env();
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    if let Some(format) = matches.get_one::<String>("format") {
        loader = loader.set_override("output.format", format.as_str())?;
    }
    if matches.get_flag("coalesce") {
        loader = loader.set_override("lexer.coalesce", true)?;
    }
    if matches.get_flag("show-skipped") {
        loader = loader.set_override("output.show_skipped", true)?;
    }

    loader.build().context("Failed to load settings")
}

fn read_input(path: &str) -> Result<String> {
    let bytes = if path == "-" {
        let mut buffer = vec![];
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        fs::read(path).with_context(|| format!("Failed to read {}", path))?
    };

    Ok(decode_input(bytes, path))
}

fn decode_input(bytes: Vec<u8>, path: &str) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let valid_up_to = err.utf8_error().valid_up_to();
            log::warn!(
                "{} is not valid UTF-8 (first invalid byte at {}); offsets refer to the repaired text",
                path,
                valid_up_to
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// One output line. `kind` is absent for skipped input.
#[derive(Serialize)]
struct Row<'s> {
    kind: Option<TokenKind>,
    value: &'s str,
    start: usize,
    end: usize,
}

impl<'s> From<Segment<'s>> for Row<'s> {
    fn from(segment: Segment<'s>) -> Self {
        let span = segment.span();
        Row {
            kind: match segment {
                Segment::Token(token) => Some(token.kind),
                Segment::Skipped { .. } => None,
            },
            value: segment.value(),
            start: span.start,
            end: span.end,
        }
    }
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let settings = settings(matches)?;

    let grammar_path = matches
        .get_one::<String>("grammar")
        .context("Missing grammar path")?;
    let table = fs::read_to_string(grammar_path)
        .with_context(|| format!("Failed to read {}", grammar_path))?;
    let grammar = match from_json(&table) {
        Ok(grammar) => grammar,
        Err(err) => {
            display_error(&err, None, grammar_path);
            return Ok(ExitCode::FAILURE);
        }
    };

    let input_path = matches
        .get_one::<String>("input")
        .map_or("-", String::as_str);
    let source = read_input(input_path)?;

    let show_skipped = settings.output.show_skipped;
    let segments = grammar
        .lex_with(&source, &settings.lexer)
        .with_skipped()
        .filter(|item| show_skipped || !matches!(item, Ok(Segment::Skipped { .. })));

    let mut out = BufWriter::new(io::stdout().lock());
    let mut failure = None;

    match settings.output.format {
        OutputFormat::Plain => {
            for item in segments {
                match item {
                    Ok(Segment::Token(token)) => writeln!(out, "{}", token)?,
                    Ok(Segment::Skipped { value, span }) => {
                        writeln!(out, "(skipped) {:?} @{}", value, span.start)?
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }
        OutputFormat::Json => {
            let rows = segments
                .map(|item| item.map(Row::from))
                .collect::<Result<Vec<_>, _>>();
            match rows {
                Ok(rows) => writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?,
                Err(err) => failure = Some(err),
            }
        }
    }
    out.flush()?;

    match failure {
        Some(err) => {
            display_error(&err, Some(&source), input_path);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let matches = cli().get_matches();
    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn display_error(error: &ConfigurationError, source: Option<&str>, file: &str) {
    /*
        Error: NonShrinkingRecursion (Recurse only into ...)
        -> input.txt
           |
        20 | let a = #;
           | --------^
    */

    if let ErrorTip::None = error.get_tip() {
        eprintln!("Error: {}", error.get_error_name());
    } else {
        eprintln!("Error: {} ({})", error.get_error_name(), error.get_tip());
    }
    eprintln!("  {}", error);
    eprintln!("-> {}", file);

    let (Some(source), Some(offset)) = (source, error.get_location().offset) else {
        return;
    };
    let Some((line, line_text, line_pos)) = line_at_offset(source, offset) else {
        return;
    };

    let line_str = line.to_string();
    let padding = line_str.len() + 2;

    eprintln!("{:>padding$}", "|");

    let (line_text_removed, removed_whitespace) = remove_starting_whitespace(line_text);
    eprintln!("{} | {}", line_str, line_text_removed.trim_end());

    let arrows = line_text
        .get(removed_whitespace..line_pos)
        .map_or(0, |before| before.chars().count())
        + 1;

    eprintln!("{:>padding$} {:->arrows$}", "|", "^");
}

fn remove_starting_whitespace(string: &str) -> (&str, usize) {
    let trimmed = string.trim_start_matches([' ', '\t']);
    (trimmed, string.len() - trimmed.len())
}

#[cfg(test)]
mod tests {
    use statelex::{grammar::rule::Rule, tokenize, Grammar, TokenKind};

    use super::decode_input;

    #[test]
    fn test_invalid_byte_becomes_error_token() {
        let text = decode_input(b"a\xFFb".to_vec(), "input");
        assert_eq!(text, "a\u{FFFD}b");

        let grammar = Grammar::builder("names")
            .state("root", |s| {
                s.rule(Rule::token("[a-z]+", TokenKind::Name));
            })
            .build()
            .unwrap();
        let tokens = tokenize(&grammar, &text).unwrap();
        let kinds: Vec<_> = tokens
            .iter()
            .map(|token| (token.kind, token.value, token.span.start))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (TokenKind::Name, "a", 0),
                (TokenKind::Error, "\u{FFFD}", 1),
                (TokenKind::Name, "b", 4),
            ]
        );
    }

    #[test]
    fn test_valid_input_is_unchanged() {
        assert_eq!(decode_input("é ok".as_bytes().to_vec(), "input"), "é ok");
    }
}
