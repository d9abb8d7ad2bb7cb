use std::io::Read;
use std::process::ExitCode;

use kvsql::{Engine, MemoryBackend, Outcome};
use tracing_subscriber::EnvFilter;

struct Args {
    verbose: bool,
    path: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        verbose: false,
        path: None,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            _ if args.path.is_some() => return Err("only one input file is accepted".into()),
            path => args.path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("kvsql=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kvsql=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Splits a script on `;`, ignoring semicolons inside quoted strings.
fn split_statements(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in script.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            ';' if !in_string => {
                statements.push(&script[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&script[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Rows(mut rows) => {
            println!("{}", rows.column_names().join("\t"));
            let width = rows.column_names().len();
            while rows.advance() {
                let line: Vec<String> = (0..width)
                    .map(|i| rows.get(i).map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                println!("{}", line.join("\t"));
            }
        }
        Outcome::RowsAffected {
            count,
            last_insert_id,
        } => match last_insert_id {
            Some(id) => println!("{count} row(s) affected, id {id}"),
            None => println!("{count} row(s) affected"),
        },
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("usage: kvsql [-v] [FILE]");
            return ExitCode::from(2);
        }
    };
    init_logging(args.verbose);

    let script = match &args.path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
    };
    let script = match script {
        Ok(script) => script,
        Err(e) => {
            eprintln!("error: cannot read input: {e}");
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::new();
    let backend = MemoryBackend::new();
    let mut failed = false;
    for statement in split_statements(&script) {
        match engine.execute(statement, &backend) {
            Ok(outcome) => print_outcome(outcome),
            Err(e) => {
                eprintln!("error: {e}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
