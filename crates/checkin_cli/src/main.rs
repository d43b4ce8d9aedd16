//! Admin command-line tool over a check-in database file.
//!
//! # Responsibility
//! - Register attendees and mark attendance without running the server.
//! - Print records and counts for quick inspection at the venue desk.
//!
//! # Usage
//! ```bash
//! checkin --db ./registrations.sqlite3 register --name Alice --email a@x.com --roll R1
//! checkin mark '{"id":1,"name":"Alice","email":"a@x.com","roll":"R1"}'
//! checkin list --pending
//! checkin stats
//! ```

use checkin_core::{
    init_logging, NewRegistration, Registration, RegistrationError, RegistrationListQuery,
    RegistrationStore, ScannedToken, TokenPayload,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "checkin")]
#[command(about = "Event registration and attendance admin tool")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "registrations.sqlite3")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long)]
    log_dir: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new attendee and print their token
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        roll: String,
    },
    /// Mark attendance from a scanned token (bare id or JSON payload)
    Mark { token: String },
    /// Show one registration
    Show { id: i64 },
    /// List registrations in registration order
    List {
        #[arg(long, conflicts_with = "pending")]
        attended: bool,
        #[arg(long)]
        pending: bool,
    },
    /// Print registered/attended counts
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(&cli.log_level, dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let store = RegistrationStore::open(&cli.db)
        .map_err(|err| format!("cannot open `{}`: {err}", cli.db.display()))?;
    let json = cli.json;

    let code = match cli.command {
        Command::Register { name, email, roll } => {
            let input = NewRegistration::new(name, email, roll);
            let record = store.register(&input).map_err(describe)?;
            let token = TokenPayload::from_registration(&record)
                .encode()
                .map_err(|err| err.to_string())?;
            if json {
                print_json(&serde_json::json!({ "record": record, "token": token }))?;
            } else {
                println!("registered id={}", record.id);
                println!("token={token}");
            }
            ExitCode::SUCCESS
        }
        Command::Mark { token } => {
            let scanned = ScannedToken::parse(&token).map_err(|err| err.to_string())?;
            match store.mark_scanned(&scanned) {
                Ok(record) => {
                    println!("attendance marked id={} name={}", record.id, record.name);
                    ExitCode::SUCCESS
                }
                Err(RegistrationError::AlreadyMarked(id)) => {
                    println!("attendance already marked id={id}");
                    ExitCode::from(2)
                }
                Err(err) => return Err(describe(err)),
            }
        }
        Command::Show { id } => {
            let record = store
                .find_by_id(id)
                .map_err(describe)?
                .ok_or_else(|| format!("registration not found: {id}"))?;
            if json {
                print_json(&record)?;
            } else {
                println!("{}", format_row(&record));
            }
            ExitCode::SUCCESS
        }
        Command::List { attended, pending } => {
            let query = RegistrationListQuery {
                attended: list_filter(attended, pending),
                ..RegistrationListQuery::default()
            };
            let records = store.list(&query).map_err(describe)?;
            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    println!("{}", format_row(record));
                }
            }
            ExitCode::SUCCESS
        }
        Command::Stats => {
            let counts = store.counts().map_err(describe)?;
            if json {
                print_json(&counts)?;
            } else {
                println!(
                    "registered={} attended={}",
                    counts.total_registered, counts.total_attended
                );
            }
            ExitCode::SUCCESS
        }
    };

    store.close().map_err(|err| err.to_string())?;
    Ok(code)
}

fn list_filter(attended: bool, pending: bool) -> Option<bool> {
    match (attended, pending) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn describe(err: RegistrationError) -> String {
    match err {
        RegistrationError::Duplicate(field) => {
            format!("this {field} is already registered; correct the input")
        }
        other => other.to_string(),
    }
}

fn format_row(record: &Registration) -> String {
    format!(
        "{:>5}  {:<8}  {}  <{}>  roll={}",
        record.id,
        if record.attended { "attended" } else { "pending" },
        record.name,
        record.email,
        record.roll
    )
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_command() {
        let cli = Cli::try_parse_from([
            "checkin", "--db", "/tmp/x.db", "register", "--name", "Alice", "--email", "a@x.com",
            "--roll", "R1",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("/tmp/x.db"));
        assert!(matches!(cli.command, Command::Register { ref roll, .. } if roll == "R1"));
    }

    #[test]
    fn attended_and_pending_are_exclusive() {
        assert!(Cli::try_parse_from(["checkin", "list", "--attended", "--pending"]).is_err());
        assert_eq!(list_filter(true, false), Some(true));
        assert_eq!(list_filter(false, true), Some(false));
        assert_eq!(list_filter(false, false), None);
    }

    #[test]
    fn format_row_shows_state() {
        let record = Registration {
            id: 7,
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            roll: "R1".to_string(),
            attended: true,
            registered_at: 0,
            attended_at: Some(1),
        };
        let row = format_row(&record);
        assert!(row.contains("attended"));
        assert!(row.contains("roll=R1"));
    }
}
