//! Parsing of front-end input lines.

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the search query. Empty clears the results.
    Query(String),
    /// `/download <key>`
    Download(String),
    /// `/persist <key>`
    Persist(String),
    /// `/jobs`
    Jobs,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("usage: /{0} <key>")]
    MissingKey(&'static str),

    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
}

pub const HELP: &str = "\
Type to search. An empty line clears the results.
  /download <key>   download a result
  /persist <key>    download a show and its future episodes
  /jobs             show download progress
  /quit             exit";

/// Parse one input line. Anything not starting with `/` is a query.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Query(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "download" => keyed(arg, "download").map(Command::Download),
        "persist" => keyed(arg, "persist").map(Command::Persist),
        "jobs" => Ok(Command::Jobs),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn keyed(arg: &str, name: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingKey(name))
    } else {
        Ok(arg.to_string())
    }
}
