//! Line-oriented command shell: parsing user input and rendering replies

use shared::{parse_scoreboard, Message, MessageKind, MATRIX_SIZE};
use std::fmt::Write;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  registra_utente <nick>   register with a nickname (alias: register)
  matrice                  show the current matrix and time left (alias: matrix)
  p <word>                 submit a word (alias: word)
  aiuto                    show this help (alias: help)
  fine                     leave the game (alias: quit)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register(String),
    Matrix,
    Word(String),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?}, type 'aiuto' for help")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "registra_utente" | "register" => {
                Command::Register(required(argument, "registra_utente")?)
            }
            "matrice" | "matrix" => Command::Matrix,
            "p" | "word" => Command::Word(required(argument, "p")?),
            "aiuto" | "help" => Command::Help,
            "fine" | "quit" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.to_string())),
        };
        Ok(Some(command))
    }

    /// The request this command sends, if any.
    pub fn to_message(&self) -> Option<Message> {
        match self {
            Command::Register(nickname) => Some(Message::text(MessageKind::RegisterUser, nickname)),
            Command::Matrix => Some(Message::empty(MessageKind::Matrix)),
            Command::Word(word) => Some(Message::text(MessageKind::SubmitWord, word)),
            Command::Help | Command::Quit => None,
        }
    }
}

fn required(argument: &str, command: &'static str) -> Result<String, CommandError> {
    if argument.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(argument.to_string())
    }
}

/// Renders a server message for the terminal.
pub fn render(message: &Message) -> String {
    let text = message.payload_text();
    match message.kind {
        MessageKind::Ok => text,
        MessageKind::Error => format!("Error: {}", text),
        MessageKind::Matrix => render_matrix(&text),
        MessageKind::TimeInRound => format!("Time left in round: {}s", text),
        MessageKind::TimeToNextRound => format!("Next round starts in {}s", text),
        MessageKind::WordScore => format!("Points: {}", text),
        MessageKind::FinalScores => render_scoreboard(&text),
        MessageKind::RegisterUser | MessageKind::SubmitWord => {
            format!("Unexpected {:?} message: {}", message.kind, text)
        }
    }
}

fn render_matrix(payload: &str) -> String {
    let tokens: Vec<&str> = payload.split_whitespace().collect();
    if tokens.len() != MATRIX_SIZE * MATRIX_SIZE {
        return format!("Malformed matrix: {}", payload);
    }

    let mut out = String::new();
    for (i, row) in tokens.chunks(MATRIX_SIZE).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let cells: Vec<String> = row.iter().map(|token| format!("{:<3}", token)).collect();
        out.push_str(cells.join("").trim_end());
    }
    out
}

fn render_scoreboard(payload: &str) -> String {
    let Some(entries) = parse_scoreboard(payload) else {
        return format!("Malformed scoreboard: {}", payload);
    };

    let mut out = String::from("Final scores:");
    for (rank, entry) in entries.iter().enumerate() {
        let _ = write!(out, "\n{:>3}. {:<10} {}", rank + 1, entry.nickname, entry.score);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(
            Command::parse("registra_utente ana").unwrap(),
            Some(Command::Register("ana".to_string()))
        );
        assert_eq!(
            Command::parse("  register   bob ").unwrap(),
            Some(Command::Register("bob".to_string()))
        );
        assert_eq!(Command::parse("matrice").unwrap(), Some(Command::Matrix));
        assert_eq!(Command::parse("MATRIX").unwrap(), Some(Command::Matrix));
        assert_eq!(
            Command::parse("p piano").unwrap(),
            Some(Command::Word("piano".to_string()))
        );
        assert_eq!(Command::parse("aiuto").unwrap(), Some(Command::Help));
        assert_eq!(Command::parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse("p"),
            Err(CommandError::MissingArgument("p"))
        );
        assert_eq!(
            Command::parse("registra_utente   "),
            Err(CommandError::MissingArgument("registra_utente"))
        );
        assert_eq!(
            Command::parse("jump high"),
            Err(CommandError::Unknown("jump".to_string()))
        );
    }

    #[test]
    fn test_commands_map_to_requests() {
        assert_eq!(
            Command::Word("quota".to_string()).to_message(),
            Some(Message::text(MessageKind::SubmitWord, "quota"))
        );
        assert_eq!(
            Command::Matrix.to_message(),
            Some(Message::empty(MessageKind::Matrix))
        );
        assert_eq!(Command::Quit.to_message(), None);
    }

    #[test]
    fn test_render_matrix_grid() {
        let message = Message::text(MessageKind::Matrix, "Qu O X X A T X X X X X X L M R S");
        assert_eq!(
            render(&message),
            "Qu O  X  X\nA  T  X  X\nX  X  X  X\nL  M  R  S"
        );
        let short = Message::text(MessageKind::Matrix, "A B");
        assert!(render(&short).starts_with("Malformed matrix"));
    }

    #[test]
    fn test_render_scoreboard() {
        let message = Message::text(MessageKind::FinalScores, "ana,12,bob,7,");
        assert_eq!(
            render(&message),
            "Final scores:\n  1. ana        12\n  2. bob        7"
        );
    }

    #[test]
    fn test_render_replies() {
        assert_eq!(
            render(&Message::text(MessageKind::Error, "Invalid word")),
            "Error: Invalid word"
        );
        assert_eq!(
            render(&Message::text(MessageKind::TimeToNextRound, "8")),
            "Next round starts in 8s"
        );
        assert_eq!(
            render(&Message::text(MessageKind::WordScore, "0")),
            "Points: 0"
        );
    }
}
