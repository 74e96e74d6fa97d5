//! Line-oriented console protocol.
//!
//! - Lines starting with `#` are commands (state, cards, add, remove, update, quit)
//! - `<mode> <text>` sends a turn with that mode
//! - Any other line is sent as a turn with no mode

use scriptbed_core::{
    parse_max_operations, Mode, SessionConfig, SessionError, SessionHandle, TurnOutcome,
};
use tokio::io::{self, AsyncBufReadExt, BufReader};

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Turn {
        mode: Option<Mode>,
        text: String,
    },
    State,
    Cards,
    Add {
        keys: Vec<String>,
        entry: String,
        card_type: String,
    },
    Remove(usize),
    Update {
        index: usize,
        keys: Vec<String>,
        entry: String,
        card_type: String,
    },
    Help,
    Quit,
    Invalid(String),
}

/// Run the console until stdin closes or `#quit`.
pub async fn run_console(session: SessionHandle) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== scriptbed ===");
    print_commands();
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(line.trim()) {
            Line::Quit => {
                println!("Goodbye!");
                break;
            }
            Line::Help => {
                println!("[HELP]");
                print_commands();
            }
            Line::State => {
                let snapshot = session.snapshot().await?;
                println!("[STATE]");
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Line::Cards => {
                let cards = session.snapshot().await?.story_cards;
                println!("[CARDS] {}", cards.len());
                for card in cards {
                    println!(
                        "  {}: [{}] ({}) {}",
                        card.id,
                        card.keys.join(", "),
                        card.card_type,
                        card.entry
                    );
                }
            }
            Line::Add {
                keys,
                entry,
                card_type,
            } => match session.add_story_card(keys, entry, card_type).await? {
                Some(index) => println!("[ADDED] card {index}"),
                None => println!("[ERROR] A card with those keys already exists"),
            },
            Line::Remove(index) => match session.remove_story_card(index).await {
                Ok(card) => println!("[REMOVED] {}", card.keys.join(", ")),
                Err(e) => println!("[ERROR] {e}"),
            },
            Line::Update {
                index,
                keys,
                entry,
                card_type,
            } => match session
                .update_story_card(index, keys, entry, card_type)
                .await
            {
                Ok(()) => println!("[UPDATED] card {index}"),
                Err(e) => println!("[ERROR] {e}"),
            },
            Line::Invalid(message) => println!("[ERROR] {message}"),
            Line::Turn { mode, text } => {
                let outcome = session.handle_input(mode, text).await?;
                print_outcome(&outcome);
                let next = session.snapshot().await?.current_side;
                println!("[NEXT] {next}");
            }
        }
    }

    Ok(())
}

fn print_commands() {
    println!("Commands:");
    println!("  <mode> <text>                     - Send a turn (modes: start, continue, do, say, story, see)");
    println!("  <text>                            - Send a turn with no mode");
    println!("  #state                            - Print the session snapshot as JSON");
    println!("  #cards                            - List story cards");
    println!("  #add <keys> | <entry> [| <type>]  - Add a story card (keys comma-separated)");
    println!("  #remove <index>                   - Remove a story card");
    println!("  #update <index> | <keys> | <entry> [| <type>]");
    println!("                                    - Replace a story card");
    println!("  #help                             - Show this help");
    println!("  #quit                             - Exit");
}

fn print_outcome(outcome: &TurnOutcome) {
    let report = match outcome {
        TurnOutcome::Ignored => {
            println!("[IGNORED] blank input");
            return;
        }
        TurnOutcome::Completed(report) => report,
    };

    for line in &report.logs {
        println!("[LOG] {line}");
    }
    for failure in &report.failures {
        println!("[HOOK] {} fell back to identity: {}", failure.hook, failure.error);
    }
    match report.entry.mode {
        Some(mode) => println!("[{}:{mode}] {}", report.side, report.entry.text),
        None => println!("[{}] {}", report.side, report.entry.text),
    }
}

fn parse_line(line: &str) -> Line {
    let Some(command) = line.strip_prefix('#') else {
        return parse_turn(line);
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "quit" | "exit" => Line::Quit,
        "help" => Line::Help,
        "state" => Line::State,
        "cards" => Line::Cards,
        "add" => {
            let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
            match fields.as_slice() {
                [keys, entry] => Line::Add {
                    keys: split_keys(keys),
                    entry: entry.to_string(),
                    card_type: String::new(),
                },
                [keys, entry, card_type] => Line::Add {
                    keys: split_keys(keys),
                    entry: entry.to_string(),
                    card_type: card_type.to_string(),
                },
                _ => Line::Invalid("Usage: #add <keys> | <entry> [| <type>]".to_string()),
            }
        }
        "remove" => match rest.parse() {
            Ok(index) => Line::Remove(index),
            Err(_) => Line::Invalid("Usage: #remove <index>".to_string()),
        },
        "update" => {
            let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
            let usage = || Line::Invalid("Usage: #update <index> | <keys> | <entry> [| <type>]".to_string());
            let (index, keys, entry, card_type) = match fields.as_slice() {
                [index, keys, entry] => (index, keys, entry, ""),
                [index, keys, entry, card_type] => (index, keys, entry, *card_type),
                _ => return usage(),
            };
            match index.parse() {
                Ok(index) => Line::Update {
                    index,
                    keys: split_keys(keys),
                    entry: entry.to_string(),
                    card_type: card_type.to_string(),
                },
                Err(_) => usage(),
            }
        }
        _ => Line::Invalid("Unknown command. Type #help for help.".to_string()),
    }
}

fn parse_turn(line: &str) -> Line {
    if let Some((word, text)) = line.split_once(char::is_whitespace) {
        if let Ok(mode) = word.parse::<Mode>() {
            return Line::Turn {
                mode: Some(mode),
                text: text.trim().to_string(),
            };
        }
    }
    Line::Turn {
        mode: None,
        text: line.to_string(),
    }
}

fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Apply `--scripts` and `--max-operations` on top of `config`.
pub fn parse_config_from_args(
    args: &[String],
    mut config: SessionConfig,
) -> Result<SessionConfig, SessionError> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--scripts" => {
                if let Some(dir) = args.get(i + 1) {
                    config = config.with_scripts_dir(dir);
                    i += 1;
                }
            }
            "--max-operations" => {
                if let Some(limit) = args.get(i + 1) {
                    let limit = parse_max_operations("--max-operations", limit)?;
                    config = config.with_max_operations(limit);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(config)
}
