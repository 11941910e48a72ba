//! Interactive mode.
//!
//! A line-oriented loop: each line names a registry term (or its number),
//! lines starting with `#` are commands.

use crate::{find_entry, generate, print_registry};
use lexicon_core::{Pipeline, ProviderChoice, TermEntry};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn print_help() {
    println!("Commands:");
    println!("  #list             - Show registry terms");
    println!("  #provider <name>  - Switch image provider (dalle, ideogram, vertex)");
    println!("  #custom           - Enter a custom term field by field");
    println!("  #save <path>      - Save each illustration to <path> (#save alone stops)");
    println!("  #quit             - Exit");
    println!("  #help             - Show this help");
}

/// Ask for one field, returning `None` at end of input.
fn prompt<I>(lines: &mut I, label: &str) -> Option<String>
where
    I: Iterator<Item = io::Result<String>>,
{
    print!("{label}: ");
    io::stdout().flush().ok();
    match lines.next() {
        Some(Ok(line)) => Some(line.trim().to_string()),
        _ => None,
    }
}

pub async fn run_interactive(
    pipeline: &Pipeline,
    http: &reqwest::Client,
    provider: ProviderChoice,
) -> io::Result<()> {
    let mut provider = provider;
    let mut save_path: Option<PathBuf> = None;

    println!("=== Arabic Root Mnemonics ===");
    let available: Vec<_> = pipeline
        .available_providers()
        .into_iter()
        .map(ProviderChoice::key)
        .collect();
    println!("Image provider: {provider} (configured: {})", available.join(", "));
    println!();
    print_registry();
    println!();
    print_help();
    println!();
    println!("Enter a term or its number:");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(line) = lines.next() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("list") => print_registry(),
                Some("provider") => match parts.get(1).map(|name| name.parse::<ProviderChoice>()) {
                    Some(Ok(choice)) if pipeline.has_provider(choice) => {
                        provider = choice;
                        println!("[PROVIDER] Using {provider}");
                    }
                    Some(Ok(choice)) => {
                        println!("[ERROR] {choice} is not configured. Check its API keys.");
                    }
                    Some(Err(e)) => println!("[ERROR] {e}"),
                    None => println!("[ERROR] Usage: #provider <dalle|ideogram|vertex>"),
                },
                Some("custom") => {
                    let Some(term) = prompt(&mut lines, "Term") else { break };
                    let Some(root) = prompt(&mut lines, "Root (e.g. S-L-K)") else { break };
                    let Some(meaning) = prompt(&mut lines, "Root meaning") else { break };
                    let Some(arabic) = prompt(&mut lines, "Arabic") else { break };

                    let entry = TermEntry::new(term, root, meaning, arabic);
                    generate(pipeline, http, &entry, provider, save_path.as_deref()).await;
                }
                Some("save") => {
                    save_path = parts.get(1).map(PathBuf::from);
                    match &save_path {
                        Some(path) => println!("[SAVE] Illustrations go to {}", path.display()),
                        None => println!("[SAVE] Not saving illustrations"),
                    }
                }
                Some("help") => print_help(),
                _ => {
                    println!("[ERROR] Unknown command. Type #help for help.");
                }
            }
            io::stdout().flush().ok();
            continue;
        }

        match find_entry(line) {
            Some(entry) => {
                generate(pipeline, http, &entry, provider, save_path.as_deref()).await;
            }
            None => println!("[ERROR] Unknown term '{line}'. Type #list, or #custom for your own."),
        }
        io::stdout().flush().ok();
    }

    Ok(())
}
