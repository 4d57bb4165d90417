//! Interactive operation loop.

use colored::Colorize;
use jsonwire_client::{Client, ClientError};
use jsonwire_core::{CoreError, OperationRegistry, Prompt};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

const MENU_HEADER: &str =
    "Please enter the corresponding number for the operation you would like to perform: ";

/// Line editor running on its own thread.
///
/// Operations hold the prompt across awaits, so the editor itself stays on
/// a dedicated thread and lines are passed over channels.
pub struct EditorPrompt {
    requests: mpsc::Sender<String>,
    lines: mpsc::Receiver<Option<String>>,
}

impl EditorPrompt {
    /// Starts the editor thread, loading and saving history at `history_path`.
    pub fn spawn(history_path: PathBuf) -> (Self, thread::JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let config = Config::builder()
                .history_ignore_space(true)
                .auto_add_history(true)
                .build();
            let mut rl: Editor<(), DefaultHistory> = match Editor::with_config(config) {
                Ok(rl) => rl,
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    for _ in request_rx {
                        if line_tx.send(None).is_err() {
                            break;
                        }
                    }
                    return;
                }
            };
            let _ = rl.load_history(&history_path);

            for prompt in request_rx {
                let line = match rl.readline(&prompt) {
                    Ok(line) => Some(line),
                    Err(ReadlineError::Interrupted) => {
                        println!("^C");
                        None
                    }
                    Err(ReadlineError::Eof) => {
                        println!("^D");
                        None
                    }
                    Err(err) => {
                        println!("{}: {:?}", "Error".red(), err);
                        None
                    }
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }

            let _ = rl.save_history(&history_path);
        });

        (
            Self {
                requests: request_tx,
                lines: line_rx,
            },
            handle,
        )
    }
}

impl Prompt for EditorPrompt {
    /// Waits for the editor thread. Needs the multi-threaded runtime: the
    /// current worker hands its other tasks off while the user types.
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        println!("{}", prompt.cyan());
        self.requests.send(format!("{} ", ">".cyan())).ok()?;
        tokio::task::block_in_place(|| self.lines.recv()).ok().flatten()
    }

    fn display(&mut self, line: &str) {
        if line.starts_with("Error") {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}

/// Lists the operations and reads a registered code. `None` when input ends.
pub fn choose_operation(registry: &OperationRegistry, prompt: &mut dyn Prompt) -> Option<i64> {
    prompt.display(MENU_HEADER);
    loop {
        let listing = format!("=============\n{}", registry.list_operations());
        let line = prompt.read_line(listing.trim_end())?;
        match line.trim().parse::<i64>() {
            Ok(code) if registry.contains(code) => return Some(code),
            Ok(_) => prompt.display("Invalid operation number. Please try again."),
            Err(_) => prompt.display("Please enter a valid number: "),
        }
    }
}

/// Runs operations chosen by the user until the connection stops or input
/// ends, then closes the connection.
pub async fn drive(client: &Client, prompt: &mut dyn Prompt) {
    while client.is_running() {
        let Some(code) = choose_operation(client.registry(), prompt) else {
            break;
        };

        match client.run_operation(code, prompt).await {
            Ok(()) => {}
            Err(ClientError::Core(CoreError::InputClosed)) => break,
            Err(e) => prompt.display(&format!("Error: {}", e)),
        }
    }

    client.close().await;
}

pub async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "jsonwire CLI".bold().cyan());
    if let Some(addr) = client.peer_addr() {
        println!("{} {}", "Connected to".green(), addr);
    }

    let history_path = std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(".jsonwire_history"))
        .unwrap_or_else(|_| ".jsonwire_history".into());
    let (mut prompt, editor) = EditorPrompt::spawn(history_path);

    drive(&client, &mut prompt).await;

    // Dropping the prompt ends the editor thread, which saves history
    drop(prompt);
    let _ = editor.join();
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}
