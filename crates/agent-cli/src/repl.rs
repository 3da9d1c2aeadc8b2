//! Interactive Loop
//!
//! Reads one line at a time from stdin. Lines starting with `/` are
//! commands; anything else is submitted to the orchestrator and the new
//! display messages are printed as the run progresses.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    AgentError, AuthMode, AuthModeKind, CredentialStore, DisplayMessage, Orchestrator, Role,
    RunState, StoredCredential,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const HELP: &str = "\
Commands:
  /key <api-key>  use and remember an API key
  /logout         forget the active credential
  /clear          start a new conversation
  /usage          show token usage
  /help           show this help
  /quit           exit";

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Message(&'a str),
    SetKey(&'a str),
    Logout,
    Clear,
    Usage,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Message(line);
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name {
            "key" if !arg.is_empty() => Command::SetKey(arg),
            "logout" => Command::Logout,
            "clear" => Command::Clear,
            "usage" => Command::Usage,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line),
        }
    }
}

pub struct Repl {
    agent: Orchestrator,
    store: Arc<dyn CredentialStore>,
    shown: usize,
}

impl Repl {
    pub fn new(agent: Orchestrator, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            agent,
            store,
            shown: 0,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("Type a message, or /help for commands.");
        if self.agent.auth_mode().await == AuthModeKind::Unauthenticated {
            println!("Not signed in. Use /key <api-key> or set ANTHROPIC_API_KEY.");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match Command::parse(&line) {
                Command::Empty => {}
                Command::Quit => break,
                Command::Help => println!("{HELP}"),
                Command::Unknown(raw) => println!("Unknown command: {raw}. Try /help."),
                Command::Usage => {
                    let usage = self.agent.usage().await;
                    println!(
                        "Tokens: {} in, {} out, {} total",
                        usage.input_tokens,
                        usage.output_tokens,
                        usage.total()
                    );
                }
                Command::SetKey(key) => {
                    self.agent.set_auth_mode(AuthMode::ApiKey(key.to_string())).await;
                    match self.store.save(&StoredCredential::ApiKey { key: key.to_string() }) {
                        Ok(()) => println!("API key saved."),
                        Err(e) => println!("API key set for this session only: {e}"),
                    }
                }
                Command::Logout => {
                    self.agent.logout().await?;
                    println!("Signed out.");
                }
                Command::Clear => match self.agent.clear_history().await {
                    Ok(()) => {
                        self.shown = 0;
                        println!("Conversation cleared.");
                    }
                    Err(e) => println!("{}", e.user_message()),
                },
                Command::Message(text) => self.converse(text).await,
            }
        }

        Ok(())
    }

    async fn converse(&mut self, text: &str) {
        // our own line is already on screen
        self.shown += 1;
        if let Err(e) = self.agent.submit(text).await {
            self.shown -= 1;
            match e {
                AgentError::NotAuthenticated => {
                    println!("Not signed in. Use /key <api-key>.");
                }
                other => println!("{}", other.user_message()),
            }
            return;
        }

        let mut state = self.agent.subscribe();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }
            self.print_new().await;
            if !self.agent.state().is_running() {
                break;
            }
        }
        self.print_new().await;

        if let RunState::Failed(failure) = self.agent.state() {
            tracing::debug!(kind = ?failure.kind, "Run ended with failure");
        }
    }

    async fn print_new(&mut self) {
        let messages = self.agent.display_messages().await;
        for message in messages.iter().skip(self.shown) {
            println!("{}", render(message));
        }
        self.shown = self.shown.max(messages.len());
    }
}

fn render(message: &DisplayMessage) -> String {
    match (&message.tool_name, message.is_tool_result) {
        (Some(name), false) => format!("  > {name}: {}", message.text),
        (Some(name), true) => {
            let first_line = message.text.lines().next().unwrap_or_default();
            let status = if message.is_error { "failed" } else { "ok" };
            format!("  < {name} {status}: {first_line}")
        }
        (None, _) if message.is_error => format!("! {}", message.text),
        (None, _) => match message.role {
            Role::Assistant => format!("\n{}\n", message.text),
            Role::User => format!("you: {}", message.text),
        },
    }
}
