//! Line-oriented terminal front-end for `duochat chat`.

use log::info;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };

use super::session::{ ChatSession, TurnOutcome };
use super::state::ChatState;
use super::store::Message;
use super::transport::{ ChatTransport, HttpTransport };
use crate::cli::ChatArgs;
use crate::llm::{ ProviderKind, Role };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Clear,
    Provider(ProviderKind),
    Settings,
    Dismiss,
    History,
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };
    let mut parts = command.split_whitespace();
    match (parts.next().unwrap_or(""), parts.next()) {
        ("clear", None) => Input::Clear,
        ("settings", None) => Input::Settings,
        ("dismiss", None) => Input::Dismiss,
        ("history", None) => Input::History,
        ("help", None) => Input::Help,
        ("quit" | "exit", None) => Input::Quit,
        ("provider", Some(name)) =>
            match name.parse() {
                Ok(provider) => Input::Provider(provider),
                Err(e) => Input::Invalid(e.to_string()),
            }
        _ => Input::Invalid(format!("Unknown command: {}", trimmed)),
    }
}

pub fn format_message(message: &Message) -> String {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => "AI",
    };
    format!("[{}] {}: {}", message.timestamp.format("%H:%M:%S"), who, message.content)
}

const HELP: &str =
    "Commands: /provider <gemini|openai>, /settings, /clear, /dismiss, /history, /help, /quit";

fn print_settings(state: &ChatState) {
    if state.show_settings() {
        println!("Settings: provider = {} (switch with /provider <gemini|openai>)", state.provider());
    } else {
        println!("Settings hidden.");
    }
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpTransport::new(&args.server_url)?;
    info!("Chatting via {} using {}", transport.base_url(), args.provider);
    let session = ChatSession::new(ChatState::new(args.provider), transport);
    repl(session).await
}

async fn repl<T: ChatTransport>(
    mut session: ChatSession<T>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("AI Chat Assistant. Powered by {}. {}", session.state().provider().display_name(), HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Message(text) => {
                let outcome = session.submit(text).await;
                if outcome == TurnOutcome::Ignored {
                    continue;
                }
                if let Some(last) = session.state().messages().last() {
                    println!("{}", format_message(last));
                }
                if let Some(error) = session.state().error() {
                    eprintln!("! {} (/dismiss to hide)", error);
                }
            }
            Input::Clear => {
                session.state_mut().clear();
                println!("Conversation cleared.");
            }
            Input::Provider(provider) => {
                session.state_mut().select_provider(provider);
                println!("Now using {}.", provider.display_name());
            }
            Input::Settings => {
                session.state_mut().toggle_settings();
                print_settings(session.state());
            }
            Input::Dismiss => session.state_mut().dismiss_error(),
            Input::History => {
                if session.state().messages().is_empty() {
                    println!("Start a conversation. Ask me anything!");
                }
                for message in session.state().messages() {
                    println!("{}", format_message(message));
                }
            }
            Input::Help => println!("{}", HELP),
            Input::Quit => {
                break;
            }
            Input::Invalid(reason) => eprintln!("{}", reason),
        }
    }

    Ok(())
}
