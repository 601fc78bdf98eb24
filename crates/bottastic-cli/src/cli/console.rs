//! Stdin console for the simulated mesh.
//!
//! The console is its own node on the mesh. Lines typed on stdin are sent
//! from it; text it receives is printed.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use bottastic_core::{MeshTransport, NotificationBus};
use bottastic_infra::sim::{SimMesh, SimRadio};
use bottastic_types::event::MeshEvent;
use bottastic_types::node::{Destination, NodeNum, PublicKey};
use bottastic_types::packet::PacketKind;
use bottastic_types::send::SendOptions;
use console::style;
use tokio::sync::oneshot;

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Broadcast(String),
    Direct(String),
    Nodes,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let command = match line.split_once(' ') {
            Some(("/dm", text)) if !text.trim().is_empty() => Self::Direct(text.trim().to_string()),
            _ => match line {
                "/nodes" => Self::Nodes,
                "/help" | "/?" => Self::Help,
                "/quit" | "/exit" => Self::Quit,
                text if text.starts_with('/') => Self::Help,
                text => Self::Broadcast(text.to_string()),
            },
        };
        Some(command)
    }
}

/// The console's radio plus everything needed to address the bot.
pub struct Console {
    pub mesh: SimMesh,
    pub radio: Arc<SimRadio>,
    pub bot: NodeNum,
    pub bot_key: Option<PublicKey>,
}

impl Console {
    /// Print text packets arriving at the console's radio.
    pub fn print_incoming(bus: &NotificationBus) {
        bus.subscribe(|event| {
            let MeshEvent::PacketReceived { packet, .. } = event else {
                return;
            };
            match &packet.kind {
                PacketKind::Text { text } => {
                    let scope = if packet.to.is_broadcast() { "all" } else { "dm" };
                    println!(
                        "  {} {} {}",
                        style(format!("[{}]", packet.sender_label())).cyan(),
                        style(format!("({scope})")).dim(),
                        text
                    );
                }
                PacketKind::Encrypted => println!(
                    "  {} {}",
                    style(format!("[{}]", packet.sender_label())).cyan(),
                    style("<encrypted for another node>").dim()
                ),
                PacketKind::Data { .. } => {}
            }
        });
    }

    /// Read stdin on a dedicated thread until EOF or `/quit`.
    ///
    /// The returned receiver resolves when the console stops.
    pub fn spawn(self) -> std::io::Result<oneshot::Receiver<()>> {
        let (done, stopped) = oneshot::channel();
        thread::Builder::new()
            .name("bottastic-console".into())
            .spawn(move || {
                self.read_lines();
                let _ = done.send(());
            })?;
        Ok(stopped)
    }

    fn read_lines(&self) {
        print_help();
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let Some(command) = ConsoleCommand::parse(&line) else {
                continue;
            };
            match command {
                ConsoleCommand::Quit => break,
                ConsoleCommand::Help => print_help(),
                ConsoleCommand::Nodes => self.print_nodes(),
                ConsoleCommand::Broadcast(text) => self.send(text, Destination::Broadcast),
                ConsoleCommand::Direct(text) => {
                    self.send(text, Destination::Node { num: self.bot })
                }
            }
        }
    }

    fn send(&self, text: String, destination: Destination) {
        let public_key = match destination {
            Destination::Node { .. } => self.bot_key.clone(),
            Destination::Broadcast => None,
        };
        let options = SendOptions {
            pki_encrypted: public_key.is_some(),
            public_key,
            ..SendOptions::default()
        };
        if let Err(err) = self.radio.send_data(text.into_bytes(), destination, options) {
            eprintln!("  {} {err}", style("send failed:").red());
        }
    }

    fn print_nodes(&self) {
        for node in self.mesh.nodes() {
            let name = node
                .user
                .as_ref()
                .map(|user| user.long_name.as_str())
                .unwrap_or("?");
            let marker = if node.num == self.radio.num() {
                " (you)"
            } else if node.num == self.bot {
                " (bot)"
            } else {
                ""
            };
            println!("  {}  {name}{marker}", style(node.num).bold());
        }
    }
}

fn print_help() {
    println!();
    println!("  {}", style("Simulated mesh console").bold());
    println!("  {}  broadcast a message", style("<text>").cyan());
    println!("  {}  direct message to the bot", style("/dm <text>").cyan());
    println!("  {}  list nodes", style("/nodes").cyan());
    println!("  {}  stop", style("/quit").cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_lines() {
        assert_eq!(ConsoleCommand::parse("   "), None);
        assert_eq!(
            ConsoleCommand::parse(" ping "),
            Some(ConsoleCommand::Broadcast("ping".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("/dm  ping"),
            Some(ConsoleCommand::Direct("ping".into()))
        );
        assert_eq!(ConsoleCommand::parse("/dm"), Some(ConsoleCommand::Help));
        assert_eq!(ConsoleCommand::parse("/nodes"), Some(ConsoleCommand::Nodes));
        assert_eq!(ConsoleCommand::parse("/quit"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("/bogus"), Some(ConsoleCommand::Help));
    }
}
