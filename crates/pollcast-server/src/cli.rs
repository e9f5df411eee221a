use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pollcast-server", version, about = "Telegram broadcast and poll service")]
pub struct Args {
    /// Path to the TOML config file; created with defaults when missing.
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Import chat ids from a legacy JSON chat list.
    ImportChatList {
        /// JSON file holding an array of chat ids.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_with_local_config() {
        let args = Args::parse_from(["pollcast-server"]);
        assert_eq!(args.config, "config.toml");
        assert!(args.command.is_none());
    }

    #[test]
    fn parses_import_subcommand() {
        let args = Args::parse_from(["pollcast-server", "-c", "/etc/pollcast.toml", "import-chat-list", "chats.json"]);
        assert_eq!(args.config, "/etc/pollcast.toml");
        match args.command {
            Some(Command::ImportChatList { path }) => assert_eq!(path, PathBuf::from("chats.json")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
