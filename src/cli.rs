use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Overrides listen_addr from config.yaml
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Run a hybrid search and print the results as json
    Search {
        query: String,

        /// Workspace to search in
        #[clap(short, long)]
        workspace: Option<String>,

        /// Print only the summary message
        #[clap(short, long, default_value = "false")]
        message: bool,
    },

    /// Add a bookmark or note
    Add {
        #[clap(short, long)]
        workspace: String,

        #[clap(short, long)]
        title: Option<String>,

        #[clap(short, long)]
        url: Option<String>,

        /// Note body
        #[clap(short, long)]
        content: Option<String>,

        /// Page description
        #[clap(short, long)]
        description: Option<String>,

        /// "bookmark" or "note", guessed from --url when omitted
        #[clap(short, long)]
        kind: Option<String>,

        #[clap(long)]
        category: Option<String>,

        /// Comma or space separated tags
        #[clap(long)]
        tags: Option<String>,
    },

    /// Move an item to the trash
    Trash { id: u64 },

    /// List the tags of a workspace with item counts
    Tags { workspace: String },
}

pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("rust, web  async"), vec!["rust", "web", "async"]);
        assert_eq!(parse_tags(" , "), Vec::<String>::new());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["shelf", "search", "react hooks", "-w", "ws1"]);
        match args.command {
            Command::Search {
                query, workspace, ..
            } => {
                assert_eq!(query, "react hooks");
                assert_eq!(workspace.as_deref(), Some("ws1"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
