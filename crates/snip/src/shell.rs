//! Shell commands and their execution

use std::sync::Arc;

use colored::*;
use serde::Serialize;

use snip_core::{
    CreateOrUpdateRequest, Document, DocumentReader, DocumentResolver, Outcome,
    PermissionResolver, RequestContext, Slug, User,
};
use snip_stats::Metrics;

/// Remote address reported for requests typed into this shell
const LOCAL_REMOTE: &str = "local";

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New { content: String },
    Put { slug: String, content: String },
    Raw { slug: String },
    User { id: String },
    Key { key: Option<String> },
    Frontend { enabled: bool },
    Stats,
    Help,
    Clear,
    Quit,
}

impl Command {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "new" => Ok(Command::New {
                content: rest.to_string(),
            }),
            "put" => {
                let (slug, content) = rest
                    .split_once(char::is_whitespace)
                    .unwrap_or((rest, ""));
                if slug.is_empty() {
                    return Err("usage: put <slug> <content>".into());
                }
                Ok(Command::Put {
                    slug: slug.to_string(),
                    content: content.to_string(),
                })
            }
            "raw" => single_arg(rest, "usage: raw <slug>").map(|slug| Command::Raw { slug }),
            "user" => single_arg(rest, "usage: user <id>").map(|id| Command::User { id }),
            "key" => match rest {
                "" => Err("usage: key <api-key>|none".into()),
                "none" => Ok(Command::Key { key: None }),
                key => Ok(Command::Key {
                    key: Some(key.to_string()),
                }),
            },
            "frontend" => match rest {
                "on" => Ok(Command::Frontend { enabled: true }),
                "off" => Ok(Command::Frontend { enabled: false }),
                _ => Err("usage: frontend on|off".into()),
            },
            "stats" => Ok(Command::Stats),
            "help" => Ok(Command::Help),
            "clear" => Ok(Command::Clear),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

fn single_arg(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        Err(usage.to_string())
    } else {
        Ok(rest.to_string())
    }
}

/// Create/edit response body, in the shape the HTTP API returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_url: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Outcome> for CreateDocumentResponse {
    fn from(outcome: &Outcome) -> Self {
        Self {
            is_url: outcome.is_url(),
            key: outcome.slug().map(|slug| slug.to_string()),
            message: outcome.rejection().map(|rejection| rejection.to_string()),
        }
    }
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Outcome(Outcome),
    Document(Document),
    NotFound(String),
    Info(String),
    Error(String),
    Help,
    Clear,
    Quit,
}

/// Shell state: the current identity plus the embedded core
pub struct Shell {
    resolver: DocumentResolver,
    reader: DocumentReader,
    permissions: PermissionResolver,
    metrics: Arc<Metrics>,
    /// Maps a user id to a user, applying the admin list
    users: Box<dyn Fn(&str) -> User + Send>,
    user: User,
    api_key: Option<String>,
    frontend: bool,
    ctx: RequestContext,
}

impl Shell {
    pub fn new(
        resolver: DocumentResolver,
        reader: DocumentReader,
        permissions: PermissionResolver,
        metrics: Arc<Metrics>,
        users: Box<dyn Fn(&str) -> User + Send>,
        user_id: &str,
    ) -> Self {
        let user = users(user_id);

        Self {
            resolver,
            reader,
            permissions,
            metrics,
            users,
            user,
            api_key: None,
            frontend: false,
            ctx: RequestContext::new()
                .with_user_agent(concat!("snip/", env!("CARGO_PKG_VERSION")))
                .with_remote(LOCAL_REMOTE),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_frontend(mut self, frontend: bool) -> Self {
        self.frontend = frontend;
        self
    }

    pub fn prompt(&self) -> String {
        let origin = match (&self.api_key, self.frontend) {
            (_, true) => "frontend",
            (Some(_), false) => "api",
            (None, false) => "session",
        };
        format!("{}@{}> ", self.user.id, origin)
    }

    /// Run one command
    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::New { content } => self.create_or_update(content, None),
            Command::Put { slug, content } => self.create_or_update(content, Some(slug)),
            Command::Raw { slug } => self.raw(slug),
            Command::User { id } => {
                self.user = (self.users)(&id);
                Reply::Info(format!("Now acting as {}", self.user.id))
            }
            Command::Key { key } => {
                let message = match &key {
                    Some(_) => "API key set",
                    None => "API key cleared",
                };
                self.api_key = key;
                Reply::Info(message.into())
            }
            Command::Frontend { enabled } => {
                self.frontend = enabled;
                Reply::Info(format!("Frontend origin {}", if enabled { "on" } else { "off" }))
            }
            Command::Stats => match self.metrics.export() {
                Ok(text) => Reply::Info(text),
                Err(e) => Reply::Error(e.to_string()),
            },
            Command::Help => Reply::Help,
            Command::Clear => Reply::Clear,
            Command::Quit => Reply::Quit,
        }
    }

    fn create_or_update(&self, content: String, slug: Option<String>) -> Reply {
        let request = CreateOrUpdateRequest {
            content,
            requested_slug: slug,
            is_frontend_origin: self.frontend,
        };

        // Requests turned down on their own never count as an API key use
        if let Err(rejection) = request.validate() {
            return Reply::Outcome(rejection.into());
        }

        let caller = self.permissions.resolve(
            request.is_frontend_origin,
            self.api_key.as_deref(),
            self.user.clone(),
            &self.ctx,
        );

        match self.resolver.resolve(&request, &caller, &self.ctx) {
            Ok(outcome) => Reply::Outcome(outcome),
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn raw(&self, slug: String) -> Reply {
        let slug = match Slug::parse(slug.as_str()) {
            Ok(slug) => slug,
            Err(_) => return Reply::NotFound(slug),
        };

        match self.reader.raw(&slug, &self.ctx) {
            Ok(Some(document)) => Reply::Document(document),
            Ok(None) => Reply::NotFound(slug.to_string()),
            Err(e) => Reply::Error(e.to_string()),
        }
    }
}

/// Print a reply to the terminal
pub fn print_reply(reply: &Reply, json: bool) {
    match reply {
        Reply::Outcome(outcome) if json => {
            let body = CreateDocumentResponse::from(outcome);
            match serde_json::to_string(&body) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("{} {}", "Error:".red(), e),
            }
        }
        Reply::Outcome(Outcome::Created { slug, is_url }) => {
            let kind = if *is_url { "link" } else { "paste" };
            println!("{} {} {}", "Created".green(), kind, slug.to_string().bold());
        }
        Reply::Outcome(Outcome::Updated {
            slug,
            is_url,
            version,
        }) => {
            let kind = if *is_url { "link" } else { "paste" };
            println!(
                "{} {} {} {}",
                "Updated".green(),
                kind,
                slug.to_string().bold(),
                format!("(v{})", version).dimmed()
            );
        }
        Reply::Outcome(Outcome::Rejected(rejection)) => {
            println!("{} {}", format!("[{}]", rejection.reason()).red(), rejection);
        }
        Reply::Document(document) => {
            if document.is_url() {
                println!("{} {}", "->".cyan(), document.content);
            } else {
                println!("{}", document.content);
            }
        }
        Reply::NotFound(slug) => println!("{} {}", "No document found:".dimmed(), slug),
        Reply::Info(text) => println!("{}", text.yellow()),
        Reply::Error(e) => eprintln!("{} {}", "Error:".red(), e),
        Reply::Help => print_help(),
        Reply::Clear => print!("\x1B[2J\x1B[1;1H"),
        Reply::Quit => {}
    }
}

fn print_help() {
    println!(
        r#"
{}

{}
  new <content>                Create a paste or short link with a generated slug
  put <slug> <content>         Create at <slug>, or edit it if it is yours
  raw <slug>                   Show a document

{}
  user <id>                    Act as another session user
  key <api-key>|none           Use an API key for subsequent requests
  frontend on|off              Mark requests as coming from the frontend

{}
  stats                        Show event counters
  help                         Show this help
  clear                        Clear screen
  quit/exit                    Exit
"#,
        "snip Commands".cyan().bold(),
        "Documents".yellow().bold(),
        "Identity".yellow().bold(),
        "Local".yellow().bold(),
    );
}
