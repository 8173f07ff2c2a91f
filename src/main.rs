use clap::{Parser, Subcommand};
use haulage_lib::{commands, logging, VERSION};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "haulage")]
#[command(about = "Command-line client for the haulage management API")]
#[command(version = VERSION)]
struct Cli {
    /// Log requests, refreshes and retries to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Username (prompted when omitted)
        username: Option<String>,
        /// Password (prompted when omitted)
        #[arg(long, env = "HAULAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Revoke the session on the server and forget it locally
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Change the password of the signed-in user
    ChangePassword,

    /// GET a path and print the response data
    Get {
        path: String,
        /// Query parameters as key=value
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
        /// Print the whole response envelope
        #[arg(long)]
        raw: bool,
    },

    /// POST a JSON body
    Post {
        path: String,
        /// Inline JSON, @file.json, or - for stdin
        body: Option<String>,
        #[arg(long)]
        raw: bool,
    },

    /// PUT a JSON body
    Put {
        path: String,
        /// Inline JSON, @file.json, or - for stdin
        body: Option<String>,
        #[arg(long)]
        raw: bool,
    },

    /// DELETE a path
    Delete {
        path: String,
        #[arg(long)]
        raw: bool,
    },

    /// Upload a file as multipart form data
    Upload {
        path: String,
        file: PathBuf,
        /// Form field name for the file
        #[arg(long, default_value = "file")]
        field: String,
        /// Extra form fields as key=value
        #[arg(long = "form", short = 'F')]
        fields: Vec<String>,
    },

    /// Inspect or change client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the resolved configuration
    Show,
    /// Set the API base URL
    SetUrl {
        url: String,
        /// Write to the global config instead of .haulage/config.json
        #[arg(long)]
        global: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Login { username, password } => commands::auth::login(username, password).await,
        Commands::Register {
            username,
            email,
            full_name,
            phone,
        } => commands::auth::register(username, email, full_name, phone).await,
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami => commands::auth::whoami().await,
        Commands::Refresh => commands::auth::refresh().await,
        Commands::ChangePassword => commands::auth::change_password().await,
        Commands::Get { path, query, raw } => commands::request::get(path, query, raw).await,
        Commands::Post { path, body, raw } => commands::request::post(path, body, raw).await,
        Commands::Put { path, body, raw } => commands::request::put(path, body, raw).await,
        Commands::Delete { path, raw } => commands::request::delete(path, raw).await,
        Commands::Upload {
            path,
            file,
            field,
            fields,
        } => commands::request::upload(path, &file, field, fields).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_cmd::show(),
            ConfigCommands::SetUrl { url, global } => commands::config_cmd::set_url(url, global),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
