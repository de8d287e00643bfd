use clap::{Parser, Subcommand};
use lesson_loader::{
    api::LessonApi,
    config::Config,
    map_raw_blocks_to_edit_blocks,
    models::lesson_models::{raw_blocks_from_value, LessonContentEnvelope},
    token_store::{TokenStore, TOKEN_KEY},
    LessonLoader, LoadRequest,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "lesson_loader", author, version, about = "Loads and normalizes lesson content for the lesson editor.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the stored bearer token.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Fetch a lesson and print the editor state as JSON.
    Load {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        module: Option<String>,
        #[arg(long)]
        lesson: Option<String>,
        /// Lesson payload already at hand; skips the metadata fetch.
        #[arg(long, value_name = "FILE")]
        prefetched: Option<PathBuf>,
    },
    /// Normalize a local block array or content response without any network access.
    Normalize {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    Set { value: String },
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let result = match cli.command {
        Commands::Token { action } => run_token(&config, action),
        Commands::Load { course, module, lesson, prefetched } => {
            run_load(&config, course, module, lesson, prefetched).await
        }
        Commands::Normalize { file } => run_normalize(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn open_store(config: &Config) -> Result<TokenStore, Box<dyn std::error::Error>> {
    Ok(TokenStore::open(&config.token_store_path())?)
}

fn run_token(config: &Config, action: TokenAction) -> CliResult {
    let store = open_store(config)?;
    match action {
        TokenAction::Set { value } => {
            store.set(TOKEN_KEY, value.trim())?;
            println!("✅ Token stored.");
        }
        TokenAction::Show => match store.token()? {
            Some(token) => println!("{}", token),
            None => println!("ℹ️ No token stored."),
        },
        TokenAction::Clear => {
            if store.remove(TOKEN_KEY)? {
                println!("✅ Token removed.");
            } else {
                println!("ℹ️ No token stored.");
            }
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Could not read '{}': {}", path.display(), e))?;
    Ok(serde_json::from_str(&text)?)
}

async fn run_load(
    config: &Config,
    course: Option<String>,
    module: Option<String>,
    lesson: Option<String>,
    prefetched: Option<PathBuf>,
) -> CliResult {
    let prefetched = prefetched.as_deref().map(read_json).transpose()?;
    let store = Arc::new(open_store(config)?);
    let api = LessonApi::new(config.api_base.clone(), store, config.request_timeout())?;
    let loader = LessonLoader::new(api);

    let outcome = loader
        .load(&LoadRequest {
            course_id: course,
            module_id: module,
            lesson_id: lesson,
            prefetched,
        })
        .await?;

    if outcome.redirect_to_login {
        eprintln!("⚠️ Authentication required. Store a fresh token with `token set <TOKEN>`.");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run_normalize(file: &Path) -> CliResult {
    let input = read_json(file)?;
    let blocks = match &input {
        Value::Array(_) => raw_blocks_from_value(&input),
        _ => serde_json::from_value::<LessonContentEnvelope>(input)?.data.content,
    };
    let mapped = map_raw_blocks_to_edit_blocks(&blocks);
    println!("{}", serde_json::to_string_pretty(&mapped)?);
    Ok(())
}
