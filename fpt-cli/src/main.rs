// fpt CLI - Chat with a language model through a plain Markdown file
// Prompts are kept blockquoted, responses plain, separated by horizontal rules

use std::io::Write;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use fpt_core::session::ask_once;
use fpt_core::{ChatProvider, Completion, Config, ModelTier, OpenAiProvider, Outcome, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

mod command;
mod notify;

use command::{Command, HELP};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    config.ensure_storage()?;
    let provider = OpenAiProvider::from_config(&config)?;
    let tier = if cli.advanced {
        ModelTier::Advanced
    } else {
        ModelTier::Standard
    };
    let reporter = Reporter {
        config: &config,
        verbose: cli.verbose,
    };

    if let Some(ref question) = cli.question {
        let completion = ask_once(&provider, &config, question, tier).await?;
        println!("{}", completion.text);
        if let Some(notice) = reporter.finished(&completion) {
            notify::wait_for_notice(notice, notify::EXIT_GRACE).await;
        }
        return Ok(());
    }

    let file = cli
        .file
        .ok_or_else(|| eyre!("Either --file or --question is required"))?;
    if !file.is_file() {
        return Err(eyre!("File does not exist: {}", file.display()));
    }
    let file = file
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", file.display()))?;

    let session = Session::new(file, &config, provider, tier);
    match session.start().await? {
        Outcome::AwaitingPrompt => println!("File ends with a response. Entering interactive mode..."),
        outcome => reporter.outcome(&outcome),
    }

    interactive(&session, &reporter).await
}

#[derive(Parser, Debug)]
#[command(
    name = "fpt",
    author,
    version,
    about = "Chat with a language model through a plain Markdown file",
    long_about = "Keeps a conversation in a Markdown file: prompts are blockquoted, responses are plain,\nand turns are separated by horizontal rules. Edit the file freely between requests."
)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "question"])))]
struct Cli {
    /// The file to operate on
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// A single question to send; the exchange is saved to the history file
    #[arg(short, long)]
    question: Option<String>,
    /// Use the advanced model
    #[arg(short = '4', long)]
    advanced: bool,
    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
    /// Config file (default: <config dir>/fpt/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fpt=debug,fpt_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints outcomes and triggers the completion notice
struct Reporter<'a> {
    config: &'a Config,
    verbose: bool,
}

impl Reporter<'_> {
    /// Print usage if asked for and start the notice, returning its task
    fn finished(&self, completion: &Completion) -> Option<JoinHandle<()>> {
        let options = &self.config.options;
        if self.verbose || options.show_tokens {
            let price = self.config.price_for_model(&completion.model);
            println!(
                "[fpt] Request finished. Model: {}, took {:.2} seconds. Used tokens: {} ({} prompt + {} response). Calculated cost: {:.2} cents",
                completion.model,
                completion.elapsed.as_secs_f64(),
                completion.usage.total,
                completion.usage.prompt,
                completion.usage.completion,
                completion.cost_cents(price),
            );
        }
        options.notifications.then(|| {
            notify::spawn_completion_notice(
                completion.elapsed,
                completion.model.clone(),
                options.sound_file.clone(),
            )
        })
    }

    fn outcome(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Responded(completion) => {
                println!("✓ Response from {} appended", completion.model);
                // The interactive loop keeps the runtime alive
                let _notice = self.finished(completion);
            }
            Outcome::AwaitingPrompt => {
                println!("The file ends with a response. Please ask a question at the end of thread.")
            }
            Outcome::PendingPrompt => println!(
                "The file ends with a prompt. Please use 'f' if you want to continue the thread."
            ),
            Outcome::NoThread => println!(
                "No thread detected. Please use 'f' if you want to start a thread from the content in the file."
            ),
            Outcome::InvalidOrdering => {
                println!("Invalid ordering in the file. Please check the file and try again.")
            }
            Outcome::Empty => println!("Nothing to send: the file is empty. Type a question to start a thread."),
            Outcome::Archived(target) => println!(
                "Cleared the current file and archived the cleared thread to {}.",
                target.display()
            ),
        }
    }
}

async fn interactive<P: ChatProvider>(session: &Session<'_, P>, reporter: &Reporter<'_>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Type the next question or command, h for help: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };

        let result = match Command::parse(&line) {
            Command::Nothing => continue,
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Quit => {
                println!("Quitting the program...");
                return Ok(());
            }
            Command::Follow(tier) => session.follow(tier).await,
            Command::Regenerate(tier) => session.regenerate(tier).await,
            Command::LastOnly(tier) => session.respond_to_last(tier).await,
            Command::DumpToHistory => session.dump_to_history(),
            Command::DumpToFile => session.dump_to_file(chrono::Local::now().date_naive()),
            Command::Prompt(text) => session.ask(&text).await,
        };

        match result {
            Ok(outcome) => reporter.outcome(&outcome),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
}
