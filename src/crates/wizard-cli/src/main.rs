//! # wizard-cli
//!
//! Runs server-driven wizards from the terminal: start or resume an
//! execution, fill in each step, and continue after an external redirect.

mod prompt;
mod runner;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use prompt::parse_key_value;
use runner::{Outcome, Runner};
use std::path::PathBuf;
use tokio::io::BufReader;
use tooling::logging::{init_tracing, LogLevel};
use utils::config::FromEnv;
use wizard_core::{
    CallbackRequest, Navigation, OpenRequest, StartContext, WizardConfig, WizardDriver,
    WizardKind, WizardSelector,
};

#[derive(Parser)]
#[command(name = "wizard")]
#[command(about = "Run server-driven wizards from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, JSON or TOML)
    #[arg(short, long, global = true, env = "WIZARD_CONFIG")]
    config: Option<PathBuf>,

    /// API root, overrides the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session token sent with every request
    #[arg(long, global = true)]
    session_token: Option<String>,

    /// JSON file remembering the registration in progress
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevelArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new execution
    Start {
        /// Wizard id
        wizard: String,

        #[arg(short, long, value_enum, default_value = "registration")]
        kind: KindArg,

        /// Invitation token for registrations
        #[arg(long)]
        invite: Option<String>,

        /// User the wizard runs for
        #[arg(long)]
        user: Option<String>,

        /// Menu entry the wizard belongs to
        #[arg(long)]
        menu: Option<String>,
    },

    /// Resume an execution by key
    Resume {
        key: String,
    },

    /// Resume by key, the remembered registration, or start
    Open {
        #[arg(long)]
        key: Option<String>,

        #[arg(long)]
        wizard: Option<String>,

        #[arg(short = 'k', long = "kind", value_enum, default_value = "registration")]
        kind: KindArg,
    },

    /// Continue after returning from an external page
    Callback {
        key: String,

        /// HTTP method of the return request
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Return request parameter, repeatable
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Registration,
    System,
    User,
    Menu,
}

impl From<KindArg> for WizardKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Registration => WizardKind::Registration,
            KindArg::System => WizardKind::System,
            KindArg::User => WizardKind::User,
            KindArg::Menu => WizardKind::Menu,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Error => LogLevel::Error,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<WizardConfig> {
    let mut config = match (&cli.config, &cli.base_url) {
        (Some(path), _) => WizardConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        (None, Some(base_url)) => WizardConfig::new(base_url.clone()),
        (None, None) => WizardConfig::from_env("WIZARD_")
            .context("pass --config or --base-url, or set WIZARD_BASE_URL")?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(token) = &cli.session_token {
        config = config.with_session_token(token.clone());
    }
    if let Some(store) = &cli.store {
        config = config.with_store_path(store.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.into())?;

    let config = load_config(&cli)?;
    let driver = WizardDriver::from_config(&config)?;

    let state = match cli.command {
        Commands::Start {
            wizard,
            kind,
            invite,
            user,
            menu,
        } => {
            let context = StartContext {
                invite_token: invite,
                user,
                menu,
            };
            driver
                .loader()
                .start(&WizardSelector::new(wizard, kind.into()), &context)
                .await?
        }
        Commands::Resume { key } => driver.loader().resume(&key).await?,
        Commands::Open { key, wizard, kind } => {
            if key.is_none() && wizard.is_none() {
                bail!("open needs --key or --wizard");
            }
            let request = OpenRequest {
                key,
                selector: wizard.map(|id| WizardSelector::new(id, kind.into())),
                context: StartContext::default(),
            };
            driver.loader().open(&request).await?
        }
        Commands::Callback { key, method, params } => {
            let payload = params
                .into_iter()
                .fold(CallbackRequest::new(method), |request, (name, value)| {
                    request.with_parameter(name, value)
                });
            match driver.dispatcher().resume_from_callback(&key, &payload).await? {
                Navigation::ResumeByKey { key, address } => {
                    println!("Resuming at {}", address);
                    driver.loader().resume(&key).await?
                }
                Navigation::Redirect { url, .. } => {
                    println!("Continue at {}", url);
                    return Ok(());
                }
            }
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut runner = Runner::new(&driver, stdin, std::io::stdout());
    match runner.run(state).await? {
        Outcome::Finished(_) => {}
        Outcome::Suspended { key, .. } => {
            println!("When you come back, run: wizard callback {} --param name=value", key);
        }
        Outcome::Stopped { key } => {
            println!("Resume later with: wizard resume {}", key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_callback_params() {
        let cli = Cli::parse_from([
            "wizard",
            "--base-url",
            "https://bank.example/api",
            "callback",
            "K1",
            "--param",
            "code=abc",
            "-p",
            "state=x=y",
        ]);
        let Commands::Callback { key, method, params } = cli.command else {
            panic!("expected callback");
        };
        assert_eq!(key, "K1");
        assert_eq!(method, "GET");
        assert_eq!(
            params,
            vec![("code".to_string(), "abc".to_string()), ("state".to_string(), "x=y".to_string())]
        );
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::parse_from([
            "wizard",
            "--base-url",
            "https://bank.example/api",
            "--session-token",
            "tok",
            "--store",
            "/tmp/wizard.json",
            "resume",
            "K1",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.base_url, "https://bank.example/api");
        assert_eq!(config.session_token.as_deref(), Some("tok"));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/wizard.json")));
    }

    #[test]
    fn test_start_kind() {
        let cli = Cli::parse_from(["wizard", "start", "payroll", "--kind", "menu", "--menu", "m1"]);
        let Commands::Start { wizard, kind, menu, .. } = cli.command else {
            panic!("expected start");
        };
        assert_eq!(wizard, "payroll");
        assert_eq!(WizardKind::from(kind), WizardKind::Menu);
        assert_eq!(menu.as_deref(), Some("m1"));
    }
}
