use std::io::{self, stdin, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use email_compliance_classifier::{
    classifier::{classify_line, DEFAULT_MAX_LENGTH},
    device::{select_device, DevicePreference},
    form::App,
    labels::LabelMap,
    model::{CheckpointConfig, CONFIG_FILE},
    runtime::{run_form, CrosstermEventSource},
    EmailClassifier, Predictor,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

/// classify emails into competition-compliance categories with a fine-tuned checkpoint
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// checkpoint directory holding config.json, tokenizer.json and model.safetensors
    #[clap(
        long,
        env = "COMPLIANCE_MODEL_DIR",
        default_value = "models/trained_model2/checkpoint-3111"
    )]
    model_dir: PathBuf,

    /// JSON-Lines training data the label mapping is rebuilt from
    #[clap(
        long,
        env = "COMPLIANCE_DATASET",
        default_value = "data/processed/combined_data.jsonl"
    )]
    dataset: PathBuf,

    /// compute device
    #[clap(long, env = "COMPLIANCE_DEVICE", value_enum, default_value_t = DevicePreference::Auto)]
    device: DevicePreference,

    /// maximum number of tokens fed to the model
    #[clap(long, env = "COMPLIANCE_MAX_LENGTH", default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// interactive classification form (default)
    Ui,
    /// classify one email from flags, or JSON lines {"subject", "body"} from stdin
    Classify {
        #[clap(long)]
        subject: Option<String>,
        #[clap(long)]
        body: Option<String>,
    },
    /// print the label mapping and where it came from
    Labels,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        None | Some(Command::Ui) => run_ui(&cli),
        Some(Command::Classify {
            ref subject,
            ref body,
        }) => run_classify(&cli, subject.as_deref(), body.as_deref()),
        Some(Command::Labels) => run_labels(&cli),
    }
}

fn load(cli: &Cli) -> anyhow::Result<EmailClassifier> {
    let device = select_device(cli.device)?;
    EmailClassifier::load(&cli.model_dir, &cli.dataset, device, cli.max_length).with_context(
        || format!("failed to load model from {}", cli.model_dir.display()),
    )
}

fn run_ui(cli: &Cli) -> anyhow::Result<()> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let classifier = load(cli)?;
    let mut app = App::new(
        classifier.device_name(),
        classifier
            .label_source()
            .dataset_error()
            .map(str::to_string),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let result = run_form(&mut terminal, &mut app, &events, &classifier);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(result?)
}

fn run_classify(cli: &Cli, subject: Option<&str>, body: Option<&str>) -> anyhow::Result<()> {
    let classifier = load(cli)?;
    let mut out = io::stdout().lock();

    if subject.is_some() || body.is_some() {
        let (subject, body) = (subject.unwrap_or_default(), body.unwrap_or_default());
        if subject.trim().is_empty() && body.trim().is_empty() {
            anyhow::bail!("fill in at least the subject or the body");
        }
        let prediction = classifier.predict(subject, body)?;
        writeln!(out, "{prediction}")?;
        return Ok(());
    }

    for (idx, line) in stdin().lock().lines().enumerate() {
        if let Some(value) = classify_line(&classifier, &line?, idx + 1) {
            writeln!(out, "{value}")?;
        }
    }
    Ok(())
}

fn run_labels(cli: &Cli) -> anyhow::Result<()> {
    let id2label = match CheckpointConfig::read(&cli.model_dir.join(CONFIG_FILE)) {
        Ok((config, _)) => Some(config.id2label).filter(|m| !m.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "could not read checkpoint config");
            None
        }
    };
    let (labels, source) = LabelMap::resolve(&cli.dataset, id2label.as_ref());

    let mut out = io::stdout().lock();
    writeln!(out, "source: {}", source.as_str())?;
    if let Some(error) = source.dataset_error() {
        writeln!(out, "dataset error: {error}")?;
    }
    for (idx, label) in labels.iter() {
        writeln!(out, "{idx}\t{label}")?;
    }
    Ok(())
}
