use anyhow::{bail, Context, Result};
use clap::Parser;
use neurocheck::analysis::Sentiment;
use neurocheck::app::{AnalysisReport, App, Submission};
use neurocheck::content::{FileInput, ProgressFn};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "neurocheck")]
#[command(about = "Assess how neurodiversity-friendly an image or text is")]
struct CliArgs {
    /// Image or document to analyze.
    #[arg(value_name = "FILE", conflicts_with_all = ["text", "stdin"])]
    file: Option<PathBuf>,

    /// Analyze this text instead of a file.
    #[arg(long, conflicts_with = "stdin")]
    text: Option<String>,

    /// Read the text to analyze from standard input.
    #[arg(long)]
    stdin: bool,

    /// Declared MIME type of FILE (guessed from the extension otherwise).
    #[arg(long, value_name = "TYPE", requires = "file")]
    mime: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

impl CliArgs {
    fn submission(&self) -> Result<Submission> {
        if let Some(path) = &self.file {
            let input = FileInput::from_path(path, self.mime.as_deref())
                .with_context(|| format!("cannot open {}", path.display()))?;
            return Ok(Submission::File(input));
        }
        if let Some(text) = &self.text {
            return Ok(Submission::Text(text.clone()));
        }
        if self.stdin {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("cannot read standard input")?;
            return Ok(Submission::Text(text));
        }
        bail!("nothing to analyze: pass a FILE, --text, or --stdin")
    }
}

fn verdict(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Friendly => "likely neurodiversity-friendly",
        Sentiment::NotFriendly => "may pose challenges",
        Sentiment::Neutral => "no clear verdict",
    }
}

fn print_report(report: &AnalysisReport) {
    println!("Analysis results ({})", report.kind);
    println!("Verdict: {}", verdict(report.sentiment));
    for (label, body) in report.result.sections() {
        println!();
        println!("{}:", label);
        println!("{}", body);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neurocheck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let submission = args.submission()?;

    let on_progress: Arc<ProgressFn> = Arc::new(|percent: u8| debug!("Progress: {}%", percent));
    let app = match App::new(Some(on_progress)) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting analysis");
    match app.analyze(submission).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_argument_becomes_text_submission() {
        let args = CliArgs::parse_from(["neurocheck", "--text", "hello"]);
        assert!(matches!(args.submission().unwrap(), Submission::Text(ref t) if t == "hello"));
    }

    #[test]
    fn test_file_and_text_conflict() {
        assert!(CliArgs::try_parse_from(["neurocheck", "a.png", "--text", "hello"]).is_err());
    }

    #[test]
    fn test_mime_requires_file() {
        assert!(CliArgs::try_parse_from(["neurocheck", "--mime", "image/png"]).is_err());
    }

    #[test]
    fn test_no_input_is_an_error() {
        let args = CliArgs::parse_from(["neurocheck"]);
        assert!(args.submission().is_err());
    }
}
