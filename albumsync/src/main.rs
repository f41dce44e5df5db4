use std::sync::Arc;

use albumsync::classify::SniffingClassifier;
use albumsync::config::MirrorConfig;
use albumsync::logging;
use albumsync::remote::{RemoteStore, YandexStore};
use albumsync::runner::{Runner, RunSummary, SubtreeStatus};
use albumsync::selection::{PromptSelection, SelectAll, SelectNames, SelectionPolicy};
use albumsync_disk::DiskClient;
use anyhow::Context;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    Prompt,
    All,
    Only(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run { selection: Selection, dry_run: bool },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut selection = Selection::Prompt;
    let mut dry_run = false;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--all" => {
                if matches!(selection, Selection::Only(_)) {
                    anyhow::bail!("--all cannot be combined with --only");
                }
                selection = Selection::All;
            }
            "--only" => {
                let Some(name) = args.next() else {
                    anyhow::bail!("--only needs a directory name");
                };
                selection = match selection {
                    Selection::All => anyhow::bail!("--all cannot be combined with --only"),
                    Selection::Prompt => Selection::Only(vec![name]),
                    Selection::Only(mut names) => {
                        names.push(name);
                        Selection::Only(names)
                    }
                };
            }
            "--dry-run" => dry_run = true,
            "--help" | "-h" => return Ok(CliMode::Help),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(CliMode::Run { selection, dry_run })
}

fn print_usage() {
    println!("Usage: albumsync [--all | --only NAME ...] [--dry-run]");
    println!("  --all        Mirror every pending directory without asking");
    println!("  --only NAME  Mirror NAME if it is pending (repeatable)");
    println!("  --dry-run    List pending directories and exit");
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        println!(
            "{}: {} in {:.1}s",
            outcome.name,
            outcome.status,
            outcome.elapsed.as_secs_f64()
        );
        if let Some(report) = &outcome.report {
            for failure in &report.failures {
                println!("  {}: {}", failure.path.display(), failure.error);
            }
        }
    }
    println!(
        "{} directories, {} files uploaded in {:.1}s",
        summary.outcomes.len(),
        summary.files_uploaded(),
        summary.elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let (selection, dry_run) = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            print_usage();
            return Ok(());
        }
        CliMode::Run { selection, dry_run } => (selection, dry_run),
    };
    logging::init();

    let config = MirrorConfig::from_env()?;
    let token = std::env::var("YADISK_TOKEN").context("YADISK_TOKEN is not set")?;
    let client = match std::env::var("YADISK_API_URL") {
        Ok(base_url) => DiskClient::with_base_url(&base_url, token)?,
        Err(_) => DiskClient::new(token)?,
    };
    let store: Arc<dyn RemoteStore> = Arc::new(YandexStore::new(client));
    let runner = Runner::new(&config, Arc::new(SniffingClassifier::new()), store);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; finishing up");
            on_signal.cancel();
        }
    });

    if dry_run {
        for name in runner.pending(&cancel).await? {
            println!("{name}");
        }
        return Ok(());
    }

    let mut policy: Box<dyn SelectionPolicy> = match selection {
        Selection::Prompt => Box::new(PromptSelection::stdio()),
        Selection::All => Box::new(SelectAll),
        Selection::Only(names) => Box::new(SelectNames::new(names)),
    };
    let summary = runner.process(policy.as_mut(), &cancel).await?;
    print_summary(&summary);

    if summary.cancelled {
        anyhow::bail!("run cancelled");
    }
    let failed = summary
        .outcomes
        .iter()
        .filter(|outcome| outcome.status != SubtreeStatus::Mirrored)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} directories were not fully mirrored");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("albumsync")
            .chain(values.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_cli_mode_defaults_to_prompt() {
        let mode = parse_cli_mode(args(&[])).unwrap();
        assert_eq!(
            mode,
            CliMode::Run {
                selection: Selection::Prompt,
                dry_run: false
            }
        );
    }

    #[test]
    fn parse_cli_mode_collects_repeated_only() {
        let mode = parse_cli_mode(args(&["--only", "2023-a", "--dry-run", "--only", "2024-b"])).unwrap();
        assert_eq!(
            mode,
            CliMode::Run {
                selection: Selection::Only(vec!["2023-a".into(), "2024-b".into()]),
                dry_run: true
            }
        );
    }

    #[test]
    fn parse_cli_mode_supports_all_and_help() {
        assert_eq!(
            parse_cli_mode(args(&["--all"])).unwrap(),
            CliMode::Run {
                selection: Selection::All,
                dry_run: false
            }
        );
        assert_eq!(parse_cli_mode(args(&["--all", "-h"])).unwrap(), CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_rejects_bad_input() {
        assert!(parse_cli_mode(args(&["--bogus"])).is_err());
        assert!(parse_cli_mode(args(&["--only"])).is_err());
        assert!(parse_cli_mode(args(&["--all", "--only", "x"])).is_err());
    }
}
