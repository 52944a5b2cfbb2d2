use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::collections::{SuiteFile, load_suite_file};
use crate::config::{ConfigOverrides, HarnessConfig};
use crate::http::client::HttpClient;
use crate::store::HistoryStore;
use crate::testing::orchestrator::Orchestrator;
use crate::testing::report::{ReportGenerator, RunReport};

use super::exit_codes::{SUCCESS, THRESHOLD_NOT_MET};
use super::{Command, HistoryArgs, OutputFormat, RunArgs, ValidateArgs};

pub async fn dispatch(cmd: Command, out: &mut dyn Write) -> Result<u8> {
    match cmd {
        Command::Run(args) => run(args, out).await,
        Command::Validate(args) => validate(args, out),
        Command::History(args) => history(args, out),
    }
}

pub async fn run(args: RunArgs, out: &mut dyn Write) -> Result<u8> {
    let file = load_suite_file(&args.suite)?;
    let config = args
        .overrides()
        .resolve(Some(&file))
        .context("invalid run configuration")?;
    for warning in file.lint() {
        warn!("{warning}");
    }
    let suite = file
        .into_suite()
        .with_context(|| format!("invalid suite file `{}`", args.suite.display()))?;

    let client = HttpClient::new(config.timeout).context("failed to build HTTP client")?;
    info!(base_url = %config.base_url, timeout = ?config.timeout, "running suite");
    let report = Orchestrator::new(config.run_settings())
        .run(&suite, &client)
        .await;

    let generator = config.report_generator();
    let rendered = render(&generator, &report, args.format)?;
    out.write_all(rendered.as_bytes())?;

    if let Some(path) = &args.report {
        fs::write(path, &rendered)
            .with_context(|| format!("failed to write report to `{}`", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = &args.history {
        let store = HistoryStore::open(path)?;
        store.record(&report)?;
    }

    Ok(exit_code(&generator, &report))
}

pub fn validate(args: ValidateArgs, out: &mut dyn Write) -> Result<u8> {
    let file = load_suite_file(&args.suite)?;
    file.validate()
        .with_context(|| format!("invalid suite file `{}`", args.suite.display()))?;
    check_suite_settings(&file)?;

    let warnings = file.lint();
    for warning in &warnings {
        writeln!(out, "warning: {warning}")?;
    }
    writeln!(
        out,
        "{}: {} case(s), {} variable(s), {} warning(s)",
        file.name,
        file.cases.len(),
        file.variables.len(),
        warnings.len()
    )?;
    Ok(SUCCESS)
}

pub fn history(args: HistoryArgs, out: &mut dyn Write) -> Result<u8> {
    let store = HistoryStore::open(&args.db)?;
    if let Some(run_id) = &args.show {
        let report = store
            .load(run_id)?
            .with_context(|| format!("no stored run `{run_id}` in `{}`", args.db.display()))?;
        let generator = HarnessConfig::default().report_generator();
        out.write_all(render(&generator, &report, args.format)?.as_bytes())?;
        return Ok(SUCCESS);
    }

    let runs = store.recent(args.limit)?;

    match args.format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&runs)?)?;
        }
        OutputFormat::Text => {
            if runs.is_empty() {
                writeln!(out, "no stored runs in `{}`", args.db.display())?;
            }
            for run in &runs {
                writeln!(
                    out,
                    "{}  {:<24} {:>3}/{:<3} {:>5.1}%  {}",
                    run.started_at_ms,
                    run.suite,
                    run.passed,
                    run.total,
                    run.success_rate,
                    run.run_id
                )?;
            }
        }
    }
    Ok(SUCCESS)
}

pub fn render(
    generator: &ReportGenerator,
    report: &RunReport,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generator.render_text(report)),
        OutputFormat::Json => {
            let mut json = generator
                .render_json(report)
                .context("failed to serialize report")?;
            json.push('\n');
            Ok(json)
        }
    }
}

pub fn exit_code(generator: &ReportGenerator, report: &RunReport) -> u8 {
    if generator.passes(report) {
        SUCCESS
    } else {
        THRESHOLD_NOT_MET
    }
}

/// Suite-level settings must be valid on their own, before any flags apply.
fn check_suite_settings(file: &SuiteFile) -> Result<()> {
    ConfigOverrides::default()
        .resolve(Some(file))
        .context("invalid suite settings")?;
    Ok(())
}
