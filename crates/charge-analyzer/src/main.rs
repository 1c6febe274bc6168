mod bootstrap;
mod report;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use charge_core::models::AnalysisResult;
use charge_core::settings::Settings;
use charge_data::analysis::AnalysisOptions;
use charge_data::reader::find_export_files;
use charge_runtime::runner::AnalysisRunner;
use charge_runtime::store::JsonFileStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = Settings::load_with_last_used();

    if settings.list_formats {
        print!("{}", report::render_formats());
        return Ok(());
    }

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Charge Analyzer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Timezone: {}, Output: {}, Save: {}",
        settings.timezone,
        settings.output,
        settings.save
    );

    if settings.inputs.is_empty() {
        if settings.clear {
            return Ok(());
        }
        bail!("no input given; pass one or more export files or directories");
    }

    let files = find_export_files(&settings.inputs);
    if files.is_empty() {
        bail!("no supported export files found in the given inputs");
    }

    let options = AnalysisOptions {
        config: settings.analyzer_config()?,
        filter: settings.session_filter()?,
    };
    tracing::info!("Session filter: {}", options.filter.describe());

    let mut runner = AnalysisRunner::new(options);
    if settings.save {
        let store = JsonFileStore::open(settings.store_path(), settings.retention())
            .context("could not open the result store")?;
        runner = runner.with_store(Arc::new(store));
    }

    let single_input = files.len() == 1;
    let mut handle = tokio::spawn(async move { runner.analyze_many(files).await });

    let outcomes = tokio::select! {
        joined = &mut handle => joined.context("analysis task failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; stopping analysis");
            handle.abort();
            bail!("interrupted");
        }
    };

    let total = outcomes.len();
    let mut results: Vec<AnalysisResult> = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => results.push(result),
            Err(e) => failures.push((outcome.path, e)),
        }
    }

    if settings.wants_json() {
        let json = if single_input {
            match results.first() {
                Some(result) => serde_json::to_string_pretty(result)?,
                None => String::new(),
            }
        } else {
            serde_json::to_string_pretty(&results)?
        };
        if !json.is_empty() {
            println!("{}", json);
        }
    } else {
        let rendered: Vec<String> = results.iter().map(report::render_text).collect();
        print!("{}", rendered.join("\n"));
    }

    if single_input {
        if let Some((_, e)) = failures.pop() {
            return Err(e.into());
        }
    } else if !failures.is_empty() {
        for (path, e) in &failures {
            eprintln!("{}: {}", path.display(), e);
        }
        bail!("{} of {} file(s) could not be analyzed", failures.len(), total);
    }

    Ok(())
}
