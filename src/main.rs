use anyhow::{Result, anyhow};
use tracing::info;

use recurfix::{cli, config, logging, pipeline, report};

fn report_kind(format: cli::ReportFormat) -> report::ReportKind {
    match format {
        cli::ReportFormat::Jsonl => report::ReportKind::Jsonl,
        cli::ReportFormat::Csv => report::ReportKind::Csv,
    }
}

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.verbose);

    let prefs_path = cli_opts
        .config_path
        .clone()
        .or_else(config::default_preferences_path);
    let stored = match prefs_path.as_deref() {
        Some(path) => config::load_preferences(path)?,
        None => config::Preferences::default(),
    };
    let used = stored.merged_with(&cli_opts.preferences());
    let params = used.repair_params()?;
    let options = used.repair_options(cli_opts.seed);

    info!(
        "starting input={} chunk_size={} recurrence_size={} recurrence_distance={} samples={} budget={}",
        cli_opts.input.display(),
        params.chunk_size,
        params.recurrence_size,
        params.recurrence_distance,
        options.consistency_sample_size,
        options.reconstruct.memory_budget
    );

    let records = pipeline::run(&cli_opts.input, cli_opts.output.as_deref(), params, &options)
        .map_err(|err| anyhow!("[{}] {err}", err.code()))?;

    if let Some(path) = cli_opts.report.as_deref() {
        let mut sink = report::build_report(report_kind(cli_opts.report_format), path)?;
        for record in &records {
            sink.record(record)?;
        }
        sink.flush()?;
    }

    if !cli_opts.no_save {
        if let Some(path) = prefs_path.as_deref() {
            config::save_preferences(path, &used)?;
        }
    }

    for record in &records {
        println!("{} -> {}", record.source, record.output);
    }
    info!("recurfix run finished ({} files)", records.len());
    Ok(())
}
