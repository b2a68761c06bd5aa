mod cli;

use anyhow::{Context, Result};
use cli::{InspectArgs, Target};
use lineage_engine::engine::LineageView;
use lineage_engine::query::{HttpBackend, LineageQueries, QueryStatus, RequestOutcome};
use lineage_engine::util::config::ViewerConfig;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = cli::parse_args()?;
    if args.help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    let mut cfg = ViewerConfig::load();
    args.apply_to(&mut cfg);
    if args.save_config {
        let path = cfg.save()?;
        tracing::info!(path = %path.display(), "saved viewer config");
    }

    run(&args, &cfg)
}

fn run(args: &InspectArgs, cfg: &ViewerConfig) -> Result<()> {
    let backend = HttpBackend::new(&cfg.backend_url, cfg.bearer_token())?;
    let queries = LineageQueries::new(Arc::new(backend))?;
    let mut view = LineageView::new(queries, cfg.view_options());
    let timeout = Duration::from_secs(cfg.query_timeout_secs.max(1));

    let outcome = match &args.target {
        Target::Summary => view.load_summary(),
        Target::Drill(urn) => view.drill(urn.clone()),
        Target::Impacts(urn) => view.show_impacts(urn.clone()),
        Target::Provenance(urn) => view.show_provenance(urn.clone()),
    };
    if outcome == RequestOutcome::Disabled {
        anyhow::bail!("query is missing a required field (scope or urn)");
    }

    view.wait_idle(timeout);
    match view.active_status() {
        QueryStatus::Success => {}
        QueryStatus::Error => {
            let err = view
                .active_error()
                .cloned()
                .context("query failed without an error")?;
            return Err(anyhow::Error::new(err).context("lineage query failed"));
        }
        QueryStatus::Loading | QueryStatus::Idle => {
            anyhow::bail!("no lineage response within {}s", timeout.as_secs());
        }
    }

    let report = view.last_report();
    tracing::info!(
        nodes = view.model().len(),
        edges = view.model().edges().len(),
        dropped_nodes = report.dropped_nodes,
        dropped_edges = report.dropped_edges,
        "snapshot ready"
    );

    if let Some(needle) = &args.search {
        match view.search(needle) {
            Some(hit) => tracing::info!(
                %hit,
                matches = view.interaction().matched().len(),
                "search hit"
            ),
            None => tracing::warn!(needle = %needle, "no node matches"),
        }
    }

    if let Some(edge_id) = &args.trace {
        view.request_trace(edge_id);
        view.wait_idle(timeout);
        match view.trace(edge_id) {
            Some(t) => tracing::info!(
                edge = %edge_id,
                samples = t.samples.len(),
                coverage_pct = ?t.coverage_pct,
                confidence = ?t.confidence,
                "trace evidence"
            ),
            None => tracing::warn!(
                edge = %edge_id,
                status = ?view.trace_status(edge_id),
                "no trace evidence"
            ),
        }
    }

    let out = view.export(args.format)?;
    match &args.output {
        Some(path) => fs::write(path, out)
            .with_context(|| format!("failed to write export {}", path.display()))?,
        None => println!("{out}"),
    }
    Ok(())
}
