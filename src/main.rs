use piezo_monitor::alert::TracingAlerts;
use piezo_monitor::api::{HttpApi, HttpNarrative};
use piezo_monitor::config::{Config, SearchConfig};
use piezo_monitor::filter::FilterPatch;
use piezo_monitor::model::{fields, Category, Status, Variant};
use piezo_monitor::routine;
use piezo_monitor::session::SessionContext;
use piezo_monitor::{Dashboard, SearchOutcome};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,piezo_monitor=debug,reqwest=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PIEZO_MONITOR_CONFIG").ok())
        .unwrap_or_else(|| "config/config.yaml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure:\n\
             1. The config file exists (pass its path as the first argument)\n\
             2. All referenced environment variables are set\n\
             3. Create a .env file if needed",
            config_path,
            e
        )
    })?;
    info!("Configuration loaded from {}", config_path);

    let Some(search) = config.search.clone() else {
        anyhow::bail!("No `search` section in {}; nothing to do", config_path);
    };

    let session = SessionContext::create_or_load(&config.session.state_dir)?;
    let api = Arc::new(HttpApi::new(&config.api, Some(&session))?);
    let narrative = Arc::new(HttpNarrative::new(&config.narrative, Some(&session))?);

    let routine = routine::for_variant(search.variant, api.clone(), narrative);
    let dashboard = Dashboard::new(api, routine, Arc::new(TracingAlerts));

    apply_search_config(&dashboard, &search).await?;

    // Log progress as points settle
    let mut progress = dashboard.subscribe_progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            match &current.current {
                Some(label) => info!("Fetching {} ({})", label, current.message()),
                None => info!("{}", current.message()),
            }
        }
    });

    let run = async {
        if search.auto_apply {
            dashboard.auto_apply().await
        } else {
            dashboard.search().await.map(Some)
        }
    };

    tokio::select! {
        outcome = run => match outcome {
            Ok(Some(outcome)) => report(&dashboard, outcome).await,
            Ok(None) => warn!("Filter incomplete, automatic search not applied"),
            Err(e) => error!("Search failed: {}", e),
        },
        _ = interrupt_requested() => {
            warn!("Search interrupted");
        }
    }

    Ok(())
}

async fn apply_search_config(dashboard: &Dashboard, search: &SearchConfig) -> anyhow::Result<()> {
    let change = dashboard
        .update_filter(FilterPatch {
            category: Some(search.category.as_deref().map(Category::from_code)),
            status: Some(search.status.as_deref().and_then(Status::from_code)),
            start: Some(search.start),
            end: Some(search.end),
            daily: Some(search.daily && search.variant == Variant::Groundwater),
            parameters: Some(search.parameters.clone()),
            ..FilterPatch::default()
        })
        .await?;

    if !change.needs_catalog_refresh {
        dashboard.load_catalog().await?;
    }
    info!("{} monitoring points available", dashboard.catalog().await.len());

    dashboard.select_entities(Some(search.entities.clone())).await?;
    Ok(())
}

async fn report(dashboard: &Dashboard, outcome: SearchOutcome) {
    let snapshot = dashboard.snapshot().await;

    if snapshot.last_search_empty {
        info!("No data recorded for the selected points and period");
    }

    for result in &snapshot.results {
        info!(
            "{}: {} readings, mean static level {}, narrative: {}",
            result.label,
            result.summary.count,
            result.summary.mean(fields::STATIC_LEVEL),
            result.narrative.current().unwrap_or("-")
        );
    }

    for failure in &snapshot.failures {
        warn!("{}: {}", failure.label, failure.message);
    }

    info!("Search finished: {:?}", outcome);
}

/// Resolves on Ctrl+C, or SIGTERM on unix. A failed handler install never
/// resolves, so the search is not cut short by it.
async fn interrupt_requested() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, abandoning search"),
            Err(e) => {
                error!("Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received, abandoning search");
            }
            Err(e) => {
                error!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
