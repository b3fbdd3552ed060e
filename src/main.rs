use std::sync::Arc;

use anyhow::Context;

use briefing_assist::briefing::{
    BriefingRouteState, ControllerFactory, LlmInterviewer, SessionController, SessionRegistry,
    briefing_routes, spawn_sweep_task,
};
use briefing_assist::cli::{CliExit, CliSession};
use briefing_assist::config::BriefingConfig;
use briefing_assist::llm::create_provider;
use briefing_assist::sink::{AppsScriptSink, SpreadsheetSink, UnconfiguredSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match BriefingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export GEMINI_API_KEY=...");
            std::process::exit(1);
        }
    };

    eprintln!("📰 Briefing Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   REST API: http://0.0.0.0:{}/api/sessions", config.http_port);
    eprintln!("   Exports: {}", config.export_dir.display());

    let llm = create_provider(&config)?;

    let sink: Arc<dyn SpreadsheetSink> = match &config.sheet_url {
        Some(url) => {
            eprintln!("   Spreadsheet: enabled");
            Arc::new(AppsScriptSink::new(url.clone()))
        }
        None => {
            eprintln!("   Spreadsheet: disabled (BRIEFING_SHEET_URL not set)");
            Arc::new(UnconfiguredSink)
        }
    };

    // Every session gets its own interviewer so conversation histories
    // never mix.
    let factory: ControllerFactory = {
        let llm = llm.clone();
        let sink = sink.clone();
        let interview = config.interview.clone();
        Arc::new(move || {
            let interviewer = Arc::new(LlmInterviewer::new(llm.clone(), interview.clone()));
            SessionController::new(interviewer, sink.clone())
        })
    };

    // ── REST server ─────────────────────────────────────────────────────
    let registry = Arc::new(SessionRegistry::new(factory.clone()));
    let _sweeper = spawn_sweep_task(registry.clone(), config.session_ttl);
    let app = briefing_routes(BriefingRouteState { registry });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.http_port))?;
    let server = tokio::spawn(async move {
        tracing::info!("Briefing REST server started");
        axum::serve(listener, app).await
    });

    // ── CLI session ─────────────────────────────────────────────────────
    // Only /quit ends the process from the CLI; closed stdin leaves the
    // REST server running.
    let cli = if config.cli {
        let session = CliSession::new(Arc::new(factory()), config.export_dir.clone());
        Some(tokio::spawn(session.run()))
    } else {
        eprintln!("   CLI: disabled (stdin is not a terminal; set BRIEFING_CLI=1 to force)");
        None
    };
    let cli_quit = async move {
        match cli {
            Some(handle) => match handle.await {
                Ok(CliExit::Quit) => {}
                Ok(CliExit::Eof) => std::future::pending::<()>().await,
                Err(e) => {
                    tracing::error!("CLI task failed: {}", e);
                    std::future::pending::<()>().await
                }
            },
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            result
                .context("REST server task panicked")?
                .context("REST server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
        _ = cli_quit => {
            tracing::info!("CLI quit, shutting down");
        }
    }

    Ok(())
}
