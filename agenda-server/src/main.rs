use std::sync::Arc;

use agenda_core::config::Backend;
use agenda_core::{create_gateway, AgendaConfig, AppointmentGateway, MemorySessionStore};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use agenda_server::assistant::Assistant;
use agenda_server::http::{start_http_server, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "agenda.toml")]
    config: String,

    /// Check the appointment backend and exit
    #[arg(long)]
    health: bool,

    /// Apply the bundled Postgres schema before serving
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match AgendaConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let rules = match config.rules() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid conversation/schedule config: {}", e);
            std::process::exit(1);
        }
    };

    // Postgres pool is only opened for the postgres backend
    let pool = if config.appointments.backend == Backend::Postgres {
        match agenda_core::db::create_pool(&config.appointments.postgres).await {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("Postgres unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    if args.migrate {
        match &pool {
            Some(p) => {
                agenda_core::db::migrate(p).await?;
                tracing::info!("Appointments schema applied");
            }
            None => tracing::warn!("--migrate ignored: postgres backend not connected"),
        }
    }

    let gateway: Arc<dyn AppointmentGateway> = match &pool {
        Some(p) => Arc::new(agenda_core::postgres::PostgresGateway::new(p.clone())),
        None => Arc::from(create_gateway(&config.appointments).await),
    };

    if args.health {
        println!("✅ Appointment backend: {}", gateway.name());
        if let Some(p) = &pool {
            match agenda_core::db::health_check(p).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        if gateway.name() == "none" {
            println!("❌ Bookings disabled: no appointment backend configured");
            std::process::exit(1);
        }
        println!("✅ Agenda health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    tracing::info!(
        backend = gateway.name(),
        dynamic_hours = rules.dynamic_hours,
        "Starting {}",
        config.studio.name
    );

    let assistant = Assistant::new(
        rules,
        Arc::new(MemorySessionStore::new()),
        gateway,
        &config.studio,
    );
    let state = Arc::new(HttpState { assistant, pool });

    start_http_server(
        state,
        &config.http.host,
        config.http.port,
        &config.http.webhook_path,
        tx.subscribe(),
    )
    .await
}
