//! Stand-in dependency for exercising the gateway.
//!
//! `GET /hello` answers "Hello from Service B", or 500 "Service B Error"
//! when the current fault plan says so. `PUT /fault` switches the plan at
//! runtime (body: `healthy`, `failing` or `every=N`); `GET /fault` shows it.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use breaker_gateway::gateway::fault::{FaultInjector, FaultPlan};
use breaker_gateway::lifecycle::{signals, Shutdown};

#[derive(Parser)]
#[command(name = "flaky-backend")]
#[command(about = "Dependency stand-in with runtime-switchable failures")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:8081", env = "BACKEND_BIND")]
    bind: String,

    /// Initial fault plan: healthy | failing | every=N
    #[arg(short, long, default_value = "healthy")]
    fault: FaultPlan,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flaky_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let injector = Arc::new(FaultInjector::new(args.fault));

    let app = Router::new()
        .route("/hello", get(hello))
        .route("/fault", get(get_fault).put(put_fault))
        .with_state(injector);

    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, fault = %args.fault, "flaky-backend listening");

    let shutdown = Arc::new(Shutdown::new());
    let mut server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::listen_for_shutdown(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.recv().await;
        })
        .await?;
    Ok(())
}

async fn hello(State(injector): State<Arc<FaultInjector>>) -> (StatusCode, &'static str) {
    if injector.should_fail() {
        tracing::info!(call = injector.calls(), "Injecting failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Service B Error")
    } else {
        (StatusCode::OK, "Hello from Service B")
    }
}

async fn get_fault(State(injector): State<Arc<FaultInjector>>) -> String {
    injector.plan().to_string()
}

async fn put_fault(
    State(injector): State<Arc<FaultInjector>>,
    body: String,
) -> Result<String, (StatusCode, String)> {
    let plan = body
        .parse::<FaultPlan>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    injector.set_plan(plan);
    tracing::info!(fault = %plan, "Fault plan changed");
    Ok(plan.to_string())
}
