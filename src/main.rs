//! Demo binary: wires up the composition root and serves it on `:8080`.

use facility_pulse::app::{self, AppConfig};

#[tokio::main]
async fn main() {
    facility_pulse::telemetry::init();

    let state = app::bootstrap(AppConfig::default()).await;
    let router = app::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
    tracing::info!(addr = "127.0.0.1:8080", "facility-pulse listening");
    facility_pulse::serve(listener, router).await;
}
