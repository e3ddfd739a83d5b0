use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::metrics::MetricStore;

pub fn router(store: MetricStore) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(store)
}

async fn metrics(State(store): State<MetricStore>) -> Response {
    match store.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, store.content_type())], body).into_response(),
        Err(err) => {
            error!("failed to encode metrics: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Serves `/metrics` until `shutdown` turns true or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    store: MetricStore,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("serving metrics on http://{addr}/metrics");
    }

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::metrics::Series;

    #[tokio::test]
    async fn scrape_returns_current_values() {
        let store = MetricStore::new().unwrap();
        store.set(Series::Humidity, &["Home", "Hallway"], 40.0);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, store.clone(), rx));

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let body = response.text().await.unwrap();
        assert!(body.contains(r#"nest_thermostat_humidity{device="Hallway",structure="Home"} 40"#));

        store.set(Series::Humidity, &["Home", "Hallway"], 41.0);
        store.inc_fetch_errors();
        let body = client
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains(r#"nest_thermostat_humidity{device="Hallway",structure="Home"} 41"#));
        assert!(body.contains("nest_api_errors_total 1"));

        let missing = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
