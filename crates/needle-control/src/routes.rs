//! Control-plane route handlers.
//!
//! Every per-file route takes an optional `?file=<name>`; without it the
//! route acts on the global configuration or on all files.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
};
use needle_sim::{MetricsReport, SimulationConfig, SimulationControl, SimulationStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `?file=` selector. An empty value means "all files".
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub file: Option<String>,
}

impl FileQuery {
    fn file(&self) -> Option<&str> {
        self.file.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnabledResponse {
    pub enabled: bool,
    pub status: String,
}

/// Runs `op` off the async workers: simulated files may hold their
/// locks across injected sleeps.
async fn blocking<T, F>(control: Arc<SimulationControl>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SimulationControl) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&control))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

/// GET /status
pub async fn status(
    State(control): State<Arc<SimulationControl>>,
) -> Result<Json<SimulationStatus>, ApiError> {
    blocking(control, |control| Ok(control.status())).await.map(Json)
}

/// GET|POST /metrics
pub async fn metrics(
    State(control): State<Arc<SimulationControl>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<MetricsReport>, ApiError> {
    blocking(control, move |control| {
        control.metrics(query.file()).map_err(ApiError::from)
    })
    .await
    .map(Json)
}

/// GET /config
pub async fn get_config(
    State(control): State<Arc<SimulationControl>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<SimulationConfig>, ApiError> {
    blocking(control, move |control| {
        control.config(query.file()).map_err(ApiError::from)
    })
    .await
    .map(Json)
}

/// POST /config
pub async fn set_config(
    State(control): State<Arc<SimulationControl>>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let config = SimulationConfig::from_json(&body)?;
    blocking(control, move |control| {
        control.set_config(query.file(), config).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(StatusResponse {
        status: "success".to_string(),
    }))
}

/// POST /reset
pub async fn reset(
    State(control): State<Arc<SimulationControl>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    blocking(control, move |control| {
        control.reset(query.file()).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(StatusResponse {
        status: "reset".to_string(),
    }))
}

/// POST /enable
pub async fn enable(
    State(control): State<Arc<SimulationControl>>,
) -> Result<Json<EnabledResponse>, ApiError> {
    let enabled = blocking(control, |control| Ok(control.enable())).await?;
    Ok(Json(EnabledResponse {
        enabled,
        status: "enabled".to_string(),
    }))
}

/// POST /disable
pub async fn disable(
    State(control): State<Arc<SimulationControl>>,
) -> Result<Json<EnabledResponse>, ApiError> {
    let enabled = blocking(control, |control| Ok(control.disable())).await?;
    Ok(Json(EnabledResponse {
        enabled,
        status: "disabled".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use needle_sim::SimulatedFile;

    fn control() -> Arc<SimulationControl> {
        let control = Arc::new(SimulationControl::new());
        control.register(
            "1.dat",
            Arc::new(SimulatedFile::new("1.dat", SimulationConfig::instant())),
        );
        control
    }

    fn query(file: &str) -> Query<FileQuery> {
        Query(FileQuery {
            file: Some(file.to_string()),
        })
    }

    #[tokio::test]
    async fn status_reports_file_count() {
        let Json(report) = status(State(control())).await.unwrap();
        assert_eq!(report.storage_files, 1);
        assert!(!report.enabled);
    }

    #[tokio::test]
    async fn unknown_file_is_404() {
        let err = metrics(State(control()), query("9.dat")).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_file_selector_means_all() {
        let Json(report) = metrics(State(control()), query("")).await.unwrap();
        assert!(matches!(report, MetricsReport::All(all) if all.len() == 1));
    }

    #[tokio::test]
    async fn set_config_rejects_malformed_body() {
        let err = set_config(
            State(control()),
            Query(FileQuery::default()),
            Bytes::from_static(b"{"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn set_config_for_one_file() {
        let control = control();
        let Json(response) = set_config(
            State(Arc::clone(&control)),
            query("1.dat"),
            Bytes::from_static(br#"{"bandwidth": 2048}"#),
        )
        .await
        .unwrap();

        assert_eq!(response.status, "success");
        assert_eq!(control.config(Some("1.dat")).unwrap().bandwidth, 2048);
        assert_eq!(control.global_config(), SimulationConfig::default());
    }

    #[tokio::test]
    async fn enable_and_disable_echo_state() {
        let control = control();
        let Json(on) = enable(State(Arc::clone(&control))).await.unwrap();
        assert_eq!(
            on,
            EnabledResponse {
                enabled: true,
                status: "enabled".to_string()
            }
        );
        let Json(off) = disable(State(Arc::clone(&control))).await.unwrap();
        assert!(!off.enabled);
        assert_eq!(off.status, "disabled");
        assert!(!control.is_enabled());
    }

    #[tokio::test]
    async fn enable_waits_off_the_runtime_while_a_write_is_throttled() {
        use needle_io::StorageFile;
        use std::time::{Duration, Instant};

        let control = control();
        let file = control.file("1.dat").unwrap();
        file.update_config(SimulationConfig::instant().with_bandwidth(4));

        // 8 bytes at 4 B/s hold the file lock for about two seconds
        let writer = std::thread::spawn(move || file.write_at(&[0u8; 8], 0));
        std::thread::sleep(Duration::from_millis(100));
        let pusher = {
            let control = Arc::clone(&control);
            std::thread::spawn(move || control.set_global_config(SimulationConfig::instant()))
        };
        std::thread::sleep(Duration::from_millis(100));

        let toggle = tokio::spawn(enable(State(Arc::clone(&control))));
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(1));

        let Json(on) = toggle.await.unwrap().unwrap();
        assert!(on.enabled);
        writer.join().unwrap().unwrap();
        pusher.join().unwrap();
    }
}
