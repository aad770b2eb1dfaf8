//! Liveness and readiness probes.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz` — process is up. No I/O.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /readyz`
///
/// Exercises the two dependencies a request would touch: the metadata pool
/// and the blob directory. 200 when both answer, 503 otherwise, with the
/// failing check named in the body.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let database = ping_database(&state).await;
    let storage = probe_storage_dir(&state).await;
    let ready = database.is_ok() && storage.is_ok();

    let body = ReadyBody {
        status: if ready { "ok" } else { "error" },
        database: CheckOutcome::from(database),
        storage: CheckOutcome::from(storage),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn ping_database(state: &AppState) -> Result<(), String> {
    let answer: i64 = sqlx::query_scalar("SELECT 1")
        .fetch_one(&*state.db)
        .await
        .map_err(|err| err.to_string())?;
    if answer != 1 {
        return Err(format!("unexpected result: {answer}"));
    }
    Ok(())
}

/// Write, read back, and delete a probe file under the storage directory.
async fn probe_storage_dir(state: &AppState) -> Result<(), String> {
    let probe = state.storage_dir.join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&probe, b"ok")
        .await
        .map_err(|err| format!("write: {err}"))?;
    let read_back = fs::read(&probe).await.map_err(|err| format!("read: {err}"));
    let _ = fs::remove_file(&probe).await;
    if read_back? != b"ok" {
        return Err("probe file content mismatch".into());
    }
    Ok(())
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: CheckOutcome,
    storage: CheckOutcome,
}

#[derive(Serialize)]
struct CheckOutcome {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Result<(), String>> for CheckOutcome {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(detail) => Self {
                ok: false,
                error: Some(detail),
            },
        }
    }
}
