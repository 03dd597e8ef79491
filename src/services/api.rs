use crate::data_provider::{SnapshotStore, DETAILS, STOCKS, VARIABLE_INCOME};
use crate::errors::{DataHubError, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

struct AppState {
    store: SnapshotStore,
}

/// 只读快照文件的 HTTP 接口
///
/// 每个请求都重新读取文件，不做缓存。
pub fn router(store: SnapshotStore) -> Router {
    let state = Arc::new(AppState { store });
    Router::new()
        .route("/acciones", get(get_stocks))
        .route("/acciones/:cod_simbolo", get(get_stock_detail))
        .route("/renta-variable", get(get_variable_income))
        .with_state(state)
}

pub async fn serve(store: SnapshotStore, addr: &str, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving snapshots from {} at http://{}", store.dir().display(), addr);
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// 读取失败（文件不存在或已损坏）返回 500，进程继续服务
fn snapshot_response<T: Serialize>(store: &SnapshotStore, name: &str, data: Result<T>) -> Response {
    match data {
        Ok(data) => {
            let mut response = Json(data).into_response();
            if let Ok(modified) = store.modified(name) {
                if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                    response.headers_mut().insert(header::LAST_MODIFIED, value);
                }
            }
            response
        }
        Err(e) => {
            error!("Cannot serve {} snapshot: {}", name, e);
            let text = match e {
                DataHubError::StoreIOError { .. } => "Snapshot not available",
                _ => "Snapshot is unreadable",
            };
            message(StatusCode::INTERNAL_SERVER_ERROR, text)
        }
    }
}

async fn get_stocks(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(&state.store, STOCKS, state.store.stocks())
}

async fn get_variable_income(State(state): State<Arc<AppState>>) -> Response {
    snapshot_response(&state.store, VARIABLE_INCOME, state.store.variable_income())
}

async fn get_stock_detail(State(state): State<Arc<AppState>>, Path(cod_simbolo): Path<String>) -> Response {
    match state.store.find_detail(&cod_simbolo) {
        Ok(Some(detail)) => snapshot_response(&state.store, DETAILS, Ok(detail)),
        Ok(None) => message(StatusCode::NOT_FOUND, "Stock not found"),
        Err(e) => snapshot_response::<()>(&state.store, DETAILS, Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_provider::tests::{detail, temp_dir};
    use axum::body::to_bytes;
    use serde_json::Value;

    fn state(tag: &str) -> Arc<AppState> {
        Arc::new(AppState {
            store: SnapshotStore::new(temp_dir(tag)),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn detail_lookup_ignores_case() {
        let state = state("api_detail");
        state.store.write(DETAILS, &[detail("BVL")]).unwrap();

        let response = get_stock_detail(State(state.clone()), Path("bvl".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(body_json(response).await["cod_simbolo"], "BVL");
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let state = state("api_missing_symbol");
        state.store.write(DETAILS, &[detail("BVL")]).unwrap();

        let response = get_stock_detail(State(state), Path("ZZZ".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Stock not found");
    }

    #[tokio::test]
    async fn missing_snapshot_is_a_server_error() {
        let state = state("api_no_file");
        let response = get_stocks(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        std::fs::write(state.store.path_for(VARIABLE_INCOME), "{not json").unwrap();
        let response = get_variable_income(State(state)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "Snapshot is unreadable");
    }

    #[tokio::test]
    async fn stocks_are_served_as_stored() {
        let state = state("api_stocks");
        std::fs::write(
            state.store.path_for(STOCKS),
            r#"[{"nombre":"Cantv","simbolo":"TDV.D","ultimo_precio":"3,10","monto_efectivo":"310,00","variacion":"0,00","titulos_negociados":"100"}]"#,
        )
        .unwrap();

        let response = get_stocks(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await[0]["simbolo"], "TDV.D");
    }
}
