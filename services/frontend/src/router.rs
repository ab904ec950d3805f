use crate::handlers::{api, edit, tickers};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    // `{id}` is the ticker on open and the session id afterwards.
    let edit_routes = Router::new()
        .route("/edit/{id}", get(edit::open))
        .route("/edit/{id}/add", post(edit::add_row))
        .route("/edit/{id}/reload", post(edit::reload))
        .route("/edit/{id}/save", post(edit::save));

    let ticker_routes = Router::new()
        .route("/tickers", get(tickers::open))
        .route("/tickers/{id}/search", post(tickers::search))
        .route("/tickers/{id}/add", post(tickers::add))
        .route("/tickers/{id}/remove", post(tickers::remove))
        .route("/tickers/{id}/save", post(tickers::save));

    Router::new()
        .route("/api/{group}/{name}", get(api::get_table))
        .merge(edit_routes)
        .merge(ticker_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editors::testing::Recorder;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::{DateTime, TimeZone, Utc};
    use market_data::{FixedClock, TradingCalendar};
    use persistence::{DocumentStore, MemoryStore, Repo, TableWrite};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use types::candle::Candle;
    use types::ids::{Group, TableId};
    use types::security::Security;
    use types::table::Table;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 22, 0, 0).unwrap()
    }

    async fn setup() -> (Router, Arc<Recorder>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

        let price = Decimal::new(905, 1);
        let candle = Candle {
            begin: Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap(),
            open: price,
            close: price,
            high: price,
            low: price,
            value: Decimal::ZERO,
            volume: Decimal::ZERO,
        };
        Repo::<Candle>::new(Arc::clone(&store))
            .replace(&Table::new(TableId::singleton(Group::Usd), now(), vec![candle]))
            .await
            .unwrap();

        let security = Security {
            ticker: "AKRN".to_string(),
            lot: 1,
            isin: "RU0009028674".to_string(),
            board: "TQBR".to_string(),
            kind: "1".to_string(),
            instrument: "EQIN".to_string(),
        };
        Repo::<Security>::new(Arc::clone(&store))
            .replace(&Table::new(TableId::singleton(Group::Securities), now(), vec![security]))
            .await
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let state = AppState::new(
            store,
            Arc::new(FixedClock::new(now())),
            TradingCalendar::default(),
            recorder.clone(),
        );
        (create_router(state), recorder)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_table_json() {
        let (app, _) = setup().await;

        let response = send(&app, "GET", "/api/usd/usd", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = json_body(response).await;
        assert_eq!(body["rows"][0]["begin"]["$date"], "2024-01-09T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_get_table_errors() {
        let (app, _) = setup().await;

        let missing = send(&app, "GET", "/api/quotes/AKRN", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(missing).await["error"], "NOT_FOUND");

        let unknown = send(&app, "GET", "/api/trades/AKRN", None).await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dividend_editor_flow() {
        let (app, recorder) = setup().await;

        let view = json_body(send(&app, "GET", "/edit/akrn", None).await).await;
        assert_eq!(view["ticker"], "AKRN");
        let session = view["session_id"].as_str().unwrap().to_string();

        let row = json!({"date": "2024-01-09", "value": 12.5, "currency": "RUR"});
        let response = send(&app, "POST", &format!("/edit/{session}/add"), Some(row)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["rows"].as_array().unwrap().len(), 1);

        let report = json_body(send(&app, "POST", &format!("/edit/{session}/save"), None).await).await;
        let steps = report["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|step| step["status"] == "OK"));
        assert_eq!(recorder.announced(), vec![TableId::new(Group::RawDiv, "AKRN")]);

        let stored = json_body(send(&app, "GET", "/api/raw_div/AKRN", None).await).await;
        assert_eq!(stored["rows"][0]["value"], 12.5);
    }

    #[tokio::test]
    async fn test_wrong_session_is_bad_request() {
        let (app, _) = setup().await;
        let uri = format!("/edit/{}/save", uuid::Uuid::now_v7());

        let response = send(&app, "POST", &uri, None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "SESSION_ERROR");
    }

    #[tokio::test]
    async fn test_portfolio_editor_flow() {
        let (app, recorder) = setup().await;

        let view = json_body(send(&app, "GET", "/tickers", None).await).await;
        assert_eq!(view["tickers"], json!([]));
        let session = view["session_id"].as_str().unwrap().to_string();

        let found = send(&app, "POST", &format!("/tickers/{session}/search"), Some(json!({"pattern": "ak"}))).await;
        assert_eq!(json_body(found).await, json!(["AKRN"]));

        let bad = send(&app, "POST", &format!("/tickers/{session}/add"), Some(json!({"ticker": "GAZP"}))).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let added = send(&app, "POST", &format!("/tickers/{session}/add"), Some(json!({"ticker": "AKRN"}))).await;
        assert_eq!(json_body(added).await["tickers"], json!(["AKRN"]));

        let saved = send(&app, "POST", &format!("/tickers/{session}/save"), None).await;
        assert_eq!(json_body(saved).await, json!({"count": 1}));
        assert_eq!(recorder.announced(), vec![TableId::singleton(Group::Positions)]);
    }
}
