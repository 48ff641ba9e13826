mod error;
mod models;
mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, Json},
    routing::{get, post},
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt};

use error::Error;
use models::{ErrorReport, GenerateBookRequest};
use services::llm::LLMClient;
use services::rate_limit::{RateLimiter, SlidingWindowLimiter};

/// Generous ceiling for one oracle round trip; long books take a while.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);
const RATE_WINDOW: Duration = Duration::from_secs(60);
const MAX_GENERATIONS_PER_WINDOW: usize = 10;
const MAX_REPORTS_PER_WINDOW: usize = 10;
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct AppState {
    llm_client: Arc<LLMClient>,
    generate_limiter: Arc<dyn RateLimiter>,
    report_limiter: Arc<dyn RateLimiter>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let llm_client = Arc::new(LLMClient::new()?);
    let generate_limiter = Arc::new(SlidingWindowLimiter::new(
        RATE_WINDOW,
        MAX_GENERATIONS_PER_WINDOW,
    ));
    let report_limiter = Arc::new(SlidingWindowLimiter::new(
        RATE_WINDOW,
        MAX_REPORTS_PER_WINDOW,
    ));

    // Periodic sweep of expired rate-limit entries.
    {
        let generate_limiter = generate_limiter.clone();
        let report_limiter = report_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                generate_limiter.cleanup();
                report_limiter.cleanup();
            }
        });
    }

    let app_state = AppState {
        llm_client,
        generate_limiter,
        report_limiter,
    };

    // Build our application with a route
    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/generate-book", post(generate_book))
        .route("/api/errors", post(report_error))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        );

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<String> {
    let html_content = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>VeloraBook Generation Service</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>VeloraBook Generation Service</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>This service turns questionnaire answers and photographs into a personalized book.</p>
            <p>The narrative is produced by a text-generation model and structured into titled chapters.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET / - This information page</div>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">POST /api/generate-book - Generate a structured book</div>
        <div class="endpoint">POST /api/errors - Submit a client error report</div>

        <h2>How to Use:</h2>
        <p>POST JSON to /api/generate-book with bookType, answers and optional images.</p>
    </body>
    </html>
    "#
    .to_string();

    Html(html_content)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn generate_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, Error> {
    let ip = client_ip(&headers);
    if !state.generate_limiter.try_acquire(&ip) {
        return Err(Error::RateLimited);
    }

    // Deserialized by hand so shape errors come back as 400s with a usable
    // message instead of the extractor's default rejection.
    let request: GenerateBookRequest = serde_json::from_value(payload)
        .map_err(|e| Error::Validation(format!("malformed request body: {e}")))?;
    services::validation::validate_generate_request(&request)?;

    tracing::info!(
        book_type = ?request.book_type,
        answers = request.answers.len(),
        images = request.images.len(),
        compressed_images = request.images.iter().filter(|i| i.compressed).count(),
        %ip,
        "book generation requested"
    );

    let raw_text = tokio::time::timeout(
        GENERATION_TIMEOUT,
        state.llm_client.generate_book_text(
            request.book_type,
            &request.answers,
            request.images.len(),
        ),
    )
    .await
    .map_err(|_| Error::OracleTimeout)?
    .map_err(|e| Error::Oracle(e.to_string()))?;

    // No image-analysis collaborator is wired in, so the structurer falls
    // back to placeholder descriptions.
    let book = services::structurer::structure(
        &raw_text,
        request.book_type,
        &request.images,
        &[],
        Utc::now(),
    )?;

    tracing::info!(
        chapters = book.total_chapters,
        words = book.word_count,
        "book generation finished"
    );

    Ok(Json(serde_json::json!({ "success": true, "book": book })))
}

async fn report_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>), Error> {
    let ip = client_ip(&headers);
    if !state.report_limiter.try_acquire(&ip) {
        return Err(Error::RateLimited);
    }

    let report: ErrorReport = serde_json::from_value(payload)
        .map_err(|e| Error::Validation(format!("invalid error report: {e}")))?;
    if report.message.trim().is_empty() || report.timestamp.trim().is_empty() {
        return Err(Error::Validation(
            "error report requires message and timestamp".into(),
        ));
    }

    let triaged = services::reports::triage(&report);
    tracing::error!(
        id = %triaged.id,
        severity = ?triaged.severity,
        fingerprint = %triaged.fingerprint,
        url = %report.url,
        user_agent = %report.user_agent,
        %ip,
        "client error report: {}",
        report.message
    );
    if report.component_stack.is_some() || report.additional_info.is_some() {
        tracing::debug!(
            id = %triaged.id,
            component_stack = ?report.component_stack,
            additional_info = ?report.additional_info,
            "error report details"
        );
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "errorId": triaged.id })),
    ))
}

/// Client IP for rate limiting, honoring the usual proxy headers.
fn client_ip(headers: &HeaderMap) -> String {
    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            // x-forwarded-for may list several addresses; the first is the
            // original client.
            if let Some(ip) = value.split(',').next().map(str::trim) {
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }
    "127.0.0.1".to_string()
}
