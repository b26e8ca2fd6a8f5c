// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI: submission form, result history and CSV download

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::db::{AnalysisRecord, Database};
use crate::export::{self, EXPORT_FILENAME};
use crate::submission::{self, parse_flag, Classifiers, FormErrors, Notice, SubmissionForm};
use crate::{Result, SnapclassError};

/// Cookie remembering the last debug-mode choice
pub const DEBUG_COOKIE: &str = "debug_mode";

/// Cookie carrying the id of the record whose outcome is shown once
pub const NOTICE_COOKIE: &str = "notice";

const NOTICE_MAX_AGE_SECS: u32 = 60;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub classifiers: Classifiers,
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page).post(submit_form))
        .route("/export-csv/", get(export_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// What the form shows: echoed values plus any validation errors
#[derive(Debug, Default)]
struct FormView {
    image_path: String,
    debug_mode: bool,
    errors: FormErrors,
}

// === Handlers ===

async fn index_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response> {
    let notice_id = read_cookie(&headers, NOTICE_COOKIE).filter(|id| !id.is_empty());
    let notice = match notice_id {
        Some(id) => state.db.get_result(id)?.map(|record| Notice::for_record(&record)),
        None => None,
    };
    let results = state.db.list_results()?;
    let form = FormView {
        debug_mode: read_cookie(&headers, DEBUG_COOKIE).map_or(false, |v| parse_flag(Some(v))),
        ..FormView::default()
    };

    let page = Html(render_index(&form, notice.as_ref(), &results));
    if notice_id.is_some() {
        Ok(([(header::SET_COOKIE, clear_notice_cookie())], page).into_response())
    } else {
        Ok(page.into_response())
    }
}

async fn submit_form(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Response> {
    let form = match form {
        Ok(Form(pairs)) => SubmissionForm::from_pairs(pairs),
        Err(rejection) => {
            debug!("Unreadable form body, treating as empty: {}", rejection);
            SubmissionForm::default()
        }
    };

    let submission = match form.validate() {
        Ok(submission) => submission,
        Err(errors) => {
            debug!("Rejected submission: {:?}", errors);
            let results = state.db.list_results()?;
            let view = FormView {
                image_path: form.image_path.clone().unwrap_or_default(),
                debug_mode: parse_flag(form.debug_mode.as_deref()),
                errors,
            };
            return Ok(Html(render_index(&view, None, &results)).into_response());
        }
    };

    let record = submission::submit(&state.db, &state.classifiers, &submission).await?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, "/")],
        AppendHeaders([
            (header::SET_COOKIE, debug_cookie_header(submission.debug_mode)),
            (header::SET_COOKIE, notice_cookie_header(&record.id)),
        ]),
        (),
    )
        .into_response())
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response> {
    let records = state.db.list_results()?;
    let body = export::to_csv(&records)?;
    info!("Exporting {} results as CSV", records.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

// === Cookies ===

/// Value of the first `name=value` pair across all `Cookie` headers
fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

fn debug_cookie_header(debug_mode: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        DEBUG_COOKIE,
        if debug_mode { 1 } else { 0 }
    )
}

/// One-shot notice: survives the redirect, cleared by the page that shows it
fn notice_cookie_header(record_id: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        NOTICE_COOKIE, record_id, NOTICE_MAX_AGE_SECS
    )
}

fn clear_notice_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", NOTICE_COOKIE)
}

// === Template Rendering ===

fn base_template(title: &str, content: &str) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - Snapclass</title>
    <style>
        :root {{
            --bg-primary: #1a1a2e;
            --bg-secondary: #16213e;
            --bg-card: #0f3460;
            --text-primary: #e8e8e8;
            --text-secondary: #a0a0a0;
            --accent: #e94560;
            --success: #00d9a5;
            --border: #2a2a4a;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }}
        .container {{ max-width: 1400px; margin: 0 auto; padding: 20px; }}
        nav {{
            background: var(--bg-secondary);
            padding: 15px 20px;
            display: flex;
            align-items: center;
            gap: 30px;
            border-bottom: 1px solid var(--border);
        }}
        nav .logo {{
            font-size: 1.5em;
            font-weight: bold;
            color: var(--accent);
            text-decoration: none;
        }}
        nav a {{ color: var(--text-secondary); text-decoration: none; }}
        nav a:hover {{ color: var(--text-primary); }}
        .card {{
            background: var(--bg-card);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }}
        .card h2 {{ margin-bottom: 15px; color: var(--accent); }}
        .notice {{ border-radius: 8px; padding: 12px 16px; margin-bottom: 20px; }}
        .notice.success {{ background: rgba(0, 217, 165, 0.15); border: 1px solid var(--success); }}
        .notice.error {{ background: rgba(233, 69, 96, 0.15); border: 1px solid var(--accent); }}
        .errorlist {{ color: var(--accent); list-style: none; margin: 6px 0; }}
        input[type=text] {{ width: 60%; padding: 8px; border-radius: 6px; border: 1px solid var(--border); }}
        button {{ padding: 8px 18px; border-radius: 6px; border: none; background: var(--accent); color: white; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid var(--border); }}
        th {{ color: var(--text-secondary); font-weight: 500; }}
        tr:hover {{ background: rgba(255,255,255,0.05); }}
        .ok {{ color: var(--success); }}
        .failed {{ color: var(--accent); }}
    </style>
</head>
<body>
    <nav>
        <a href="/" class="logo">Snapclass</a>
        <a href="/">Analyze</a>
        <a href="/export-csv/">Export CSV</a>
    </nav>
    <main class="container">
        {}
    </main>
</body>
</html>"#, title, content)
}

fn render_index(form: &FormView, notice: Option<&Notice>, results: &[AnalysisRecord]) -> String {
    let notice_html = notice
        .map(|n| {
            format!(
                r#"<div class="notice {}">{}</div>"#,
                if n.is_success() { "success" } else { "error" },
                encode_text(&n.text())
            )
        })
        .unwrap_or_default();

    let content = format!(r#"
        <h1>Image Analysis</h1>
        {}
        <div class="card">
            <h2>Submit</h2>
            {}
        </div>
        <div class="card">
            <h2>Results</h2>
            {}
        </div>
    "#, notice_html, render_form(form), render_results_table(results));

    base_template("Image Analysis", &content)
}

fn render_form(form: &FormView) -> String {
    let errors: String = form.errors.image_path.iter()
        .map(|e| format!("<li>{}</li>", encode_text(e)))
        .collect();
    let errors_html = if errors.is_empty() {
        String::new()
    } else {
        format!(r#"<ul class="errorlist">{}</ul>"#, errors)
    };

    format!(r#"
        <form method="post" action="/">
            {}
            <p>
                <label for="id_image_path">Image file path</label>
                <input type="text" name="image_path" id="id_image_path" maxlength="255" required value="{}">
            </p>
            <p>
                <label for="id_debug_mode">Debug mode</label>
                <input type="checkbox" name="debug_mode" id="id_debug_mode"{}>
            </p>
            <button type="submit">Analyze</button>
        </form>
    "#,
        errors_html,
        encode_double_quoted_attribute(&form.image_path),
        if form.debug_mode { " checked" } else { "" },
    )
}

fn render_results_table(results: &[AnalysisRecord]) -> String {
    if results.is_empty() {
        return "<p>No results yet.</p>".to_string();
    }

    let rows: String = results.iter()
        .map(|r| {
            format!(r#"
                <tr>
                    <td>{}</td>
                    <td class="{}">{}</td>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                </tr>
            "#,
            encode_text(&r.image_path),
            if r.success { "ok" } else { "failed" },
            if r.success { "Success" } else { "Failed" },
            encode_text(r.message.as_deref().unwrap_or("")),
            r.class_id.map(|c| c.to_string()).unwrap_or_default(),
            r.confidence.map(|c| c.to_string()).unwrap_or_default(),
            r.request_timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.response_timestamp.format("%Y-%m-%d %H:%M:%S"),
            )
        })
        .collect();

    format!(r#"
        <table>
            <tr>
                <th>Image Path</th>
                <th>Status</th>
                <th>Message</th>
                <th>Class ID</th>
                <th>Confidence</th>
                <th>Requested</th>
                <th>Responded</th>
            </tr>
            {}
        </table>
    "#, rows)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

/// Start the web server with config and database
pub async fn start_server(config: AppConfig, db: Database) -> Result<()> {
    let classifiers = Classifiers::from_config(&config.classifier)?;
    let state = Arc::new(AppState { db, classifiers });

    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Web UI available at http://{}", addr);
    info!("Classification API: {}", config.classifier.url);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SnapclassError::Server(e.to_string()))?;

    Ok(())
}
