use crate::{
    DictionaryStore, Language, ResultFormatter, SearchConfig, SearchError, SearchOrchestrator,
    SearchOutcome,
};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;

const MAX_LIMIT: usize = 50;

pub struct AppState {
    pub store: Arc<dyn DictionaryStore>,
    pub default_search: SearchConfig,
}

/// Tailwind classes shared by every page.
#[derive(Debug, Clone, Copy)]
struct PageStyle {
    body: &'static str,
    main: &'static str,
    card: &'static str,
    headline: &'static str,
    lede: &'static str,
    input: &'static str,
    button: &'static str,
}

const STYLE: PageStyle = PageStyle {
    body: "bg-slate-50 text-slate-900",
    main: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
    card: "max-w-4xl w-full space-y-6",
    headline: "text-4xl font-extrabold tracking-tight",
    lede: "text-lg text-slate-600",
    input: "flex-1 rounded-md border border-slate-300 px-3 py-2",
    button: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800",
};

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub search: SearchConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, store: Arc<dyn DictionaryStore>) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        store,
        default_search: config.search,
    });
    let router = build_router(state);
    info!(%config.addr, limit = config.search.fuzzy_limit, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::EmptyQuery => ApiError::bad_request(err.to_string()),
            SearchError::StoreUnavailable(_) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search_html))
        .route("/api/search", get(api_search))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    let template = HomeTemplate {
        style: STYLE,
        examples: ["håfa", "ta'otao", "guma'", "gupu~"]
            .into_iter()
            .map(|word| ExampleLink {
                word,
                href: search_path(word, Language::Chamoru),
            })
            .collect(),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "diksionariu-web" }))
}

async fn search_html(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let formatter = ResultFormatter::new(state.default_search.partial_display_limit);
    let (query, language, limit) = match parse_search_params(&params) {
        Ok(parsed) => parsed,
        Err(err) => return Html(render_error_page(err.message)),
    };
    let results_html = match run_search(&state, query.clone(), language, limit).await {
        Ok(outcome) => formatter.render(&outcome),
        Err(SearchFailure::Search(err)) => formatter.render_error(&err),
        Err(SearchFailure::Join(message)) => {
            return Html(render_error_page(message));
        }
    };
    let other = match language {
        Language::Chamoru => Language::English,
        Language::English => Language::Chamoru,
    };
    let template = SearchTemplate {
        style: STYLE,
        query: &query,
        language,
        english: language == Language::English,
        switch_href: search_path(&query, other),
        switch_label: match other {
            Language::Chamoru => "Search in Chamoru",
            Language::English => "Search in English",
        },
        results_html,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponsePayload>, ApiError> {
    let (query, language, limit) = parse_search_params(&params)?;
    let outcome = run_search(&state, query.clone(), language, limit)
        .await
        .map_err(|failure| match failure {
            SearchFailure::Search(err) => ApiError::from(err),
            SearchFailure::Join(message) => ApiError::internal(message),
        })?;
    let html = ResultFormatter::new(state.default_search.partial_display_limit).render(&outcome);
    Ok(Json(SearchResponsePayload {
        query,
        language,
        outcome,
        html,
    }))
}

enum SearchFailure {
    Search(SearchError),
    Join(String),
}

/// Searches on the blocking pool; store calls are synchronous.
async fn run_search(
    state: &SharedState,
    query: String,
    language: Language,
    limit: Option<usize>,
) -> Result<SearchOutcome, SearchFailure> {
    let mut config = state.default_search;
    if let Some(limit) = limit {
        config = config.with_limit(limit);
    }
    let search = SearchOrchestrator::new(Arc::clone(&state.store), config);
    let joined = tokio::task::spawn_blocking(move || search.search(&query, language)).await;
    match joined {
        Ok(result) => result.map_err(|err| {
            if let SearchError::StoreUnavailable(cause) = &err {
                warn!(error = %cause, "dictionary store failed");
            }
            SearchFailure::Search(err)
        }),
        Err(err) => Err(SearchFailure::Join(format!("search task failed: {err}"))),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    lang: Option<Language>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: String,
    language: Language,
    outcome: SearchOutcome,
    html: String,
}

fn parse_search_params(
    params: &SearchParams,
) -> Result<(String, Language, Option<usize>), ApiError> {
    let query = params
        .q
        .as_ref()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `q` is required"))?;
    let limit = params.limit.map(|limit| limit.clamp(1, MAX_LIMIT));
    Ok((query.to_string(), params.lang.unwrap_or_default(), limit))
}

fn render_error_page(message: impl Into<String>) -> String {
    let message = escape_html(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Diksionariu • Error</title>
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
        body_class = STYLE.body,
        main_class = STYLE.main,
        card_class = STYLE.card,
        headline_class = STYLE.headline,
        lede_class = STYLE.lede,
        button_class = STYLE.button,
    )
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn search_path(query: &str, language: Language) -> String {
    let lang = match language {
        Language::Chamoru => "ch",
        Language::English => "en",
    };
    format!("/search?q={}&lang={lang}", encode_component(query))
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct ExampleLink {
    word: &'static str,
    href: String,
}

const PAGE_HEAD: &str = r#"<meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <style>
      .highlight { background: #fde68a; }
      .no-result { color: #b91c1c; }
      .minor-content { font-size: 0.9em; color: #475569; }
      .match-strength { display: inline-block; width: 5em; margin-right: 0.5em; background: #e2e8f0; }
      .match-strength-bar { height: 0.6em; background: #0f766e; }
      .fuzzy-container-columns { columns: 2; }
      .ex-eng { font-style: italic; margin-bottom: 0.5em; }
    </style>"#;

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    {{ self.head()|safe }}
    <title>Diksionariu • Chamoru-English Dictionary</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="{{ style.body }}">
    <main class="{{ style.main }}">
      <div class="{{ style.card }}">
        <h1 class="{{ style.headline }}">Diksionariu</h1>
        <p class="{{ style.lede }}">Search Chamoru headwords or English definitions. Use * and ? as wildcards, or end a word with ~ for near matches.</p>
        <form action="/search" method="get" class="flex gap-2">
          <input type="search" name="q" class="{{ style.input }}" placeholder="håfa" autofocus>
          <select name="lang" class="rounded-md border border-slate-300 px-2">
            <option value="ch" selected>Chamoru</option>
            <option value="en">English</option>
          </select>
          <button type="submit" class="{{ style.button }}">Search</button>
        </form>
        <p>
          Try:
          {% for example in examples %}
          <a href="{{ example.href }}" class="text-blue-700 hover:underline">{{ example.word }}</a>
          {% endfor %}
        </p>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate {
    style: PageStyle,
    examples: Vec<ExampleLink>,
}

impl HomeTemplate {
    fn head(&self) -> &'static str {
        PAGE_HEAD
    }
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    {{ self.head()|safe }}
    <title>Diksionariu • {{ query }}</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="{{ style.body }}">
    <main class="{{ style.main }}">
      <div class="{{ style.card }}">
        <form action="/search" method="get" class="flex gap-2">
          <input type="search" name="q" value="{{ query }}" class="{{ style.input }}">
          <select name="lang" class="rounded-md border border-slate-300 px-2">
            <option value="ch"{% if !english %} selected{% endif %}>Chamoru</option>
            <option value="en"{% if english %} selected{% endif %}>English</option>
          </select>
          <button type="submit" class="{{ style.button }}">Search</button>
        </form>
        <p><a href="{{ switch_href }}" class="text-blue-700 hover:underline">{{ switch_label }}</a></p>
        <section id="results" data-lang="{{ language }}">
          {{ results_html|safe }}
        </section>
      </div>
    </main>
    <script>
      document.addEventListener("click", function (event) {
        var link = event.target.closest("a[data-query]");
        if (!link) return;
        event.preventDefault();
        var lang = link.getAttribute("data-lang") || "ch";
        window.location.href = "/search?q=" + encodeURIComponent(link.getAttribute("data-query")) + "&lang=" + lang;
      });
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    style: PageStyle,
    query: &'a str,
    language: Language,
    english: bool,
    switch_href: String,
    switch_label: &'static str,
    results_html: String,
}

impl SearchTemplate<'_> {
    fn head(&self) -> &'static str {
        PAGE_HEAD
    }
}
