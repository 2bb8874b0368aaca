use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use cmdrun_model::JobId;
use tracing::debug;

use crate::{
    error::ApiError,
    handler::ApiHandler,
    types::{CommandHelpResponse, CommandRequest, RunCommandResponse, StartCommandResponse},
};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /api/v1/commands - List commands with help
    /// - POST /api/v1/commands/start - Start a command in the background
    /// - POST /api/v1/commands/run - Run a command and wait for it
    /// - GET /api/v1/commands/status/{id} - Poll a started command
    /// - GET /api/v1/commands/{name}/help - Help text of one command
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/commands", get(list_commands::<H>))
            .route("/api/v1/commands/start", post(start_command::<H>))
            .route("/api/v1/commands/run", post(run_command::<H>))
            .route("/api/v1/commands/status/{id}", get(command_status::<H>))
            .route("/api/v1/commands/{name}/help", get(command_help::<H>))
            .with_state(self.handler)
    }
}

/// Command name and argument string of a request body.
fn parse_request(body: Result<Json<CommandRequest>, JsonRejection>) -> Result<(String, String), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let command = req
        .command
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("command is required".into()))?;
    Ok((command, req.arguments.unwrap_or_default()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/commands
async fn list_commands<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.list_commands().await?))
}

/// POST /api/v1/commands/start
async fn start_command<H>(
    State(handler): State<Arc<H>>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let (command, arguments) = parse_request(body)?;
    let id = handler.start_command(&command, &arguments).await?;
    debug!(target: "cmdrun.api", %command, job = %id, "command started");

    Ok(Json(StartCommandResponse {
        command_id: id.to_string(),
    }))
}

/// POST /api/v1/commands/run
async fn run_command<H>(
    State(handler): State<Arc<H>>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let (command, arguments) = parse_request(body)?;
    let record = handler.run_command(&command, &arguments).await?;

    Ok(Json(RunCommandResponse {
        output: record.output,
        error: record.error,
    }))
}

/// GET /api/v1/commands/status/{id}
async fn command_status<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let id = JobId::from(id);
    Ok(Json(handler.command_status(&id).await?))
}

/// GET /api/v1/commands/{name}/help
async fn command_help<H>(
    State(handler): State<Arc<H>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let help = handler.command_help(&name).await?;
    Ok(Json(CommandHelpResponse { name, help }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use cmdrun_core::{
        CommandIo, FlushPolicy, HelpCache, JobContext, JobService, MemoryCache, Operation,
        OperationError, OperationRegistry, StatusStore, StoreLimits, TaskExecutor,
        catalog::DEFAULT_HELP_TTL, metrics::noop_metrics,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::adapter::JobServiceAdapter;

    struct Greet;

    #[async_trait]
    impl Operation for Greet {
        fn name(&self) -> &str {
            "with_args_command"
        }
        fn group(&self) -> &str {
            "test_app"
        }
        fn help(&self) -> &str {
            "Greets someone."
        }
        fn usage(&self) -> Option<String> {
            Some("name [--shout]".into())
        }
        async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
            let name = args
                .first()
                .ok_or_else(|| OperationError::Usage("the following arguments are required: name".into()))?;
            let greeting = format!("Hello, {name}!");
            if args.iter().any(|a| a == "--shout") {
                io.outln(greeting.to_uppercase());
            } else {
                io.outln(greeting);
            }
            Ok(())
        }
    }

    async fn serve() -> String {
        let store = StatusStore::new(std::sync::Arc::new(MemoryCache::default()), StoreLimits::default());
        let catalog: std::sync::Arc<dyn cmdrun_core::Catalog> =
            std::sync::Arc::new(OperationRegistry::new().with(Greet).unwrap());
        let executor = TaskExecutor::new(JobContext {
            store: store.clone(),
            catalog: catalog.clone(),
            flush: FlushPolicy::default(),
            metrics: noop_metrics(),
        });
        let help = HelpCache::new(store.backend().clone(), Some(DEFAULT_HELP_TTL));
        let service = JobService::new(store, Arc::new(executor), catalog, help, noop_metrics());
        let router = HttpApi::new(Arc::new(JobServiceAdapter::new(Arc::new(service)))).router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn poll(client: &reqwest::Client, base: &str, id: &str) -> Value {
        for _ in 0..100 {
            let status: Value = client
                .get(format!("{base}/api/v1/commands/status/{id}"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if status["finished"] == json!(true) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("command {id} did not finish");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_and_poll_over_http() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/v1/commands/start"))
            .json(&json!({"command": "with_args_command", "arguments": "TestName --shout"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let id = body["command_id"].as_str().unwrap().to_string();

        let status = poll(&client, &base, &id).await;
        assert!(status["output"].as_str().unwrap().contains("TESTNAME"));
        assert_eq!(status["error"], json!(""));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_command_finishes_with_error() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/api/v1/commands/start"))
            .json(&json!({"command": "nonexistent_command", "arguments": ""}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let status = poll(&client, &base, body["command_id"].as_str().unwrap()).await;
        assert!(!status["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_id_is_not_found_sentinel() {
        let base = serve().await;
        let resp = reqwest::get(format!("{base}/api/v1/commands/status/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": "not found", "finished": true}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_start_requests_are_client_errors() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let missing = client
            .post(format!("{base}/api/v1/commands/start"))
            .json(&json!({"arguments": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 400);
        let body: Value = missing.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("command is required"));

        let garbage = client
            .post(format!("{base}/api/v1/commands/start"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(garbage.status(), 400);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listing_help_and_inline_run() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let list: Value = client
            .get(format!("{base}/api/v1/commands"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            list,
            json!([{
                "name": "with_args_command",
                "app": "test_app",
                "help": "Greets someone.\n\nUsage: name [--shout]"
            }])
        );

        let help = client
            .get(format!("{base}/api/v1/commands/nope/help"))
            .send()
            .await
            .unwrap();
        assert_eq!(help.status(), 404);

        let run: Value = client
            .post(format!("{base}/api/v1/commands/run"))
            .json(&json!({"command": "with_args_command"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(run["output"], json!(""));
        assert!(run["error"].as_str().unwrap().contains("required: name"));
    }
}
