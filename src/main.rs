use std::{process, sync::Arc};

use cairn::{
    application::{content::DocumentService, error::AppError},
    config,
    content::{self, ContentTree, PublishedContentRefresher, PublishedContentStore},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    messaging::{
        BatchedServerMessenger, HttpRefreshTransport, LocalIdentity, MessagingConfig,
        RefreshReceiver, RefreshTransport, RefresherRegistry,
    },
    routing::{ReservedPathRegistry, ReservedPaths, RoutableDocumentFilter, RouteRegistry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    telemetry::describe_metrics();

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    serve_http(&settings, state).await
}

fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let tree = match settings.content.snapshot_path.as_deref() {
        Some(path) => content::snapshot::load(path)?,
        None => {
            info!("No content snapshot configured; starting with an empty tree");
            ContentTree::new(Vec::new()).map_err(|err| AppError::unexpected(err.to_string()))?
        }
    };
    let store = Arc::new(PublishedContentStore::new(
        tree,
        settings.content.hide_top_level_node_from_path,
        settings.content.route_cache_limit,
    ));

    let refreshers = Arc::new(RefresherRegistry::new().with(Arc::new(
        PublishedContentRefresher::new(store.clone(), settings.content.snapshot_path.clone()),
    )));

    let messaging = MessagingConfig::from(&settings.messaging);
    let identity = LocalIdentity::detect(&messaging.application_id);
    let transport: Arc<dyn RefreshTransport> = Arc::new(HttpRefreshTransport::new(
        messaging.call_timeout,
        messaging.credentials.clone(),
    )?);
    let credentials = messaging.credentials.clone();
    info!(
        distributed = messaging.distributed_enabled,
        mode = ?messaging.mode,
        servers = messaging.servers.len(),
        "Cache refresh messaging configured"
    );
    let messenger = Arc::new(BatchedServerMessenger::new(
        messaging,
        refreshers.clone(),
        transport,
        identity.clone(),
    ));
    let receiver = Arc::new(RefreshReceiver::new(refreshers, identity));

    let reserved_paths = Arc::new(ReservedPathRegistry::new());
    let reserved = ReservedPaths::new(
        &settings.routing.reserved_urls,
        &settings.routing.reserved_paths,
        &settings.routing.virtual_root,
        reserved_paths.clone(),
    );
    let routes = RouteRegistry::with_routes(http::app_routes().iter().map(String::as_str))
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let filter = Arc::new(RoutableDocumentFilter::new(
        reserved,
        &settings.routing.document_extension,
        Arc::new(routes),
    ));

    let documents = Arc::new(DocumentService::new(
        store,
        settings.content.clone(),
        &settings.routing.document_extension,
    ));

    Ok(HttpState {
        documents,
        messenger,
        receiver,
        filter,
        reserved_paths,
        credentials,
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
