pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod mutation;
pub(crate) mod query;
pub(crate) mod state;

use std::sync::Arc;

use anyhow::Context as _;
use entity_common::{JetStreamQueue, PostgresEntityTable, Storage};
use poem::{
    EndpointExt, Route, Server,
    endpoint::BoxEndpoint,
    get,
    http::Method,
    listener::TcpListener,
    middleware::{Cors, Tracing},
    post,
};
use state::AppState;

/// Build the HTTP application.
///
/// CORS is enabled only when `allowed_origins` is not empty.
pub(crate) fn app(state: AppState, allowed_origins: &[String]) -> BoxEndpoint<'static> {
    let api = Route::new()
        .at("/entities", post(mutation::create_entity))
        .at("/entities/:id", get(query::get_entity));

    let app = Route::new().nest("/api", api).data(state).with(Tracing);

    if allowed_origins.is_empty() {
        return app.map_to_response().boxed();
    }

    let cors = allowed_origins.iter().fold(
        Cors::new().allow_methods([Method::GET, Method::POST]),
        |cors, origin| cors.allow_origin(origin.as_str()),
    );

    app.with(cors).map_to_response().boxed()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::parse_config()?;

    let storage = Storage::from_config(config.s3)?.with_public_base_url(config.public_base_url);
    storage
        .check()
        .await
        .context("Failed to access the photo storage")?;

    let table = PostgresEntityTable::connect(&config.database_url)
        .await
        .context("Failed to connect to the entity table")?;
    table
        .ensure()
        .await
        .context("Failed to create the entity table")?;

    let queue = JetStreamQueue::connect(&config.nats_url, config.queue)
        .await
        .context("Failed to connect to the photo queue")?;

    let state = AppState {
        table: Arc::new(table),
        storage: Arc::new(storage),
        queue: Arc::new(queue),
    };

    let app = app(state, &config.allowed_origins);

    tracing::info!(
        "To upload a photo, POST it to http://127.0.0.1:{port}/api/entities",
        port = config.bind_addr.port()
    );

    Server::new(TcpListener::bind(config.bind_addr))
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            None,
        )
        .await
        .context("The HTTP server stopped unexpectedly")?;

    Ok(())
}
