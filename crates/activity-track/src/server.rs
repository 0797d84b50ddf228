//! HTTP surface and process lifecycle.
//!
//! One router is served on every configured port. Shutdown stops the
//! listeners, waits for acknowledged batches to be persisted, then closes
//! the store.

use crate::config::ServerConfig;
use crate::dead_letter::DeadLetterSink;
use crate::error::{Error, Result};
use crate::ingest::{self, IngestState};
use crate::storage::SqliteStore;
use axum::Router;
use axum::routing::post;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

/// Pages that all render the same document
const PAGE_ROUTES: [&str; 3] = ["/1.html", "/2.html", "/3.html"];

/// Build the router for one set of paths
pub fn router(state: IngestState, config: &ServerConfig) -> Router {
    let index = config.index_page();

    let mut router = Router::new()
        .route("/track", post(ingest::track))
        .route_service("/tracker", ServeFile::new(config.tracker_asset()));
    for page in PAGE_ROUTES {
        router = router.route_service(page, ServeFile::new(&index));
    }

    router
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A server with its store open and its listeners bound
pub struct Server {
    store: Arc<SqliteStore>,
    state: IngestState,
    app: Router,
    listeners: Vec<TcpListener>,
}

impl Server {
    /// Open the store and bind every listener. Fails fast on either.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_path, config.connect_timeout)?);
        tracing::info!(path = %config.db_path.display(), "store opened");

        let dead_letter = match &config.dead_letter {
            Some(path) => DeadLetterSink::to_file(path),
            None => DeadLetterSink::log_only(),
        };
        let state = IngestState::new(store.clone(), dead_letter);
        let app = router(state.clone(), config);

        let mut listeners = Vec::new();
        for addr in config.listen_addrs() {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| Error::Bind { addr, source })?;
            listeners.push(listener);
        }

        Ok(Self {
            store,
            state,
            app,
            listeners,
        })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    /// Serve until `shutdown` resolves or a listener fails, then drain
    /// pending writes and close the store.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            store,
            state,
            app,
            listeners,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut servers = JoinSet::new();
        for listener in listeners {
            let addr = listener.local_addr()?;
            tracing::info!("listening on http://{addr}");

            let app = app.clone();
            let mut stop = stop_rx.clone();
            servers.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.wait_for(|stopped| *stopped).await;
                    })
                    .await
            });
        }

        let outcome = tokio::select! {
            () = shutdown => Ok(()),
            Some(joined) = servers.join_next() => Err(listener_failure(joined)),
        };

        let _ = stop_tx.send(true);
        while let Some(joined) = servers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("listener stopped with error: {e}"),
                Err(e) => tracing::warn!("listener task failed: {e}"),
            }
        }

        let pending = state.pending();
        if pending > 0 {
            tracing::info!(pending, "waiting for pending writes");
        }
        state.drain().await;

        // Close runs even after a listener failure; its error wins
        let closed = store.close();
        match &closed {
            Ok(()) => tracing::info!("store closed"),
            Err(e) => tracing::error!("failed to close store: {e}"),
        }
        closed.and(outcome)
    }
}

type Joined = std::result::Result<std::io::Result<()>, tokio::task::JoinError>;

fn listener_failure(joined: Joined) -> Error {
    match joined {
        Ok(Ok(())) => Error::Server("listener stopped unexpectedly".to_string()),
        Ok(Err(e)) => Error::Server(e.to_string()),
        Err(e) => Error::Server(e.to_string()),
    }
}

/// Run until SIGINT or SIGTERM
pub async fn run(config: &ServerConfig) -> Result<()> {
    let server = Server::bind(config).await?;
    server.run_until(shutdown_signal()).await
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to setup signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to setup SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutting down gracefully...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use std::path::Path;
    use tower::ServiceExt;
    use track_agent::EventRecord;

    struct NullStore;

    impl Store for NullStore {
        fn insert_one(&self, _: &EventRecord) -> Result<()> {
            Ok(())
        }

        fn insert_many(&self, _: &[EventRecord]) -> Result<()> {
            Ok(())
        }
    }

    fn site(root: &Path) -> ServerConfig {
        let public = root.join("public");
        let client = root.join("dist").join("client");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::create_dir_all(&client).unwrap();
        std::fs::write(public.join("index.html"), "<html>index</html>").unwrap();
        std::fs::write(public.join("style.css"), "body {}").unwrap();
        std::fs::write(client.join("tracker.js"), "// tracker").unwrap();

        ServerConfig {
            public_dir: public,
            dist_dir: root.join("dist"),
            db_path: root.join("activity-track.db"),
            html_port: 0,
            js_port: 0,
            host: "127.0.0.1".parse().unwrap(),
            ..Default::default()
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::ORIGIN, "http://localhost:50000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    fn app(config: &ServerConfig) -> Router {
        let state = IngestState::new(Arc::new(NullStore), DeadLetterSink::log_only());
        router(state, config)
    }

    #[tokio::test]
    async fn test_numbered_pages_serve_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());

        for page in PAGE_ROUTES {
            let (status, body) = get(app(&config), page).await;
            assert_eq!(status, StatusCode::OK, "{page}");
            assert_eq!(body, "<html>index</html>");
        }
    }

    #[tokio::test]
    async fn test_tracker_asset_and_static_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());

        let (status, body) = get(app(&config), "/tracker").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "// tracker");

        let (status, body) = get(app(&config), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body {}");

        let (status, _) = get(app(&config), "/missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_is_permissive() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());

        let response = app(&config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/track")
                    .header(header::ORIGIN, "http://localhost:50000")
                    .body(Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_run_until_closes_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());

        let server = Server::bind(&config).await.unwrap();
        assert_eq!(server.local_addrs().len(), 1);
        let store = server.store.clone();

        server.run_until(async {}).await.unwrap();
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_bind_fails_when_store_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = site(dir.path());
        // A directory is not a database file
        config.db_path = dir.path().to_path_buf();

        let err = Server::bind(&config).await.err().unwrap();
        assert!(matches!(err, Error::Database(_)), "{err}");
    }
}
