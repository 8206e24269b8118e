use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use keyhole_core::Store;
use keyhole_gateway::grpc::{GrpcAuth, ShortenerGrpcServer};
use keyhole_gateway::middleware::subnet::TrustedSubnet;
use keyhole_gateway::{app, AppState, Config};
use keyhole_identity::Identity;
use keyhole_proto_schema::v1::shortener_server::ShortenerServer;
use keyhole_shortener::{Mediator, NanoSlugGenerator, ShortenerService, SlugSettings};
use keyhole_storage::{FileStore, PgStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    info!(
        server_address = %config.server_address,
        base_url = %config.base_url,
        use_grpc = config.use_grpc,
        "keyhole starting"
    );
    if config.enable_https {
        warn!("enable_https is set but TLS termination is not handled in-process");
    }

    let shutdown = CancellationToken::new();

    let store: Arc<dyn Store> = match &config.database_dsn {
        Some(dsn) => {
            info!("using postgres storage");
            PgStore::open(dsn, shutdown.clone())
                .await
                .context("opening postgres storage")?
        }
        None => {
            info!(path = %config.file_storage_path, "using file storage");
            Arc::new(
                FileStore::open(&config.file_storage_path, shutdown.clone())
                    .await
                    .context("opening file storage")?,
            )
        }
    };

    let identity = Arc::new(Identity::new(&config.user_key));
    let generator = NanoSlugGenerator::new(SlugSettings::builder().build());
    let service = ShortenerService::new(Arc::clone(&store), Box::new(generator));
    let mediator = Arc::new(Mediator::new(service, config.base_url.clone()));

    let trusted_subnet = config.trusted_subnet.as_deref().and_then(|cidr| {
        let subnet = TrustedSubnet::parse(cidr);
        if subnet.is_none() {
            warn!(cidr, "trusted subnet did not parse; stats endpoint will reject all callers");
        }
        subnet
    });

    if config.use_grpc {
        let addr: SocketAddr = config
            .server_address
            .parse()
            .context("parsing server_address as a socket address")?;
        let auth = GrpcAuth::new(Arc::clone(&identity), config.auth_key.clone());
        let grpc = ShortenerGrpcServer::new(Arc::clone(&mediator), auth);

        info!(listen_addr = %addr, "serving gRPC front");
        tonic::transport::Server::builder()
            .add_service(ShortenerServer::new(grpc))
            .serve_with_shutdown(addr, shutdown_signal())
            .await?;
    } else {
        let state = AppState::builder()
            .mediator(Arc::clone(&mediator))
            .identity(Arc::clone(&identity))
            .auth_key(config.auth_key.clone())
            .trusted_subnet(trusted_subnet)
            .build();

        let listener = tokio::net::TcpListener::bind(&config.server_address)
            .await
            .context("binding listen endpoint")?;
        info!(listen_addr = %listener.local_addr()?, "serving HTTP front");

        let app = app::router(state).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    // Cancel the process-wide token: the deletion pipeline performs its
    // final flush and the journal watcher syncs; then release the back-end.
    shutdown.cancel();
    store.close().await.context("closing storage")?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
