use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use pressroom::{
    application::{
        comments::CommentService,
        content::ContentQueries,
        error::AppError,
        listing::ListingService,
        pages::{PageScheduler, PostComposer},
        render::{BlockRenderer, TransformRegistry},
        store::ContentStore,
    },
    config::{self, BuildArgs, Settings, StoreBackend},
    infra::{
        error::InfraError,
        export::StaticExporter,
        http::{self, ApiState, HttpState, RouterState},
        images::ImageUrlBuilder,
        store::{MemoryStore, SanityEndpoints, SanityStore},
        telemetry,
    },
    presentation::views::LayoutChrome,
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Build(args) => run_build(settings, args).await,
    }
}

struct ApplicationContext {
    pages: PageScheduler,
    listing: ListingService,
    comments: CommentService,
}

async fn build_application_context(settings: &Settings) -> Result<ApplicationContext, AppError> {
    let store = init_store(settings).await?;
    let images = ImageUrlBuilder::new(
        settings.store.project_id.clone(),
        settings.store.dataset.clone(),
    );
    let chrome = LayoutChrome::new(settings.site.title.clone(), settings.site.tagline.clone());
    let queries = ContentQueries::new(Arc::clone(&store));

    let renderer = Arc::new(BlockRenderer::new(TransformRegistry::with_defaults(
        images.clone(),
    )));
    let pages = PageScheduler::new(
        queries.clone(),
        renderer,
        PostComposer::new(images.clone(), chrome.clone()),
        settings.pages.revalidate,
    );

    Ok(ApplicationContext {
        pages,
        listing: ListingService::new(queries, images, chrome),
        comments: CommentService::new(store),
    })
}

async fn init_store(settings: &Settings) -> Result<Arc<dyn ContentStore>, AppError> {
    let store = &settings.store;
    match store.backend {
        StoreBackend::Sanity => {
            let endpoints = SanityEndpoints::hosted(&store.project_id)?;
            let sanity = SanityStore::new(
                endpoints,
                store.dataset.clone(),
                store.api_version.clone(),
                store.token.clone(),
                store.use_cdn,
                store.timeout,
            )?;
            info!(
                target = "pressroom::store",
                project_id = %store.project_id,
                dataset = %store.dataset,
                "using hosted content store"
            );
            Ok(Arc::new(sanity))
        }
        StoreBackend::Fixture => {
            let memory = MemoryStore::load(&store.fixture_path).await?;
            info!(
                target = "pressroom::store",
                path = %store.fixture_path.display(),
                "using fixture content store"
            );
            Ok(Arc::new(memory))
        }
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    if settings.pages.prebuild {
        let report = app
            .pages
            .prebuild(settings.pages.prebuild_concurrency)
            .await?;
        info!(
            target = "pressroom::pages",
            built = report.built.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "prebuild finished"
        );
    }

    let router = http::build_router(RouterState {
        http: HttpState {
            pages: app.pages,
            listing: app.listing,
            comments: app.comments.clone(),
        },
        api: ApiState {
            comments: app.comments,
        },
    });

    serve_http(&settings, router).await
}

async fn serve_http(settings: &Settings, router: axum::Router) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pressroom::http",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { signal.notified().await });
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut handle => return server_result(joined),
        received = tokio::signal::ctrl_c() => {
            if let Err(err) = received {
                warn!(target = "pressroom::http", error = %err, "failed to listen for shutdown signal");
            }
        }
    }

    info!(target = "pressroom::http", "shutting down");
    shutdown.notify_one();
    drain(handle, settings.server.graceful_shutdown).await
}

async fn drain(
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, handle).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "pressroom::http",
                grace_seconds = grace.as_secs(),
                "connections still open after grace period; exiting"
            );
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_build(settings: Settings, args: BuildArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    info!(
        target = "pressroom::export",
        out = %args.out.display(),
        "starting static build"
    );

    let exporter = StaticExporter::new(app.listing, app.pages);
    let report = exporter.export(&args.out, args.concurrency).await?;
    info!(
        target = "pressroom::export",
        written = report.written.len(),
        "static build completed"
    );
    Ok(())
}
