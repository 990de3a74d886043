//! Headless feed watcher: connects to the backend, loads the feed for the
//! configured session, and logs every update pushed by the change channel
//! until interrupted.

use ripple_common::model::{feed::FeedScope, session::Session};
use ripple_db::client::PgStore;
use ripple_db::listen::PgPushChannel;
use ripple_db::object::HttpObjectStore;
use ripple_db::store::{
    FeedStore, ObjectStore, POSTS_RESOURCE, StoreError, SubscribeError,
};
use ripple_feed::notifier::ChangeNotifier;
use ripple_feed::profile::ProfileManager;
use ripple_feed::sync::FeedSynchronizer;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error parsing storage url: {0}")]
    StorageUrl(#[from] url::ParseError),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] StoreError),
    #[error("Error subscribing to change notifications: {0}")]
    Subscribe(#[from] SubscribeError),
    #[error("Error waiting for shutdown signal: {0}")]
    Signal(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    database_url: String,
    storage_url: String,
    storage_bucket: String,
    storage_api_key: String,
    session_user_id: String,
    session_email: String,
    /// Watch a single author's feed instead of the global one.
    feed_author: Option<String>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ripple_feed=debug,ripple_db=debug,ripple_common=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let pool = ripple_db::client::connect(&env.database_url).await?;
    let store: Arc<dyn FeedStore> = Arc::new(PgStore::new(pool.clone()));
    let push_channel = PgPushChannel::new(pool);
    let objects: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
        Url::parse(&env.storage_url)?,
        env.storage_bucket,
        env.storage_api_key,
    ));

    let session = Session::new(env.session_user_id, env.session_email);
    let profiles = ProfileManager::new(store.clone(), objects, session.clone());
    match profiles.profile().await {
        Ok(profile) => info!(username = profile.username.get(), "Signed in"),
        Err(error) => warn!(%error, "Could not load the session profile"),
    }

    let scope = match env.feed_author {
        Some(author) => FeedScope::author(author),
        None => FeedScope::Global,
    };
    let sync = Arc::new(FeedSynchronizer::new(store, session, scope));

    if let Err(error) = sync.refresh().await {
        warn!(%error, "Initial feed fetch failed, showing nothing until the next change");
    }
    info!(posts = sync.posts().len(), "Feed loaded");

    let notifier = ChangeNotifier::spawn(&push_channel, POSTS_RESOURCE, sync.clone()).await?;

    let mut feed = sync.watch();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(InitError::Signal)?;
                break;
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = feed.borrow_and_update();
                info!(phase = ?state.phase, posts = state.posts.len(), "Feed updated");
            }
        }
    }

    info!("Shutting down");
    notifier.shutdown().await;
    sync.close();

    Ok(())
}
