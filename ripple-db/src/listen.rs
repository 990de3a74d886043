//! Push channel over Postgres `LISTEN`/`NOTIFY`. Row-level triggers on the
//! subscribed table are expected to `NOTIFY <resource>_changes` on insert,
//! update, and delete; any payload they attach is ignored.

use crate::store::{ChangeEvent, ChangeSubscription, PushChannel, SubscribeError};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const EVENT_BUFFER: usize = 16;

#[must_use]
pub fn notify_channel(resource: &str) -> String {
    format!("{resource}_changes")
}

pub struct PgPushChannel {
    pool: PgPool,
}

impl PgPushChannel {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PushChannel for PgPushChannel {
    async fn subscribe(
        &self,
        resource: &str,
    ) -> Result<Box<dyn ChangeSubscription>, SubscribeError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&notify_channel(resource)).await?;

        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let released = CancellationToken::new();
        tokio::spawn(forward_notifications(listener, events, released.clone()));

        Ok(Box::new(PgSubscription {
            events: receiver,
            released,
        }))
    }
}

struct PgSubscription {
    events: mpsc::Receiver<ChangeEvent>,
    released: CancellationToken,
}

#[async_trait]
impl ChangeSubscription for PgSubscription {
    async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for PgSubscription {
    fn drop(&mut self) {
        self.released.cancel();
    }
}

async fn forward_notifications(
    mut listener: PgListener,
    events: mpsc::Sender<ChangeEvent>,
    released: CancellationToken,
) {
    loop {
        tokio::select! {
            () = released.cancelled() => break,
            notification = listener.recv() => match notification {
                // Every mutation is the same "re-synchronize" signal; the
                // payload is ignored.
                Ok(_) => {
                    if events.send(ChangeEvent).await.is_err() {
                        break;
                    }
                }
                // No internal retry: the subscription surfaces nothing
                // further and the subscriber only goes stale until it
                // re-subscribes.
                Err(error) => {
                    warn!(%error, "Change listener connection lost");
                    break;
                }
            },
        }
    }

    debug!("Change listener stopped");
}

#[cfg(test)]
mod tests {
    use crate::listen::notify_channel;

    #[test]
    fn channel_name_per_resource() {
        assert_eq!(notify_channel("posts"), "posts_changes");
        assert_eq!(notify_channel("likes"), "likes_changes");
    }
}
