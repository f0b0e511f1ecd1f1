//! Chat updates by periodic fetch-and-diff.
//!
//! A subscription re-reads a booking's thread every tick and forwards the
//! messages it has not seen yet. A message sent from the same client shows
//! up on the next tick, not before.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::marketplace::Marketplace;
use crate::models::Message;

const BUFFER: usize = 32;

pub struct ChatSubscription {
    booking_id: String,
    messages: mpsc::Receiver<Message>,
    stop: Option<oneshot::Sender<()>>,
}

impl ChatSubscription {
    pub fn booking_id(&self) -> &str {
        &self.booking_id
    }

    /// Next new message, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Message> {
        self.messages.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for ChatSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts polling `booking_id`. Messages already in the thread are not
/// replayed.
pub fn poll_chat(market: Marketplace, booking_id: impl Into<String>, every: Duration) -> ChatSubscription {
    let booking_id = booking_id.into();
    let (tx, rx) = mpsc::channel(BUFFER);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let id = booking_id.clone();
    tokio::spawn(async move {
        let mut seen = match market.messages(&id).await {
            Ok(existing) => existing.len(),
            Err(e) => {
                warn!("chat poll for booking {id} could not load history: {e}");
                0
            }
        };

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let thread = match market.messages(&id).await {
                        Ok(thread) => thread,
                        Err(e) => {
                            warn!("chat poll for booking {id} failed: {e}");
                            continue;
                        }
                    };
                    if thread.len() <= seen {
                        continue;
                    }
                    let start = seen;
                    seen = thread.len();
                    debug!("chat poll for booking {id} found {} new message(s)", seen - start);
                    for message in thread.into_iter().skip(start) {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
        debug!("chat poll for booking {id} stopped");
    });

    ChatSubscription {
        booking_id,
        messages: rx,
        stop: Some(stop_tx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;
    use std::sync::Arc;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn new_messages_arrive_in_order() {
        let market = Marketplace::new(Arc::new(MemoryRepository::seeded()));
        let mut sub = poll_chat(market.clone(), "b1", TICK);
        assert_eq!(sub.booking_id(), "b1");

        // Give the poller time to take its baseline.
        tokio::time::sleep(TICK * 3).await;
        market.send_message("b1", "c1", "first").await.unwrap();
        market.send_message("b1", "1", "second").await.unwrap();

        let a = timeout(WAIT, sub.next()).await.unwrap().unwrap();
        let b = timeout(WAIT, sub.next()).await.unwrap().unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
    }

    #[tokio::test]
    async fn other_threads_are_ignored() {
        let market = Marketplace::new(Arc::new(MemoryRepository::seeded()));
        let mut sub = poll_chat(market.clone(), "b4", TICK);
        tokio::time::sleep(TICK * 3).await;
        market.send_message("b1", "c1", "not for b4").await.unwrap();

        assert!(timeout(TICK * 10, sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn cancelled_subscription_ends() {
        let market = Marketplace::new(Arc::new(MemoryRepository::seeded()));
        let mut sub = poll_chat(market, "b1", TICK);
        sub.cancel();
        assert!(timeout(WAIT, sub.next()).await.unwrap().is_none());
    }
}
