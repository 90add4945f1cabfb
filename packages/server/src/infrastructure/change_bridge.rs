//! ストアの変更フィード → ルームへのブロードキャスト
//!
//! ## 設計ノート
//!
//! ライブなルームごとに購読タスクを高々 1 つ持ちます。ルームで最初の入室が
//! [`ChangeBridge::ensure`] で購読を開始し、ルームを削除した退出が
//! [`ChangeBridge::release`] で停止します。
//!
//! - ロックはルーム単位です。あるルームのストア呼び出しが遅くても、
//!   他のルームの ensure / release は待たされません。
//! - release はルームのロック内でレジストリを再確認するため、最後の退出と
//!   競合した入室があれば購読は維持されます。
//! - 初回の購読は ensure の中で行うため、入室処理の完了後に書き込まれた
//!   更新は取りこぼしません。
//! - 壊れたフィードは [`RetryPolicy`] に従って再購読し、上限に達すると
//!   タスクは終了します。次の入室で新しい購読が開始されます。

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures_util::StreamExt;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::{ChangeFeed, MeetingId, MeetingStore, StoreError};

use super::{hub::BroadcastHub, registry::ConnectionRegistry};

/// Re-subscription policy for a broken change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before each re-subscription
    pub delay: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

/// Subscription state of one room.
///
/// A retired slot has been removed from the bridge map; an `ensure` that
/// finds one starts over with a fresh slot.
#[derive(Default)]
struct Slot {
    task: Option<JoinHandle<()>>,
    retired: bool,
}

impl Slot {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

pub struct ChangeBridge {
    store: Arc<dyn MeetingStore>,
    hub: Arc<BroadcastHub>,
    registry: Arc<ConnectionRegistry>,
    subscriptions: Mutex<HashMap<MeetingId, Arc<Mutex<Slot>>>>,
    retry: RetryPolicy,
}

impl ChangeBridge {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        hub: Arc<BroadcastHub>,
        registry: Arc<ConnectionRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            hub,
            registry,
            subscriptions: Mutex::new(HashMap::new()),
            retry,
        }
    }

    /// Start the room's subscription unless one is already running.
    ///
    /// Returns `true` when a subscription was started.
    pub async fn ensure(&self, meeting_id: &MeetingId) -> bool {
        loop {
            let slot = self
                .subscriptions
                .lock()
                .await
                .entry(meeting_id.clone())
                .or_default()
                .clone();

            // 部屋ごとのロックだけを保持したままストアを呼ぶ
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            if guard.is_running() {
                return false;
            }

            let initial = match self.store.watch_changes(meeting_id).await {
                Ok(feed) => Some(feed),
                Err(e) => {
                    tracing::warn!("Failed to subscribe to changes of '{}': {}", meeting_id, e);
                    None
                }
            };

            guard.task = Some(tokio::spawn(run_subscription(
                meeting_id.clone(),
                initial,
                self.store.clone(),
                self.hub.clone(),
                self.retry,
            )));
            tracing::debug!("Change subscription for '{}' started", meeting_id);
            return true;
        }
    }

    /// Stop the room's subscription if the room no longer exists.
    ///
    /// Returns `true` when a subscription was stopped.
    pub async fn release(&self, meeting_id: &MeetingId) -> bool {
        let Some(slot) = self.subscriptions.lock().await.get(meeting_id).cloned() else {
            return false;
        };

        let mut guard = slot.lock().await;
        if guard.retired || self.registry.contains_room(meeting_id).await {
            return false;
        }
        guard.retired = true;

        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions
            .get(meeting_id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            subscriptions.remove(meeting_id);
        }
        drop(subscriptions);

        match guard.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("Change subscription for '{}' stopped", meeting_id);
                true
            }
            None => false,
        }
    }

    /// Number of subscriptions still running
    #[cfg(test)]
    pub(crate) async fn active_count(&self) -> usize {
        let slots: Vec<_> = self.subscriptions.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_running() {
                count += 1;
            }
        }
        count
    }

    #[cfg(test)]
    pub(crate) async fn is_subscribed(&self, meeting_id: &MeetingId) -> bool {
        let slot = self.subscriptions.lock().await.get(meeting_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.is_running(),
            None => false,
        }
    }
}

impl Drop for ChangeBridge {
    fn drop(&mut self) {
        for (_, slot) in self.subscriptions.get_mut().drain() {
            // ensure / release は &self を借用するため、ここで競合するロックはない
            if let Ok(mut guard) = slot.try_lock()
                && let Some(task) = guard.task.take()
            {
                task.abort();
            }
        }
    }
}

async fn run_subscription(
    meeting_id: MeetingId,
    initial: Option<ChangeFeed>,
    store: Arc<dyn MeetingStore>,
    hub: Arc<BroadcastHub>,
    retry: RetryPolicy,
) {
    let mut feed = initial;
    let mut failures: u32 = 0;

    loop {
        if let Some(mut changes) = feed.take() {
            let reason = loop {
                match changes.next().await {
                    Some(Ok(meeting)) => {
                        failures = 0;
                        let delivered = hub.notify_room_updated(&meeting).await;
                        tracing::debug!(
                            "room_updated for '{}' delivered to {} member(s)",
                            meeting_id,
                            delivered
                        );
                    }
                    Some(Err(e)) => break e,
                    None => break StoreError::ChangeFeed("feed ended".to_string()),
                }
            };
            tracing::warn!("Change feed for '{}' broke: {}", meeting_id, reason);
        }

        failures += 1;
        if failures > retry.max_attempts {
            tracing::error!(
                "Giving up on change feed for '{}' after {} attempt(s)",
                meeting_id,
                retry.max_attempts
            );
            return;
        }

        tokio::time::sleep(retry.delay).await;
        match store.watch_changes(&meeting_id).await {
            Ok(changes) => feed = Some(changes),
            Err(e) => {
                tracing::warn!(
                    "Re-subscription {} for '{}' failed: {}",
                    failures,
                    meeting_id,
                    e
                );
            }
        }
    }
}
