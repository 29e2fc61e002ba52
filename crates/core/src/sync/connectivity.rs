//! Runtime online/offline signal.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

/// Shared online flag. Every clone observes the same state.
///
/// Subscribers see each change of the flag; a change to `true` is the
/// "became online" event.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    sender: Arc<watch::Sender<bool>>,
}

impl NetworkStatus {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _receiver) = watch::channel(initially_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Update the flag. Returns `true` when the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(
                "[DataSync] Network is now {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_online_reports_only_real_transitions() {
        let status = NetworkStatus::new(false);
        assert!(!status.is_online());
        assert!(status.set_online(true));
        assert!(!status.set_online(true));
        assert!(status.is_online());
    }

    #[tokio::test]
    async fn clones_share_state_and_notify_subscribers() {
        let status = NetworkStatus::new(false);
        let mut receiver = status.subscribe();
        let other = status.clone();

        other.set_online(true);
        receiver.changed().await.expect("sender alive");
        assert!(*receiver.borrow_and_update());
        assert!(status.is_online());
    }
}
