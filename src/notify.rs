use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Fire-and-forget sink for transient user messages.
pub trait Notifier {
    fn notify(&mut self, message: &str, severity: Severity);
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    pub created: Instant,
}

/// Toasts waiting to be drawn, oldest first. Expired toasts are dropped on [`Toasts::prune`].
#[derive(Debug)]
pub struct Toasts {
    queue: VecDeque<Toast>,
    ttl: Duration,
    capacity: usize,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            ttl,
            capacity: 8,
        }
    }

    pub fn push_at(&mut self, message: &str, severity: Severity, now: Instant) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            message: message.to_string(),
            severity,
            created: now,
        });
    }

    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.queue.retain(|t| now.saturating_duration_since(t.created) < ttl);
    }

    /// The newest live toast.
    pub fn latest(&self) -> Option<&Toast> {
        self.queue.back()
    }

    pub fn dismiss(&mut self) {
        self.queue.pop_back();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => log::error!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Success | Severity::Info => log::info!("{message}"),
        }
        self.push_at(message, severity, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_ttl() {
        let mut toasts = Toasts::new(Duration::from_secs(5));
        let start = Instant::now();
        toasts.push_at("first", Severity::Info, start);
        toasts.push_at("second", Severity::Success, start + Duration::from_secs(3));

        toasts.prune(start + Duration::from_secs(4));
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts.latest().map(|t| t.message.as_str()), Some("second"));

        toasts.prune(start + Duration::from_secs(6));
        assert_eq!(toasts.len(), 1);

        toasts.dismiss();
        assert!(toasts.latest().is_none());
    }

    #[test]
    fn queue_is_bounded() {
        let mut toasts = Toasts::new(Duration::from_secs(60));
        for i in 0..20 {
            toasts.notify(&format!("msg {i}"), Severity::Info);
        }
        assert_eq!(toasts.len(), 8);
        assert_eq!(toasts.latest().map(|t| t.message.as_str()), Some("msg 19"));
    }
}
