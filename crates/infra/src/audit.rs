//! Buffering audit sink.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use coachgate_auth::{AuditEvent, AuditSink};

/// Keeps the most recent events in memory and forwards each one to an
/// optional downstream sink.
///
/// Oldest events are dropped once `capacity` is reached; recording never
/// blocks on the downstream or fails.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    forward: Option<Arc<dyn AuditSink>>,
}

impl InMemoryAuditSink {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
            forward: None,
        }
    }

    pub fn forwarding_to(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.forward = Some(sink);
        self
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(q) => q.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Some(forward) = &self.forward {
            forward.record(event.clone());
        }
        let mut q = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if q.len() == self.capacity {
            q.pop_front();
        }
        q.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coachgate_auth::{AuditKind, RequestMeta};

    fn event(path: &str) -> AuditEvent {
        AuditEvent::new(
            AuditKind::PrincipalResolution,
            None,
            &RequestMeta::new("GET", path),
            "allowed",
            Utc::now(),
        )
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let sink = InMemoryAuditSink::new(2);
        sink.record(event("/a"));
        sink.record(event("/b"));
        sink.record(event("/c"));

        let paths: Vec<_> = sink.events().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/b", "/c"]);
    }

    #[test]
    fn forwards_every_event() {
        let downstream = Arc::new(InMemoryAuditSink::default());
        let sink = InMemoryAuditSink::new(1).forwarding_to(downstream.clone());
        sink.record(event("/a"));
        sink.record(event("/b"));

        assert_eq!(sink.len(), 1);
        assert_eq!(downstream.len(), 2);
    }
}
