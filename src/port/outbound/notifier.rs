//! Notifier port for engine events.
//!
//! Observers such as the spread monitor, log output and persistence hooks
//! subscribe through this trait.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{MarketPhase, Position, Quote, QuotePair};

/// Events emitted by the engine.
#[derive(Debug, Clone)]
pub enum Event {
    /// A venue produced a fresh quote.
    QuoteReceived(Quote),
    /// A long/short pairing was evaluated for a phase.
    QuotePairEvaluated {
        pair: QuotePair,
        phase: MarketPhase,
    },
    /// Both entry orders were accepted by their venues.
    EntryOrdersPlaced(Position),
    /// Both entry orders filled.
    EntryOrdersFilled(Position),
    /// Both exit orders were accepted by their venues.
    ExitOrdersPlaced(Position),
    /// A position left the registry without completing.
    PositionRemoved(Position),
    /// A position completed its exit.
    PositionClosed(Position),
    /// The engine switched to exit processing for open positions.
    ProcessExit,
}

impl Event {
    /// Short name for log output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QuoteReceived(_) => "quote_received",
            Self::QuotePairEvaluated { .. } => "quote_pair_evaluated",
            Self::EntryOrdersPlaced(_) => "entry_orders_placed",
            Self::EntryOrdersFilled(_) => "entry_orders_filled",
            Self::ExitOrdersPlaced(_) => "exit_orders_placed",
            Self::PositionRemoved(_) => "position_removed",
            Self::PositionClosed(_) => "position_closed",
            Self::ProcessExit => "process_exit",
        }
    }
}

/// Trait for notification handlers.
///
/// Implementations must be thread-safe and return quickly; slow work should
/// be spawned onto the runtime.
pub trait Notifier: Send + Sync {
    /// Handle an event.
    fn notify(&self, event: &Event);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, event: &Event) {
        (**self).notify(event);
    }
}

/// Registry of notifiers (composite pattern).
///
/// Broadcasts events to all registered notifiers. A notifier that panics is
/// logged and does not prevent the others from running.
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { notifiers: vec![] }
    }

    /// Register a notifier.
    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Append every notifier of `other`, keeping its order.
    pub fn extend(&mut self, other: NotifierRegistry) {
        self.notifiers.extend(other.notifiers);
    }

    /// Notify all registered notifiers in registration order.
    pub fn notify_all(&self, event: &Event) {
        for notifier in &self.notifiers {
            if catch_unwind(AssertUnwindSafe(|| notifier.notify(event))).is_err() {
                error!(event = event.name(), "Notifier panicked");
            }
        }
    }

    /// Number of registered notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A no-op notifier for testing or when notifications are disabled.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &Event) {}
}

/// A logging notifier that logs position lifecycle events via tracing.
///
/// Quote-level events are too frequent for info output and are skipped.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &Event) {
        match event {
            Event::QuoteReceived(_) | Event::QuotePairEvaluated { .. } => {}
            Event::EntryOrdersPlaced(p) => {
                info!(
                    position = %p.id(),
                    long = %p.long(),
                    short = %p.short(),
                    exposure = %p.exposure(),
                    "Entry orders placed"
                );
            }
            Event::EntryOrdersFilled(p) => {
                info!(position = %p.id(), "Entry orders filled\n{}", p.entry_info());
            }
            Event::ExitOrdersPlaced(p) => {
                info!(position = %p.id(), "Exit orders placed");
            }
            Event::PositionRemoved(p) => {
                info!(position = %p.id(), "Position removed");
            }
            Event::PositionClosed(p) => {
                info!(position = %p.id(), "Position closed\n{}", p.exit_info());
            }
            Event::ProcessExit => {
                info!("Processing exits for open positions");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl Notifier for Counting {
        fn notify(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    impl Notifier for Panicking {
        fn notify(&self, _event: &Event) {
            panic!("boom");
        }
    }

    #[test]
    fn registry_broadcasts_to_all() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(Arc::clone(&counter)));
        registry.register(Box::new(Arc::clone(&counter)));
        registry.notify_all(&Event::ProcessExit);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn panicking_notifier_does_not_stop_others() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(Panicking));
        registry.register(Box::new(Arc::clone(&counter)));
        registry.notify_all(&Event::ProcessExit);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_registry() {
        let registry = NotifierRegistry::default();
        assert!(registry.is_empty());
        registry.notify_all(&Event::ProcessExit);
    }
}
