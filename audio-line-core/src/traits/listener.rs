use crate::models::event::LineEvent;

/// Receiver of line and mixer lifecycle events.
///
/// Called synchronously on the thread that performed the transition, before
/// that call returns. Implementations must not block: the line's transition
/// lock is held during dispatch, so a blocking listener stalls every other
/// transition on that line, including `close()`. Listeners may call back
/// into the line that fired the event.
pub trait LineListener: Send + Sync {
    fn update(&self, event: &LineEvent);
}

impl<F> LineListener for F
where
    F: Fn(&LineEvent) + Send + Sync,
{
    fn update(&self, event: &LineEvent) {
        self(event)
    }
}
