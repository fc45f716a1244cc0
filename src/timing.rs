use std::time::{Duration, Instant};

pub const CLICK_DISAMBIGUATION: Duration = Duration::from_millis(400);
pub const HOVER_EXIT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);
pub const ZOOM_PERSIST_DEBOUNCE: Duration = Duration::from_millis(200);

/// Trailing-edge debounce driven by explicit timestamps.
///
/// `trigger` (re)arms the deadline, `poll` reports the deadline passing exactly once.
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickAction<T> {
    Single(T),
    Double(T),
}

/// Separates single from double clicks on the same surface.
///
/// A click is held back for the disambiguation window. A second click inside the
/// window discards the held one and reports a double click instead.
#[derive(Clone, Debug)]
pub struct ClickDisambiguator<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> ClickDisambiguator<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn register(&mut self, target: T, now: Instant) -> Option<ClickAction<T>> {
        match self.pending.take() {
            Some((_, at)) if now.saturating_duration_since(at) < self.window => {
                Some(ClickAction::Double(target))
            }
            Some((held, _)) => {
                self.pending = Some((target, now));
                Some(ClickAction::Single(held))
            }
            None => {
                self.pending = Some((target, now));
                None
            }
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<ClickAction<T>> {
        let due = matches!(
            &self.pending,
            Some((_, at)) if now.saturating_duration_since(*at) >= self.window
        );
        if !due {
            return None;
        }
        self.pending.take().map(|(held, _)| ClickAction::Single(held))
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, at)| (*at + self.window).saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(HOVER_EXIT_DEBOUNCE);

        debounce.trigger(start);
        assert!(!debounce.poll(start + Duration::from_millis(499)));
        assert!(debounce.poll(start + Duration::from_millis(500)));
        assert!(!debounce.poll(start + Duration::from_millis(900)));
    }

    #[test]
    fn retrigger_pushes_deadline_and_cancel_disarms() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(RESIZE_DEBOUNCE);

        debounce.trigger(start);
        debounce.trigger(start + Duration::from_millis(150));
        assert!(!debounce.poll(start + Duration::from_millis(250)));
        assert!(debounce.poll(start + Duration::from_millis(350)));

        debounce.trigger(start);
        debounce.cancel();
        assert!(!debounce.is_pending());
        assert!(!debounce.poll(start + Duration::from_secs(5)));
    }

    #[test]
    fn lone_click_becomes_single_exactly_once() {
        let start = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_DISAMBIGUATION);

        assert_eq!(clicks.register("A", start), None);
        assert_eq!(clicks.poll(start + Duration::from_millis(399)), None);
        assert_eq!(
            clicks.poll(start + Duration::from_millis(400)),
            Some(ClickAction::Single("A"))
        );
        assert_eq!(clicks.poll(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn two_quick_clicks_become_one_double_and_no_single() {
        let start = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_DISAMBIGUATION);

        assert_eq!(clicks.register("A", start), None);
        assert_eq!(
            clicks.register("A", start + Duration::from_millis(250)),
            Some(ClickAction::Double("A"))
        );
        assert_eq!(clicks.poll(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn late_second_click_flushes_the_first() {
        let start = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_DISAMBIGUATION);

        clicks.register("A", start);
        assert_eq!(
            clicks.register("B", start + Duration::from_millis(450)),
            Some(ClickAction::Single("A"))
        );
        assert_eq!(
            clicks.poll(start + Duration::from_millis(900)),
            Some(ClickAction::Single("B"))
        );
    }
}
