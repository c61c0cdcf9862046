use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::model::settings::Settings;
use crate::model::width::Width;
use crate::ops::resolver::Trigger;

/// Quiet period after a note activation before resolving it.
pub const ACTIVATION_DELAY: Duration = Duration::from_millis(300);

/// Quiet period after a width control changes before writing the edit.
pub const EDIT_DELAY: Duration = Duration::from_millis(250);

/// Collapses a burst of events into one, fired after a quiet period.
///
/// Scheduling while a payload is pending replaces it and restarts the
/// timer. Time is always passed in, so callers own the clock.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload` to fire at `now + delay`. Returns the payload it superseded.
    pub fn schedule(&mut self, now: Instant, payload: T) -> Option<T> {
        self.pending
            .replace((now + self.delay, payload))
            .map(|(_, old)| old)
    }

    /// Take the pending payload if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.as_ref().is_some_and(|(deadline, _)| *deadline <= now) {
            return self.pending.take().map(|(_, p)| p);
        }
        None
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, p)| p)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A resolution the event layer wants run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    /// Resolve the note that just became active
    Activate(PathBuf),
    /// Write the user's width to the active note
    UserEdit,
}

impl Run {
    pub fn trigger(&self) -> Trigger {
        match self {
            Run::Activate(_) => Trigger::Navigation,
            Run::UserEdit => Trigger::UserEdit,
        }
    }
}

/// Turns host events into debounced resolver runs.
#[derive(Debug)]
pub struct EventHandler {
    activation: Debouncer<PathBuf>,
    edit: Debouncer<()>,
    user_input_triggered: bool,
}

impl Default for EventHandler {
    fn default() -> Self {
        EventHandler::new(ACTIVATION_DELAY, EDIT_DELAY)
    }
}

impl EventHandler {
    pub fn new(activation_delay: Duration, edit_delay: Duration) -> Self {
        EventHandler {
            activation: Debouncer::new(activation_delay),
            edit: Debouncer::new(edit_delay),
            user_input_triggered: false,
        }
    }

    /// The host switched to `note`.
    pub fn on_active_note_changed(&mut self, now: Instant, note: PathBuf) {
        if let Some(superseded) = self.activation.schedule(now, note) {
            debug!(note = %superseded.display(), "activation superseded");
        }
    }

    /// A width control moved to `width`.
    ///
    /// The width becomes the current `width_percentage` immediately. A
    /// user-edit run is scheduled only when a per-note source is enabled;
    /// returns whether one was.
    pub fn on_width_input(&mut self, now: Instant, settings: &mut Settings, width: Width) -> bool {
        settings.width_percentage = width;
        if !settings.any_source_enabled() {
            return false;
        }
        self.user_input_triggered = true;
        self.edit.schedule(now, ());
        true
    }

    /// Text typed into the width box, read leniently.
    pub fn on_text_input(&mut self, now: Instant, settings: &mut Settings, text: &str) -> (Width, bool) {
        let width = Width::parse_input(text);
        let scheduled = self.on_width_input(now, settings, width);
        (width, scheduled)
    }

    pub fn user_input_triggered(&self) -> bool {
        self.user_input_triggered
    }

    /// Runs whose quiet period has elapsed, earliest deadline first.
    ///
    /// A user-edit run clears the one-shot input flag as it fires.
    pub fn poll(&mut self, now: Instant) -> Vec<Run> {
        let mut due: Vec<(Instant, Run)> = Vec::new();
        if let Some(deadline) = self.activation.deadline()
            && let Some(note) = self.activation.poll(now)
        {
            due.push((deadline, Run::Activate(note)));
        }
        if let Some(deadline) = self.edit.deadline()
            && self.edit.poll(now).is_some()
        {
            self.user_input_triggered = false;
            due.push((deadline, Run::UserEdit));
        }
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, run)| run).collect()
    }

    /// The earliest pending deadline, for sizing a wait.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.activation.deadline(), self.edit.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn cancel_all(&mut self) {
        self.activation.cancel();
        self.edit.cancel();
        self.user_input_triggered = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debouncer_fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(100));
        assert_eq!(d.schedule(t0, 1), None);
        assert_eq!(d.poll(t0 + ms(99)), None);
        assert_eq!(d.poll(t0 + ms(100)), Some(1));
        assert_eq!(d.poll(t0 + ms(500)), None);
    }

    #[test]
    fn debouncer_supersedes_and_restarts() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(100));
        d.schedule(t0, "a");
        assert_eq!(d.schedule(t0 + ms(80), "b"), Some("a"));
        assert_eq!(d.deadline(), Some(t0 + ms(180)));
        assert_eq!(d.poll(t0 + ms(150)), None);
        assert_eq!(d.poll(t0 + ms(180)), Some("b"));
    }

    #[test]
    fn debouncer_cancel_drops_pending() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(10));
        d.schedule(t0, ());
        assert!(d.is_pending());
        assert_eq!(d.cancel(), Some(()));
        assert_eq!(d.poll(t0 + ms(20)), None);
    }

    #[test]
    fn activation_burst_resolves_last_note_only() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        handler.on_active_note_changed(t0, "a.md".into());
        handler.on_active_note_changed(t0 + ms(100), "b.md".into());
        handler.on_active_note_changed(t0 + ms(200), "c.md".into());
        assert!(handler.poll(t0 + ms(450)).is_empty());
        assert_eq!(
            handler.poll(t0 + ms(500)),
            vec![Run::Activate("c.md".into())]
        );
    }

    #[test]
    fn width_input_schedules_one_shot_user_edit() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        let mut settings = Settings::default();
        assert!(handler.on_width_input(t0, &mut settings, Width::clamped(40)));
        assert!(handler.on_width_input(t0 + ms(100), &mut settings, Width::clamped(45)));
        assert_eq!(settings.width_percentage, Width::clamped(45));
        assert!(handler.user_input_triggered());

        assert!(handler.poll(t0 + ms(300)).is_empty());
        let runs = handler.poll(t0 + ms(350));
        assert_eq!(runs, vec![Run::UserEdit]);
        assert_eq!(runs[0].trigger(), Trigger::UserEdit);
        assert!(!handler.user_input_triggered());
        assert!(handler.poll(t0 + ms(1000)).is_empty());
    }

    #[test]
    fn width_input_without_sources_only_updates_current_width() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        let mut settings = Settings {
            enable_save_width_individually: false,
            enable_yaml_width: false,
            ..Default::default()
        };
        assert!(!handler.on_width_input(t0, &mut settings, Width::clamped(70)));
        assert_eq!(settings.width_percentage, Width::clamped(70));
        assert!(handler.next_deadline().is_none());
    }

    #[test]
    fn width_input_with_only_yaml_source_still_schedules() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        let mut settings = Settings {
            enable_save_width_individually: false,
            ..Default::default()
        };
        assert!(handler.on_width_input(t0, &mut settings, Width::clamped(70)));
    }

    #[test]
    fn text_input_above_range_clamps() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        let mut settings = Settings::default();
        let (width, scheduled) = handler.on_text_input(t0, &mut settings, "120");
        assert_eq!(width, Width::MAX);
        assert!(scheduled);
        let (width, _) = handler.on_text_input(t0, &mut settings, "abc");
        assert_eq!(width, Width::MIN);
    }

    #[test]
    fn poll_orders_runs_by_deadline() {
        let t0 = Instant::now();
        let mut handler = EventHandler::default();
        let mut settings = Settings::default();
        handler.on_active_note_changed(t0, "a.md".into());
        handler.on_width_input(t0 + ms(10), &mut settings, Width::clamped(50));
        assert_eq!(handler.next_deadline(), Some(t0 + ms(260)));
        assert_eq!(
            handler.poll(t0 + ms(400)),
            vec![Run::UserEdit, Run::Activate("a.md".into())]
        );
    }
}
