//! Keyboard-style controls shared with the main loop through atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ToggleRedaction,
    Quit,
}

/// Blocking source of user input, driven from its own thread.
pub trait InputController: Send + 'static {
    /// Wait for the next event. `Ok(None)` means the input has closed.
    fn next_event(&mut self) -> Result<Option<InputEvent>>;
}

/// Redaction on/off flag written by the input thread and read once per
/// frame by the main loop.
#[derive(Debug, Clone)]
pub struct RedactionSwitch(Arc<AtomicBool>);

impl RedactionSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}

/// Quit request checked by the main loop between frames.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Start a listener thread for `controller`.
///
/// An unavailable controller is not fatal: the failure is logged, no thread
/// is started and the switch keeps its current state.
pub fn spawn_listener<C: InputController>(
    controller: Result<C>,
    switch: RedactionSwitch,
    stop: StopSignal,
) -> Option<JoinHandle<()>> {
    let mut controller = match controller {
        Ok(controller) => controller,
        Err(err) => {
            warn!(
                %err,
                redacting = switch.is_enabled(),
                "input controller unavailable; redaction toggle disabled"
            );
            return None;
        }
    };

    let spawned = thread::Builder::new()
        .name("blurtrack-input".into())
        .spawn(move || {
            loop {
                match controller.next_event() {
                    Ok(Some(InputEvent::ToggleRedaction)) => {
                        if switch.toggle() {
                            info!("Blurring is activated.");
                        } else {
                            info!("Blurring is deactivated.");
                        }
                    }
                    Ok(Some(InputEvent::Quit)) => {
                        stop.request();
                        break;
                    }
                    Ok(None) => {
                        debug!("input closed");
                        break;
                    }
                    Err(err) => {
                        warn!(%err, "input controller failed; redaction toggle disabled");
                        break;
                    }
                }
            }
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(%err, "could not start input listener; redaction toggle disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<InputEvent>);

    impl InputController for Scripted {
        fn next_event(&mut self) -> Result<Option<InputEvent>> {
            Ok(self.0.pop_front())
        }
    }

    #[test]
    fn test_switch_toggle() {
        let switch = RedactionSwitch::new(true);
        assert!(!switch.toggle());
        assert!(!switch.is_enabled());
        assert!(switch.toggle());
        switch.set(false);
        assert!(!switch.is_enabled());
    }

    #[test]
    fn test_listener_applies_events() {
        let switch = RedactionSwitch::new(true);
        let stop = StopSignal::new();
        let events = VecDeque::from([
            InputEvent::ToggleRedaction,
            InputEvent::ToggleRedaction,
            InputEvent::ToggleRedaction,
            InputEvent::Quit,
        ]);
        let handle = spawn_listener(Ok(Scripted(events)), switch.clone(), stop.clone()).unwrap();
        handle.join().unwrap();

        assert!(!switch.is_enabled());
        assert!(stop.is_requested());
    }

    #[test]
    fn test_unavailable_controller_degrades() {
        let switch = RedactionSwitch::new(true);
        let stop = StopSignal::new();
        let controller: Result<Scripted> = Err(Error::InputUnavailable("no keyboard".into()));
        assert!(spawn_listener(controller, switch.clone(), stop.clone()).is_none());
        assert!(switch.is_enabled());
        assert!(!stop.is_requested());
    }
}
