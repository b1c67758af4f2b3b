//! Arrow-key nudging of the local selection box.
//!
//! The host's global keydown listener is modelled by [`KeyboardBus`].
//! Registering returns a [`KeyListener`] guard that unregisters itself when
//! dropped, so the listener lives exactly as long as whoever owns the guard
//! (normally a [`KeyNudgeController`]).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::geometry::{BoxPatch, GRID_STEP, GeometryModel, SelectionBox};

/// Nudge distance without modifier.
pub const NUDGE_STEP: f32 = GRID_STEP;

/// Step multiplier while a modifier key is held.
pub const NUDGE_MULTIPLIER: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowKey {
    Left,
    Right,
    Up,
    Down,
}

impl ArrowKey {
    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(ArrowKey::Left),
            "ArrowRight" => Some(ArrowKey::Right),
            "ArrowUp" => Some(ArrowKey::Up),
            "ArrowDown" => Some(ArrowKey::Down),
            _ => None,
        }
    }

    fn direction(self) -> (f32, f32) {
        match self {
            ArrowKey::Left => (-1.0, 0.0),
            ArrowKey::Right => (1.0, 0.0),
            ArrowKey::Up => (0.0, -1.0),
            ArrowKey::Down => (0.0, 1.0),
        }
    }
}

/// A keydown as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    /// Shift (or the platform's equivalent) held.
    pub modifier: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, modifier: bool) -> Self {
        Self {
            key: key.into(),
            modifier,
        }
    }
}

/// Position patch for one nudge of `selection`.
pub fn nudge_patch(
    selection: &SelectionBox,
    key: ArrowKey,
    modifier: bool,
    step: f32,
    multiplier: f32,
) -> BoxPatch {
    let distance = if modifier { step * multiplier } else { step };
    let (dx, dy) = key.direction();
    BoxPatch::position(selection.x + dx * distance, selection.y + dy * distance)
}

/// Keyboard-driven movement of the local box.
pub struct KeyNudgeController {
    step: f32,
    multiplier: f32,
    enabled: bool,
    subscription: Option<KeyListener>,
}

impl Default for KeyNudgeController {
    fn default() -> Self {
        Self::new(NUDGE_STEP, NUDGE_MULTIPLIER)
    }
}

impl std::fmt::Debug for KeyNudgeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyNudgeController")
            .field("step", &self.step)
            .field("multiplier", &self.multiplier)
            .field("enabled", &self.enabled)
            .field("bound", &self.subscription.is_some())
            .finish()
    }
}

impl KeyNudgeController {
    pub fn new(step: f32, multiplier: f32) -> Self {
        Self {
            step,
            multiplier,
            enabled: true,
            subscription: None,
        }
    }

    /// Whether the box is the active interaction target.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Take ownership of the keyboard subscription. A previous one is
    /// released first.
    pub fn bind(&mut self, listener: KeyListener) {
        self.subscription = Some(listener);
    }

    /// Release the keyboard subscription.
    pub fn unbind(&mut self) {
        self.subscription = None;
    }

    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    /// Nudge the box for `input`. No-op for non-arrow keys, while disabled
    /// and while generating.
    pub fn handle_key(
        &self,
        input: &KeyInput,
        generating: bool,
        model: &mut GeometryModel,
    ) -> Option<SelectionBox> {
        if !self.enabled || generating {
            return None;
        }
        let key = ArrowKey::from_key(&input.key)?;
        let patch = nudge_patch(&model.get(), key, input.modifier, self.step, self.multiplier);
        Some(model.update(patch))
    }
}

type Handler = Rc<RefCell<dyn FnMut(&KeyInput)>>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// Host keydown source that listeners attach to.
#[derive(Clone, Default)]
pub struct KeyboardBus {
    inner: Rc<RefCell<BusInner>>,
}

impl KeyboardBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered until the guard is dropped.
    pub fn listen(&self, handler: impl FnMut(&KeyInput) + 'static) -> KeyListener {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let handler: Handler = Rc::new(RefCell::new(handler));
        inner.handlers.push((id, handler));
        KeyListener {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver a keydown to every registered handler. Returns how many ran.
    pub fn dispatch(&self, input: &KeyInput) -> usize {
        // Snapshot so handlers may register or drop listeners.
        let handlers: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            // A handler that dispatches re-entrantly is skipped, not re-run.
            if let Ok(mut call) = handler.try_borrow_mut() {
                (&mut *call)(input);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

/// Registration guard returned by [`KeyboardBus::listen`].
pub struct KeyListener {
    id: u64,
    bus: Weak<RefCell<BusInner>>,
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            if let Ok(mut inner) = bus.try_borrow_mut() {
                inner.handlers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
