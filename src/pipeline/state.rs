use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Sender;

use crate::types::GestureState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureUpdate {
    Proximity {
        sequence: u64,
        state: GestureState,
        distance: Option<f32>,
    },
    Mouth {
        sequence: u64,
        open: bool,
        ratio: Option<f32>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HolderSnapshot {
    pub sequence: u64,
    pub state: GestureState,
    pub distance: Option<f32>,
    pub mouth_open: bool,
}

/// Published gesture state, owned by whoever renders it.
///
/// The classifier worker writes through `set_gesture_state` and
/// `set_mouth_state`; readers poll `current` or listen for changes.
#[derive(Clone, Default)]
pub struct GestureStateHolder {
    inner: Arc<Mutex<HolderSnapshot>>,
    listener: Option<Sender<GestureUpdate>>,
}

impl GestureStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes are also sent to `listener`. A full channel drops the update.
    pub fn with_listener(listener: Sender<GestureUpdate>) -> Self {
        Self {
            inner: Arc::default(),
            listener: Some(listener),
        }
    }

    pub fn current(&self) -> HolderSnapshot {
        *self.lock()
    }

    /// Stores the new flag. Returns true when it differs from the previous one.
    pub fn set_gesture_state(&self, sequence: u64, active: bool, distance: Option<f32>) -> bool {
        let changed = {
            let mut inner = self.lock();
            let changed = inner.state.active != active;
            inner.sequence = sequence;
            inner.state = GestureState::from(active);
            inner.distance = distance;
            changed
        };

        if changed {
            self.notify(GestureUpdate::Proximity {
                sequence,
                state: GestureState::from(active),
                distance,
            });
        }
        changed
    }

    pub fn set_mouth_state(&self, sequence: u64, open: bool, ratio: Option<f32>) -> bool {
        let changed = {
            let mut inner = self.lock();
            let changed = inner.mouth_open != open;
            inner.sequence = sequence;
            inner.mouth_open = open;
            changed
        };

        if changed {
            self.notify(GestureUpdate::Mouth {
                sequence,
                open,
                ratio,
            });
        }
        changed
    }

    fn notify(&self, update: GestureUpdate) {
        if let Some(listener) = &self.listener {
            if listener.try_send(update).is_err() {
                log::debug!("dropping gesture update, listener full or gone");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HolderSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
