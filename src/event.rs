//! A type-indexed publish/subscribe bus.
//!
//! This is the mechanism [`crate::handle`] uses to let handles notice their
//! referent was destroyed: nothing holds a registry of outstanding handles
//! anywhere, a handle is just another listener on a `*Destroyed` event.
//!
//! [`EventManager`] is itself a cheap, `Clone`-able handle around shared
//! interior-mutable state (`Rc<RefCell<_>>`), not a value callers pass
//! `&mut` references to. That's deliberate: an [`crate::handle::EntityHandle`]
//! needs to deregister its listener in its own `Drop` impl, and `Drop::drop`
//! takes no extra arguments — it can only reach state the value already
//! owns. Cloning an `EventManager` clones the handle, not the bus; every
//! clone observes the same listeners.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::id::{Id, IdAllocator};
use crate::TypeKey;

type Callback = Box<dyn FnMut(&dyn Any)>;

/// The callback lives behind its own `Rc<RefCell<_>>` so `emit` can take a
/// cheap clone of it to invoke without holding the manager's own `RefCell`
/// borrowed for the duration of the call. That's what lets a callback call
/// back into `add_listener`/`remove_listener` (on the same bucket it's
/// being dispatched from) without the removal going missing: the listener's
/// entry in the map is never detached from the map while it's running, so
/// `remove_listener` sees and removes the real entry immediately.
struct Listener {
  id: Id,
  callback: Rc<RefCell<Callback>>,
}

#[derive(Default)]
struct Inner {
  ids: IdAllocator,
  listeners: AHashMap<TypeKey, Vec<Listener>>,
}

/// A type-indexed, synchronous publish/subscribe bus.
///
/// Listeners are invoked in registration order. `emit` snapshots the
/// *order* of the bucket for the event type before iterating (so additions
/// made mid-dispatch are only observed starting with the next `emit` of
/// that event type), but the listeners themselves stay registered in the
/// map the whole time — a callback that calls `remove_listener` (including
/// removing itself) takes effect immediately instead of being silently
/// lost and re-inserted after dispatch.
#[derive(Clone, Default)]
pub struct EventManager(Rc<RefCell<Inner>>);

impl EventManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `callback` to run every time an `Event` is emitted, and
  /// returns an id that can later be passed to [`remove_listener`](Self::remove_listener).
  pub fn add_listener<Event: 'static>(&self, mut callback: impl FnMut(&Event) + 'static) -> Id {
    let mut inner = self.0.borrow_mut();
    let id = inner.ids.alloc();
    let erased: Callback = Box::new(move |event: &dyn Any| {
      let event = event
        .downcast_ref::<Event>()
        .expect("event type key did not match the downcast target");
      callback(event);
    });
    inner
      .listeners
      .entry(TypeKey::of::<Event>())
      .or_default()
      .push(Listener {
        id,
        callback: Rc::new(RefCell::new(erased)),
      });
    id
  }

  /// Removes a previously registered listener. A no-op if `id` is not
  /// currently registered (already removed, or never valid).
  pub fn remove_listener(&self, id: Id) {
    if !id.is_valid() {
      return;
    }
    let mut inner = self.0.borrow_mut();
    for bucket in inner.listeners.values_mut() {
      if let Some(pos) = bucket.iter().position(|l| l.id == id) {
        bucket.remove(pos);
        inner.ids.release(id);
        return;
      }
    }
  }

  /// Invokes every listener registered for `Event` at the time of the
  /// call, in registration order.
  pub fn emit<Event: 'static>(&self, event: &Event) {
    let key = TypeKey::of::<Event>();
    let snapshot: Vec<Rc<RefCell<Callback>>> = {
      let inner = self.0.borrow();
      inner
        .listeners
        .get(&key)
        .map(|bucket| bucket.iter().map(|l| l.callback.clone()).collect())
        .unwrap_or_default()
    };
    tracing::trace!(event = key.name(), listeners = snapshot.len(), "emit");

    for callback in &snapshot {
      // A listener that triggers a nested `emit` of the same event type
      // from within its own callback would try to borrow this same cell
      // twice; skip rather than panic; such a listener is still the one
      // that just asked for the nested emit, so it isn't silently missed,
      // just not reentered.
      if let Ok(mut callback) = callback.try_borrow_mut() {
        (*callback)(event);
      } else {
        tracing::warn!(event = key.name(), "skipped reentrant listener invocation");
      }
    }
  }
}

impl std::fmt::Debug for EventManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.0.try_borrow() {
      Ok(inner) => f
        .debug_struct("EventManager")
        .field("listener_buckets", &inner.listeners.len())
        .finish(),
      Err(_) => f
        .debug_struct("EventManager")
        .field("listener_buckets", &"<borrowed>")
        .finish(),
    }
  }
}
