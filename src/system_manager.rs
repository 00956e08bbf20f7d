//! Registry of client systems, advanced through their lifecycle by [`SystemManager::tick`].

use indexmap::IndexMap;

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::clock::{Clock, SystemClock};
use crate::error::EcsError;
use crate::system::{ErrorReport, Phase, System, SystemResult, SystemState};
use crate::TypeKey;

struct Entry {
  system: Box<dyn System>,
  state: SystemState,
  name: &'static str,
}

/// Owns every registered system, keyed by concrete type. Drives them
/// through [`SystemState`] on each [`tick`](Self::tick), scaling the
/// measured wall-clock delta by [`time_scale`](Self::time_scale) and
/// buffering any lifecycle failure as an [`ErrorReport`] instead of
/// propagating it.
pub struct SystemManager {
  systems: IndexMap<TypeKey, Entry>,
  time_scale: f64,
  last_tick: std::time::Instant,
  clock: Box<dyn Clock>,
  errors: Vec<ErrorReport>,
}

impl SystemManager {
  pub fn new() -> Self {
    Self::with_clock(Box::new(SystemClock))
  }

  /// Builds a manager driven by a custom [`Clock`] — the seam tests use to
  /// get a deterministic `Δt` (see [`crate::clock::FakeClock`]).
  pub fn with_clock(clock: Box<dyn Clock>) -> Self {
    Self {
      systems: IndexMap::new(),
      time_scale: 1.0,
      last_tick: clock.now(),
      clock,
      errors: Vec::new(),
    }
  }

  pub fn time_scale(&self) -> f64 {
    self.time_scale
  }

  pub fn set_time_scale(&mut self, scale: f64) {
    self.time_scale = scale;
  }

  /// Registers `system` in state [`SystemState::NotStarted`]. Fails if a
  /// system of this concrete type is already registered.
  pub fn add<S: System>(&mut self, system: S) -> Result<(), EcsError> {
    let key = TypeKey::of::<S>();
    if self.systems.contains_key(&key) {
      return Err(EcsError::SystemAlreadyExisting(std::any::type_name::<S>()));
    }
    self.systems.insert(
      key,
      Entry {
        system: Box::new(system),
        state: SystemState::NotStarted,
        name: std::any::type_name::<S>(),
      },
    );
    Ok(())
  }

  /// Requires the system currently be [`SystemState::Stopped`]; transitions
  /// it to [`SystemState::TearingDown`] (it is actually dropped on a later
  /// `tick`, after its `on_teardown` runs).
  pub fn remove<S: System>(&mut self) -> Result<(), EcsError> {
    let entry = self.entry_mut::<S>()?;
    if entry.state != SystemState::Stopped {
      return Err(EcsError::SystemLogical {
        name: entry.name,
        state: entry.state,
        action: "remove",
      });
    }
    entry.state = SystemState::TearingDown;
    Ok(())
  }

  /// Requires [`SystemState::Running`]; transitions to
  /// [`SystemState::Stopping`].
  pub fn stop<S: System>(&mut self) -> Result<(), EcsError> {
    let entry = self.entry_mut::<S>()?;
    if entry.state != SystemState::Running {
      return Err(EcsError::SystemLogical {
        name: entry.name,
        state: entry.state,
        action: "stop",
      });
    }
    entry.state = SystemState::Stopping;
    Ok(())
  }

  /// `NotStarted` → `Awaking`, or `Stopped` → `Starting`. Any other current
  /// state fails with [`EcsError::SystemLogical`].
  pub fn start<S: System>(&mut self) -> Result<(), EcsError> {
    let entry = self.entry_mut::<S>()?;
    entry.state = match entry.state {
      SystemState::NotStarted => SystemState::Awaking,
      SystemState::Stopped => SystemState::Starting,
      other => {
        return Err(EcsError::SystemLogical {
          name: entry.name,
          state: other,
          action: "start",
        })
      }
    };
    Ok(())
  }

  pub fn state<S: System>(&self) -> Result<SystemState, EcsError> {
    self
      .systems
      .get(&TypeKey::of::<S>())
      .map(|e| e.state)
      .ok_or(EcsError::SystemNotFound(std::any::type_name::<S>()))
  }

  pub fn get<S: System>(&self) -> Result<&S, EcsError> {
    let name = std::any::type_name::<S>();
    self
      .systems
      .get(&TypeKey::of::<S>())
      .ok_or(EcsError::SystemNotFound(name))
      .map(|e| {
        e.system
          .downcast_ref::<S>()
          .expect("type key matched a differently-typed system")
      })
  }

  pub fn get_mut<S: System>(&mut self) -> Result<&mut S, EcsError> {
    let name = std::any::type_name::<S>();
    self
      .systems
      .get_mut(&TypeKey::of::<S>())
      .ok_or(EcsError::SystemNotFound(name))
      .map(|e| {
        e.system
          .downcast_mut::<S>()
          .expect("type key matched a differently-typed system")
      })
  }

  /// Returns every buffered [`ErrorReport`] since the last call, then
  /// clears the buffer.
  pub fn get_errors(&mut self) -> Vec<ErrorReport> {
    std::mem::take(&mut self.errors)
  }

  /// Advances every registered system by at most one lifecycle transition,
  /// in registration order, then erases any system that finished tearing
  /// down.
  ///
  /// `Δt` passed to `on_update` is `(now − last tick) × time_scale`. A
  /// callback that panics is caught and recorded as an `ErrorReport` same
  /// as an `Err` return, rather than unwinding through the tick loop and
  /// taking every other system down with it.
  pub fn tick(&mut self) {
    let now = self.clock.now();
    let dt = now.duration_since(self.last_tick).mul_f64(self.time_scale.max(0.0));
    self.last_tick = now;

    let mut to_erase = Vec::new();
    for (key, entry) in self.systems.iter_mut() {
      match entry.state {
        SystemState::NotStarted | SystemState::Stopped => {}
        SystemState::Awaking => {
          entry.state = match call_guarded(entry.name, Phase::Awake, &mut self.errors, || entry.system.on_awake()) {
            Ok(()) => SystemState::Starting,
            Err(()) => SystemState::NotStarted,
          };
        }
        SystemState::Starting => {
          entry.state = match call_guarded(entry.name, Phase::Start, &mut self.errors, || entry.system.on_start()) {
            Ok(()) => SystemState::Running,
            Err(()) => SystemState::Stopped,
          };
        }
        SystemState::Running => {
          let _ = call_guarded(entry.name, Phase::Update, &mut self.errors, || entry.system.on_update(dt));
        }
        SystemState::Stopping => {
          let _ = call_guarded(entry.name, Phase::Stop, &mut self.errors, || entry.system.on_stop());
          entry.state = SystemState::Stopped;
        }
        SystemState::TearingDown => {
          let _ = call_guarded(entry.name, Phase::Teardown, &mut self.errors, || entry.system.on_teardown());
          to_erase.push(*key);
        }
      }
    }

    for key in to_erase {
      self.systems.shift_remove(&key);
    }
  }

  fn entry_mut<S: System>(&mut self) -> Result<&mut Entry, EcsError> {
    let name = std::any::type_name::<S>();
    self
      .systems
      .get_mut(&TypeKey::of::<S>())
      .ok_or(EcsError::SystemNotFound(name))
  }
}

impl Default for SystemManager {
  fn default() -> Self {
    Self::new()
  }
}

fn record_error(errors: &mut Vec<ErrorReport>, system: &'static str, phase: Phase, message: String) {
  tracing::warn!(system, phase = %phase, message = message.as_str(), "system lifecycle error");
  errors.push(ErrorReport {
    system,
    message,
    phase,
  });
}

/// Runs one lifecycle callback, catching both an `Err` return and a panic,
/// recording either as an [`ErrorReport`]. Returns `Ok(())` only if the
/// callback ran to completion and returned `Ok(())`.
fn call_guarded(
  system: &'static str,
  phase: Phase,
  errors: &mut Vec<ErrorReport>,
  f: impl FnOnce() -> SystemResult,
) -> Result<(), ()> {
  match catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(())) => Ok(()),
    Ok(Err(message)) => {
      record_error(errors, system, phase, message);
      Err(())
    }
    Err(panic) => {
      let message = panic_message(&panic);
      record_error(errors, system, phase, message);
      Err(())
    }
  }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&'static str>() {
    format!("panicked: {s}")
  } else if let Some(s) = panic.downcast_ref::<String>() {
    format!("panicked: {s}")
  } else {
    "panicked with a non-string payload".to_string()
  }
}

/// Per-state shutdown fallthrough a still-registered system receives when
/// the manager itself is torn down, so every system sees a complete,
/// well-ordered lifecycle even if the application never drove it there
/// through `tick`.
fn run_shutdown_sequence(entry: &mut Entry) {
  use SystemState::*;
  match entry.state {
    NotStarted => {}
    Awaking => {
      let _ = entry.system.on_awake();
      let _ = entry.system.on_start();
      let _ = entry.system.on_stop();
      let _ = entry.system.on_teardown();
    }
    Starting => {
      let _ = entry.system.on_start();
      let _ = entry.system.on_stop();
      let _ = entry.system.on_teardown();
    }
    Running | Stopping => {
      let _ = entry.system.on_stop();
      let _ = entry.system.on_teardown();
    }
    Stopped => {
      let _ = entry.system.on_teardown();
    }
    TearingDown => {
      let _ = entry.system.on_teardown();
    }
  }
}

impl Drop for SystemManager {
  /// Runs the shutdown fallthrough above for every remaining system.
  /// Lifecycle failures during manager teardown are swallowed — there's no
  /// caller left to hand an `ErrorReport` to.
  fn drop(&mut self) {
    for entry in self.systems.values_mut() {
      run_shutdown_sequence(entry);
    }
  }
}

impl std::fmt::Debug for SystemManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SystemManager")
      .field("count", &self.systems.len())
      .field("time_scale", &self.time_scale)
      .field("pending_errors", &self.errors.len())
      .finish()
  }
}
