//! Client-defined behavior, advanced through a fixed lifecycle by
//! [`crate::system_manager::SystemManager::tick`].

use std::time::Duration;

use downcast::{downcast, Any};

/// The result type every lifecycle callback returns. `Err` carries a
/// human-readable failure message; the tick loop turns it into an
/// [`ErrorReport`] rather than propagating it.
pub type SystemResult = Result<(), String>;

/// A client-defined object advanced through a five-callback lifecycle.
///
/// All five callbacks default to a no-op success — most systems only care
/// about one or two phases. Registered and looked up by concrete type
/// through [`crate::system_manager::SystemManager`].
pub trait System: Any {
  fn on_awake(&mut self) -> SystemResult {
    Ok(())
  }

  fn on_start(&mut self) -> SystemResult {
    Ok(())
  }

  fn on_update(&mut self, _dt: Duration) -> SystemResult {
    Ok(())
  }

  fn on_stop(&mut self) -> SystemResult {
    Ok(())
  }

  fn on_teardown(&mut self) -> SystemResult {
    Ok(())
  }
}
downcast!(dyn System);

/// The lifecycle phase a system callback ran in, recorded on an
/// [`ErrorReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Awake,
  Start,
  Update,
  Stop,
  Teardown,
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Phase::Awake => "awake",
      Phase::Start => "start",
      Phase::Update => "update",
      Phase::Stop => "stop",
      Phase::Teardown => "teardown",
    };
    f.write_str(s)
  }
}

/// A system's position in its lifecycle. At most one transition is applied
/// per [`tick`](crate::system_manager::SystemManager::tick), so a
/// callback's return is always observable by the next tick before the next
/// callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
  NotStarted,
  Awaking,
  Starting,
  Running,
  Stopping,
  Stopped,
  TearingDown,
}

impl std::fmt::Display for SystemState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      SystemState::NotStarted => "not started",
      SystemState::Awaking => "awaking",
      SystemState::Starting => "starting",
      SystemState::Running => "running",
      SystemState::Stopping => "stopping",
      SystemState::Stopped => "stopped",
      SystemState::TearingDown => "tearing down",
    };
    f.write_str(s)
  }
}

/// One system lifecycle callback failing. Buffered by
/// [`crate::system_manager::SystemManager`] and drained by
/// [`crate::system_manager::SystemManager::get_errors`]; does not halt the
/// tick loop.
#[derive(Debug, Clone)]
pub struct ErrorReport {
  /// The concrete system type's name, since the system itself may no
  /// longer exist by the time a client inspects this report (a
  /// `TearingDown` error is recorded in the same tick the system is
  /// dropped).
  pub system: &'static str,
  pub message: String,
  pub phase: Phase,
}

impl std::fmt::Display for ErrorReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} failed during {}: {}",
      self.system, self.phase, self.message
    )
  }
}
