//! The crate's unified error type.

use thiserror::Error;

use crate::system::SystemState;

/// Everything that can go wrong calling into this crate.
#[derive(Debug, Error)]
pub enum EcsError {
  /// A handle was dereferenced after its referent was destroyed, or before
  /// it was ever set.
  #[error("handle is invalid: its referent was destroyed or never set")]
  InvalidHandle,

  /// Internal invariant violation: an entity id was already present in the
  /// registry when it was about to be inserted.
  #[error("entity {0:?} is already registered")]
  EntityAlreadyRegistered(crate::id::Id),

  /// A system of this type is already registered.
  #[error("a system of type {0:?} already exists")]
  SystemAlreadyExisting(&'static str),

  /// No system of this type is registered.
  #[error("no system of type {0:?} is registered")]
  SystemNotFound(&'static str),

  /// A lifecycle transition was requested from an incompatible state.
  #[error("cannot {action} a system of type {name:?} while it is {state:?}")]
  SystemLogical {
    name: &'static str,
    state: SystemState,
    action: &'static str,
  },
}

pub type Result<T> = std::result::Result<T, EcsError>;
