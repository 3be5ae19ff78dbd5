//! Recording sessions and the registry that owns them

mod controls;
mod registry;
mod state;

pub use controls::Control;
pub use registry::{RegistryOptions, RegistrySnapshot, SessionRegistry};
pub use state::{Download, Session};
