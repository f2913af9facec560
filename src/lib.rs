//! A small console for typed business objects kept in a JSON file.
//!
//! Lines are read in one of two equivalent grammars, `show User 1234` or
//! `User.show("1234")`, validated against a [`Registry`] of known types and
//! executed against an [`ObjectStore`] that mirrors every live [`Entity`] to
//! disk.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`] and
//! [`session`] expose the traits and state needed to plug in additional verbs.

pub mod command;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod registry;
pub mod session;
pub mod store;
mod interpreter;
mod verbs;

pub use error::{ConsoleError, ModelError, RegistryError, StoreError};
/// Just a convenient re-export of the interactive console.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, PROMPT};
pub use model::{Attributes, Entity};
pub use registry::Registry;
pub use session::Session;
pub use store::ObjectStore;
