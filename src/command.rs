use crate::error::ConsoleError;
use crate::parser::Call;
use crate::session::Session;
use std::io::Write;

/// A validated console command, ready to run.
///
/// Implemented by every verb via a blanket impl, so the interpreter can hold
/// commands of different types behind one box.
pub trait ExecutableCommand {
    /// Runs the command, writing its result to `out`.
    fn execute(
        self: Box<Self>,
        session: &mut Session,
        out: &mut dyn Write,
    ) -> Result<(), ConsoleError>;
}

/// Creates commands for one verb.
pub trait CommandFactory {
    /// The verb as typed, e.g. `show`.
    fn name(&self) -> &'static str;

    /// One-line usage, e.g. `show <class> <id>`.
    fn usage(&self) -> &'static str;

    /// Text printed by `help <verb>`.
    fn description(&self) -> &'static str;

    /// Validates `call` against the session and builds the command.
    ///
    /// Validation stops at the first failing precondition.
    fn create(
        &self,
        call: Call,
        session: &Session,
    ) -> Result<Box<dyn ExecutableCommand>, ConsoleError>;
}
