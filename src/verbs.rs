use crate::command::{CommandFactory, ExecutableCommand};
use crate::error::{ArgumentKind, ConsoleError, ModelError};
use crate::interpreter::Factory;
use crate::lexer::Token;
use crate::model::{self, Attributes, Entity};
use crate::parser::{self, Call};
use crate::session::Session;
use log::{debug, info};
use serde_json::Value;
use std::io::Write;

/// Verbs known to the console at compile time.
///
/// A verb validates its [`Call`] up front in [`Verb::from_call`], so by the
/// time [`Verb::execute`] runs every precondition has already been checked.
pub(crate) trait Verb: Sized {
    /// Canonical name of the verb, e.g. "show".
    fn name() -> &'static str;

    fn usage() -> &'static str;

    /// Help text for `help <verb>`.
    fn description() -> &'static str;

    /// Checks preconditions in order and keeps what `execute` needs.
    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError>;

    fn execute(self, session: &mut Session, out: &mut dyn Write) -> Result<(), ConsoleError>;
}

impl<T: Verb> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        session: &mut Session,
        out: &mut dyn Write,
    ) -> Result<(), ConsoleError> {
        T::execute(*self, session, out)
    }
}

impl<T: Verb + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn usage(&self) -> &'static str {
        T::usage()
    }

    fn description(&self) -> &'static str {
        T::description()
    }

    fn create(
        &self,
        call: Call,
        session: &Session,
    ) -> Result<Box<dyn ExecutableCommand>, ConsoleError> {
        Ok(Box::new(T::from_call(call, session)?))
    }
}

/// Type tag present, then registered.
fn require_type(call: &Call, session: &Session) -> Result<String, ConsoleError> {
    let tag = call
        .tag
        .as_deref()
        .ok_or(ConsoleError::MissingArgument(ArgumentKind::TypeTag))?;
    if !session.registry.contains(tag) {
        return Err(ConsoleError::UnknownType(tag.to_string()));
    }
    Ok(tag.to_string())
}

/// Type checks, then id present, then instance live.
fn require_instance(call: &Call, session: &Session) -> Result<(String, String), ConsoleError> {
    let tag = require_type(call, session)?;
    let id = call
        .id
        .as_deref()
        .ok_or(ConsoleError::MissingArgument(ArgumentKind::Id))?;
    if !session.store.contains(&tag, id) {
        return Err(ConsoleError::NotFound);
    }
    Ok((tag, id.to_string()))
}

/// Create a new instance, save it and print its id.
pub struct Create {
    pub tag: String,
}

impl Verb for Create {
    fn name() -> &'static str {
        "create"
    }

    fn usage() -> &'static str {
        "create <class>"
    }

    fn description() -> &'static str {
        "Create a new instance of a class, save it to the data file and print its id."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        Ok(Self {
            tag: require_type(&call, session)?,
        })
    }

    fn execute(self, session: &mut Session, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let id = session
            .store
            .create(&session.registry, &self.tag)
            .map_err(|_| ConsoleError::UnknownType(self.tag.clone()))?
            .id()
            .to_string();
        if let Err(e) = session.store.save() {
            session.store.remove(&self.tag, &id);
            return Err(e.into());
        }
        info!("created {} {}", self.tag, id);
        writeln!(out, "{}", id)?;
        Ok(())
    }
}

/// Print the string representation of an instance.
pub struct Show {
    pub tag: String,
    pub id: String,
}

impl Verb for Show {
    fn name() -> &'static str {
        "show"
    }

    fn usage() -> &'static str {
        "show <class> <id>"
    }

    fn description() -> &'static str {
        "Print the string representation of an instance based on the class name and id."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        let (tag, id) = require_instance(&call, session)?;
        Ok(Self { tag, id })
    }

    fn execute(self, session: &mut Session, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let entity = session
            .store
            .get(&self.tag, &self.id)
            .ok_or(ConsoleError::NotFound)?;
        writeln!(out, "{}", entity)?;
        Ok(())
    }
}

/// Delete an instance and save the change right away.
pub struct Destroy {
    pub tag: String,
    pub id: String,
}

impl Verb for Destroy {
    fn name() -> &'static str {
        "destroy"
    }

    fn usage() -> &'static str {
        "destroy <class> <id>"
    }

    fn description() -> &'static str {
        "Delete an instance based on the class name and id, and save the change."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        let (tag, id) = require_instance(&call, session)?;
        Ok(Self { tag, id })
    }

    fn execute(self, session: &mut Session, _out: &mut dyn Write) -> Result<(), ConsoleError> {
        let removed = session
            .store
            .remove(&self.tag, &self.id)
            .ok_or(ConsoleError::NotFound)?;
        if let Err(e) = session.store.save() {
            session.store.insert(removed);
            return Err(e.into());
        }
        info!("destroyed {} {}", self.tag, self.id);
        Ok(())
    }
}

/// Print every instance, or every instance of one class.
pub struct All {
    pub tag: Option<String>,
}

impl Verb for All {
    fn name() -> &'static str {
        "all"
    }

    fn usage() -> &'static str {
        "all [class]"
    }

    fn description() -> &'static str {
        "Print the string representation of all instances, optionally only those of one class."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        let tag = match call.tag {
            Some(_) => Some(require_type(&call, session)?),
            None => None,
        };
        Ok(Self { tag })
    }

    fn execute(self, session: &mut Session, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let reprs: Vec<String> = match &self.tag {
            Some(tag) => session.store.of_type(tag).map(double_quoted).collect(),
            None => session.store.all().values().map(double_quoted).collect(),
        };
        writeln!(out, "[{}]", reprs.join(", "))?;
        Ok(())
    }
}

/// Text representation as a double-quoted list item, `"` and `\` escaped.
fn double_quoted(entity: &Entity) -> String {
    let text = entity.to_string();
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Print how many instances of a class are live.
pub struct Count {
    pub tag: String,
}

impl Verb for Count {
    fn name() -> &'static str {
        "count"
    }

    fn usage() -> &'static str {
        "count <class>"
    }

    fn description() -> &'static str {
        "Print the number of instances of a class."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        Ok(Self {
            tag: require_type(&call, session)?,
        })
    }

    fn execute(self, session: &mut Session, out: &mut dyn Write) -> Result<(), ConsoleError> {
        writeln!(out, "{}", session.store.count(&self.tag))?;
        Ok(())
    }
}

/// Attribute changes requested by `update`.
#[derive(Debug, PartialEq)]
pub enum Change {
    /// `update <class> <id> <name> <value>`
    One(String, Value),
    /// `update <class> <id> {<name>: <value>, ...}`
    Many(Attributes),
}

/// Add or overwrite attributes of an instance, then save it.
pub struct Update {
    pub tag: String,
    pub id: String,
    pub change: Change,
}

impl Update {
    fn parse_change(args: &[Token]) -> Result<Change, ConsoleError> {
        let first = args
            .first()
            .ok_or(ConsoleError::MissingArgument(ArgumentKind::AttrName))?;

        if let Token::Object(raw) = first {
            let changes = parser::parse_object_literal(raw).map_err(|e| {
                debug!("rejecting object literal {}: {}", raw, e);
                ConsoleError::MalformedValue
            })?;
            if let Some(name) = changes.keys().find(|k| model::is_reserved(k)) {
                return Err(ConsoleError::ReservedAttribute(name.clone()));
            }
            return Ok(Change::Many(changes));
        }

        let name = first.text().to_string();
        let value = args
            .get(1)
            .ok_or(ConsoleError::MissingArgument(ArgumentKind::Value))?;
        if model::is_reserved(&name) {
            return Err(ConsoleError::ReservedAttribute(name));
        }
        Ok(Change::One(name, parser::coerce_value(value)))
    }
}

impl Verb for Update {
    fn name() -> &'static str {
        "update"
    }

    fn usage() -> &'static str {
        "update <class> <id> <attribute> <value> | update <class> <id> {<attribute>: <value>, ...}"
    }

    fn description() -> &'static str {
        "Update an instance based on the class name and id by adding or overwriting attributes, then save it."
    }

    fn from_call(call: Call, session: &Session) -> Result<Self, ConsoleError> {
        let (tag, id) = require_instance(&call, session)?;
        let change = Self::parse_change(&call.args)?;
        Ok(Self { tag, id, change })
    }

    fn execute(self, session: &mut Session, _out: &mut dyn Write) -> Result<(), ConsoleError> {
        let entity = session
            .store
            .get_mut(&self.tag, &self.id)
            .ok_or(ConsoleError::NotFound)?;
        let before = entity.clone();
        let applied = match self.change {
            Change::One(name, value) => entity.set(&name, value).map(|_| ()),
            Change::Many(changes) => entity.apply(changes),
        };
        applied.map_err(|e| match e {
            ModelError::ReservedAttribute(name) => ConsoleError::ReservedAttribute(name),
            _ => ConsoleError::MalformedValue,
        })?;
        if let Err(e) = session.store.touch_and_save(&self.tag, &self.id) {
            session.store.insert(before);
            return Err(e.into());
        }
        info!("updated {} {}", self.tag, self.id);
        Ok(())
    }
}

/// Leave the console.
pub struct Quit;

impl Verb for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn usage() -> &'static str {
        "quit"
    }

    fn description() -> &'static str {
        "Exit the console. End of input (Ctrl-D) does the same."
    }

    fn from_call(_call: Call, _session: &Session) -> Result<Self, ConsoleError> {
        Ok(Quit)
    }

    fn execute(self, session: &mut Session, _out: &mut dyn Write) -> Result<(), ConsoleError> {
        session.should_exit = true;
        Ok(())
    }
}
