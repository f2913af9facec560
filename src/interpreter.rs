use crate::command::CommandFactory;
use crate::error::ConsoleError;
use crate::parser::{self, ParsingError};
use crate::registry::Registry;
use crate::session::Session;
use crate::store::ObjectStore;
use log::{debug, error};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

/// Prompt printed before every line read by [`Interpreter::repl`].
pub const PROMPT: &str = "(hbnb) ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports verbs defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Line-oriented console over an [`ObjectStore`].
///
/// Every line goes through parse, validate, dispatch and print. Input errors
/// are printed and the interpreter keeps going.
///
/// Example
/// ```
/// use hbnb_console::{Interpreter, ObjectStore, Registry};
/// let dir = tempfile::TempDir::new().unwrap();
/// let store = ObjectStore::new(dir.path().join("file.json"));
/// let mut console = Interpreter::new(store, Registry::default());
///
/// let mut out = Vec::new();
/// console.execute_line("count User", &mut out).unwrap();
/// assert_eq!(out, b"0\n");
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with the default verbs.
    pub fn new(store: ObjectStore, registry: Registry) -> Self {
        use crate::verbs::*;
        Self::with_commands(
            store,
            registry,
            vec![
                Box::new(Factory::<All>::default()),
                Box::new(Factory::<Count>::default()),
                Box::new(Factory::<Create>::default()),
                Box::new(Factory::<Destroy>::default()),
                Box::new(Factory::<Quit>::default()),
                Box::new(Factory::<Show>::default()),
                Box::new(Factory::<Update>::default()),
            ],
        )
    }

    /// Create an interpreter with a custom set of command factories.
    pub fn with_commands(
        store: ObjectStore,
        registry: Registry,
        commands: Vec<Box<dyn CommandFactory>>,
    ) -> Self {
        Self {
            session: Session::new(store, registry),
            commands,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `true` once `quit` has run.
    pub fn should_exit(&self) -> bool {
        self.session.should_exit
    }

    /// Run one console line, writing results and error messages to `out`.
    ///
    /// Only a failure to write to `out` is returned as an error.
    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if let Some(topic) = help_topic(line) {
            self.help(topic, out)?;
            return Ok(());
        }

        match self.dispatch(line, out) {
            Ok(()) => Ok(()),
            Err(ConsoleError::Io(e)) => Err(e.into()),
            Err(e) => {
                if let ConsoleError::Storage(inner) = &e {
                    error!("{}", inner);
                }
                writeln!(out, "{}", e)?;
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> Result<(), ConsoleError> {
        let call = match parser::parse_line(line) {
            Ok(call) => call,
            Err(ParsingError::Empty) => return Ok(()),
            Err(e) => {
                debug!("cannot parse {:?}: {:?}", line, e);
                return Err(ConsoleError::SyntaxError(line.to_string()));
            }
        };

        let factory = self
            .commands
            .iter()
            .find(|f| f.name() == call.verb)
            .ok_or_else(|| ConsoleError::SyntaxError(line.to_string()))?;

        debug!("dispatching {:?}", call);
        let command = factory.create(call, &self.session)?;
        command.execute(&mut self.session, out)
    }

    fn help(&self, topic: Option<&str>, out: &mut dyn Write) -> std::io::Result<()> {
        match topic {
            None => {
                let mut names: Vec<&str> = self.commands.iter().map(|f| f.name()).collect();
                names.push("help");
                names.sort_unstable();

                writeln!(out)?;
                writeln!(out, "Documented commands (type help <topic>):")?;
                writeln!(out, "========================================")?;
                writeln!(out, "{}", names.join("  "))?;
                writeln!(out)?;
                writeln!(
                    out,
                    "Classes: {}",
                    self.session.registry.enumerate().collect::<Vec<_>>().join(", ")
                )?;
                writeln!(out)
            }
            Some("help") => writeln!(
                out,
                "List available commands with \"help\" or detailed help with \"help <command>\"."
            ),
            Some(name) => match self.commands.iter().find(|f| f.name() == name) {
                Some(factory) => {
                    writeln!(out, "{}", factory.description())?;
                    writeln!(out, "Usage: {}", factory.usage())
                }
                None => writeln!(out, "*** No help on {}", name),
            },
        }
    }

    /// Interactive loop on the terminal. Ends on `quit`, Ctrl-D or Ctrl-C.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = std::io::stdout();

        while !self.should_exit() {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.execute_line(&line, &mut stdout) {
                        error!("cannot write output: {:#}", e);
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    error!("readline failed: {:?}", err);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

/// `help` -> `Some(None)`, `help show` -> `Some(Some("show"))`.
fn help_topic(line: &str) -> Option<Option<&str>> {
    let rest = line.strip_prefix("help")?;
    if rest.is_empty() {
        return Some(None);
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(Some(rest.trim()).filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn console(dir: &TempDir) -> Interpreter {
        Interpreter::new(
            ObjectStore::new(dir.path().join("file.json")),
            Registry::default(),
        )
    }

    fn run(console: &mut Interpreter, line: &str) -> String {
        let mut out = Vec::new();
        console.execute_line(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn create_show_update_destroy() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);

        let id = run(&mut c, "create User").trim().to_string();
        assert!(c.session().store.contains("User", &id));

        let shown = run(&mut c, &format!("show User {id}"));
        assert!(shown.starts_with(&format!("[User] ({id})")));

        assert_eq!(run(&mut c, &format!("update User {id} first_name \"Betty\"")), "");
        let shown = run(&mut c, &format!("show User {id}"));
        assert!(shown.contains("'first_name': 'Betty'"));

        assert_eq!(run(&mut c, &format!("destroy User {id}")), "");
        assert_eq!(
            run(&mut c, &format!("show User {id}")),
            "** no instance found **\n"
        );
    }

    #[test]
    fn dotted_calls_behave_like_verb_first() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create Place").trim().to_string();

        assert_eq!(
            run(&mut c, &format!("Place.show(\"{id}\")")),
            run(&mut c, &format!("show Place {id}"))
        );
        assert_eq!(run(&mut c, "Place.count()"), "1\n");
        assert_eq!(run(&mut c, "Place.all()"), run(&mut c, "all Place"));

        run(&mut c, &format!("Place.update(\"{id}\", \"max_guest\", 4)"));
        run(
            &mut c,
            &format!("Place.update(\"{id}\", {{\"name\": \"Loft\", \"price_by_night\": 120}})"),
        );
        let place = c.session().store.get("Place", &id).unwrap();
        assert_eq!(place.get("max_guest"), Some(&Value::from(4)));
        assert_eq!(place.get("name"), Some(&Value::from("Loft")));
        assert_eq!(place.get("price_by_night"), Some(&Value::from(120)));

        run(&mut c, &format!("Place.destroy(\"{id}\")"));
        assert_eq!(run(&mut c, "Place.count()"), "0\n");
    }

    #[test]
    fn dotted_errors_match_verb_first() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create User").trim().to_string();

        let pairs = [
            ("User.show()".to_string(), "show User".to_string()),
            ("Ghost.count()".to_string(), "count Ghost".to_string()),
            ("Ghost.all()".to_string(), "all Ghost".to_string()),
            ("User.destroy(\"nope\")".to_string(), "destroy User nope".to_string()),
            (format!("User.update(\"{id}\")"), format!("update User {id}")),
            (
                format!("User.update(\"{id}\", \"name\")"),
                format!("update User {id} name"),
            ),
        ];
        for (dotted, verb_first) in &pairs {
            let expected = run(&mut c, verb_first);
            assert!(expected.starts_with("**"), "{verb_first}: {expected}");
            assert_eq!(run(&mut c, dotted), expected, "{dotted} vs {verb_first}");
        }
    }

    #[test]
    fn capitalized_literals_are_stored_typed() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create User").trim().to_string();

        run(&mut c, &format!("update User {id} flag True"));
        run(&mut c, &format!("update User {id} note None"));
        let shown = run(&mut c, &format!("show User {id}"));
        assert!(shown.contains("'flag': true"), "{shown}");
        assert!(shown.contains("'note': null"), "{shown}");
    }

    #[test]
    fn failed_save_is_reported_and_rolled_back() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        let mut c = Interpreter::new(ObjectStore::new(blocked), Registry::default());

        let reply = run(&mut c, "create User");
        assert!(reply.starts_with("** storage error: "), "{reply}");
        assert_eq!(run(&mut c, "count User"), "0\n");
    }

    #[test]
    fn count_on_empty_store_is_zero() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        assert_eq!(run(&mut c, "count Review"), "0\n");
        assert_eq!(run(&mut c, "all"), "[]\n");
    }

    #[test]
    fn validation_messages_in_order() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create User").trim().to_string();

        assert_eq!(run(&mut c, "create"), "** class name missing **\n");
        assert_eq!(run(&mut c, "create Ghost"), "** class doesn't exist **\n");
        assert_eq!(run(&mut c, "show Ghost 1"), "** class doesn't exist **\n");
        assert_eq!(run(&mut c, "destroy User"), "** instance id missing **\n");
        assert_eq!(run(&mut c, "update User 42"), "** no instance found **\n");
        assert_eq!(
            run(&mut c, &format!("update User {id}")),
            "** attribute name missing **\n"
        );
        assert_eq!(
            run(&mut c, &format!("update User {id} email")),
            "** value missing **\n"
        );
        assert_eq!(
            run(&mut c, &format!("update User {id} id 7")),
            "** attribute can't be updated: id **\n"
        );
    }

    #[test]
    fn malformed_object_update_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create User").trim().to_string();
        let before = c.session().store.get("User", &id).cloned();

        let line = format!("User.update(\"{id}\", {{\"first_name\": \"Betty\", age: }})");
        assert_eq!(run(&mut c, &line), "** invalid value **\n");
        assert_eq!(c.session().store.get("User", &id).cloned(), before);
    }

    #[test]
    fn destroy_is_visible_on_disk_without_save() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        let id = run(&mut c, "create Amenity").trim().to_string();
        run(&mut c, &format!("destroy Amenity {id}"));

        let on_disk: Value =
            serde_json::from_slice(&fs::read(dir.path().join("file.json")).unwrap()).unwrap();
        assert!(on_disk.get(format!("Amenity.{id}")).is_none());
    }

    #[test]
    fn unknown_input_is_reported_verbatim() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        assert_eq!(
            run(&mut c, "frobnicate User"),
            "*** Unknown syntax: frobnicate User\n"
        );
        assert_eq!(run(&mut c, "User.fly()"), "*** Unknown syntax: User.fly()\n");
        assert_eq!(
            run(&mut c, "show User \"unterminated"),
            "*** Unknown syntax: show User \"unterminated\n"
        );
    }

    #[test]
    fn empty_line_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        assert_eq!(run(&mut c, ""), "");
        assert_eq!(run(&mut c, "   \t"), "");
        assert!(!dir.path().join("file.json").exists());
    }

    #[test]
    fn help_topics() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);

        let listing = run(&mut c, "help");
        for verb in ["all", "count", "create", "destroy", "help", "quit", "show", "update"] {
            assert!(listing.contains(verb), "missing {verb}");
        }
        assert!(listing.contains("BaseModel"));

        let show = run(&mut c, "help show");
        assert!(show.contains("Print the string representation of an instance"));
        assert!(show.contains("Usage: show <class> <id>"));

        assert_eq!(run(&mut c, "help fly"), "*** No help on fly\n");
    }

    #[test]
    fn help_prefix_is_not_a_topic() {
        assert_eq!(help_topic("help"), Some(None));
        assert_eq!(help_topic("help  show "), Some(Some("show")));
        assert_eq!(help_topic("helpme"), None);
        assert_eq!(help_topic("show User"), None);
    }

    #[test]
    fn quit_stops_the_console() {
        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        assert!(!c.should_exit());
        assert_eq!(run(&mut c, "quit"), "");
        assert!(c.should_exit());
    }

    #[test]
    fn output_failures_propagate() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let mut c = console(&dir);
        assert!(c.execute_line("count User", &mut Broken).is_err());
        assert!(c.execute_line("show", &mut Broken).is_err());
    }
}
