//! Name-keyed table of action constructors

use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{Action, BoundAction};
use crate::config::ActionSpec;
use crate::error::ConfigError;

/// Builds an action from its configuration payload
pub type ActionConstructor =
    Arc<dyn Fn(serde_yaml::Value) -> Result<Box<dyn Action>> + Send + Sync>;

/// Process-wide registry of the built-in actions.
///
/// Populated on first access, before any configuration is bound, and never
/// mutated afterwards.
static REGISTRY: Lazy<ActionRegistry> = Lazy::new(ActionRegistry::with_builtin_actions);

/// The process-wide registry of built-in actions
pub fn registry() -> &'static ActionRegistry {
    &REGISTRY
}

/// Maps action names, as written in the configuration, to constructors
#[derive(Clone, Default)]
pub struct ActionRegistry {
    constructors: HashMap<String, ActionConstructor>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry").field("actions", &names).finish()
    }
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every action available on this platform
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        registry.register("command", super::command::CommandAction::from_config);
        registry.register("sendMidi", super::send_midi::SendMidiAction::from_config);
        #[cfg(target_os = "linux")]
        {
            registry.register("sendKeys", super::send_keys::SendKeysAction::from_config);
            registry.register("sendMouse", super::send_mouse::SendMouseAction::from_config);
        }
        registry
    }

    /// Associate a constructor with `name`; re-registering a name replaces
    /// the previous constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(serde_yaml::Value) -> Result<Box<dyn Action>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(action = %name, "register action");
        self.constructors.insert(name, Arc::new(constructor));
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, name: &str) -> Option<ActionConstructor> {
        trace!(want = name, "lookup action");
        self.constructors.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Build an ordered action list from its configuration entries.
///
/// Every entry must name exactly one action; a malformed entry rejects the
/// whole list before any action is constructed. Unknown action names are
/// skipped with a warning naming `control` and `list`. A constructor failure
/// aborts the list.
pub fn build_action_list(
    control: u8,
    list: &str,
    specs: &[ActionSpec],
    registry: &ActionRegistry,
) -> Result<Vec<BoundAction>, ConfigError> {
    let mut entries = Vec::with_capacity(specs.len());
    for spec in specs {
        match spec.iter().next() {
            Some((name, payload)) if spec.len() == 1 => entries.push((name, payload)),
            _ => {
                return Err(ConfigError::InvalidActionSpec {
                    keys: spec.keys().cloned().collect(),
                })
            }
        }
    }

    let mut actions = Vec::with_capacity(entries.len());
    for (name, payload) in entries {
        debug!(control, list, action = %name, "building action");

        let Some(constructor) = registry.lookup(name) else {
            warn!(control, list, action = %name, "unimplemented action, skipping");
            continue;
        };

        let action = constructor(payload.clone()).map_err(|source| {
            ConfigError::ActionConstruction {
                action: name.clone(),
                source,
            }
        })?;
        actions.push(BoundAction::new(name.clone(), action));
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shared sink for formatted log lines
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    struct NoopAction;

    impl Action for NoopAction {
        fn act(&self, _value: i32, _last_value: i32) -> Result<()> {
            Ok(())
        }
    }

    fn spec(entries: &[(&str, serde_yaml::Value)]) -> ActionSpec {
        entries
            .iter()
            .map(|(name, payload)| (name.to_string(), payload.clone()))
            .collect()
    }

    fn counting_registry(counter: Arc<AtomicUsize>) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register("noop", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NoopAction) as Box<dyn Action>)
        });
        registry.register("other", |_| Ok(Box::new(NoopAction) as Box<dyn Action>));
        registry.register("broken", |_| anyhow::bail!("payload rejected"));
        registry
    }

    #[test]
    fn test_lookup_is_exact_and_case_sensitive() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));

        assert!(registry.lookup("noop").is_some());
        assert!(registry.lookup("Noop").is_none());
        assert!(registry.lookup("noo").is_none());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = counting_registry(first.clone());
        let counter = second.clone();
        registry.register("noop", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NoopAction) as Box<dyn Action>)
        });

        let constructor = registry.lookup("noop").unwrap();
        constructor(serde_yaml::Value::Null).unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builtin_actions() {
        let names = registry().names();
        assert!(names.contains(&"command"));
        assert!(names.contains(&"sendMidi"));
        #[cfg(target_os = "linux")]
        {
            assert!(names.contains(&"sendKeys"));
            assert!(names.contains(&"sendMouse"));
        }
    }

    #[test]
    fn test_build_preserves_declaration_order() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let specs = vec![
            spec(&[("other", serde_yaml::Value::Null)]),
            spec(&[("noop", serde_yaml::Value::Null)]),
            spec(&[("other", serde_yaml::Value::Null)]),
        ];

        let actions = build_action_list(1, "onPress", &specs, &registry).unwrap();
        let names: Vec<_> = actions.iter().map(BoundAction::name).collect();
        assert_eq!(names, vec!["other", "noop", "other"]);
    }

    #[test]
    fn test_unknown_action_is_skipped() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let specs = vec![
            spec(&[("flashLights", serde_yaml::Value::Null)]),
            spec(&[("noop", serde_yaml::Value::Null)]),
        ];

        let actions = build_action_list(1, "onPress", &specs, &registry).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name(), "noop");
    }

    #[test]
    fn test_unknown_action_warning_names_control_and_list() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let specs = vec![spec(&[("flashLights", serde_yaml::Value::Null)])];

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let actions = tracing::subscriber::with_default(subscriber, || {
            build_action_list(41, "onRelease", &specs, &registry).unwrap()
        });
        assert!(actions.is_empty());

        let logs = buffer.contents();
        let line = logs
            .lines()
            .find(|line| line.contains("unimplemented action"))
            .unwrap();
        assert!(line.contains("WARN"));
        assert!(line.contains("control=41"));
        assert!(line.contains("onRelease"));
        assert!(line.contains("flashLights"));
    }

    #[test]
    fn test_two_keys_in_one_mapping_builds_nothing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(counter.clone());
        let specs = vec![
            spec(&[("noop", serde_yaml::Value::Null)]),
            spec(&[
                ("noop", serde_yaml::Value::Null),
                ("other", serde_yaml::Value::Null),
            ]),
        ];

        let err = build_action_list(1, "onPress", &specs, &registry).unwrap_err();
        match &err {
            ConfigError::InvalidActionSpec { keys } => {
                assert_eq!(keys, &vec!["noop".to_string(), "other".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("found 2 (noop, other)"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_mapping_is_rejected() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let err = build_action_list(1, "onPress", &[ActionSpec::new()], &registry).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidActionSpec { ref keys } if keys.is_empty()));
    }

    #[test]
    fn test_constructor_failure_names_the_action() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let specs = vec![
            spec(&[("noop", serde_yaml::Value::Null)]),
            spec(&[("broken", serde_yaml::Value::Null)]),
        ];

        let err = build_action_list(1, "onPress", &specs, &registry).unwrap_err();
        match err {
            ConfigError::ActionConstruction { action, source } => {
                assert_eq!(action, "broken");
                assert_eq!(source.to_string(), "payload rejected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
