//! Listener registry used for view composers

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::view::View;

/// A callback that may bind data on a view before it renders
pub type Listener = Rc<dyn Fn(&mut View<'_>)>;

/// Prefix of the event fired just before a view evaluates
pub const COMPOSING: &str = "composing: ";

/// The event name fired before `view` renders
pub fn composing_event(view: &str) -> String {
    format!("{}{}", COMPOSING, view)
}

#[derive(Default)]
pub struct Dispatcher {
    listeners: RefCell<HashMap<String, Vec<Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, event: impl Into<String>, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push(listener);
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners
            .borrow()
            .get(event)
            .is_some_and(|list| !list.is_empty())
    }

    /// Call each listener for `event` in registration order
    ///
    /// Listeners may register further listeners while running; those apply
    /// from the next firing on.
    pub fn fire(&self, event: &str, view: &mut View<'_>) {
        let listeners = self
            .listeners
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(&mut *view);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::config::ViewConfig;
    use crate::environment::Environment;
    use crate::filesystem::MemoryFilesystem;
    use crate::value::{Data, Value};

    fn listener(f: impl Fn(&mut View<'_>) + 'static) -> Listener {
        Rc::new(f)
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let files = MemoryFilesystem::new().with_file("views/home.quire", "");
        let env = Environment::with_filesystem(&ViewConfig::new().with_path("views"), Rc::new(files));
        let mut view = env.make("home", Data::new()).unwrap();

        let dispatcher = Dispatcher::new();
        let event = composing_event("home");
        assert!(!dispatcher.has_listeners(&event));
        dispatcher.listen(event.clone(), listener(|view| view.set("order", "first")));
        dispatcher.listen(
            event.clone(),
            listener(|view| {
                let seen = view["order"].to_output().unwrap_or_default();
                view.set("order", format!("{} then second", seen));
            }),
        );
        assert!(dispatcher.has_listeners(&event));

        dispatcher.fire(&event, &mut view);
        assert_eq!(view["order"], Value::from("first then second"));
        assert_eq!(event, "composing: home");
    }
}
