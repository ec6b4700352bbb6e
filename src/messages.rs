//! Validation message bags exposed to views as `$errors`

use indexmap::IndexMap;

use crate::error::ViewError;
use crate::value::Value;

/// Name of the bag used when a template does not name one
pub const DEFAULT_BAG: &str = "default";

/// Messages keyed by field name, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBag {
    messages: IndexMap<String, Vec<String>>,
}

impl MessageBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field, returning `self` for chaining
    pub fn with(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(key, message);
        self
    }

    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(key.into())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.messages.get(key).is_some_and(|list| !list.is_empty())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.messages
            .get(key)
            .and_then(|list| list.first())
            .map(|s| s.as_str())
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.messages.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every message across all fields
    pub fn all(&self) -> Vec<&str> {
        self.messages
            .values()
            .flat_map(|list| list.iter().map(|s| s.as_str()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.values().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Dispatch a script method call such as `$bag->first('email')`
    pub(crate) fn call(&self, method: &str, args: &[Value]) -> Result<Value, ViewError> {
        match method {
            "has" => Ok(Value::Bool(self.has(&key_arg(method, args)?))),
            "first" => Ok(self
                .first(&key_arg(method, args)?)
                .map(Value::from)
                .unwrap_or(Value::Null)),
            "get" => Ok(Value::List(
                self.get(&key_arg(method, args)?)
                    .iter()
                    .map(|m| Value::from(m.as_str()))
                    .collect(),
            )),
            "all" => Ok(Value::List(self.all().into_iter().map(Value::from).collect())),
            "any" => Ok(Value::Bool(!self.is_empty())),
            "isEmpty" => Ok(Value::Bool(self.is_empty())),
            "count" => Ok(Value::Int(self.count() as i64)),
            other => Err(ViewError::runtime(format!(
                "call to undefined method MessageBag::{}()",
                other
            ))),
        }
    }
}

/// Named message bags; unnamed lookups go to the `default` bag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBag {
    bags: IndexMap<String, MessageBag>,
}

impl ErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a bag under a name, returning `self` for chaining
    pub fn with_bag(mut self, name: impl Into<String>, bag: MessageBag) -> Self {
        self.put(name, bag);
        self
    }

    pub fn put(&mut self, name: impl Into<String>, bag: MessageBag) {
        self.bags.insert(name.into(), bag);
    }

    /// The named bag, or an empty one if it was never stored
    pub fn get_bag(&self, name: &str) -> MessageBag {
        self.bags.get(name).cloned().unwrap_or_default()
    }

    pub fn bags(&self) -> impl Iterator<Item = (&str, &MessageBag)> {
        self.bags.iter().map(|(name, bag)| (name.as_str(), bag))
    }

    pub(crate) fn call(&self, method: &str, args: &[Value]) -> Result<Value, ViewError> {
        match method {
            "getBag" => Ok(Value::Messages(self.get_bag(&key_arg(method, args)?))),
            _ => self.get_bag(DEFAULT_BAG).call(method, args),
        }
    }
}

fn key_arg(method: &str, args: &[Value]) -> Result<String, ViewError> {
    match args.first() {
        Some(value) => value.to_output(),
        None => Err(ViewError::runtime(format!(
            "{}() expects a key argument",
            method
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_returns_earliest_message() {
        let bag = MessageBag::new()
            .with("email", "The email is required.")
            .with("email", "The email is invalid.");
        assert_eq!(bag.first("email"), Some("The email is required."));
        assert_eq!(bag.count(), 2);
        assert!(!bag.has("name"));
    }

    #[test]
    fn test_error_bag_delegates_to_default() {
        let errors = ErrorBag::new().with_bag(
            DEFAULT_BAG,
            MessageBag::new().with("name", "Name is required."),
        );
        let has = errors.call("has", &[Value::from("name")]).unwrap();
        assert_eq!(has, Value::Bool(true));
    }

    #[test]
    fn test_get_bag_of_unknown_name_is_empty() {
        let errors = ErrorBag::new();
        let bag = errors.call("getBag", &[Value::from("login")]).unwrap();
        assert_eq!(bag, Value::Messages(MessageBag::new()));
    }
}
