use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::values::Value;

/// A runtime scope. Child frames point at their parent; lookups walk the
/// chain outwards. A frame is filled when it is created and never changed
/// afterwards, except that a `let rec` frame receives its closures after they
/// have captured it.
#[derive(Clone)]
pub struct Env {
    parent: Option<Rc<Env>>,
    values: Rc<RefCell<HashMap<String, Value>>>,
}

impl Env {
    pub fn new(parent: Option<Rc<Env>>) -> Self {
        Self {
            parent,
            values: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// A new frame below `self`.
    pub fn child(&self) -> Self {
        Env::new(Some(Rc::new(self.clone())))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    pub fn set(&self, name: String, value: Value) {
        self.values.borrow_mut().insert(name, value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
