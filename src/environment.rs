//! Scope frames for the runtime environment chain.
//!
//! Each [`Environment`] is one lexical frame: a name-to-value table plus an
//! optional link to the enclosing frame. Frames are created per block, per
//! call, and per class-superclass wrapper, and are shared through
//! `Rc<RefCell<_>>` because multiple closures may capture the same defining
//! frame. Children hold a strong reference to their parent, so a parent
//! outlives every child that might still look up an enclosing name; the
//! chain is strictly parent-directed, so no reference cycles form.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    /// A fresh root frame (the global scope).
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// A fresh frame chained under `enclosing`.
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    /// Bind `name` in this frame, shadowing any enclosing binding.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        debug!("define '{}'", name);

        self.values.insert(name, value);
    }

    /// Read `name`, walking outward through enclosing frames. Used only for
    /// globals; resolved locals go through [`Environment::get_at`].
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Assign to an existing binding, walking outward through enclosing
    /// frames. Assignment never creates a binding.
    pub fn assign(&mut self, name: &'a str, value: Value<'a>, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name, value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links from `env`.
    ///
    /// The resolver guarantees the chain is at least that deep; a shorter
    /// chain means the interpreter's frame creation fell out of step with
    /// the resolver's scope structure, which is reported rather than
    /// panicked on.
    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        line: usize,
    ) -> Result<Rc<RefCell<Environment<'a>>>> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let parent = frame.borrow().enclosing.clone().ok_or_else(|| {
                LoxError::runtime(line, "Resolved scope depth exceeds environment chain.")
            })?;

            frame = parent;
        }

        Ok(frame)
    }

    /// Read `name` from the frame exactly `distance` links away.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value<'a>> {
        let frame = Self::ancestor(env, distance, line)?;

        let value = frame.borrow().values.get(name).cloned().ok_or_else(|| {
            LoxError::runtime(line, format!("Undefined variable '{}'.", name))
        })?;

        Ok(value)
    }

    /// Assign `name` in the frame exactly `distance` links away.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &'a str,
        value: Value<'a>,
        line: usize,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance, line)?;
        frame.borrow_mut().values.insert(name, value);

        Ok(())
    }
}
