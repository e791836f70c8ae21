//! Callable object model: user functions (closures), classes, and
//! instances.
//!
//! A function value pairs its declaration with the frame that was active
//! when it was declared; calling it builds exactly one fresh frame for the
//! parameters. Methods additionally get a one-frame `this` wrapper
//! interposed by [`LoxFunction::bind`] on every property access, which is
//! what keeps the resolver's fixed `this` distance correct across
//! instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Name of the constructor method.
pub const INIT: &str = "init";

/// A user-defined function or method closure.
#[derive(Debug)]
pub struct LoxFunction<'a> {
    declaration: Rc<FunctionDecl<'a>>,
    closure: Rc<RefCell<Environment<'a>>>,
    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(
        declaration: Rc<FunctionDecl<'a>>,
        closure: Rc<RefCell<Environment<'a>>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a copy of this method whose closure chain has one extra
    /// frame defining `this` as `instance`. Happens once per property
    /// access, never shared between instances.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance<'a>>>) -> LoxFunction<'a> {
        let environment = Environment::with_enclosing(Rc::clone(&self.closure));

        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    /// Invoke the function. The caller has already checked arity.
    ///
    /// Initializers always evaluate to `this`, even on a bare `return;`
    /// (the resolver rejects `return <value>` in an initializer).
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Calling <fn {}>", self.name());

        let environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, value) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(param.lexeme, value);
        }

        let flow = interpreter.execute_block(&self.declaration.body, environment)?;

        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this", self.declaration.name.line);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// A class value: its name, an optional superclass link, and a method
/// table. Methods close over the class's defining environment (plus the
/// `super` wrapper frame when inheriting), not over any instance.
#[derive(Debug)]
pub struct LoxClass<'a> {
    pub name: &'a str,
    superclass: Option<Rc<LoxClass<'a>>>,
    methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
}

impl<'a> LoxClass<'a> {
    pub fn new(
        name: &'a str,
        superclass: Option<Rc<LoxClass<'a>>>,
        methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Look up a method on this class or, failing that, up the ancestor
    /// chain (nearest first).
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'a>>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// A class called as a function takes whatever its `init` takes.
    pub fn arity(&self) -> usize {
        self.find_method(INIT).map_or(0, |init| init.arity())
    }

    /// Invoke the class as a constructor: build a fresh instance, run the
    /// bound `init` if one exists anywhere on the chain (its result is
    /// discarded), and yield the instance.
    pub fn instantiate(
        class: &Rc<LoxClass<'a>>,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(RefCell::new(LoxInstance {
            class: Rc::clone(class),
            fields: HashMap::new(),
        }));

        if let Some(init) = class.find_method(INIT) {
            init.bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// A class instance: a reference to its class plus a mutable field table.
#[derive(Debug)]
pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: HashMap<&'a str, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    pub fn class_name(&self) -> &'a str {
        self.class.name
    }

    /// Property read: instance fields shadow methods; methods are bound to
    /// the instance freshly on every access.
    pub fn get(instance: &Rc<RefCell<LoxInstance<'a>>>, name: &Token<'a>) -> Result<Value<'a>> {
        let field = instance.borrow().fields.get(name.lexeme).cloned();

        if let Some(value) = field {
            return Ok(value);
        }

        let class = Rc::clone(&instance.borrow().class);

        match class.find_method(name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Property write: inserts or overwrites unconditionally.
    pub fn set(&mut self, name: &'a str, value: Value<'a>) {
        self.fields.insert(name, value);
    }
}
