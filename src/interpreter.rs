//! Tree-walking evaluator.
//!
//! Consumes the AST together with the resolver's [`ResolutionMap`] and
//! executes statements depth-first against the environment chain. Resolved
//! references walk exactly the recorded number of frame links; unresolved
//! ones fall through to the global frame, where "undefined variable" is a
//! *runtime* error surfacing at use time (so globals may be referenced
//! before they are defined).
//!
//! `return` is modelled as an explicit control-flow outcome ([`Flow`])
//! threaded through every statement executor and collapsed at the
//! function-call boundary, instead of being smuggled through the error
//! channel.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::object::{LoxClass, LoxFunction, LoxInstance, INIT};
use crate::resolver::ResolutionMap;
use crate::token::{Token, TokenType};
use crate::value::{NativeFunction, Value};

/// Outcome of executing a statement: either control continues normally, or
/// a `return` is unwinding toward the nearest function-call boundary.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,
    locals: ResolutionMap,
    output: Box<dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// Interpreter writing program output to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter writing program output to an arbitrary sink. The global
    /// frame is pre-populated with the native `clock` function.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing interpreter");

        let globals = Environment::new();

        globals.borrow_mut().define(
            "clock",
            Value::Native(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args| {
                    let timestamp = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|e| format!("Clock error: {}", e))?
                        .as_secs_f64();

                    Ok(Value::Number(timestamp))
                },
            }),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: ResolutionMap::default(),
            output,
        }
    }

    /// Execute a program against the resolution map produced for it.
    ///
    /// The first runtime error aborts the remaining statements and is
    /// returned; the interpreter itself stays usable.
    pub fn interpret(&mut self, statements: &[Stmt<'a>], locals: ResolutionMap) -> Result<()> {
        debug!(
            "Interpreting {} statement(s), {} resolved local(s)",
            statements.len(),
            locals.len()
        );

        self.locals = locals;

        for stmt in statements {
            // A top-level `return` is rejected by the resolver, so any
            // Flow::Return here is simply discarded.
            self.execute(stmt)?;
        }

        info!("Interpretation completed");

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("var '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                // The closure captures the frame active at declaration time.
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass, methods)?;

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("return {}", value);

                Ok(Flow::Return(value))
            }
        }
    }

    /// Execute statements inside `environment`, restoring the previous
    /// frame on every exit path (normal completion, `return`, or error).
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Flow<'a>> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token<'a>,
        superclass: &Option<Expr<'a>>,
        methods: &[Rc<FunctionDecl<'a>>],
    ) -> Result<()> {
        let superclass_value: Option<Rc<LoxClass<'a>>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(LoxError::runtime(expr.line(), "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Define the name first so method bodies may refer to the class.
        self.environment.borrow_mut().define(name.lexeme, Value::Nil);

        // Method closures of a subclass chain through one extra frame that
        // binds `super`, mirroring the scope the resolver pushed.
        let method_environment = match &superclass_value {
            Some(superclass) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));

                environment
                    .borrow_mut()
                    .define("super", Value::Class(Rc::clone(superclass)));

                environment
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == INIT;

            let function = LoxFunction::new(
                Rc::clone(method),
                Rc::clone(&method_environment),
                is_initializer,
            );

            method_table.insert(method.name.lexeme, Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme, superclass_value, method_table);

        debug!("Defined class '{}'", name.lexeme);

        self.environment.borrow_mut().assign(
            name.lexeme,
            Value::Class(Rc::new(class)),
            name.line,
        )
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(value) => Ok(match value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // The result is the operand's own value, never a coerced
                // boolean.
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),
                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.distance(*id) {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(name.lexeme, value.clone(), name.line)?
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut argument_values = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.invoke(callee_value, argument_values, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.borrow_mut().set(name.lexeme, value.clone());

                    Ok(value)
                }
                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    /// Read through the resolution map: resolved references walk exactly
    /// the recorded number of frame links; the rest go to the globals.
    fn look_up_variable(&self, name: &Token<'a>, id: ExprId) -> Result<Value<'a>> {
        match self.locals.distance(id) {
            Some(distance) => {
                Environment::get_at(&self.environment, distance, name.lexeme, name.line)
            }
            None => self.globals.borrow().get(name.lexeme, name.line),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token<'a>, right: &Expr<'a>) -> Result<Value<'a>> {
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_value.is_truthy())),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'a>,
        operator: &Token<'a>,
        right: &Expr<'a>,
    ) -> Result<Value<'a>> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                // IEEE-754 semantics: dividing by zero yields an infinity
                // or NaN, never an error.
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = self.number_operands(operator, left_value, right_value)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value.equals(&right_value))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!left_value.equals(&right_value))),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.")),
        }
    }

    fn number_operands(
        &self,
        operator: &Token<'a>,
        left: Value<'a>,
        right: Value<'a>,
    ) -> Result<(f64, f64)> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok((a, b)),
            _ => Err(LoxError::runtime(
                operator.line,
                "Operands must be numbers.",
            )),
        }
    }

    /// Dispatch a call over the callable kinds; anything else is an error.
    fn invoke(
        &mut self,
        callee: Value<'a>,
        arguments: Vec<Value<'a>>,
        paren: &Token<'a>,
    ) -> Result<Value<'a>> {
        match callee {
            Value::Native(native) => {
                self.check_arity(native.arity, arguments.len(), paren)?;

                (native.func)(&arguments).map_err(|message| LoxError::runtime(paren.line, message))
            }

            Value::Function(function) => {
                self.check_arity(function.arity(), arguments.len(), paren)?;

                function.call(self, arguments)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), arguments.len(), paren)?;

                LoxClass::instantiate(&class, self, arguments)
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token<'a>) -> Result<()> {
        if expected != got {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", expected, got),
            ));
        }

        Ok(())
    }

    /// `super.method`: start the lookup one link above the class whose
    /// method is currently running (not the instance's own class), then
    /// bind the found method to the current `this`.
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token<'a>,
        method: &Token<'a>,
    ) -> Result<Value<'a>> {
        let distance = self.locals.distance(id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass =
            match Environment::get_at(&self.environment, distance, "super", keyword.line)? {
                Value::Class(class) => class,
                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Superclass must be a class.",
                    ));
                }
            };

        // `this` always lives exactly one frame inside the `super` frame.
        let instance =
            match Environment::get_at(&self.environment, distance - 1, "this", keyword.line)? {
                Value::Instance(instance) => instance,
                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Can't use 'super' outside of a method.",
                    ));
                }
            };

        match superclass.find_method(method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}
