//! The sync subsystem: `sync(channel, name) = value;` and
//! `x = sync(channel, name);`.
//!
//! Channels:
//!
//! | channel              | write                                               | read |
//! |----------------------|-----------------------------------------------------|------|
//! | `context-in`         | stage `(name, value)` for the next delegated run    | |
//! | `context-out`        | register `name` with a placeholder or type name     | harvested value |
//! | `context-*-clear`    | drop every staged entry                             | |
//! | `context-current`    | `insert` / `update` / `delete` on the live table    | 1 if `name` resolves, else 0 |
//! | `program`            | run a delegate: `python`, `java` or `udil`          | |
//! | `statement`          | `current`: execute a statement value in place       | |
//! | `udil`               | `root`, `text`, `statement`, `pc_counter`, `restart`, `halt` | `pc_counter`, `temp` |
//! | `java`, `python`     | toolchain paths (`javac`, `jvm`; `path`)            | |

use std::rc::Rc;

use udil_syntax::ast::{Expr, Statement, TypeName, TypeTag};

use crate::delegate::{self, JvmRuntime, ScriptRuntime, Toolchain};
use crate::error::{ExecError, ScopeError, SyncError};
use crate::eval::{as_index, Grammar};
use crate::flow::Flow;
use crate::interpreter::{checked, Interpreter};
use crate::symbols::Delete;
use crate::value::Value;

/// Staged delegate context, the text/statement bridge slot and the delegate
/// runtimes of one interpreter.
pub struct SyncState {
    pub(crate) context_in: Vec<(String, Value)>,
    pub(crate) context_out: Vec<(String, Value)>,
    pub(crate) temp: Option<Value>,
    pub(crate) toolchain: Toolchain,
    script: Rc<dyn ScriptRuntime>,
    jvm: Rc<dyn JvmRuntime>,
}

impl SyncState {
    pub fn new(toolchain: Toolchain, script: Rc<dyn ScriptRuntime>, jvm: Rc<dyn JvmRuntime>) -> Self {
        Self {
            context_in: Vec::new(),
            context_out: Vec::new(),
            temp: None,
            toolchain,
            script,
            jvm,
        }
    }

    /// Fresh state for a nested interpreter, sharing runtimes and toolchain.
    pub(crate) fn child(&self) -> Self {
        Self::new(
            self.toolchain.clone(),
            Rc::clone(&self.script),
            Rc::clone(&self.jvm),
        )
    }

    pub(crate) fn clear(&mut self) {
        self.context_in.clear();
        self.context_out.clear();
        self.temp = None;
    }
}

fn push_unique(list: &mut Vec<(String, Value)>, name: &str, value: Value) {
    if !list.iter().any(|(n, v)| n == name && *v == value) {
        list.push((name.to_string(), value));
    }
}

fn expect_text(value: Value, what: &str) -> Result<String, SyncError> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(SyncError::BadArgument(format!(
            "{} must be text, got {}",
            what, other
        ))),
    }
}

fn expect_statement(value: Value) -> Result<Rc<Statement>, SyncError> {
    match value {
        Value::Block(stmt) => Ok(stmt),
        other => Err(SyncError::ExpectedBlock(other.to_string())),
    }
}

fn expect_block(value: Value) -> Result<Rc<Statement>, SyncError> {
    let stmt = expect_statement(value)?;
    if stmt.as_block().is_none() {
        return Err(SyncError::ExpectedBlock(stmt.to_string()));
    }
    Ok(stmt)
}

impl Interpreter {
    pub(crate) fn exec_sync_write(&mut self, key: &[Expr], value: &Expr) -> Result<Flow, ExecError> {
        if key.len() != 2 {
            return Err(SyncError::BadKeyArity(key.len()).into());
        }
        let channel = self.eval(&key[0], None)?.key_text();
        let name = self.eval(&key[1], None)?.key_text();
        let grammar = match (channel.as_str(), name.as_str()) {
            ("statement", _) | ("udil", "root") | ("udil", "statement") => Some(Grammar::Object),
            _ => None,
        };
        let value = self.eval(value, grammar)?;
        Ok(self.sync_write(&channel, &name, value)?)
    }

    pub(crate) fn exec_sync_read(
        &mut self,
        target: &str,
        ty: Option<TypeName>,
        parts: &[Expr],
    ) -> Result<Flow, ExecError> {
        if parts.len() != 2 {
            return Err(SyncError::BadKeyArity(parts.len()).into());
        }
        let channel = self.eval(&parts[0], None)?.key_text();
        let name = self.eval(&parts[1], None)?.key_text();
        let value = self.sync_read(&channel, &name)?;
        match ty {
            Some(ty) => {
                let tag = ty
                    .tag()
                    .ok_or_else(|| ScopeError::VoidBinding(target.to_string()))?;
                let value = checked(target, tag, value)?;
                self.table.insert(target, tag, value)?;
            }
            None => {
                let tag = self
                    .table
                    .lookup(target)
                    .map(|b| b.ty)
                    .ok_or_else(|| ScopeError::Undefined(target.to_string()))?;
                let value = checked(target, tag, value)?;
                self.table.update(target, tag, value)?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Writes `value` to `(channel, name)`. The returned flow carries jumps
    /// requested through the `udil` channel.
    pub fn sync_write(&mut self, channel: &str, name: &str, value: Value) -> Result<Flow, SyncError> {
        tracing::debug!(channel, name, value = %value, "sync write");
        let unknown_key = || SyncError::UnknownKey {
            channel: channel.to_string(),
            key: name.to_string(),
        };
        match channel {
            "context-in-clear" => self.sync.context_in.clear(),
            "context-out-clear" => self.sync.context_out.clear(),
            "context-in" => push_unique(&mut self.sync.context_in, name, value),
            "context-out" => push_unique(&mut self.sync.context_out, name, value),
            "context-current" => self.write_current(name, value)?,
            "java" => match name {
                "javac" => self.sync.toolchain.javac = expect_text(value, "javac path")?,
                "jvm" | "java" => self.sync.toolchain.java = expect_text(value, "jvm path")?,
                _ => return Err(unknown_key()),
            },
            "python" => match name {
                "path" => self.sync.toolchain.python = expect_text(value, "python path")?,
                _ => return Err(unknown_key()),
            },
            "program" => match name {
                "python" | "script" => self.run_script(value)?,
                "java" | "jvm" => self.run_jvm(value)?,
                "udil" => self.run_udil(value)?,
                _ => return Err(unknown_key()),
            },
            "statement" => match name {
                "current" => {
                    let stmt = expect_statement(value)?;
                    return Ok(self.parse_statement(&stmt));
                }
                _ => return Err(unknown_key()),
            },
            "udil" => return self.write_udil(name, value),
            _ => return Err(SyncError::UnknownChannel(channel.to_string())),
        }
        Ok(Flow::Continue)
    }

    pub fn sync_read(&self, channel: &str, name: &str) -> Result<Value, SyncError> {
        tracing::debug!(channel, name, "sync read");
        match channel {
            "context-out" => self
                .sync
                .context_out
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| SyncError::MissingContextOut(name.to_string())),
            "context-current" => Ok(Value::Int(self.table.lookup(name).is_some() as i64)),
            "udil" => match name {
                "pc_counter" => Ok(Value::Int(self.pc_counter() as i64)),
                "temp" => Ok(self.sync.temp.clone().unwrap_or(Value::Null)),
                _ => Err(SyncError::UnknownKey {
                    channel: channel.to_string(),
                    key: name.to_string(),
                }),
            },
            _ => Err(SyncError::UnknownChannel(channel.to_string())),
        }
    }

    fn write_current(&mut self, op: &str, value: Value) -> Result<(), SyncError> {
        match op {
            "insert" | "update" => {
                let items = match value {
                    Value::List(items) => items,
                    other => {
                        return Err(SyncError::BadArgument(format!(
                            "expected [name, type, value], got {}",
                            other
                        )))
                    }
                };
                let [name, ty, value] = <[Value; 3]>::try_from(items).map_err(|items| {
                    SyncError::BadArgument(format!(
                        "expected [name, type, value], got {} items",
                        items.len()
                    ))
                })?;
                let name = name.key_text();
                let tag = TypeTag::from_name(&ty.key_text()).ok_or_else(|| {
                    SyncError::BadArgument(format!("unknown type {}", ty))
                })?;
                if !value.fits(tag) {
                    return Err(SyncError::BadArgument(format!(
                        "{} does not fit type {}",
                        value, tag
                    )));
                }
                if op == "insert" {
                    self.table.insert(&name, tag, value)?;
                } else {
                    self.table.update(&name, tag, value)?;
                }
            }
            "delete" => {
                let target = match value {
                    Value::Int(0) => Delete::All,
                    other => Delete::Name(other.key_text()),
                };
                if !self.table.delete(&target) {
                    if let Delete::Name(name) = target {
                        return Err(ScopeError::Undefined(name).into());
                    }
                }
            }
            _ => {
                return Err(SyncError::UnknownKey {
                    channel: "context-current".to_string(),
                    key: op.to_string(),
                })
            }
        }
        Ok(())
    }

    fn write_udil(&mut self, name: &str, value: Value) -> Result<Flow, SyncError> {
        match name {
            "root" => self.root = expect_block(value)?,
            "text" => {
                let src = expect_text(value, "program text")?;
                let program = udil_parser::parse_source(&src)?;
                let first = program
                    .statements
                    .into_iter()
                    .next()
                    .ok_or_else(|| SyncError::BadArgument("text holds no statement".to_string()))?;
                self.sync.temp = Some(Value::Block(first));
            }
            "statement" => match value {
                Value::Block(stmt) => self.sync.temp = Some(Value::Text(stmt.to_string())),
                other => {
                    self.sync.temp = None;
                    return Err(SyncError::ExpectedBlock(other.to_string()));
                }
            },
            "pc_counter" => {
                self.pc_counter =
                    as_index(&value).map_err(|e| SyncError::BadArgument(e.to_string()))?;
            }
            "restart" => {
                if value == Value::Int(1) {
                    return Ok(Flow::JumpTo(self.pc_counter));
                }
            }
            "halt" => {
                if value == Value::Int(1) {
                    return Ok(Flow::Halt);
                }
            }
            _ => {
                return Err(SyncError::UnknownKey {
                    channel: "udil".to_string(),
                    key: name.to_string(),
                })
            }
        }
        Ok(Flow::Continue)
    }

    fn run_script(&mut self, value: Value) -> Result<(), SyncError> {
        let program = expect_text(value, "script program")?;
        let script = delegate::script_source(&self.sync.context_in, &self.sync.context_out, &program);
        tracing::info!(inputs = self.sync.context_in.len(), outputs = self.sync.context_out.len(), "launching script delegate");
        let outputs = self.sync.script.run(&self.sync.toolchain, &script)?;
        for (slot, value) in self.sync.context_out.iter_mut().zip(outputs) {
            slot.1 = value;
        }
        Ok(())
    }

    fn run_jvm(&mut self, value: Value) -> Result<(), SyncError> {
        let program = expect_text(value, "jvm program")?;
        let unit = delegate::jvm_unit(&self.sync.context_in, &self.sync.context_out, &program)?;
        tracing::info!(class = %unit.class_name, accessors = unit.accessors.len(), "launching jvm delegate");
        let values = self.sync.jvm.run(&self.sync.toolchain, &unit)?;
        for (accessor, value) in unit.accessors.iter().zip(values) {
            if let Some(slot) = self
                .sync
                .context_out
                .iter_mut()
                .find(|(n, _)| *n == accessor.name)
            {
                slot.1 = value;
            }
        }
        Ok(())
    }

    /// Runs a block in a fresh interpreter seeded from `context-in`, then
    /// copies every `context-out` name back out of it. Nothing is copied
    /// unless every name resolves in the child.
    fn run_udil(&mut self, value: Value) -> Result<(), SyncError> {
        let stmt = expect_block(value)?;
        let Some(block) = stmt.as_block() else {
            return Err(SyncError::ExpectedBlock(stmt.to_string()));
        };
        let mut child = Interpreter::from_sync(self.sync.child());
        for (name, value) in &self.sync.context_in {
            let Some(tag) = value.type_tag() else {
                continue;
            };
            if child.table.insert(name, tag, value.clone()).is_err() {
                child.table.update(name, tag, value.clone())?;
            }
        }
        child.root = Rc::new(Statement::block(
            block.id.clone(),
            block.statements.clone(),
            stmt.position,
        ));
        tracing::info!(block = %block.id, statements = block.len(), "launching udil delegate");
        child.exec_root();
        self.reports.append(&mut child.reports);
        let outputs = self
            .sync
            .context_out
            .iter()
            .map(|(name, _)| {
                child
                    .table
                    .lookup(name)
                    .map(|b| b.value.clone())
                    .ok_or_else(|| ScopeError::Undefined(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for ((_, slot), value) in self.sync.context_out.iter_mut().zip(outputs) {
            *slot = value;
        }
        Ok(())
    }
}
