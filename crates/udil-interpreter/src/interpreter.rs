//! Main interpreter engine.

use std::fmt;
use std::rc::Rc;

use udil_syntax::ast::*;

use crate::delegate::{JvmRuntime, ProcessJvm, ProcessScript, ScriptRuntime, Toolchain};
use crate::error::{EvalError, ExecError, ScopeError};
use crate::eval::{as_index, truth, Evaluator, Grammar};
use crate::flow::Flow;
use crate::symbols::SymbolTable;
use crate::sync::SyncState;
use crate::value::Value;

/// A statement that failed. Failures never stop the program.
#[derive(Debug)]
pub struct Report {
    /// Source line of the statement
    pub position: usize,
    /// Canonical text of the statement
    pub text: String,
    pub error: ExecError,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.position, self.text, self.error)
    }
}

/// Rejects `value` unless a binding tagged `tag` may hold it as is. There is
/// no implicit widening: an int never lands in a `real` binding.
pub(crate) fn checked(name: &str, tag: TypeTag, value: Value) -> Result<Value, ExecError> {
    if value.fits(tag) {
        Ok(value)
    } else {
        Err(ExecError::ValueTypeMismatch {
            name: name.to_string(),
            expected: tag,
            found: value.type_name().to_string(),
        })
    }
}

/// Largest list an indexed store may auto-extend to.
pub const MAX_LIST_LEN: usize = 1 << 20;

fn grow_limit(index: usize) -> Result<usize, ExecError> {
    if index < MAX_LIST_LEN {
        Ok(index + 1)
    } else {
        Err(ExecError::IndexTooLarge {
            index,
            limit: MAX_LIST_LEN,
        })
    }
}

fn empty_root() -> Rc<Statement> {
    Rc::new(Statement::block("root", Vec::new(), 1))
}

pub struct Interpreter {
    pub(crate) table: SymbolTable,
    /// The program `exec_root` walks; always a block statement
    pub(crate) root: Rc<Statement>,
    /// Index of the root statement being executed
    pub(crate) pc_counter: usize,
    resume_from_block: bool,
    pub(crate) sync: SyncState,
    pub(crate) reports: Vec<Report>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter whose delegates run as external processes configured
    /// from the environment.
    pub fn new() -> Self {
        Self::with_runtimes(
            Toolchain::from_env(),
            Rc::new(ProcessScript),
            Rc::new(ProcessJvm),
        )
    }

    pub fn with_runtimes(
        toolchain: Toolchain,
        script: Rc<dyn ScriptRuntime>,
        jvm: Rc<dyn JvmRuntime>,
    ) -> Self {
        Self::from_sync(SyncState::new(toolchain, script, jvm))
    }

    pub(crate) fn from_sync(sync: SyncState) -> Self {
        Self {
            table: SymbolTable::new(),
            root: empty_root(),
            pc_counter: 0,
            resume_from_block: false,
            sync,
            reports: Vec::new(),
        }
    }

    /// Clears variables, program, counters, reports and staged sync state.
    /// The toolchain and runtimes are kept.
    pub fn reset(&mut self) {
        self.table = SymbolTable::new();
        self.root = empty_root();
        self.pc_counter = 0;
        self.sync.clear();
        self.reports.clear();
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SymbolTable {
        &mut self.table
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.table.lookup(name).map(|b| &b.value)
    }

    pub fn root(&self) -> &Rc<Statement> {
        &self.root
    }

    /// Index of the root statement being executed.
    pub fn pc_counter(&self) -> usize {
        self.pc_counter
    }

    /// When set, `exec_root` starts from the root block's `exec_counter`
    /// and keeps that counter up to date.
    pub fn set_resume_from_block(&mut self, on: bool) {
        self.resume_from_block = on;
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn take_reports(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports)
    }

    pub fn context_in(&self) -> &[(String, Value)] {
        &self.sync.context_in
    }

    pub fn context_out(&self) -> &[(String, Value)] {
        &self.sync.context_out
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.sync.toolchain
    }

    pub fn toolchain_mut(&mut self) -> &mut Toolchain {
        &mut self.sync.toolchain
    }

    /// Evaluates expression text in the current scope.
    pub fn evaluate(&self, text: &str, grammar: Option<Grammar>) -> Result<Value, EvalError> {
        Evaluator::new(&self.table).evaluate(text, grammar)
    }

    pub(crate) fn eval(&self, expr: &Expr, grammar: Option<Grammar>) -> Result<Value, EvalError> {
        Evaluator::new(&self.table).eval_expr(expr, grammar)
    }

    /// Parses `src` and installs it as the root block, rewinding the program
    /// counter.
    pub fn parse_program(&mut self, src: &str) -> udil_syntax::Result<()> {
        let program = udil_parser::parse_source(src)?;
        self.root = Rc::new(Statement::block("root", program.statements, 1));
        self.pc_counter = 0;
        Ok(())
    }

    /// Runs the root block from the program counter to its end, following
    /// jumps. Returns `false` if any statement failed on the way.
    ///
    /// The counter advances by one after every statement, so a statement
    /// that overwrites it through `sync("udil", "pc_counter")` lands on the
    /// statement after the written index. A restart re-enters at the written
    /// index itself.
    pub fn exec_root(&mut self) -> bool {
        let failures = self.reports.len();
        if self.resume_from_block {
            if let Some(block) = self.root.as_block() {
                self.pc_counter = block.exec_counter.get();
            }
        }
        loop {
            let root = Rc::clone(&self.root);
            let Some(block) = root.as_block() else {
                break;
            };
            let index = self.pc_counter;
            let Some(stmt) = block.statements.get(index).cloned() else {
                break;
            };
            let flow = self.parse_statement(&stmt);
            match flow {
                Flow::Continue | Flow::Halt => self.pc_counter = self.pc_counter.saturating_add(1),
                Flow::JumpTo(target) => {
                    tracing::debug!(from = index, to = target, "restarting root program");
                    self.pc_counter = target;
                }
            }
            if self.resume_from_block {
                if let Some(block) = self.root.as_block() {
                    block.exec_counter.set(self.pc_counter);
                }
            }
            if flow == Flow::Halt {
                tracing::debug!(at = index, "root program halted");
                break;
            }
        }
        self.reports.len() == failures
    }

    /// Executes one statement, recording a [`Report`] if it fails.
    pub fn parse_statement(&mut self, stmt: &Rc<Statement>) -> Flow {
        tracing::debug!(position = stmt.position, kind = stmt.kind_name(), text = %stmt, "executing statement");
        match self.execute(stmt) {
            Ok(flow) => flow,
            Err(error) => {
                tracing::warn!(position = stmt.position, %error, "statement failed");
                self.reports.push(Report {
                    position: stmt.position,
                    text: stmt.to_string(),
                    error,
                });
                Flow::Continue
            }
        }
    }

    /// Executes one statement against the current scope.
    pub fn execute(&mut self, stmt: &Rc<Statement>) -> Result<Flow, ExecError> {
        match &stmt.kind {
            StmtKind::Declaration { ty, name } => {
                let tag = ty
                    .tag()
                    .ok_or_else(|| ScopeError::VoidBinding(name.clone()))?;
                self.table.insert(name, tag, Value::zero(tag))?;
                Ok(Flow::Continue)
            }
            StmtKind::DeclAssign { ty, name, expr } => {
                let tag = ty
                    .tag()
                    .ok_or_else(|| ScopeError::VoidBinding(name.clone()))?;
                let value = self.eval(expr, Some(Grammar::for_tag(tag)))?;
                let value = checked(name, tag, value)?;
                self.table.insert(name, tag, value)?;
                Ok(Flow::Continue)
            }
            StmtKind::Assignment { target, expr } => self.exec_assignment(target, expr),
            StmtKind::Block(block) => {
                if !block.id.is_empty() {
                    self.table
                        .insert(&block.id, TypeTag::Block, Value::Block(Rc::clone(stmt)))?;
                }
                Ok(Flow::Continue)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let c = self.eval(cond, None)?;
                if truth(&c)? {
                    Ok(self.exec_body(then_block))
                } else if let Some(else_block) = else_block {
                    Ok(self.exec_body(else_block))
                } else {
                    Ok(Flow::Continue)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    let c = self.eval(cond, None)?;
                    if !truth(&c)? {
                        break;
                    }
                    match self.exec_body(body) {
                        Flow::Continue => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Continue)
            }
            StmtKind::For { .. } | StmtKind::Return(_) | StmtKind::FunctionDef { .. } => {
                Err(ExecError::NotExecutable(stmt.kind_name()))
            }
            StmtKind::Expression(_) => Ok(Flow::Continue),
            StmtKind::SyncWrite { key, value } => self.exec_sync_write(key, value),
            StmtKind::SyncRead { target, ty, parts } => self.exec_sync_read(target, *ty, parts),
        }
    }

    /// Runs `body` in a fresh child scope. Jumps and halts cut the body short.
    fn exec_body(&mut self, body: &[Rc<Statement>]) -> Flow {
        self.table.push_scope();
        let mut flow = Flow::Continue;
        for s in body {
            flow = self.parse_statement(s);
            if flow != Flow::Continue {
                break;
            }
        }
        self.table.pop_scope();
        flow
    }

    fn exec_assignment(&mut self, target: &AssignTarget, expr: &Expr) -> Result<Flow, ExecError> {
        let name = &target.name;
        let (tag, current) = self
            .table
            .lookup(name)
            .map(|b| (b.ty, b.value.clone()))
            .ok_or_else(|| ScopeError::Undefined(name.clone()))?;

        if target.indices.is_empty() {
            let value = self.eval(expr, Some(Grammar::for_tag(tag)))?;
            let value = checked(name, tag, value)?;
            self.table.update(name, tag, value)?;
            return Ok(Flow::Continue);
        }

        let Value::List(mut items) = current else {
            return Err(ExecError::NotAList(name.clone()));
        };
        if target.indices.len() > 2 {
            return Err(ExecError::TooManyIndices(target.indices.len()));
        }
        let value = self.eval(expr, None)?;
        let mut indices = Vec::with_capacity(target.indices.len());
        for index in &target.indices {
            indices.push(as_index(&self.eval(index, Some(Grammar::Logic))?)?);
        }
        match indices[..] {
            [i] => {
                if i >= items.len() {
                    items.resize(grow_limit(i)?, Value::Null);
                }
                items[i] = value;
            }
            [i, j] => {
                let row_len = grow_limit(j)?;
                if i >= items.len() {
                    let rows = grow_limit(i)?;
                    if (rows - items.len()).saturating_mul(row_len) > MAX_LIST_LEN {
                        return Err(ExecError::IndexTooLarge {
                            index: i,
                            limit: MAX_LIST_LEN,
                        });
                    }
                    items.resize(rows, Value::List(vec![Value::Null; row_len]));
                }
                match &mut items[i] {
                    Value::List(row) => {
                        if j >= row.len() {
                            row.resize(row_len, Value::Null);
                        }
                        row[j] = value;
                    }
                    _ => return Err(ExecError::NotAList(format!("{}[{}]", name, i))),
                }
            }
            _ => return Err(ExecError::TooManyIndices(indices.len())),
        }
        self.table.update(name, tag, Value::List(items))?;
        Ok(Flow::Continue)
    }
}
