//! Bytecode compiler
//!
//! Lowers the AST of one chunk into [`Function`]s for the VM. Jump targets
//! are absolute instruction indices. Top-level `let`s and every name not
//! bound inside a function are globals; parameters and `let`s inside a
//! function body are frame slots.

use std::fmt;
use std::rc::Rc;

use super::ast::*;
use super::errors::CompileError;
use super::value::{NativeFunction, Value};

/// One VM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Constant(u16),
    Nil,
    True,
    False,
    Pop,
    GetLocal(u16),
    SetLocal(u16),
    GetGlobal(u16),
    SetGlobal(u16),
    GetField(u16),
    SetField(u16),
    Index,
    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Jump(usize),
    /// Jump when the top of the stack is falsy. Does not pop.
    JumpIfFalse(usize),
    /// Jump when the top of the stack is truthy. Does not pop.
    JumpIfTrue(usize),
    Call(u8),
    Return,
}

/// Compiled code of one function.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub constants: Vec<Value>,
    /// Source line of each instruction
    pub lines: Vec<usize>,
}

impl Chunk {
    fn emit(
        &mut self,
        op: Op,
        line: usize,
    ) -> usize {
        self.code.push(op);
        self.lines.push(line);
        self.code.len() - 1
    }

    /// Line of the instruction at `ip`.
    #[inline]
    pub fn line(
        &self,
        ip: usize,
    ) -> usize {
        self.lines.get(ip).copied().unwrap_or(0)
    }
}

/// What kind of code a function holds, for tracebacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    Main,
    Named(String),
    Anonymous,
    /// Wrapper that calls a builtin as a task body.
    Trampoline(&'static str),
}

/// A compiled function.
#[derive(Debug, Clone)]
pub struct Function {
    pub kind: FunctionKind,
    /// Chunk name, e.g. the file it was loaded from
    pub source: Rc<str>,
    /// Line of the definition
    pub line: usize,
    pub arity: u8,
    /// Slots a frame needs, parameters included
    pub local_count: u16,
    pub chunk: Chunk,
}

impl Function {
    /// A function whose body calls `native` with no arguments.
    pub fn trampoline(native: NativeFunction) -> Self {
        let mut chunk = Chunk::default();
        chunk.constants.push(Value::Native(native));
        chunk.emit(Op::Constant(0), 0);
        chunk.emit(Op::Call(0), 0);
        chunk.emit(Op::Return, 0);
        Self {
            kind: FunctionKind::Trampoline(native.name),
            source: Rc::from("[builtin]"),
            line: 0,
            arity: 0,
            local_count: 0,
            chunk,
        }
    }

    /// Name used when printing the function value.
    pub fn display_name(&self) -> String {
        match &self.kind {
            FunctionKind::Main => format!("{} main chunk", self.source),
            FunctionKind::Named(name) => name.clone(),
            FunctionKind::Anonymous => format!("<{}:{}>", self.source, self.line),
            FunctionKind::Trampoline(name) => name.to_string(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.kind {
            FunctionKind::Main => f.write_str("main chunk"),
            FunctionKind::Named(name) => write!(f, "function '{}'", name),
            FunctionKind::Anonymous => write!(f, "function <{}:{}>", self.source, self.line),
            FunctionKind::Trampoline(name) => write!(f, "builtin '{}'", name),
        }
    }
}

/// Compile a parsed chunk into its main function.
pub fn compile_program(
    program: &Program,
    chunk_name: &str,
) -> Result<Rc<Function>, CompileError> {
    let source: Rc<str> = Rc::from(chunk_name);
    let mut compiler = FunctionCompiler::new(FunctionKind::Main, Rc::clone(&source), 1, false);
    compiler.statements(&program.statements)?;
    let last_line = program
        .statements
        .last()
        .map(|s| s.span.end.line)
        .unwrap_or(1);
    compiler.emit(Op::Nil, last_line);
    compiler.emit(Op::Return, last_line);
    Ok(Rc::new(compiler.finish(0)))
}

struct FunctionCompiler {
    kind: FunctionKind,
    source: Rc<str>,
    line: usize,
    chunk: Chunk,
    /// Block scopes of local names. Always empty in the main chunk.
    scopes: Vec<Vec<(String, u16)>>,
    in_function: bool,
    local_count: u16,
}

impl FunctionCompiler {
    fn new(
        kind: FunctionKind,
        source: Rc<str>,
        line: usize,
        in_function: bool,
    ) -> Self {
        Self {
            kind,
            source,
            line,
            chunk: Chunk::default(),
            scopes: Vec::new(),
            in_function,
            local_count: 0,
        }
    }

    fn finish(
        self,
        arity: u8,
    ) -> Function {
        Function {
            kind: self.kind,
            source: self.source,
            line: self.line,
            arity,
            local_count: self.local_count,
            chunk: self.chunk,
        }
    }

    fn error(
        &self,
        line: usize,
        message: impl Into<String>,
    ) -> CompileError {
        CompileError::Codegen {
            chunk: self.source.to_string(),
            line,
            message: message.into(),
        }
    }

    fn emit(
        &mut self,
        op: Op,
        line: usize,
    ) -> usize {
        self.chunk.emit(op, line)
    }

    fn constant(
        &mut self,
        value: Value,
        line: usize,
    ) -> Result<u16, CompileError> {
        if let Value::Str(s) = &value {
            if let Some(i) = self
                .chunk
                .constants
                .iter()
                .position(|c| c.as_str() == Some(&**s))
            {
                return Ok(i as u16);
            }
        }
        let index = u16::try_from(self.chunk.constants.len())
            .map_err(|_| self.error(line, "too many constants in one function"))?;
        self.chunk.constants.push(value);
        Ok(index)
    }

    fn name_constant(
        &mut self,
        name: &str,
        line: usize,
    ) -> Result<u16, CompileError> {
        self.constant(Value::string(name), line)
    }

    fn patch_jump(
        &mut self,
        at: usize,
    ) {
        let target = self.chunk.code.len();
        match &mut self.chunk.code[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => *t = target,
            _ => {}
        }
    }

    fn declare_local(
        &mut self,
        name: &str,
        line: usize,
    ) -> Result<u16, CompileError> {
        let slot = self.local_count;
        self.local_count = self
            .local_count
            .checked_add(1)
            .ok_or_else(|| self.error(line, "too many local variables in one function"))?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), slot));
        }
        Ok(slot)
    }

    fn resolve_local(
        &self,
        name: &str,
    ) -> Option<u16> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(local, _)| local == name)
            .map(|(_, slot)| *slot)
    }

    fn begin_scope(&mut self) {
        if self.in_function {
            self.scopes.push(Vec::new());
        }
    }

    fn end_scope(&mut self) {
        if self.in_function {
            self.scopes.pop();
        }
    }

    fn block(
        &mut self,
        statements: &[Stmt],
    ) -> Result<(), CompileError> {
        self.begin_scope();
        let result = self.statements(statements);
        self.end_scope();
        result
    }

    fn statements(
        &mut self,
        statements: &[Stmt],
    ) -> Result<(), CompileError> {
        statements.iter().try_for_each(|stmt| self.statement(stmt))
    }

    /// Store the value on top of the stack into a new binding.
    fn define(
        &mut self,
        name: &str,
        line: usize,
    ) -> Result<(), CompileError> {
        if self.in_function {
            let slot = self.declare_local(name, line)?;
            self.emit(Op::SetLocal(slot), line);
        } else {
            let index = self.name_constant(name, line)?;
            self.emit(Op::SetGlobal(index), line);
        }
        Ok(())
    }

    fn statement(
        &mut self,
        stmt: &Stmt,
    ) -> Result<(), CompileError> {
        let line = stmt.span.start.line;
        match &stmt.value {
            StmtKind::Let { name, value } => {
                self.expression(value)?;
                self.define(name, line)?;
            }
            StmtKind::Function(decl) => {
                self.function(decl)?;
                if let Some(name) = &decl.name {
                    self.define(name, line)?;
                }
            }
            StmtKind::Assign { target, value } => match target {
                AssignTarget::Var(name) => {
                    self.expression(value)?;
                    match self.resolve_local(name) {
                        Some(slot) => {
                            self.emit(Op::SetLocal(slot), line);
                        }
                        None => {
                            let index = self.name_constant(name, line)?;
                            self.emit(Op::SetGlobal(index), line);
                        }
                    }
                }
                AssignTarget::Field { object, name } => {
                    self.expression(object)?;
                    self.expression(value)?;
                    let index = self.name_constant(name, line)?;
                    self.emit(Op::SetField(index), line);
                }
            },
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition)?;
                let to_else = self.emit(Op::JumpIfFalse(usize::MAX), line);
                self.emit(Op::Pop, line);
                self.block(then_branch)?;
                let to_end = self.emit(Op::Jump(usize::MAX), line);
                self.patch_jump(to_else);
                self.emit(Op::Pop, line);
                if let Some(else_branch) = else_branch {
                    self.block(else_branch)?;
                }
                self.patch_jump(to_end);
            }
            StmtKind::While { condition, body } => {
                let start = self.chunk.code.len();
                self.expression(condition)?;
                let to_exit = self.emit(Op::JumpIfFalse(usize::MAX), line);
                self.emit(Op::Pop, line);
                self.block(body)?;
                self.emit(Op::Jump(start), line);
                self.patch_jump(to_exit);
                self.emit(Op::Pop, line);
            }
            StmtKind::Return(value) => {
                match value {
                    Some(value) => self.expression(value)?,
                    None => {
                        self.emit(Op::Nil, line);
                    }
                }
                self.emit(Op::Return, line);
            }
            StmtKind::Expr(expr) => {
                self.expression(expr)?;
                self.emit(Op::Pop, line);
            }
        }
        Ok(())
    }

    /// Compile a nested function and push it as a constant.
    fn function(
        &mut self,
        decl: &FunctionDecl,
    ) -> Result<(), CompileError> {
        let line = decl.span.start.line;
        let kind = match &decl.name {
            Some(name) => FunctionKind::Named(name.clone()),
            None => FunctionKind::Anonymous,
        };
        let mut inner = FunctionCompiler::new(kind, Rc::clone(&self.source), line, true);
        inner.scopes.push(Vec::new());
        for param in &decl.params {
            inner.declare_local(param, line)?;
        }
        inner.statements(&decl.body)?;
        let end_line = decl.span.end.line;
        inner.emit(Op::Nil, end_line);
        inner.emit(Op::Return, end_line);

        let arity = u8::try_from(decl.params.len()).map_err(|_| self.error(line, "too many parameters"))?;
        let function = inner.finish(arity);
        let index = self.constant(Value::Function(Rc::new(function)), line)?;
        self.emit(Op::Constant(index), line);
        Ok(())
    }

    fn expression(
        &mut self,
        expr: &Expr,
    ) -> Result<(), CompileError> {
        let line = expr.span.start.line;
        match &expr.value {
            ExprKind::Nil => {
                self.emit(Op::Nil, line);
            }
            ExprKind::Bool(true) => {
                self.emit(Op::True, line);
            }
            ExprKind::Bool(false) => {
                self.emit(Op::False, line);
            }
            ExprKind::Number(n) => {
                let index = self.constant(Value::Number(*n), line)?;
                self.emit(Op::Constant(index), line);
            }
            ExprKind::Str(s) => {
                let index = self.constant(Value::string(s), line)?;
                self.emit(Op::Constant(index), line);
            }
            ExprKind::Var(name) => match self.resolve_local(name) {
                Some(slot) => {
                    self.emit(Op::GetLocal(slot), line);
                }
                None => {
                    let index = self.name_constant(name, line)?;
                    self.emit(Op::GetGlobal(index), line);
                }
            },
            ExprKind::Unary { op, operand } => {
                self.expression(operand)?;
                self.emit(
                    match op {
                        UnaryOp::Neg => Op::Neg,
                        UnaryOp::Not => Op::Not,
                    },
                    line,
                );
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expression(lhs)?;
                self.expression(rhs)?;
                let op = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::Ne => Op::Ne,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::Le => Op::Le,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::Ge => Op::Ge,
                };
                self.emit(op, line);
            }
            ExprKind::Logical { op, lhs, rhs } => {
                self.expression(lhs)?;
                let jump = match op {
                    LogicalOp::And => Op::JumpIfFalse(usize::MAX),
                    LogicalOp::Or => Op::JumpIfTrue(usize::MAX),
                };
                let to_end = self.emit(jump, line);
                self.emit(Op::Pop, line);
                self.expression(rhs)?;
                self.patch_jump(to_end);
            }
            ExprKind::Call { callee, args } => {
                self.expression(callee)?;
                for arg in args {
                    self.expression(arg)?;
                }
                let argc = u8::try_from(args.len()).map_err(|_| self.error(line, "too many arguments"))?;
                self.emit(Op::Call(argc), line);
            }
            ExprKind::Field { object, name } => {
                self.expression(object)?;
                let index = self.name_constant(name, line)?;
                self.emit(Op::GetField(index), line);
            }
            ExprKind::Index { object, index } => {
                self.expression(object)?;
                self.expression(index)?;
                self.emit(Op::Index, line);
            }
            ExprKind::Function(decl) => self.function(decl)?,
        }
        Ok(())
    }
}
