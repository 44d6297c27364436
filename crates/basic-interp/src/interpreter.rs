//! The tree-walking statement/expression executor: the part of the package
//! that actually runs a parsed program against an [`IoPort`].
//!
//! Execution is indexed by `(line_index, statement_index)` into a flat,
//! line-number-sorted `Vec<Line>` rather than by following `basic_lang::Expr`
//! pointers around, which is what lets `GOTO`/`GOSUB`/`FOR...NEXT` jump
//! around freely: every control-transferring statement just produces a new
//! cursor position instead of a native call/return.

use std::collections::HashMap;

use basic_lang::{BinaryOp, Expr, Line, PrintItem, Statement, TypeSuffix, UnaryOp, VarRef};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::builtins;
use crate::env::{truncate_name, Environment};
use crate::error::{BasicError, RuntimeError};
use crate::io::IoPort;
use crate::value::Value;

const PRINT_ZONE_WIDTH: usize = 16;

/// Real Applesoft carves the FOR/GOSUB stacks out of a fixed string-space
/// arena, so runaway recursion fails with `OUT OF MEMORY` rather than
/// growing forever; the spec calls this out as unbounded-but-failing
/// (section 3), so this crate enforces a generous depth instead of an
/// exact byte budget.
const MAX_STACK_DEPTH: usize = 4096;

#[derive(Debug, Clone)]
struct ForFrame {
    var_name: String,
    limit: f64,
    step: f64,
    /// Cursor to resume at for another pass through the loop body.
    resume_line: usize,
    resume_stmt: usize,
}

#[derive(Debug, Clone, Copy)]
struct GosubFrame {
    return_line: usize,
    return_stmt: usize,
}

/// What a statement wants execution to do next.
enum Flow {
    /// Fall through to the next statement in sequence.
    Next,
    /// Jump straight to a `(line_index, statement_index)` cursor.
    Jump(usize, usize),
    /// `END`/`STOP`, or falling off the end of the program.
    Halt,
}

/// One flattened `DATA` item plus the line it came from, for `RESTORE n`.
struct DataItem {
    line: u32,
    text: String,
}

/// A loaded, ready-to-run program.
pub struct Interpreter {
    lines: Vec<Line>,
    line_index: HashMap<u32, usize>,
    env: Environment,
    for_stack: Vec<ForFrame>,
    gosub_stack: Vec<GosubFrame>,
    data: Vec<DataItem>,
    data_cursor: usize,
    rng: StdRng,
    column: usize,
    himem: f64,
    lomem: f64,
    /// `(line_index, statement_index)` of the statement currently
    /// executing, so `FOR`/`GOSUB`/`ON...GOSUB` can record where to resume.
    current_cursor: (usize, usize),
}

impl Interpreter {
    /// Parses `source` and builds the DATA queue and line index up front,
    /// exactly as loading a program into real Applesoft does.
    #[must_use]
    pub fn load(source: &str) -> Self {
        let lines = basic_lang::parse_program(source);
        Self::from_lines(lines)
    }

    #[must_use]
    pub fn from_lines(lines: Vec<Line>) -> Self {
        let mut interp = Self {
            lines,
            line_index: HashMap::new(),
            env: Environment::new(),
            for_stack: Vec::new(),
            gosub_stack: Vec::new(),
            data: Vec::new(),
            data_cursor: 0,
            rng: StdRng::seed_from_u64(0),
            column: 0,
            himem: 0.0,
            lomem: 0.0,
            current_cursor: (0, 0),
        };
        interp.rebuild_index();
        interp
    }

    /// Adds a line to the loaded program, or replaces it if its number is
    /// already present, as happens when a program is typed in one line at
    /// a time. The line index and `DATA` queue are rebuilt to match, so a
    /// `DATA` statement entered this way is visible to the next `RUN`.
    pub fn set_line(&mut self, line: Line) {
        match self.lines.binary_search_by_key(&line.number, |l| l.number) {
            Ok(pos) => self.lines[pos] = line,
            Err(pos) => self.lines.insert(pos, line),
        }
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.line_index.clear();
        for (i, line) in self.lines.iter().enumerate() {
            self.line_index.entry(line.number).or_insert(i);
        }
        self.data.clear();
        self.data_cursor = 0;
        for line in &self.lines {
            for statement in &line.statements {
                if let Statement::Data { values } = statement {
                    for v in values {
                        self.data.push(DataItem {
                            line: line.number,
                            text: v.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Reseeds the RNG `RND` draws from. Two runs seeded identically, fed
    /// identical `IoPort` input, produce identical output.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Current `HIMEM:`/`LOMEM:` boundaries, for a host that wants to
    /// reserve the matching address range from the program's own storage.
    #[must_use]
    pub fn himem(&self) -> f64 {
        self.himem
    }

    #[must_use]
    pub fn lomem(&self) -> f64 {
        self.lomem
    }

    /// Runs the whole program from its first line to `END`/`STOP`/program
    /// fall-off, or until a runtime error interrupts it.
    pub fn run(&mut self, io: &mut dyn IoPort) -> Result<(), RuntimeError> {
        self.run_from(0, 0, io)
    }

    /// Executes an unnumbered (immediate-mode) statement list typed at a
    /// prompt, against whatever program is already loaded. A bare
    /// `GOTO`/`GOSUB` in that list jumps into the loaded program exactly as
    /// it would from a numbered line; anything else (a plain `PRINT X` or
    /// assignment) runs once and returns control to the prompt.
    pub fn run_immediate(&mut self, statements: &[Statement], io: &mut dyn IoPort) -> Result<(), RuntimeError> {
        let line = 0;
        let flow = self
            .exec_inline_block(statements, line, io)
            .map_err(|error| RuntimeError { error, line })?;
        match flow {
            Flow::Next | Flow::Halt => Ok(()),
            Flow::Jump(l, s) => self.run_from(l, s, io),
        }
    }

    fn run_from(&mut self, mut line_idx: usize, mut stmt_idx: usize, io: &mut dyn IoPort) -> Result<(), RuntimeError> {
        loop {
            if line_idx >= self.lines.len() {
                return Ok(());
            }
            if stmt_idx >= self.lines[line_idx].statements.len() {
                line_idx += 1;
                stmt_idx = 0;
                continue;
            }
            let line_number = self.lines[line_idx].number;
            let statement = self.lines[line_idx].statements[stmt_idx].clone();
            self.current_cursor = (line_idx, stmt_idx);
            let flow = self.exec_statement(&statement, line_number, io).map_err(|error| RuntimeError {
                error,
                line: line_number,
            })?;
            match flow {
                Flow::Next => stmt_idx += 1,
                Flow::Jump(l, s) => {
                    line_idx = l;
                    stmt_idx = s;
                }
                Flow::Halt => return Ok(()),
            }
        }
    }

    fn resolve_line(&self, number: u32) -> Result<usize, BasicError> {
        self.line_index.get(&number).copied().ok_or(BasicError::UndefinedStatement)
    }

    #[allow(clippy::too_many_lines)]
    fn exec_statement(&mut self, statement: &Statement, line: u32, io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        match statement {
            Statement::Print { items } => self.exec_print(items, io),
            Statement::Input { prompt, vars } => self.exec_input(prompt.as_deref(), vars, io),
            Statement::Get { var } => self.exec_get(var, io),
            Statement::Let { target, value } => {
                let v = self.eval(value, io)?;
                self.assign(target, v, io)?;
                Ok(Flow::Next)
            }
            Statement::If { cond, then_branch, else_branch } => {
                let branch = if self.eval(cond, io)?.is_truthy() { then_branch } else { else_branch };
                self.exec_inline_block(branch, line, io)
            }
            Statement::For { var, start, end, step } => self.exec_for(var, start, end, step.as_ref(), io),
            Statement::Next { vars } => self.exec_next(vars),
            Statement::Goto(target) => Ok(Flow::Jump(self.resolve_line(*target)?, 0)),
            Statement::Gosub(target) => {
                if self.gosub_stack.len() >= MAX_STACK_DEPTH {
                    return Err(BasicError::OutOfMemory);
                }
                self.gosub_stack.push(GosubFrame {
                    return_line: self.current_cursor.0,
                    return_stmt: self.current_cursor.1 + 1,
                });
                Ok(Flow::Jump(self.resolve_line(*target)?, 0))
            }
            Statement::Return => {
                let frame = self.gosub_stack.pop().ok_or(BasicError::ReturnWithoutGosub)?;
                Ok(Flow::Jump(frame.return_line, frame.return_stmt))
            }
            Statement::On { selector, targets, is_gosub } => self.exec_on(selector, targets, *is_gosub, io),
            Statement::Dim { vars } => {
                for var in vars {
                    let dims = self.eval_subscripts(&var.subscripts, io)?;
                    self.env.dim(&var.name, var.suffix, dims)?;
                }
                Ok(Flow::Next)
            }
            Statement::Data { .. } => Ok(Flow::Next),
            Statement::Read { vars } => {
                for var in vars {
                    self.exec_read_one(var, io)?;
                }
                Ok(Flow::Next)
            }
            Statement::Restore(target) => {
                self.data_cursor = match target {
                    None => 0,
                    Some(n) => self.data.iter().position(|d| d.line >= *n).unwrap_or(self.data.len()),
                };
                Ok(Flow::Next)
            }
            Statement::End | Statement::Stop => Ok(Flow::Halt),
            Statement::Rem(_) => Ok(Flow::Next),
            Statement::Unparsed(_) => Err(BasicError::Syntax),
            Statement::DefFn { name, param, body } => {
                self.env.define_fn(name, param.clone(), body.clone());
                Ok(Flow::Next)
            }
            Statement::Home => {
                io.home();
                self.column = 0;
                Ok(Flow::Next)
            }
            Statement::Clear => {
                self.for_stack.clear();
                self.gosub_stack.clear();
                self.env.clear();
                Ok(Flow::Next)
            }
            Statement::Htab(expr) => {
                self.column = self.eval_index(expr, io)?;
                io.htab(self.column);
                Ok(Flow::Next)
            }
            Statement::Vtab(expr) => {
                let row = self.eval_index(expr, io)?;
                io.vtab(row);
                Ok(Flow::Next)
            }
            Statement::Text => {
                io.set_display_mode(crate::io::DisplayMode::Text);
                Ok(Flow::Next)
            }
            Statement::Gr => {
                io.set_display_mode(crate::io::DisplayMode::Gr);
                Ok(Flow::Next)
            }
            Statement::Hgr => {
                io.set_display_mode(crate::io::DisplayMode::Hgr);
                Ok(Flow::Next)
            }
            Statement::Hgr2 => {
                io.set_display_mode(crate::io::DisplayMode::Hgr2);
                Ok(Flow::Next)
            }
            Statement::Color(expr) => {
                let c = self.eval_index(expr, io)?;
                io.set_color(c as u8);
                Ok(Flow::Next)
            }
            Statement::Hcolor(expr) => {
                let c = self.eval_index(expr, io)?;
                io.set_hcolor(c as u8);
                Ok(Flow::Next)
            }
            Statement::Plot { x, y } => {
                let xi = self.eval_index(x, io)?;
                let yi = self.eval_index(y, io)?;
                io.plot(xi, yi);
                Ok(Flow::Next)
            }
            Statement::Hplot { points } => {
                let mut prev = None;
                for (x, y) in points {
                    let xi = self.eval_index(x, io)?;
                    let yi = self.eval_index(y, io)?;
                    if let Some((px, py)) = prev {
                        io.hplot_line(px, py, xi, yi);
                    } else {
                        io.hplot_line(xi, yi, xi, yi);
                    }
                    prev = Some((xi, yi));
                }
                Ok(Flow::Next)
            }
            Statement::Inverse => {
                io.set_text_style(crate::io::TextStyle::Inverse);
                Ok(Flow::Next)
            }
            Statement::Flash => {
                io.set_text_style(crate::io::TextStyle::Flash);
                Ok(Flow::Next)
            }
            Statement::Normal => {
                io.set_text_style(crate::io::TextStyle::Normal);
                Ok(Flow::Next)
            }
            Statement::Sleep(expr) => {
                let ticks = self.eval(expr, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
                io.sleep_ticks(ticks.max(0.0) as u64);
                Ok(Flow::Next)
            }
            Statement::Poke { address, value } => {
                let addr = self.eval_index(address, io)?;
                let v = self.eval_index(value, io)?;
                io.poke(addr as u16, v as u8);
                Ok(Flow::Next)
            }
            Statement::Call(expr) => {
                let addr = self.eval_index(expr, io)?;
                io.call(addr as u16);
                Ok(Flow::Next)
            }
            Statement::Himem(expr) => {
                self.himem = self.eval(expr, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
                Ok(Flow::Next)
            }
            Statement::Lomem(expr) => {
                self.lomem = self.eval(expr, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
                Ok(Flow::Next)
            }
            Statement::Draw { shape, at } | Statement::Xdraw { shape, at } => {
                let shape_n = self.eval_index(shape, io)?;
                let origin = match at {
                    Some((x, y)) => Some((self.eval_index(x, io)?, self.eval_index(y, io)?)),
                    None => None,
                };
                let xdraw = matches!(statement, Statement::Xdraw { .. });
                io.draw_shape(shape_n as u8, origin, xdraw);
                Ok(Flow::Next)
            }
            Statement::Ampersand(text) => {
                io.ampersand(text);
                Ok(Flow::Next)
            }
        }
    }

    /// Runs a statement list that lives entirely inside one line (an `IF`
    /// branch). A jump out of the block (via a nested `GOTO`, or the
    /// bare-line-number `THEN` sugar) propagates straight out; falling off
    /// the end of the block is `Flow::Next` for the *caller's* cursor, i.e.
    /// the statement after the whole `IF`.
    fn exec_inline_block(&mut self, block: &[Statement], line: u32, io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        for statement in block {
            match self.exec_statement(statement, line, io)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_for(
        &mut self,
        var: &VarRef,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        io: &mut dyn IoPort,
    ) -> Result<Flow, BasicError> {
        let start_v = self.eval(start, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
        let limit = self.eval(end, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
        let step_v = match step {
            Some(e) => self.eval(e, io)?.as_number().ok_or(BasicError::TypeMismatch)?,
            None => 1.0,
        };
        if self.for_stack.len() >= MAX_STACK_DEPTH {
            return Err(BasicError::OutOfMemory);
        }
        self.env.set_scalar(&var.name, TypeSuffix::Numeric, Value::Number(start_v));
        self.for_stack.push(ForFrame {
            var_name: var.name.clone(),
            limit,
            step: step_v,
            resume_line: self.current_cursor.0,
            resume_stmt: self.current_cursor.1 + 1,
        });
        Ok(Flow::Next)
    }

    fn exec_next(&mut self, vars: &[VarRef]) -> Result<Flow, BasicError> {
        if vars.is_empty() {
            return self.next_one(None);
        }
        let mut flow = Flow::Next;
        for (i, var) in vars.iter().enumerate() {
            flow = self.next_one(Some(var))?;
            if i != vars.len() - 1 && !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(flow)
    }

    fn next_one(&mut self, var: Option<&VarRef>) -> Result<Flow, BasicError> {
        loop {
            let frame = self.for_stack.pop().ok_or(BasicError::NextWithoutFor)?;
            if let Some(v) = var {
                if truncate_name(&v.name) != truncate_name(&frame.var_name) {
                    continue;
                }
            }
            let current = self.env.get_scalar(&frame.var_name, TypeSuffix::Numeric).as_number().unwrap_or(0.0);
            let next_val = current + frame.step;
            self.env.set_scalar(&frame.var_name, TypeSuffix::Numeric, Value::Number(next_val));
            let sign = if frame.step >= 0.0 { 1.0 } else { -1.0 };
            let continues = (next_val - frame.limit) * sign <= 0.0;
            if continues {
                let resume = (frame.resume_line, frame.resume_stmt);
                self.for_stack.push(frame);
                return Ok(Flow::Jump(resume.0, resume.1));
            }
            return Ok(Flow::Next);
        }
    }

    fn exec_on(&mut self, selector: &Expr, targets: &[u32], is_gosub: bool, io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        let n = self.eval(selector, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
        let idx = n as i64;
        if idx < 1 || idx as usize > targets.len() {
            return Ok(Flow::Next);
        }
        let target_line = targets[idx as usize - 1];
        let dest = self.resolve_line(target_line)?;
        if is_gosub {
            if self.gosub_stack.len() >= MAX_STACK_DEPTH {
                return Err(BasicError::OutOfMemory);
            }
            self.gosub_stack.push(GosubFrame {
                return_line: self.current_cursor.0,
                return_stmt: self.current_cursor.1 + 1,
            });
        }
        Ok(Flow::Jump(dest, 0))
    }

    fn exec_read_one(&mut self, var: &VarRef, io: &mut dyn IoPort) -> Result<(), BasicError> {
        if self.data_cursor >= self.data.len() {
            return Err(BasicError::OutOfData);
        }
        let text = self.data[self.data_cursor].text.clone();
        self.data_cursor += 1;
        let value = if var.suffix == TypeSuffix::StringDollar {
            Value::Str(text)
        } else {
            Value::Number(text.trim().parse().map_err(|_| BasicError::Syntax)?)
        };
        self.assign(var, value, io)
    }

    fn exec_get(&mut self, var: &VarRef, io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        let value = match io.get_char() {
            Some(ch) if var.suffix == TypeSuffix::StringDollar => Value::Str(ch.to_string()),
            Some(ch) => Value::Number(f64::from(ch as u32 & 0xFF)),
            None => Value::default_for(var.suffix == TypeSuffix::StringDollar),
        };
        self.assign(var, value, io)?;
        Ok(Flow::Next)
    }

    fn exec_input(&mut self, prompt: Option<&str>, vars: &[VarRef], io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        'retry: loop {
            let shown = prompt.unwrap_or("? ");
            let Some(line) = io.input_line(Some(shown)) else {
                return Err(BasicError::OutOfData);
            };
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < vars.len() {
                io.print("?REENTER\n");
                continue 'retry;
            }
            let mut values = Vec::with_capacity(vars.len());
            for (var, raw) in vars.iter().zip(parts.iter()) {
                let trimmed = raw.trim();
                let value = if var.suffix == TypeSuffix::StringDollar {
                    Value::Str(trimmed.to_string())
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(n) => Value::Number(n),
                        Err(_) => {
                            io.print("?REENTER\n");
                            continue 'retry;
                        }
                    }
                };
                values.push(value);
            }
            for (var, value) in vars.iter().zip(values) {
                self.assign(var, value, io)?;
            }
            return Ok(Flow::Next);
        }
    }

    fn exec_print(&mut self, items: &[PrintItem], io: &mut dyn IoPort) -> Result<Flow, BasicError> {
        let mut suppress_newline = false;
        for item in items {
            suppress_newline = false;
            match item {
                PrintItem::Comma => {
                    suppress_newline = true;
                    let target = (self.column / PRINT_ZONE_WIDTH + 1) * PRINT_ZONE_WIDTH;
                    let pad = target - self.column;
                    let spaces = " ".repeat(pad);
                    io.print(&spaces);
                    self.column = target;
                }
                PrintItem::Semicolon => {
                    suppress_newline = true;
                }
                PrintItem::Expr(expr) => {
                    let value = self.eval(expr, io)?;
                    let text = match &value {
                        Value::Number(n) => format!("{} ", crate::value::format_number(*n)),
                        Value::Str(s) => s.clone(),
                    };
                    io.print(&text);
                    self.column += text.chars().count();
                }
            }
        }
        if !suppress_newline {
            io.newline();
            self.column = 0;
        }
        Ok(Flow::Next)
    }

    fn eval_subscripts(&mut self, exprs: &[Expr], io: &mut dyn IoPort) -> Result<Vec<usize>, BasicError> {
        exprs.iter().map(|e| self.eval_index(e, io)).collect()
    }

    fn eval_index(&mut self, expr: &Expr, io: &mut dyn IoPort) -> Result<usize, BasicError> {
        let n = self.eval(expr, io)?.as_number().ok_or(BasicError::TypeMismatch)?;
        if n < 0.0 {
            return Err(BasicError::IllegalQuantity);
        }
        Ok(n as usize)
    }

    fn assign(&mut self, target: &VarRef, value: Value, io: &mut dyn IoPort) -> Result<(), BasicError> {
        let coerced = coerce(target.suffix, value)?;
        if target.subscripts.is_empty() {
            self.env.set_scalar(&target.name, target.suffix, coerced);
            Ok(())
        } else {
            let subs = self.eval_subscripts(&target.subscripts, io)?;
            self.env.set_array_element(&target.name, target.suffix, &subs, coerced)
        }
    }

    fn eval(&mut self, expr: &Expr, io: &mut dyn IoPort) -> Result<Value, BasicError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Group(inner) => self.eval(inner, io),
            Expr::Var(var) => {
                if var.subscripts.is_empty() {
                    Ok(self.env.get_scalar(&var.name, var.suffix))
                } else {
                    let subs = self.eval_subscripts(&var.subscripts, io)?;
                    self.env.array_element(&var.name, var.suffix, &subs)
                }
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner, io)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-v.as_number().ok_or(BasicError::TypeMismatch)?)),
                    UnaryOp::Not => Ok(Value::Number(if v.is_truthy() { 0.0 } else { 1.0 })),
                }
            }
            Expr::Binary(lhs, op, rhs) => {
                let l = self.eval(lhs, io)?;
                let r = self.eval(rhs, io)?;
                eval_binary(*op, l, r)
            }
            Expr::Call(builtin, args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, io)?);
                }
                builtins::call(*builtin, &values, &mut self.rng, io, self.column)
            }
            Expr::FnCall(name, arg) => self.eval_fn_call(name, arg, io),
        }
    }

    fn eval_fn_call(&mut self, name: &str, arg: &Expr, io: &mut dyn IoPort) -> Result<Value, BasicError> {
        let def = self.env.lookup_fn(name).cloned().ok_or(BasicError::UndefinedFunction)?;
        let arg_value = self.eval(arg, io)?;
        let saved = self.env.get_scalar(&def.param, TypeSuffix::Numeric);
        self.env.set_scalar(&def.param, TypeSuffix::Numeric, arg_value);
        let result = self.eval(&def.body, io);
        self.env.set_scalar(&def.param, TypeSuffix::Numeric, saved);
        result
    }
}

fn coerce(suffix: TypeSuffix, value: Value) -> Result<Value, BasicError> {
    match (suffix, &value) {
        (TypeSuffix::StringDollar, Value::Str(_)) => Ok(value),
        (TypeSuffix::StringDollar, Value::Number(_)) => Err(BasicError::TypeMismatch),
        (TypeSuffix::IntegerPercent, Value::Number(n)) => Ok(Value::Number(n.trunc())),
        (TypeSuffix::Numeric, Value::Number(_)) => Ok(value),
        (_, Value::Str(_)) => Err(BasicError::TypeMismatch),
    }
}

/// Applesoft numbers top out around 1.7E38 (a 40-bit exponent range); past
/// that — or at outright infinity, `f64`'s own overflow — a result is
/// reported as `OVERFLOW ERROR` rather than silently handed back as a huge
/// or infinite float.
const OVERFLOW_MAGNITUDE: f64 = 1.7e38;

fn check_overflow(result: f64) -> Result<f64, BasicError> {
    if result.is_infinite() || result.abs() > OVERFLOW_MAGNITUDE {
        Err(BasicError::Overflow)
    } else {
        Ok(result)
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, BasicError> {
    use BinaryOp::{Add, And, Div, Eq, Ge, Gt, Le, Lt, Mul, Ne, Or, Pow, Sub};
    match op {
        Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(check_overflow(a + b)?)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            _ => Err(BasicError::TypeMismatch),
        },
        Sub | Mul | Div | Pow => {
            let a = lhs.as_number().ok_or(BasicError::TypeMismatch)?;
            let b = rhs.as_number().ok_or(BasicError::TypeMismatch)?;
            let result = match op {
                Sub => a - b,
                Mul => a * b,
                Div => {
                    if b == 0.0 {
                        return Err(BasicError::DivisionByZero);
                    }
                    a / b
                }
                Pow => a.powf(b),
                _ => unreachable!(),
            };
            Ok(Value::Number(check_overflow(result)?))
        }
        Eq | Ne | Lt | Le | Gt | Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(BasicError::TypeMismatch),
            }
            .ok_or(BasicError::IllegalQuantity)?;
            let result = match op {
                Eq => ordering.is_eq(),
                Ne => !ordering.is_eq(),
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Number(f64::from(result)))
        }
        And => Ok(Value::Number(f64::from(lhs.is_truthy() && rhs.is_truthy()))),
        Or => Ok(Value::Number(f64::from(lhs.is_truthy() || rhs.is_truthy()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RecordingPort;

    fn run(source: &str) -> RecordingPort {
        let mut interp = Interpreter::load(source);
        let mut io = RecordingPort::new();
        interp.run(&mut io).unwrap();
        io
    }

    #[test]
    fn print_joins_items_and_formats_numbers() {
        let io = run("10 PRINT \"X=\"; 5\n");
        assert_eq!(io.output, "X= 5 \n");
    }

    #[test]
    fn print_comma_advances_to_next_zone() {
        let io = run("10 PRINT \"AB\",\"CD\"\n");
        assert_eq!(io.output, "AB              CD\n");
    }

    #[test]
    fn trailing_semicolon_suppresses_newline() {
        let io = run("10 PRINT \"X\";\n20 PRINT \"Y\"\n");
        assert_eq!(io.output, "XY\n");
    }

    #[test]
    fn for_next_accumulates() {
        let io = run("10 LET S = 0\n20 FOR I = 1 TO 5\n30 LET S = S + I\n40 NEXT I\n50 PRINT S\n");
        assert_eq!(io.output, " 15 \n");
    }

    #[test]
    fn negative_step_counts_down() {
        let io = run("10 FOR I = 3 TO 1 STEP -1\n20 PRINT I;\n30 NEXT I\n");
        assert_eq!(io.output, " 3  2  1 ");
    }

    #[test]
    fn gosub_then_return_resumes_after_call() {
        let io = run("10 GOSUB 100\n20 PRINT \"BACK\"\n30 END\n100 PRINT \"IN\"\n110 RETURN\n");
        assert_eq!(io.output, "IN\nBACK\n");
    }

    #[test]
    fn return_without_gosub_is_an_error() {
        let mut interp = Interpreter::load("10 RETURN\n");
        let mut io = RecordingPort::new();
        let err = interp.run(&mut io).unwrap_err();
        assert_eq!(err.error, BasicError::ReturnWithoutGosub);
        assert_eq!(err.line, 10);
    }

    #[test]
    fn arithmetic_overflow_is_an_error() {
        let mut interp = Interpreter::load("10 X = 1E38 * 100\n");
        let mut io = RecordingPort::new();
        let err = interp.run(&mut io).unwrap_err();
        assert_eq!(err.error, BasicError::Overflow);
    }

    #[test]
    fn unbounded_gosub_recursion_fails_with_out_of_memory() {
        let mut interp = Interpreter::load("10 GOSUB 10\n");
        let mut io = RecordingPort::new();
        let err = interp.run(&mut io).unwrap_err();
        assert_eq!(err.error, BasicError::OutOfMemory);
    }

    #[test]
    fn on_goto_dispatches_by_index() {
        let io = run("10 ON 2 GOTO 100, 200\n20 END\n100 PRINT \"ONE\"\n110 END\n200 PRINT \"TWO\"\n");
        assert_eq!(io.output, "TWO\n");
    }

    #[test]
    fn data_read_restore_roundtrip() {
        let io = run("10 DATA 1,2,3\n20 READ A\n30 READ B\n40 RESTORE\n50 READ C\n60 PRINT A; B; C\n");
        assert_eq!(io.output, " 1  2  1 \n");
    }

    #[test]
    fn out_of_data_is_an_error() {
        let mut interp = Interpreter::load("10 READ A\n");
        let mut io = RecordingPort::new();
        let err = interp.run(&mut io).unwrap_err();
        assert_eq!(err.error, BasicError::OutOfData);
    }

    #[test]
    fn def_fn_evaluates_with_shadowed_param() {
        let io = run("10 X = 100\n20 DEF FN DOUBLE(X) = X * 2\n30 PRINT FN DOUBLE(4)\n40 PRINT X\n");
        assert_eq!(io.output, " 8 \n 100 \n");
    }

    #[test]
    fn string_variables_truncate_to_two_significant_characters() {
        let io = run("10 SCORE$ = \"HI\"\n20 PRINT SC$\n");
        assert_eq!(io.output, "HI\n");
    }

    #[test]
    fn array_assignment_and_lookup_round_trip() {
        let io = run("10 DIM A(3)\n20 A(2) = 7\n30 PRINT A(2)\n");
        assert_eq!(io.output, " 7 \n");
    }

    #[test]
    fn input_reprompts_on_bad_numeric_value() {
        let mut interp = Interpreter::load("10 INPUT A\n20 PRINT A\n");
        let mut io = RecordingPort::with_input(["NOTANUMBER", "42"]);
        interp.run(&mut io).unwrap();
        assert!(io.output.contains("?REENTER"));
        assert!(io.output.ends_with(" 42 \n"));
    }

    #[test]
    fn if_then_goto_desugars_and_jumps() {
        let io = run("10 IF 1 = 1 THEN 30\n20 PRINT \"SKIPPED\"\n30 PRINT \"HIT\"\n");
        assert_eq!(io.output, "HIT\n");
    }

    #[test]
    fn set_line_accretes_a_program_entered_one_line_at_a_time() {
        let mut interp = Interpreter::from_lines(Vec::new());
        interp.set_line(basic_lang::parse_line("20 PRINT \"TWO\"").unwrap());
        interp.set_line(basic_lang::parse_line("10 PRINT \"ONE\"").unwrap());
        let mut io = RecordingPort::new();
        interp.run(&mut io).unwrap();
        assert_eq!(io.output, "ONE\nTWO\n");
    }

    #[test]
    fn set_line_replaces_an_existing_line_number() {
        let mut interp = Interpreter::from_lines(Vec::new());
        interp.set_line(basic_lang::parse_line("10 PRINT \"FIRST\"").unwrap());
        interp.set_line(basic_lang::parse_line("10 PRINT \"SECOND\"").unwrap());
        let mut io = RecordingPort::new();
        interp.run(&mut io).unwrap();
        assert_eq!(io.output, "SECOND\n");
    }

    #[test]
    fn run_immediate_executes_without_storing_into_the_program() {
        let mut interp = Interpreter::from_lines(Vec::new());
        let statements = basic_lang::parse_immediate("PRINT \"HI\"", 0).unwrap();
        let mut io = RecordingPort::new();
        interp.run_immediate(&statements, &mut io).unwrap();
        assert_eq!(io.output, "HI\n");

        let mut io2 = RecordingPort::new();
        interp.run(&mut io2).unwrap();
        assert_eq!(io2.output, "");
    }

    #[test]
    fn run_immediate_gosub_jumps_into_the_loaded_program() {
        let mut interp = Interpreter::load("10 PRINT \"IN SUB\"\n20 RETURN\n");
        let statements = basic_lang::parse_immediate("GOSUB 10", 0).unwrap();
        let mut io = RecordingPort::new();
        interp.run_immediate(&statements, &mut io).unwrap();
        assert_eq!(io.output, "IN SUB\n");
    }
}
