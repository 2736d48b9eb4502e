//! Converts checked compilation units into stack-machine [LIR](lir).
//! Every routine gets its own [frame](frame) of numbered slots, globals are addressed by name.

pub mod frame;
pub mod lir;

use crate::compiler::codegen::{frame::*, lir::*};
use crate::compiler::common::{
    decl::*, environment::*, error::*, expr::*, stmt::*, symbol_table::*, types::*,
};
use crate::compiler::typechecker::{intrinsics::Intrinsics, Assignability, TypeChecker};

use indexmap::IndexMap;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Code of a single routine
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCode {
    pub name: String,
    pub params: usize,
    pub returns: BaseType,
    pub frame: Vec<SlotInfo>,
    pub code: Vec<Lir>,
}

/// Everything generated for a compilation unit
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub language: Language,
    pub globals: Vec<(String, TypeDescriptor)>,
    pub routines: Vec<RoutineCode>,
    /// Entry name of every routine mapped to its index in `routines`
    pub entry_points: IndexMap<String, usize>,
    /// Index of the main program
    pub main: usize,
    /// Global scope first, then every routine scope in the order it was closed
    pub scopes: Vec<SymbolTable>,
}
impl Module {
    pub fn routine(&self, name: &str) -> Option<&RoutineCode> {
        self.entry_points.get(name).map(|index| &self.routines[*index])
    }
}

// state of the routine currently being translated
struct Function {
    // entry name, nested routines are qualified by their parents
    name: String,

    // depth of the routine's frame in the scope-stack, the main program is at 0
    depth: usize,

    // source line of the routine header, -1 for the main program
    line: i32,

    return_type: BaseType,

    // fortran functions assign their result to the function name
    result_name: Option<String>,

    params: usize,
    frame: LocalFrame,

    // label symbol with its label index
    labels: HashMap<String, LabelId>,

    output: Vec<Lir>,

    // number of recorded errors when translation of the routine started
    error_mark: usize,
}
impl Function {
    fn new(name: String, depth: usize, line: i32, return_type: BaseType, error_mark: usize) -> Self {
        Function {
            name,
            depth,
            line,
            return_type,
            result_name: None,
            params: 0,
            frame: LocalFrame::new(),
            labels: HashMap::new(),
            output: Vec::with_capacity(64),
            error_mark,
        }
    }
    fn write_out(&mut self, instruction: Lir) {
        self.output.push(instruction)
    }
    fn load(&mut self, storage: &Storage) {
        match storage {
            Storage::Local(slot) => self.write_out(Lir::LoadLocal(*slot)),
            Storage::Global(name) => self.write_out(Lir::LoadGlobal(name.clone())),
        }
    }
    fn store(&mut self, storage: &Storage) {
        match storage {
            Storage::Local(slot) => self.write_out(Lir::Store(*slot)),
            Storage::Global(name) => self.write_out(Lir::StoreGlobal(name.clone())),
        }
    }
    fn result_slot(&mut self) -> Option<Slot> {
        let name = self.result_name.clone()?;
        let ty = TypeDescriptor::scalar(self.return_type);
        Some(self.frame.local(&name, &ty))
    }
}

// step of a FOR loop
enum Step {
    // value, counting upwards
    Constant(Literal, bool),
    Dynamic(Slot),
}

fn create_label(index: &mut usize) -> LabelId {
    let label = *index;
    *index += 1;
    label
}

pub struct Compiler<'a> {
    scopes: ScopeManager,
    checker: TypeChecker,
    intrinsics: &'a Intrinsics,
    language: Language,

    // index of next label, unique across the module
    label_index: usize,

    // recoverable errors, translation continues with the next statement
    errors: Vec<Error>,

    routines: Vec<RoutineCode>,
    entry_points: IndexMap<String, usize>,
    closed_scopes: Vec<SymbolTable>,
}

impl<'a> Compiler<'a> {
    pub fn new(language: Language, scopes: ScopeManager, intrinsics: &'a Intrinsics) -> Self {
        Compiler {
            scopes,
            checker: TypeChecker::new(language),
            intrinsics,
            language,
            label_index: 0,
            errors: Vec::new(),
            routines: Vec::new(),
            entry_points: IndexMap::new(),
            closed_scopes: Vec::new(),
        }
    }

    pub fn translate(mut self, unit: &CompilationUnit) -> Result<Module, Vec<Error>> {
        match self.cg_unit(unit) {
            Ok(module) if self.errors.is_empty() => Ok(module),
            Ok(_) => Err(self.errors),
            Err(fatal) => {
                self.errors.push(fatal);
                Err(self.errors)
            }
        }
    }

    fn cg_unit(&mut self, unit: &CompilationUnit) -> Result<Module, Error> {
        self.declare_globals(unit);

        let mut main = Function::new(
            self.scopes.normalize(&unit.name),
            0,
            -1,
            BaseType::Void,
            self.errors.len(),
        );
        self.declare_labels(&mut main, &unit.main);

        for decl in &unit.globals {
            let mark = main.output.len();
            let result = self.alloc_global(&mut main, decl);
            self.recover(&mut main, mark, result)?;
        }
        self.cg_stmts(&mut main, &unit.main)?;
        self.finish_routine(main)?;

        for routine in &unit.routines {
            let entry = self.scopes.normalize(&routine.name);
            self.function_definition(routine, entry)?;
        }

        let globals = self
            .scopes
            .global()
            .enumerate()
            .filter(|symbol| symbol.borrow().class == SymbolClass::Variable)
            .map(|symbol| {
                let symbol = symbol.borrow();
                (symbol.normalized.clone(), symbol.type_decl.clone())
            })
            .collect();

        let mut scopes = vec![self.scopes.global().clone()];
        scopes.append(&mut self.closed_scopes);

        Ok(Module {
            name: unit.name.clone(),
            language: unit.language,
            globals,
            routines: std::mem::take(&mut self.routines),
            entry_points: std::mem::take(&mut self.entry_points),
            main: 0,
            scopes,
        })
    }

    // globals, main-program declarations and top-level routines are visible everywhere,
    // so they are all declared before any code is generated
    fn declare_globals(&mut self, unit: &CompilationUnit) {
        let mut decls: Vec<&Declaration> = unit.globals.iter().collect();
        walk_stmts(&unit.main, &mut |stmt| {
            if let StmtKind::Declare(decl) = &stmt.kind {
                decls.push(decl)
            }
        });

        for decl in decls {
            if let Err(e) = self.declare(decl) {
                self.errors.push(e);
            }
        }
        for routine in &unit.routines {
            let symbol = routine.symbol().with_entry(self.scopes.normalize(&routine.name));
            if let Err(e) = self.scopes.declare_global(symbol) {
                self.errors.push(e);
            }
        }
    }

    fn declare(&mut self, decl: &Declaration) -> Result<SymbolRef, Error> {
        let mut symbol = decl.symbol();

        match decl.class {
            SymbolClass::Constant => {
                if !decl.dimensions.is_empty() {
                    return Err(Error::new(
                        decl,
                        ErrorKind::ArrayDimension(format!("constant '{}' cannot be an array", decl.name)),
                    ));
                }
                let value = decl.value.clone().ok_or_else(|| {
                    Error::new(
                        decl,
                        ErrorKind::UnsupportedConstruct(format!("constant '{}' has no value", decl.name)),
                    )
                })?;
                let value_type = TypeDescriptor::scalar(value.base());

                symbol.value = Some(
                    match self.checker.check_assignment(&decl.type_decl(), &value_type, decl.line)? {
                        Assignability::Ok => value,
                        Assignability::CoercionNeeded(promotion) => promote(value, promotion),
                    },
                );
            }
            SymbolClass::Variable => {
                if !decl.base.is_storable() {
                    return Err(Error::new(
                        decl,
                        ErrorKind::UnsupportedConstruct(format!(
                            "variable '{}' cannot have type '{}'",
                            decl.name, decl.base
                        )),
                    ));
                }
                decl.type_decl()
                    .validate_dimensions(&decl.name)
                    .map_err(|kind| Error::new(decl, kind))?;

                let dynamic = decl.dimensions.iter().filter(|e| **e == Extent::Dynamic).count();
                if dynamic != decl.extents.len() {
                    return Err(Error::new(
                        decl,
                        ErrorKind::ArrayDimension(format!(
                            "array '{}' has {} dynamic extent{} but {} size{} given",
                            decl.name,
                            dynamic,
                            if dynamic == 1 { "" } else { "s" },
                            decl.extents.len(),
                            if decl.extents.len() == 1 { " is" } else { "s are" }
                        )),
                    ));
                }
            }
            class => {
                return Err(Error::new(
                    decl,
                    ErrorKind::UnsupportedConstruct(format!(
                        "a {} cannot be introduced by a declaration",
                        class
                    )),
                ))
            }
        }

        self.scopes.declare(symbol)
    }

    fn declare_labels(&mut self, func: &mut Function, body: &[Stmt]) {
        let mut labels = Vec::new();
        walk_stmts(body, &mut |stmt| {
            if let StmtKind::Label(name) = &stmt.kind {
                labels.push((name, stmt.line))
            }
        });

        for (name, line) in labels {
            let symbol = Symbol::new(name, BaseType::Label, SymbolClass::Label, vec![], line);
            match self.scopes.declare(symbol) {
                Ok(symbol) => {
                    let label = create_label(&mut self.label_index);
                    func.labels.insert(symbol.borrow().normalized.clone(), label);
                }
                Err(e) => self.errors.push(e),
            }
        }
    }

    fn function_definition(&mut self, routine: &Routine, entry: String) -> Result<(), Error> {
        let handle = match self.scopes.push_scope(&routine.name, routine.discipline) {
            Ok(handle) => handle,
            Err(e) => {
                self.errors.push(Error::new(routine, e.kind));
                return Ok(());
            }
        };

        let mut func = Function::new(
            entry,
            handle.depth(),
            routine.line,
            routine.return_type,
            self.errors.len(),
        );
        if self.language == Language::Fortran && routine.return_type != BaseType::Void {
            func.result_name = Some(self.scopes.normalize(&routine.name));
        }

        for param in &routine.params {
            let declared = param
                .type_decl()
                .validate_dimensions(&param.name)
                .map_err(|kind| Error::new(param, kind))
                .and_then(|_| self.scopes.declare(param.symbol()));

            let key = match declared {
                Ok(symbol) => symbol.borrow().normalized.clone(),
                Err(e) => {
                    self.errors.push(e);
                    param.name.clone()
                }
            };
            func.frame.param(&key, param.type_decl());
        }
        func.params = routine.params.len();

        for nested in &routine.routines {
            let symbol = nested.symbol().with_entry(self.nested_entry(&func.name, nested));
            if let Err(e) = self.scopes.declare(symbol) {
                self.errors.push(e);
            }
        }
        self.declare_labels(&mut func, &routine.body);

        self.cg_stmts(&mut func, &routine.body)?;
        let parent = func.name.clone();
        self.finish_routine(func)?;

        for nested in &routine.routines {
            let entry = self.nested_entry(&parent, nested);
            self.function_definition(nested, entry)?;
        }

        let table = self.scopes.pop_scope(handle)?;
        self.closed_scopes.push(table);

        Ok(())
    }

    fn nested_entry(&self, parent: &str, nested: &Routine) -> String {
        format!("{}.{}", parent, self.scopes.normalize(&nested.name))
    }

    fn finish_routine(&mut self, mut func: Function) -> Result<(), Error> {
        if !matches!(func.output.last(), Some(Lir::Return(_))) {
            self.cg_epilogue(&mut func);
        }

        // partially translated routines can't be checked, they are discarded anyway
        if self.errors.len() == func.error_mark {
            let defined: HashSet<LabelId> = func
                .output
                .iter()
                .filter_map(|instr| match instr {
                    Lir::Label(label) => Some(*label),
                    _ => None,
                })
                .collect();

            if let Some(missing) = func
                .output
                .iter()
                .filter_map(Lir::branch_target)
                .find(|label| !defined.contains(label))
            {
                return Err(Error::internal(ErrorKind::UndefinedLabel(missing, func.name)));
            }
        }

        if self.entry_points.contains_key(&func.name) {
            self.errors.push(Error::at(func.line, ErrorKind::DuplicateSymbol(
                func.name,
                self.scopes.global().name().to_string(),
            )));
            return Ok(());
        }

        debug!(
            "translated '{}': {} instructions, {} slots",
            func.name,
            func.output.len(),
            func.frame.len()
        );

        self.entry_points.insert(func.name.clone(), self.routines.len());
        self.routines.push(RoutineCode {
            name: func.name,
            params: func.params,
            returns: func.return_type,
            frame: func.frame.into_slots(),
            code: func.output,
        });

        Ok(())
    }

    // falling off the end of a routine
    fn cg_epilogue(&mut self, func: &mut Function) {
        if func.return_type == BaseType::Void {
            func.write_out(Lir::Return(false));
        } else if let Some(slot) = func.result_slot() {
            func.write_out(Lir::LoadLocal(slot));
            func.write_out(Lir::Return(true));
        } else {
            if let Some(zero) = Literal::zero(func.return_type) {
                func.write_out(Lir::LoadConst(zero));
            }
            func.write_out(Lir::Return(true));
        }
    }

    // records a recoverable error and discards everything emitted since `mark`
    fn recover(&mut self, func: &mut Function, mark: usize, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                func.output.truncate(mark);
                self.errors.push(e);
                Ok(())
            }
        }
    }

    fn cg_stmts(&mut self, func: &mut Function, statements: &[Stmt]) -> Result<(), Error> {
        for stmt in statements {
            let mark = func.output.len();
            let result = self.visit_stmt(func, stmt);
            self.recover(func, mark, result)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, func: &mut Function, statement: &Stmt) -> Result<(), Error> {
        let line = statement.line;
        match &statement.kind {
            StmtKind::Declare(decl) => self.declaration(func, decl),
            StmtKind::Import(names) => {
                for name in names {
                    self.scopes.import_name(name, line)?;
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => self.cg_assign(func, target, value, line),
            StmtKind::Call { name, args } => {
                if self.cg_call(func, name, args, line)?.is_some() {
                    // result isn't used
                    func.write_out(Lir::Pop);
                }
                Ok(())
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.if_statement(func, cond, then_branch, else_branch)
            }
            StmtKind::While { cond, body } => self.while_statement(func, cond, body),
            StmtKind::Repeat { body, until } => self.repeat_statement(func, body, until),
            StmtKind::For { var, from, to, step, body } => {
                self.for_statement(func, var, from, to, step.as_ref(), body, line)
            }
            StmtKind::Label(name) => {
                let label = self.label_index_of(func, name, line)?;
                func.write_out(Lir::Label(label));
                Ok(())
            }
            StmtKind::Goto(name) => {
                let label = self.label_index_of(func, name, line)?;
                func.write_out(Lir::Branch(label));
                Ok(())
            }
            StmtKind::Return(value) => self.return_statement(func, value.as_ref(), line),
            StmtKind::Print(exprs) => self.print_statement(func, exprs, line),
            StmtKind::Stop => {
                func.write_out(Lir::Call(CallTarget::Runtime("rt.stop".to_string()), 0, false));
                Ok(())
            }
        }
    }

    fn declaration(&mut self, func: &mut Function, decl: &Declaration) -> Result<(), Error> {
        if func.depth == 0 {
            // already declared together with the globals
            return self.alloc_global(func, decl);
        }

        let symbol = self.declare(decl)?;
        if decl.class == SymbolClass::Variable && !decl.dimensions.is_empty() {
            let slot = {
                let symbol = symbol.borrow();
                func.frame.local(&symbol.normalized, &symbol.type_decl)
            };
            self.cg_alloc(func, decl, Storage::Local(slot))?;
        }
        Ok(())
    }

    fn alloc_global(&mut self, func: &mut Function, decl: &Declaration) -> Result<(), Error> {
        if decl.class == SymbolClass::Variable && !decl.dimensions.is_empty() {
            let storage = Storage::Global(self.scopes.normalize(&decl.name));
            self.cg_alloc(func, decl, storage)?;
        }
        Ok(())
    }

    fn cg_alloc(&mut self, func: &mut Function, decl: &Declaration, storage: Storage) -> Result<(), Error> {
        let mut sizes = decl.extents.iter();

        for extent in &decl.dimensions {
            match extent {
                Extent::Fixed(n) => func.write_out(Lir::LoadConst(Literal::Integer(*n as i64))),
                Extent::Dynamic => {
                    let size = sizes.next().ok_or_else(|| {
                        Error::new(
                            decl,
                            ErrorKind::ArrayDimension(format!("missing size of array '{}'", decl.name)),
                        )
                    })?;
                    let ty = self.execute_expr(func, size)?;
                    self.checker.check_subscript(&ty, decl.line)?;
                }
            }
        }
        func.write_out(Lir::AllocArray(storage, decl.base, decl.dimensions.len()));

        Ok(())
    }

    fn label_index_of(&mut self, func: &Function, name: &str, line: i32) -> Result<LabelId, Error> {
        let (symbol, _) = self.resolve(name, line)?;
        let symbol = symbol.borrow();

        match func.labels.get(&symbol.normalized) {
            Some(label) if symbol.class == SymbolClass::Label => Ok(*label),
            _ if symbol.class == SymbolClass::Label => Err(Error::at(
                line,
                ErrorKind::UnsupportedConstruct(format!(
                    "jump to label '{}' outside of routine '{}'",
                    name, func.name
                )),
            )),
            _ => Err(Error::at(line, ErrorKind::UnresolvedSymbol(name.to_string()))),
        }
    }

    fn if_statement(
        &mut self,
        func: &mut Function,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: &[Stmt],
    ) -> Result<(), Error> {
        self.cg_condition(func, cond)?;

        let done_label = create_label(&mut self.label_index);
        let mut else_label = done_label;

        if !else_branch.is_empty() {
            else_label = create_label(&mut self.label_index);
        }
        func.write_out(Lir::BranchIf(false, else_label));

        self.cg_stmts(func, then_branch)?;

        if !else_branch.is_empty() {
            func.write_out(Lir::Branch(done_label));
            func.write_out(Lir::Label(else_label));
            self.cg_stmts(func, else_branch)?;
        }
        func.write_out(Lir::Label(done_label));

        Ok(())
    }

    fn while_statement(&mut self, func: &mut Function, cond: &Expr, body: &[Stmt]) -> Result<(), Error> {
        let body_label = create_label(&mut self.label_index);
        let cond_label = create_label(&mut self.label_index);

        func.write_out(Lir::Branch(cond_label));
        func.write_out(Lir::Label(body_label));

        self.cg_stmts(func, body)?;

        func.write_out(Lir::Label(cond_label));
        self.cg_condition(func, cond)?;
        func.write_out(Lir::BranchIf(true, body_label));

        Ok(())
    }

    fn repeat_statement(&mut self, func: &mut Function, body: &[Stmt], until: &Expr) -> Result<(), Error> {
        let body_label = create_label(&mut self.label_index);

        func.write_out(Lir::Label(body_label));
        self.cg_stmts(func, body)?;

        self.cg_condition(func, until)?;
        func.write_out(Lir::BranchIf(false, body_label));

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn for_statement(
        &mut self,
        func: &mut Function,
        var: &str,
        from: &Expr,
        to: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
        line: i32,
    ) -> Result<(), Error> {
        let (symbol, depth) = self.resolve(var, line)?;
        let (class, ty) = {
            let symbol = symbol.borrow();
            (symbol.class, symbol.type_decl.clone())
        };
        if !matches!(class, SymbolClass::Variable | SymbolClass::Parameter) {
            return Err(Error::at(line, ErrorKind::NotAssignable(var.to_string(), class)));
        }
        if !ty.is_numeric() {
            return Err(Error::at(
                line,
                ErrorKind::TypeMismatch(TypeDescriptor::scalar(BaseType::Integer), ty),
            ));
        }
        let counter = self.storage(func, &symbol, depth, line)?;

        let from_type = self.execute_expr(func, from)?;
        self.coerce(func, &ty, &from_type, from.line)?;
        func.store(&counter);

        let to_type = self.execute_expr(func, to)?;
        self.coerce(func, &ty, &to_type, to.line)?;
        let limit = func.frame.temp(ty.clone());
        func.write_out(Lir::Store(limit));

        let step = match step.map(|step| (step, constant_value(step))) {
            None => Step::Constant(Literal::Integer(1), true),
            Some((step, Some(value))) => {
                let ascending = match value {
                    Literal::Integer(n) => n >= 0,
                    Literal::Double(n) => n >= 0.0,
                    _ => true,
                };
                self.checker
                    .check_assignment(&ty, &TypeDescriptor::scalar(value.base()), step.line)?;
                Step::Constant(value, ascending)
            }
            Some((step, None)) => {
                let step_type = self.execute_expr(func, step)?;
                self.coerce(func, &ty, &step_type, step.line)?;
                let slot = func.frame.temp(ty.clone());
                func.write_out(Lir::Store(slot));
                Step::Dynamic(slot)
            }
        };
        // constant steps are stored with the counter's type
        let step = match step {
            Step::Constant(value, ascending) if ty.base == BaseType::Double => {
                Step::Constant(promote(value, Promotion::IntegerToDouble), ascending)
            }
            step => step,
        };

        let body_label = create_label(&mut self.label_index);
        let cond_label = create_label(&mut self.label_index);

        func.write_out(Lir::Branch(cond_label));
        func.write_out(Lir::Label(body_label));

        self.cg_stmts(func, body)?;

        func.load(&counter);
        match &step {
            Step::Constant(value, _) => func.write_out(Lir::LoadConst(value.clone())),
            Step::Dynamic(slot) => func.write_out(Lir::LoadLocal(*slot)),
        }
        func.write_out(Lir::Binary(BinaryOp::Add, ty.base));
        func.store(&counter);

        func.write_out(Lir::Label(cond_label));
        match step {
            Step::Constant(_, ascending) => {
                func.load(&counter);
                func.write_out(Lir::LoadLocal(limit));
                let op = if ascending { BinaryOp::Le } else { BinaryOp::Ge };
                func.write_out(Lir::Binary(op, ty.base));
            }
            // (step >= 0 AND counter <= limit) OR (step < 0 AND counter >= limit)
            Step::Dynamic(slot) => {
                let zero = Literal::zero(ty.base).unwrap_or(Literal::Integer(0));
                for (sign, bound) in [(BinaryOp::Ge, BinaryOp::Le), (BinaryOp::Lt, BinaryOp::Ge)] {
                    func.write_out(Lir::LoadLocal(slot));
                    func.write_out(Lir::LoadConst(zero.clone()));
                    func.write_out(Lir::Binary(sign, ty.base));
                    func.load(&counter);
                    func.write_out(Lir::LoadLocal(limit));
                    func.write_out(Lir::Binary(bound, ty.base));
                    func.write_out(Lir::Binary(BinaryOp::And, BaseType::Boolean));
                }
                func.write_out(Lir::Binary(BinaryOp::Or, BaseType::Boolean));
            }
        }
        func.write_out(Lir::BranchIf(true, body_label));

        Ok(())
    }

    fn return_statement(&mut self, func: &mut Function, value: Option<&Expr>, line: i32) -> Result<(), Error> {
        match (value, func.return_type) {
            (None, BaseType::Void) => func.write_out(Lir::Return(false)),
            (Some(expr), BaseType::Void) => {
                let ty = self.execute_expr(func, expr)?;
                return Err(Error::at(line, ErrorKind::TypeMismatch(TypeDescriptor::void(), ty)));
            }
            (Some(expr), return_type) => {
                let ty = self.execute_expr(func, expr)?;
                self.coerce(func, &TypeDescriptor::scalar(return_type), &ty, line)?;
                func.write_out(Lir::Return(true));
            }
            (None, return_type) => match func.result_slot() {
                Some(slot) => {
                    func.write_out(Lir::LoadLocal(slot));
                    func.write_out(Lir::Return(true));
                }
                None => {
                    return Err(Error::at(
                        line,
                        ErrorKind::TypeMismatch(TypeDescriptor::scalar(return_type), TypeDescriptor::void()),
                    ))
                }
            },
        }
        Ok(())
    }

    fn print_statement(&mut self, func: &mut Function, exprs: &[Expr], line: i32) -> Result<(), Error> {
        for expr in exprs {
            let ty = self.execute_expr(func, expr)?;
            let runtime = match ty.base {
                BaseType::Integer if ty.is_scalar() => "rt.print_int",
                BaseType::Double if ty.is_scalar() => "rt.print_double",
                BaseType::Char if ty.is_scalar() => "rt.print_str",
                BaseType::Boolean if ty.is_scalar() => "rt.print_bool",
                _ => return Err(Error::at(line, ErrorKind::InvalidOperand("PRINT", ty))),
            };
            func.write_out(Lir::Call(CallTarget::Runtime(runtime.to_string()), 1, false));
        }
        func.write_out(Lir::Call(CallTarget::Runtime("rt.newline".to_string()), 0, false));
        Ok(())
    }

    fn cg_assign(&mut self, func: &mut Function, target: &LValue, value: &Expr, line: i32) -> Result<(), Error> {
        let (symbol, depth) = self.resolve(&target.name, line)?;
        let (class, normalized, ty) = {
            let symbol = symbol.borrow();
            (symbol.class, symbol.normalized.clone(), symbol.type_decl.clone())
        };

        if class == SymbolClass::Function
            && target.indices.is_empty()
            && func.result_name.as_ref() == Some(&normalized)
        {
            let value_type = self.execute_expr(func, value)?;
            self.coerce(func, &TypeDescriptor::scalar(func.return_type), &value_type, line)?;
            if let Some(slot) = func.result_slot() {
                func.write_out(Lir::Store(slot));
            }
            return Ok(());
        }
        if !matches!(class, SymbolClass::Variable | SymbolClass::Parameter) {
            return Err(Error::at(line, ErrorKind::NotAssignable(target.name.clone(), class)));
        }

        if target.indices.is_empty() {
            let storage = self.storage(func, &symbol, depth, line)?;
            let value_type = self.execute_expr(func, value)?;
            self.coerce(func, &ty, &value_type, line)?;
            if ty.is_array() {
                return Err(Error::at(
                    line,
                    ErrorKind::UnsupportedConstruct(format!("assignment to whole array '{}'", target.name)),
                ));
            }
            func.store(&storage);
        } else {
            let (storage, ty) = self.cg_subscripts(func, &symbol, depth, &target.indices, line)?;
            let value_type = self.execute_expr(func, value)?;
            self.coerce(func, &ty.element_type(), &value_type, line)?;
            func.write_out(Lir::StoreElement(storage, target.indices.len()));
        }
        Ok(())
    }

    fn coerce(
        &mut self,
        func: &mut Function,
        target: &TypeDescriptor,
        value: &TypeDescriptor,
        line: i32,
    ) -> Result<(), Error> {
        if let Assignability::CoercionNeeded(promotion) = self.checker.check_assignment(target, value, line)? {
            func.write_out(Lir::Convert(promotion));
        }
        Ok(())
    }

    fn cg_condition(&mut self, func: &mut Function, cond: &Expr) -> Result<(), Error> {
        let ty = self.execute_expr(func, cond)?;
        self.checker.check_condition(&ty, cond.line)
    }

    fn resolve(&mut self, name: &str, line: i32) -> Result<(SymbolRef, usize), Error> {
        let (symbol, depth) = self
            .scopes
            .resolve_with_depth(name)
            .ok_or_else(|| Error::at(line, ErrorKind::UnresolvedSymbol(name.to_string())))?;
        symbol.borrow_mut().touch(line);

        Ok((symbol, depth))
    }

    fn storage(&mut self, func: &mut Function, symbol: &SymbolRef, depth: usize, line: i32) -> Result<Storage, Error> {
        let symbol = symbol.borrow();

        if depth == 0 {
            Ok(Storage::Global(symbol.normalized.clone()))
        } else if depth == func.depth {
            Ok(Storage::Local(func.frame.local(&symbol.normalized, &symbol.type_decl)))
        } else {
            Err(Error::at(
                line,
                ErrorKind::UnsupportedConstruct(format!(
                    "'{}' belongs to an enclosing routine and cannot be accessed from '{}'",
                    symbol.name, func.name
                )),
            ))
        }
    }

    fn execute_expr(&mut self, func: &mut Function, expr: &Expr) -> Result<TypeDescriptor, Error> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                func.write_out(Lir::LoadConst(literal.clone()));
                Ok(TypeDescriptor::scalar(literal.base()))
            }
            ExprKind::Ident(name) => self.cg_ident(func, name, expr.line),
            ExprKind::Index { name, indices } => self.cg_element(func, name, indices, expr.line),
            ExprKind::Unary { op, operand } => {
                let ty = self.execute_expr(func, operand)?;
                let base = self.checker.check_unary(*op, &ty, expr.line)?;
                func.write_out(Lir::Unary(*op, base));
                Ok(TypeDescriptor::scalar(base))
            }
            ExprKind::Binary { left, op, right } => self.cg_binary(func, left, *op, right, expr.line),
            ExprKind::Call { name, args } => self.call_value(func, name, args, expr.line),
        }
    }

    // intrinsics only apply to names the program doesn't declare itself
    fn is_intrinsic(&self, name: &str) -> bool {
        self.scopes.resolve_with_depth(name).is_none() && self.intrinsics.get(name).is_some()
    }

    fn cg_ident(&mut self, func: &mut Function, name: &str, line: i32) -> Result<TypeDescriptor, Error> {
        if self.is_intrinsic(name) {
            return self.call_value(func, name, &[], line);
        }
        let (symbol, depth) = self.resolve(name, line)?;
        let (class, normalized, ty, value) = {
            let symbol = symbol.borrow();
            (symbol.class, symbol.normalized.clone(), symbol.type_decl.clone(), symbol.value.clone())
        };

        match class {
            SymbolClass::Constant => match value {
                Some(value) => {
                    func.write_out(Lir::LoadConst(value));
                    Ok(ty)
                }
                None => Err(Error::at(line, ErrorKind::NotAValue(name.to_string(), class))),
            },
            SymbolClass::Variable | SymbolClass::Parameter => {
                let storage = self.storage(func, &symbol, depth, line)?;
                func.load(&storage);
                Ok(ty)
            }
            SymbolClass::Function if func.result_name.as_ref() == Some(&normalized) => {
                if let Some(slot) = func.result_slot() {
                    func.write_out(Lir::LoadLocal(slot));
                }
                Ok(ty)
            }
            // functions without parameters can be called without parentheses
            SymbolClass::Function => self.call_value(func, name, &[], line),
            SymbolClass::Label => Err(Error::at(line, ErrorKind::NotAValue(name.to_string(), class))),
        }
    }

    fn cg_element(&mut self, func: &mut Function, name: &str, indices: &[Expr], line: i32) -> Result<TypeDescriptor, Error> {
        // fortran front-ends can't tell a function call from an array access
        if self.is_intrinsic(name) {
            return self.call_value(func, name, indices, line);
        }
        let (symbol, depth) = self.resolve(name, line)?;
        if symbol.borrow().is_routine() {
            return self.call_value(func, name, indices, line);
        }

        let (storage, ty) = self.cg_subscripts(func, &symbol, depth, indices, line)?;
        func.write_out(Lir::LoadElement(storage, indices.len()));

        Ok(ty.element_type())
    }

    // emits subscripts with their bounds-checks and returns the array's location and type
    fn cg_subscripts(
        &mut self,
        func: &mut Function,
        symbol: &SymbolRef,
        depth: usize,
        indices: &[Expr],
        line: i32,
    ) -> Result<(Storage, TypeDescriptor), Error> {
        let (name, class, ty) = {
            let symbol = symbol.borrow();
            (symbol.name.clone(), symbol.class, symbol.type_decl.clone())
        };
        if !matches!(class, SymbolClass::Variable | SymbolClass::Parameter) {
            return Err(Error::at(line, ErrorKind::NotAValue(name, class)));
        }
        if ty.is_scalar() {
            return Err(Error::at(line, ErrorKind::ArrayDimension(format!("'{}' is not an array", name))));
        }
        if ty.rank() != indices.len() {
            return Err(Error::at(
                line,
                ErrorKind::ArrayDimension(format!(
                    "array '{}' has {} dimensions, found {} subscripts",
                    name,
                    ty.rank(),
                    indices.len()
                )),
            ));
        }
        let storage = self.storage(func, symbol, depth, line)?;

        for (dim, (index, extent)) in indices.iter().zip(&ty.dimensions).enumerate() {
            let index_type = self.execute_expr(func, index)?;
            self.checker.check_subscript(&index_type, line)?;

            match extent {
                Extent::Fixed(n) => {
                    if let Some(value) = index.as_integer_literal() {
                        if value < 1 || value > *n as i64 {
                            return Err(Error::at(
                                line,
                                ErrorKind::ArrayDimension(format!(
                                    "subscript {} is out of range 1..{} in dimension {} of '{}'",
                                    value,
                                    n,
                                    dim + 1,
                                    name
                                )),
                            ));
                        }
                    }
                }
                Extent::Dynamic => func.write_out(Lir::CheckBounds(storage.clone(), dim)),
            }
        }

        Ok((storage, ty))
    }

    fn cg_binary(
        &mut self,
        func: &mut Function,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        line: i32,
    ) -> Result<TypeDescriptor, Error> {
        let left_type = self.execute_expr(func, left)?;
        let left_end = func.output.len();
        let right_type = self.execute_expr(func, right)?;

        let typing = self.checker.check_binary(op, &left_type, &right_type, line)?;

        if let Assignability::CoercionNeeded(promotion) = typing.right {
            func.write_out(Lir::Convert(promotion));
        }
        if let Assignability::CoercionNeeded(promotion) = typing.left {
            func.output.insert(left_end, Lir::Convert(promotion));
        }
        func.write_out(Lir::Binary(typing.op, typing.operand));

        Ok(TypeDescriptor::scalar(typing.result))
    }

    // call inside an expression, procedures have no value to use
    fn call_value(&mut self, func: &mut Function, name: &str, args: &[Expr], line: i32) -> Result<TypeDescriptor, Error> {
        self.cg_call(func, name, args, line)?
            .ok_or_else(|| Error::at(line, ErrorKind::VoidValue(name.to_string())))
    }

    // returns the type of the result, `None` for procedures
    fn cg_call(
        &mut self,
        func: &mut Function,
        name: &str,
        args: &[Expr],
        line: i32,
    ) -> Result<Option<TypeDescriptor>, Error> {
        let (target, signature) = match self.scopes.resolve_routine(name) {
            Some((symbol, _)) => {
                symbol.borrow_mut().touch(line);
                let symbol = symbol.borrow();
                if !symbol.is_routine() {
                    return Err(Error::at(line, ErrorKind::NotCallable(name.to_string(), symbol.class)));
                }
                let entry = symbol.entry.clone().unwrap_or_else(|| symbol.normalized.clone());
                (CallTarget::Routine(entry), symbol.clone())
            }
            None => match self.intrinsics.get(name) {
                Some(intrinsic) => (
                    CallTarget::Runtime(intrinsic.runtime.to_string()),
                    intrinsic.symbol(line),
                ),
                None => return Err(Error::at(line, ErrorKind::UnresolvedSymbol(name.to_string()))),
            },
        };

        let mut arg_types = Vec::with_capacity(args.len());
        let mut arg_ends = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.execute_expr(func, arg)?);
            arg_ends.push(func.output.len());
        }

        let coercions = self.checker.check_call(&signature, &arg_types, line)?;

        // back to front so earlier positions stay valid
        for (end, coercion) in arg_ends.into_iter().zip(coercions).rev() {
            if let Assignability::CoercionNeeded(promotion) = coercion {
                func.output.insert(end, Lir::Convert(promotion));
            }
        }

        let returns = !signature.type_decl.is_void();
        func.write_out(Lir::Call(target, args.len(), returns));

        Ok(returns.then(|| signature.type_decl.clone()))
    }
}

fn promote(value: Literal, promotion: Promotion) -> Literal {
    match (value, promotion) {
        (Literal::Integer(n), Promotion::IntegerToDouble) => Literal::Double(n as f64),
        (value, _) => value,
    }
}

// value of a literal or a negated literal
fn constant_value(expr: &Expr) -> Option<Literal> {
    match &expr.kind {
        ExprKind::Literal(literal) => Some(literal.clone()),
        ExprKind::Unary { op: UnaryOp::Neg, operand } => match &operand.kind {
            ExprKind::Literal(Literal::Integer(n)) => n.checked_neg().map(Literal::Integer),
            ExprKind::Literal(Literal::Double(n)) => Some(Literal::Double(-n)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn translate(unit: &CompilationUnit) -> Result<Module, Vec<Error>> {
        let intrinsics = Intrinsics::for_language(unit.language);
        let scopes = ScopeManager::new(&unit.name, unit.language.case_sensitive(), unit.language.scoping());

        Compiler::new(unit.language, scopes, &intrinsics).translate(unit)
    }
    fn error_kinds(unit: &CompilationUnit) -> Vec<ErrorKind> {
        translate(unit).unwrap_err().into_iter().map(|e| e.kind).collect()
    }
    fn code<'a>(module: &'a Module, routine: &str) -> &'a [Lir] {
        &module.routine(routine).unwrap().code
    }

    fn int(n: i64) -> Expr {
        Expr::literal(Literal::Integer(n), 1)
    }
    fn ident(name: &str) -> Expr {
        Expr::ident(name, 1)
    }
    fn declare(decl: Declaration) -> Stmt {
        let line = decl.line;
        Stmt::new(StmtKind::Declare(decl), line)
    }
    fn global(name: &str) -> String {
        name.to_string()
    }

    #[test]
    fn promotes_on_assignment() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.routines.push(Routine::new("p", vec![], BaseType::Void, vec![
            declare(Declaration::variable("x", BaseType::Double, 2)),
            Stmt::assign("x", int(1), 3),
        ], 1));

        let module = translate(&unit).unwrap();

        assert_eq!(code(&module, "prog"), &[Lir::Return(false)]);
        assert_eq!(code(&module, "p"), &[
            Lir::LoadConst(Literal::Integer(1)),
            Lir::Convert(Promotion::IntegerToDouble),
            Lir::Store(0),
            Lir::Return(false),
        ]);
        assert_eq!(module.routine("p").unwrap().frame[0].names, vec!["x".to_string()]);
    }

    #[test]
    fn if_else_labels() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("i", BaseType::Integer, 1));
        unit.main.push(Stmt::new(StmtKind::If {
            cond: Expr::binary(ident("i"), BinaryOp::Gt, int(0)),
            then_branch: vec![Stmt::assign("i", int(1), 3)],
            else_branch: vec![Stmt::assign("i", int(2), 5)],
        }, 2));

        let module = translate(&unit).unwrap();

        assert_eq!(code(&module, "prog"), &[
            Lir::LoadGlobal(global("i")),
            Lir::LoadConst(Literal::Integer(0)),
            Lir::Binary(BinaryOp::Gt, BaseType::Integer),
            Lir::BranchIf(false, 1),
            Lir::LoadConst(Literal::Integer(1)),
            Lir::StoreGlobal(global("i")),
            Lir::Branch(0),
            Lir::Label(1),
            Lir::LoadConst(Literal::Integer(2)),
            Lir::StoreGlobal(global("i")),
            Lir::Label(0),
            Lir::Return(false),
        ]);
        assert_eq!(module.globals, vec![(global("i"), TypeDescriptor::scalar(BaseType::Integer))]);
    }

    #[test]
    fn for_loop_counting_up() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("i", BaseType::Integer, 1));
        unit.main.push(Stmt::new(StmtKind::For {
            var: "i".to_string(),
            from: int(1),
            to: int(10),
            step: None,
            body: vec![Stmt::new(StmtKind::Print(vec![ident("i")]), 3)],
        }, 2));

        let module = translate(&unit).unwrap();

        assert_eq!(code(&module, "prog"), &[
            Lir::LoadConst(Literal::Integer(1)),
            Lir::StoreGlobal(global("i")),
            Lir::LoadConst(Literal::Integer(10)),
            Lir::Store(0),
            Lir::Branch(1),
            Lir::Label(0),
            Lir::LoadGlobal(global("i")),
            Lir::Call(CallTarget::Runtime("rt.print_int".to_string()), 1, false),
            Lir::Call(CallTarget::Runtime("rt.newline".to_string()), 0, false),
            Lir::LoadGlobal(global("i")),
            Lir::LoadConst(Literal::Integer(1)),
            Lir::Binary(BinaryOp::Add, BaseType::Integer),
            Lir::StoreGlobal(global("i")),
            Lir::Label(1),
            Lir::LoadGlobal(global("i")),
            Lir::LoadLocal(0),
            Lir::Binary(BinaryOp::Le, BaseType::Integer),
            Lir::BranchIf(true, 0),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn negative_constant_step_counts_down() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("i", BaseType::Integer, 1));
        unit.main.push(Stmt::new(StmtKind::For {
            var: "i".to_string(),
            from: int(10),
            to: int(1),
            step: Some(Expr::unary(UnaryOp::Neg, int(2))),
            body: vec![],
        }, 2));

        let module = translate(&unit).unwrap();
        let code = code(&module, "prog");

        assert!(code.contains(&Lir::LoadConst(Literal::Integer(-2))));
        assert!(code.contains(&Lir::Binary(BinaryOp::Ge, BaseType::Integer)));
        assert!(!code.contains(&Lir::Binary(BinaryOp::Le, BaseType::Integer)));
    }

    #[test]
    fn recovers_after_errors() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("i", BaseType::Integer, 1));
        unit.main.push(Stmt::assign("y", int(1), 2));
        unit.main.push(Stmt::assign("i", Expr::literal(Literal::Boolean(true), 3), 3));
        unit.main.push(Stmt::assign("i", int(4), 4));

        let errors = translate(&unit).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ErrorKind::UnresolvedSymbol("y".to_string()));
        assert_eq!(errors[0].line_index, 2);
        assert_eq!(errors[1].kind, ErrorKind::TypeMismatch(
            TypeDescriptor::scalar(BaseType::Integer),
            TypeDescriptor::scalar(BaseType::Boolean),
        ));
        assert_eq!(errors[1].line_index, 3);
    }

    #[test]
    fn closed_procedures_need_imports() {
        let body = |import: bool| {
            let mut body = vec![Stmt::assign("total", Expr::literal(Literal::Double(1.0), 3), 3)];
            if import {
                body.insert(0, Stmt::new(StmtKind::Import(vec!["total".to_string()]), 2));
            }
            body
        };
        let unit = |import: bool| {
            let mut unit = CompilationUnit::new("prog", Language::Comal);
            unit.globals.push(Declaration::variable("total", BaseType::Double, 1));
            unit.routines.push(Routine::new("p", vec![], BaseType::Void, body(import), 2).closed());
            unit
        };

        assert_eq!(error_kinds(&unit(false)), vec![ErrorKind::UnresolvedSymbol("total".to_string())]);

        let module = translate(&unit(true)).unwrap();
        assert_eq!(code(&module, "p"), &[
            Lir::LoadConst(Literal::Double(1.0)),
            Lir::StoreGlobal(global("total")),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn fortran_function_result() {
        let mut unit = CompilationUnit::new("demo", Language::Fortran);
        unit.globals.push(Declaration::variable("y", BaseType::Double, 1));
        unit.main.push(Stmt::assign("y", Expr::call("sq", vec![int(2)], 2), 2));
        unit.routines.push(Routine::new(
            "sq",
            vec![Param::new("x", BaseType::Double, 3)],
            BaseType::Double,
            vec![Stmt::assign("sq", Expr::binary(ident("x"), BinaryOp::Mul, ident("x")), 4)],
            3,
        ));

        let module = translate(&unit).unwrap();

        assert_eq!(code(&module, "DEMO"), &[
            Lir::LoadConst(Literal::Integer(2)),
            Lir::Convert(Promotion::IntegerToDouble),
            Lir::Call(CallTarget::Routine("SQ".to_string()), 1, true),
            Lir::StoreGlobal(global("Y")),
            Lir::Return(false),
        ]);
        assert_eq!(code(&module, "SQ"), &[
            Lir::LoadLocal(0),
            Lir::LoadLocal(0),
            Lir::Binary(BinaryOp::Mul, BaseType::Double),
            Lir::Store(1),
            Lir::LoadLocal(1),
            Lir::Return(true),
        ]);
        let sq = module.routine("SQ").unwrap();
        assert_eq!(sq.params, 1);
        assert_eq!(sq.returns, BaseType::Double);
    }

    #[test]
    fn dynamic_arrays_are_bounds_checked() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("n", BaseType::Integer, 1));
        unit.main.push(declare(
            Declaration::array("a", BaseType::Integer, vec![Extent::Dynamic], 2)
                .with_extents(vec![ident("n")]),
        ));
        unit.main.push(Stmt::assign_element("a", vec![int(3)], int(5), 3));

        let module = translate(&unit).unwrap();
        let array = Storage::Global(global("a"));

        assert_eq!(code(&module, "prog"), &[
            Lir::LoadGlobal(global("n")),
            Lir::AllocArray(array.clone(), BaseType::Integer, 1),
            Lir::LoadConst(Literal::Integer(3)),
            Lir::CheckBounds(array.clone(), 0),
            Lir::LoadConst(Literal::Integer(5)),
            Lir::StoreElement(array, 1),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn constant_subscript_out_of_range() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::array("a", BaseType::Integer, vec![Extent::Fixed(10)], 1));
        unit.main.push(Stmt::assign_element("a", vec![int(11)], int(1), 2));
        unit.main.push(Stmt::assign_element("a", vec![int(1), int(1)], int(1), 3));

        let kinds = error_kinds(&unit);

        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], ErrorKind::ArrayDimension(_)));
        assert!(matches!(kinds[1], ErrorKind::ArrayDimension(_)));
    }

    #[test]
    fn nested_routines() {
        let inner = Routine::new("inner", vec![], BaseType::Void, vec![Stmt::assign("count", int(1), 4)], 3);
        let outer = Routine::new("outer", vec![], BaseType::Void, vec![
            declare(Declaration::variable("count", BaseType::Integer, 2)),
            Stmt::new(StmtKind::Call { name: "inner".to_string(), args: vec![] }, 5),
        ], 1).with_routines(vec![inner]);

        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.routines.push(outer);

        let kinds = error_kinds(&unit);
        assert_eq!(kinds.len(), 1);
        assert!(matches!(kinds[0], ErrorKind::UnsupportedConstruct(_)));

        // without the capture the nested routine gets a qualified name
        unit.routines[0].routines[0].body.clear();
        let module = translate(&unit).unwrap();

        assert_eq!(module.entry_points.keys().collect::<Vec<_>>(), vec!["prog", "outer", "outer.inner"]);
        assert_eq!(code(&module, "outer"), &[
            Lir::Call(CallTarget::Routine("outer.inner".to_string()), 0, false),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn fortran_rejects_nesting() {
        let inner = Routine::new("inner", vec![], BaseType::Void, vec![], 2);
        let mut unit = CompilationUnit::new("demo", Language::Fortran);
        unit.routines.push(Routine::new("outer", vec![], BaseType::Void, vec![], 1).with_routines(vec![inner]));

        let errors = translate(&unit).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, ErrorKind::UnsupportedConstruct(_)));
        assert_eq!(errors[0].line_index, 2);
    }

    #[test]
    fn gotos() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.main.push(Stmt::new(StmtKind::Label("top".to_string()), 1));
        unit.main.push(Stmt::new(StmtKind::Goto("top".to_string()), 2));

        let module = translate(&unit).unwrap();
        assert_eq!(code(&module, "prog"), &[Lir::Label(0), Lir::Branch(0), Lir::Return(false)]);

        unit.main.push(Stmt::new(StmtKind::Goto("nowhere".to_string()), 3));
        assert_eq!(error_kinds(&unit), vec![ErrorKind::UnresolvedSymbol("nowhere".to_string())]);
    }

    #[test]
    fn calls_are_checked() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("x", BaseType::Double, 1));
        unit.routines.push(Routine::new("p", vec![Param::new("n", BaseType::Integer, 5)], BaseType::Void, vec![], 5));
        unit.main.push(Stmt::assign("x", Expr::call("sqr", vec![int(2)], 2), 2));
        unit.main.push(Stmt::new(StmtKind::Call { name: "p".to_string(), args: vec![] }, 3));
        unit.main.push(Stmt::assign("x", Expr::call("p", vec![int(1)], 4), 4));

        let kinds = error_kinds(&unit);

        assert_eq!(kinds, vec![
            ErrorKind::Arity("p".to_string(), 1, 0),
            ErrorKind::VoidValue("p".to_string()),
        ]);
    }

    #[test]
    fn intrinsics_without_call_syntax() {
        // SQRT(X) handed over as an element access
        let mut unit = CompilationUnit::new("demo", Language::Fortran);
        unit.globals.push(Declaration::variable("x", BaseType::Double, 1));
        unit.globals.push(Declaration::variable("y", BaseType::Double, 1));
        unit.main.push(Stmt::assign("y", Expr::index("SQRT", vec![ident("x")], 2), 2));

        let module = translate(&unit).unwrap();
        assert_eq!(code(&module, "DEMO"), &[
            Lir::LoadGlobal(global("X")),
            Lir::Call(CallTarget::Runtime("rt.sqrt".to_string()), 1, true),
            Lir::StoreGlobal(global("Y")),
            Lir::Return(false),
        ]);

        // a parameterless intrinsic used like a variable
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.globals.push(Declaration::variable("r", BaseType::Double, 1));
        unit.main.push(Stmt::assign("r", ident("RND"), 2));

        let module = translate(&unit).unwrap();
        assert_eq!(code(&module, "prog"), &[
            Lir::Call(CallTarget::Runtime("rt.rnd".to_string()), 0, true),
            Lir::StoreGlobal(global("r")),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn declared_arrays_shadow_intrinsics() {
        let mut unit = CompilationUnit::new("demo", Language::Fortran);
        unit.globals.push(Declaration::array("abs", BaseType::Integer, vec![Extent::Fixed(3)], 1));
        unit.globals.push(Declaration::variable("y", BaseType::Integer, 1));
        unit.main.push(Stmt::assign("y", Expr::index("ABS", vec![int(2)], 2), 2));

        let module = translate(&unit).unwrap();
        assert_eq!(code(&module, "DEMO"), &[
            Lir::LoadConst(Literal::Integer(3)),
            Lir::AllocArray(Storage::Global(global("ABS")), BaseType::Integer, 1),
            Lir::LoadConst(Literal::Integer(2)),
            Lir::LoadElement(Storage::Global(global("ABS")), 1),
            Lir::StoreGlobal(global("Y")),
            Lir::Return(false),
        ]);
    }

    #[test]
    fn invalid_parameter_arrays() {
        let mut grid = Param::new("grid", BaseType::Integer, 7);
        grid.dimensions = vec![Extent::Fixed(2), Extent::Fixed(0)];

        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.routines.push(Routine::new("p", vec![grid], BaseType::Void, vec![], 6));

        let errors = translate(&unit).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line_index, 7);
        assert!(matches!(errors[0].kind, ErrorKind::ArrayDimension(_)));
    }

    #[test]
    fn routine_named_like_the_unit() {
        let mut unit = CompilationUnit::new("prog", Language::Comal);
        unit.routines.push(Routine::new("prog", vec![], BaseType::Void, vec![], 4));

        let errors = translate(&unit).unwrap_err();

        assert_eq!(errors, vec![Error::at(4, ErrorKind::DuplicateSymbol("prog".to_string(), "prog".to_string()))]);
    }

    #[test]
    fn constants_are_folded_into_loads() {
        let mut unit = CompilationUnit::new("demo", Language::Fortran);
        unit.globals.push(Declaration::constant("pi", BaseType::Double, Literal::Integer(3), 1));
        unit.globals.push(Declaration::variable("r", BaseType::Double, 1));
        unit.main.push(Stmt::assign("r", ident("PI"), 2));
        unit.main.push(Stmt::assign("pi", int(4), 3));

        assert_eq!(error_kinds(&unit), vec![
            ErrorKind::NotAssignable("pi".to_string(), SymbolClass::Constant),
        ]);

        unit.main.pop();
        let module = translate(&unit).unwrap();
        assert_eq!(code(&module, "DEMO"), &[
            Lir::LoadConst(Literal::Double(3.0)),
            Lir::StoreGlobal(global("R")),
            Lir::Return(false),
        ]);
        assert_eq!(module.globals.len(), 1);
    }
}
