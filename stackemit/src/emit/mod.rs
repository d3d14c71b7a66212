//! # Instruction Emission
//!
//! Turns lowered expressions into stack-machine instructions for one method
//! body at a time.
//!
//! ## Module Structure
//!
//! - [`builder`] - Instruction set and the per-method instruction stream
//! - [`slots`] - Declared locals and the temporary pool
//! - [`home`] - Addressability ("home") analysis
//! - [`escape`] - Reference escape analysis after calls
//! - [`numeric`] - Numeric conversion table
//! - `conversion` - Conversion and delegate creation emission
//! - `stackalloc` - Stack allocation with bulk initializers
//! - `address` - Address emission, with temporary fallback
//! - `call` - Call emission and temporary reuse
//! - `expr` - Expression emission entry point
//!
//! ## Concurrency
//!
//! A [`CodeGenerator`] owns everything specific to its method body. Workers
//! on different methods share only the symbol table, the module blob table
//! and the diagnostic sink.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::EmitOptions;
use crate::diagnostics::DiagnosticSink;
use crate::metadata::{ModuleBuilder, SymbolTable};
use crate::model::{AddressKind, Expr, LocalId, MethodContext};

pub mod builder;
pub mod escape;
pub mod home;
pub mod numeric;
pub mod slots;

mod address;
mod call;
mod conversion;
mod expr;
mod stackalloc;


pub use builder::{ConvTarget, IndirectKind, Instruction, InstructionBuilder, LabelId, Overflow};
pub use escape::{call_might_escape, might_escape_temporary_refs};
pub use home::{has_home, HomeQuery};
pub use numeric::numeric_conversion;
pub use slots::{LocalSlot, LocalSlots, SlotState};
pub use stackalloc::{classify_initializer, InitializerStyle};

/// How the value of an expression is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    /// Evaluated for side effects only.
    Unused,
    UsedAsValue,
    /// The expression's address is left on the stack.
    UsedAsAddress,
}

impl UseKind {
    pub fn from_used(used: bool) -> Self {
        if used {
            UseKind::UsedAsValue
        } else {
            UseKind::Unused
        }
    }
}

/// The finished body of one method.
#[derive(Debug)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub max_stack: i32,
    pub local_count: usize,
}

/// Per-method emission state.
pub struct CodeGenerator {
    pub(crate) builder: InstructionBuilder,
    pub(crate) slots: LocalSlots,
    /// Locals the optimizer kept on the evaluation stack.
    pub(crate) stack_locals: HashSet<LocalId>,
    pub(crate) method: MethodContext,
    pub(crate) options: EmitOptions,
    pub(crate) symbols: Arc<dyn SymbolTable>,
    pub(crate) module: Arc<ModuleBuilder>,
    pub(crate) diagnostics: Arc<DiagnosticSink>,
}

impl CodeGenerator {
    pub fn new(
        method: MethodContext,
        options: EmitOptions,
        symbols: Arc<dyn SymbolTable>,
        module: Arc<ModuleBuilder>,
        diagnostics: Arc<DiagnosticSink>,
    ) -> Self {
        Self {
            builder: InstructionBuilder::new(),
            slots: LocalSlots::new(),
            stack_locals: HashSet::new(),
            method,
            options,
            symbols,
            module,
            diagnostics,
        }
    }

    /// Record that `local` lives on the evaluation stack.
    pub fn mark_stack_local(&mut self, local: LocalId) {
        self.stack_locals.insert(local);
    }

    pub fn is_stack_local(&self, local: LocalId) -> bool {
        self.stack_locals.contains(&local)
    }

    pub fn home_query(&self) -> HomeQuery<'_> {
        HomeQuery::new(&self.method, self.options.verifier_compat, &self.stack_locals)
    }

    pub fn has_home(&self, expr: &Expr, kind: AddressKind) -> bool {
        self.home_query().has_home(expr, kind)
    }

    pub fn builder(&self) -> &InstructionBuilder {
        &self.builder
    }

    pub fn slots(&self) -> &LocalSlots {
        &self.slots
    }

    pub fn method(&self) -> &MethodContext {
        &self.method
    }

    pub fn finish(self) -> MethodBody {
        MethodBody {
            max_stack: self.builder.max_stack(),
            local_count: self.slots.len(),
            instructions: self.builder.into_instructions(),
        }
    }

    pub(crate) fn emit_pop_if_unused(&mut self, used: bool) {
        if !used {
            self.builder.emit(Instruction::Pop);
        }
    }
}
