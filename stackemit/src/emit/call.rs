//! Call emission.

use crate::ice::EmitResult;
use crate::ice_err;
use crate::model::{AddressKind, CallExpr, RefKind};
use crate::span::Span;

use super::builder::Instruction;
use super::escape::call_might_escape;
use super::{CodeGenerator, UseKind};

impl CodeGenerator {
    /// Emit a call, consuming its result according to `use_kind`.
    ///
    /// Temporaries created for by-reference arguments are returned to the
    /// pool afterwards unless the callee's signature could have captured a
    /// reference to one of them.
    pub fn emit_call(&mut self, call: &CallExpr, use_kind: UseKind, span: Span) -> EmitResult<()> {
        let method = &call.method;
        if call.arguments.len() != method.parameters.len() {
            return Err(ice_err!(span, "argument count does not match signature";
                                "method" => method,
                                "arguments" => call.arguments.len(),
                                "parameters" => method.parameters.len()));
        }

        let mut temps = Vec::new();
        let mut receiver_kind = None;
        let mut constrained = None;
        let mut virtual_dispatch = false;

        match (&call.receiver, method.is_static) {
            (Some(receiver), false) => {
                if receiver.ty.is_verifier_reference() {
                    self.emit_expression(receiver, true)?;
                    virtual_dispatch = !call.non_virtual;
                } else {
                    let kind = if method.is_effectively_readonly {
                        AddressKind::ReadOnly
                    } else {
                        AddressKind::Constrained
                    };
                    temps.extend(self.emit_address(receiver, kind)?);
                    receiver_kind = Some(kind);
                    if !receiver.ty.is_value_type() {
                        // Generic receiver: the runtime picks boxing or not.
                        constrained = Some(receiver.ty.clone());
                        virtual_dispatch = true;
                    }
                }
            }
            (None, false) => {
                return Err(ice_err!(span, "instance call without receiver"; "method" => method));
            }
            (_, true) => {}
        }

        for (argument, parameter) in call.arguments.iter().zip(&method.parameters) {
            match parameter.ref_kind {
                RefKind::None => self.emit_expression(argument, true)?,
                RefKind::Ref | RefKind::Out => {
                    temps.extend(self.emit_address(argument, AddressKind::Writable)?)
                }
                RefKind::In | RefKind::RefReadOnly | RefKind::RefReadOnlyParam => {
                    temps.extend(self.emit_address(argument, AddressKind::ReadOnlyStrict)?)
                }
            }
        }

        if let Some(ty) = constrained {
            self.builder.emit(Instruction::Constrained(ty));
        }
        if virtual_dispatch {
            self.builder.emit(Instruction::Callvirt(method.clone()));
        } else {
            self.builder.emit(Instruction::Call(method.clone()));
        }

        if !temps.is_empty() {
            let used = use_kind != UseKind::Unused;
            if call_might_escape(method, used, receiver_kind) {
                tracing::debug!(%method, count = temps.len(), "retiring argument temporaries");
                temps.iter().for_each(|&temp| self.slots.retire_temp(temp));
            } else {
                temps.iter().for_each(|&temp| self.slots.free_temp(temp));
            }
        }

        if method.returns_value() {
            match use_kind {
                UseKind::Unused => self.builder.emit(Instruction::Pop),
                UseKind::UsedAsValue if method.return_ref_kind.is_by_ref() => {
                    self.emit_load_indirect(&method.return_type)
                }
                UseKind::UsedAsValue => {}
                UseKind::UsedAsAddress if !method.return_ref_kind.is_by_ref() => {
                    return Err(ice_err!(span, "address of a by-value call result";
                                        "method" => method));
                }
                UseKind::UsedAsAddress => {}
            }
        }
        Ok(())
    }
}
