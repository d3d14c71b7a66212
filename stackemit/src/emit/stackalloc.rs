//! Stack allocation with initializer lists.
//!
//! The block is allocated with `localloc` and its address stays on the stack
//! while it is populated. Population picks one of three styles from how much
//! of the initializer list is constant:
//!
//! - **Element**: store every entry through its computed address.
//! - **Block**: copy (or fill) all entries at once from a data blob.
//! - **Mixed**: block-copy the constants, then store the remaining entries.

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::ice::EmitResult;
use crate::ice_err;
use crate::model::{Expr, PrimitiveType, TypeRef};
use crate::span::Span;

use super::builder::{ConvTarget, IndirectKind, Instruction, Overflow};
use super::CodeGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializerStyle {
    Element,
    Block,
    Mixed,
}

/// Pick the population style for `init_count` entries of which
/// `const_count` are constant.
pub fn classify_initializer(init_count: usize, const_count: usize) -> InitializerStyle {
    if init_count > 2 {
        if init_count == const_count {
            return InitializerStyle::Block;
        }
        let threshold = (init_count / 3).max(3);
        if const_count >= threshold {
            return InitializerStyle::Mixed;
        }
    }
    InitializerStyle::Element
}

/// Blob-embeddable element layout.
fn blittable_layout(element_type: &TypeRef) -> Option<PrimitiveType> {
    element_type.primitive().filter(|prim| prim.is_blittable())
}

impl CodeGenerator {
    /// Allocate `count` elements of `element_type` on the stack and populate
    /// them from `initializers`.
    pub fn emit_stackalloc(
        &mut self,
        element_type: &TypeRef,
        count: &Expr,
        initializers: Option<&[Expr]>,
        used: bool,
        span: Span,
    ) -> EmitResult<()> {
        self.emit_allocation_size(element_type, count)?;
        self.builder.emit(Instruction::Localloc);

        if let Some(inits) = initializers {
            if used {
                self.emit_stackalloc_initializers(element_type, inits, span)?;
            } else {
                for init in inits {
                    self.emit_expression(init, false)?;
                }
            }
        }

        // `localloc` may overflow the stack, so it stays even when unused.
        self.emit_pop_if_unused(used);
        Ok(())
    }

    /// Byte count for the allocation, as an unsigned native integer.
    fn emit_allocation_size(&mut self, element_type: &TypeRef, count: &Expr) -> EmitResult<()> {
        let size = element_type.size_in_bytes();

        if let (Some(size), Some(count)) = (size, count.constant.and_then(|c| c.as_i32_immediate())) {
            let folded = u64::from(count as u32) * u64::from(size);
            if folded < u64::from(u32::MAX) {
                self.builder.emit_int_constant(folded as u32 as i32);
                self.builder.emit(Instruction::Conv(ConvTarget::U, Overflow::Unchecked));
                return Ok(());
            }
        }

        self.emit_expression(count, true)?;
        self.builder.emit(Instruction::Conv(ConvTarget::U, Overflow::Unchecked));
        match size {
            Some(1) => {}
            Some(size) => {
                self.builder.emit_int_constant(size as i32);
                self.builder.emit(Instruction::MulOvfUn);
            }
            None => {
                self.builder.emit(Instruction::Sizeof(element_type.clone()));
                self.builder.emit(Instruction::MulOvfUn);
            }
        }
        Ok(())
    }

    fn emit_stackalloc_initializers(
        &mut self,
        element_type: &TypeRef,
        inits: &[Expr],
        span: Span,
    ) -> EmitResult<()> {
        let style = self.initializer_style(element_type, inits);
        tracing::debug!(?style, element = %element_type, entries = inits.len(), "stackalloc initializer");

        if style == InitializerStyle::Element {
            return self.emit_element_initializers(element_type, inits, true);
        }

        let Some(prim) = blittable_layout(element_type) else {
            return Err(ice_err!(span, "block initializer for non-blittable element";
                                "element" => element_type));
        };
        let data = raw_initializer_data(prim, inits, span)?;
        let element_size = prim.size_in_bytes().unwrap_or(1);
        let mut fully_initialized = false;

        if let Some(&first) = data.first().filter(|&&b| data.iter().all(|&d| d == b)) {
            self.builder.emit(Instruction::Dup);
            self.builder.emit_int_constant(i32::from(first));
            self.builder.emit_int_constant(data.len() as i32);
            self.builder.emit(Instruction::Initblk);
        } else if element_size == 1 {
            let blob = self.module.blob_for(&data, 1);
            self.builder.emit(Instruction::Dup);
            self.builder.emit(Instruction::LdsfldaBlob(blob));
            self.builder.emit_int_constant(data.len() as i32);
            self.builder.emit(Instruction::Cpblk { unaligned: None });
        } else if let Some(helper) = self.symbols.blob_view_helper(element_type) {
            let blob = self.module.blob_for(&data, element_size as u16);
            self.builder.emit(Instruction::Dup);
            self.builder.emit(Instruction::LdtokenBlob(blob));
            self.builder.emit(Instruction::Call(helper.create_view));
            let view = self.slots.allocate_temp(&helper.view_type);
            self.builder.emit(Instruction::Stloc(view));
            self.builder.emit(Instruction::Ldloca(view));
            self.builder.emit(Instruction::Call(helper.pin_view));
            self.builder.emit_int_constant(data.len() as i32);
            self.builder.emit(Instruction::Cpblk { unaligned: Some(element_size as u8) });
            self.slots.free_temp(view);
        } else {
            self.diagnostics.push(
                Diagnostic::note(
                    format!("initializing stackalloc of '{}' element by element", element_type),
                    span,
                )
                .with_error_code(ErrorCode::MissingBlobViewHelper)
                .with_note(span, format!("no blob view helper for '{}' elements", element_type))
                .with_suggestion("provide RuntimeHelpers.CreateSpan<T> to copy constant data in one block"),
            );
            self.emit_element_initializers(element_type, inits, true)?;
            fully_initialized = true;
        }

        if style == InitializerStyle::Mixed && !fully_initialized {
            self.emit_element_initializers(element_type, inits, false)?;
        }
        Ok(())
    }

    fn initializer_style(&self, element_type: &TypeRef, inits: &[Expr]) -> InitializerStyle {
        if !self.options.supports_blob_initializers || blittable_layout(element_type).is_none() {
            return InitializerStyle::Element;
        }
        let const_count = inits.iter().filter(|init| init.is_constant()).count();
        classify_initializer(inits.len(), const_count)
    }

    /// Store entries one at a time; constants are skipped unless
    /// `include_constants`.
    fn emit_element_initializers(
        &mut self,
        element_type: &TypeRef,
        inits: &[Expr],
        include_constants: bool,
    ) -> EmitResult<()> {
        let element_size = element_type.size_in_bytes();
        for (index, init) in inits.iter().enumerate() {
            if include_constants || !init.is_constant() {
                self.builder.emit(Instruction::Dup);
                self.emit_element_offset(element_type, element_size, index as i32);
                self.emit_expression(init, true)?;
                self.builder.emit(Instruction::Stind(IndirectKind::store_of(element_type)));
            }
        }
        Ok(())
    }

    /// Advance the block address on the stack to element `index`.
    fn emit_element_offset(&mut self, element_type: &TypeRef, element_size: Option<u32>, index: i32) {
        if index == 0 {
            return;
        }
        if element_size == Some(1) {
            self.builder.emit_int_constant(index);
            self.builder.emit(Instruction::Add);
        } else if index == 1 {
            self.emit_size_of(element_type, element_size);
            self.builder.emit(Instruction::Add);
        } else {
            self.builder.emit_int_constant(index);
            self.builder.emit(Instruction::Conv(ConvTarget::I, Overflow::Unchecked));
            self.emit_size_of(element_type, element_size);
            self.builder.emit(Instruction::Mul);
            self.builder.emit(Instruction::Add);
        }
    }

    fn emit_size_of(&mut self, element_type: &TypeRef, element_size: Option<u32>) {
        match element_size {
            Some(size) => self.builder.emit_int_constant(size as i32),
            None => self.builder.emit(Instruction::Sizeof(element_type.clone())),
        }
    }
}

/// Little-endian bytes of the initializer list; non-constant entries are
/// zero-filled.
fn raw_initializer_data(prim: PrimitiveType, inits: &[Expr], span: Span) -> EmitResult<Vec<u8>> {
    let element_size = prim.size_in_bytes().unwrap_or(0) as usize;
    let mut data = Vec::with_capacity(element_size * inits.len());
    for init in inits {
        match init.constant {
            Some(value) => {
                if !value.write_le_bytes(prim, &mut data) {
                    return Err(ice_err!(span, "constant has no layout at element type";
                                        "value" => value,
                                        "element" => prim.name()));
                }
            }
            None => data.resize(data.len() + element_size, 0),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstantValue;

    #[test]
    fn test_classification_table() {
        assert_eq!(classify_initializer(4, 4), InitializerStyle::Block);
        assert_eq!(classify_initializer(1, 1), InitializerStyle::Element);
        assert_eq!(classify_initializer(6, 4), InitializerStyle::Mixed);
        assert_eq!(classify_initializer(9, 2), InitializerStyle::Element);
    }

    #[test]
    fn test_two_constants_stay_element_wise() {
        assert_eq!(classify_initializer(2, 2), InitializerStyle::Element);
        assert_eq!(classify_initializer(0, 0), InitializerStyle::Element);
    }

    #[test]
    fn test_mixed_threshold_grows_with_count() {
        // threshold max(3, 30 / 3) = 10
        assert_eq!(classify_initializer(30, 9), InitializerStyle::Element);
        assert_eq!(classify_initializer(30, 10), InitializerStyle::Mixed);
    }

    #[test]
    fn test_raw_data_zero_fills_non_constants() {
        let inits = vec![
            Expr::literal(TypeRef::int16(), ConstantValue::Int(0x0102)),
            Expr::local(crate::model::LocalRef::new(crate::model::LocalId::new(0), TypeRef::int16())),
            Expr::literal(TypeRef::int16(), ConstantValue::Int(-1)),
        ];
        let data = raw_initializer_data(PrimitiveType::Int16, &inits, Span::dummy()).unwrap();
        assert_eq!(data, vec![0x02, 0x01, 0, 0, 0xff, 0xff]);
    }

    #[test]
    fn test_native_int_elements_are_not_blittable() {
        assert!(blittable_layout(&TypeRef::intptr()).is_none());
        assert!(blittable_layout(&TypeRef::structure("Pair")).is_none());
        assert_eq!(blittable_layout(&TypeRef::boolean()), Some(PrimitiveType::Boolean));
    }
}
