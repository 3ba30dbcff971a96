//! Pattern matching against a subject held in memory.
//!
//! Subjects are addresses the matcher never consumes; bindings receive
//! copies. A failed test unwinds to the exit's depth and branches to its
//! block.

use crate::core::ir::{InstKind, LoadQualifier, Ownership, SwitchCase, Terminator, ValueId};
use crate::core::lower::calls::ArgSource;
use crate::core::lower::func::{Exit, FuncLowerer, LowerResult, Managed};
use crate::core::resolve::DeclKind;
use crate::core::tree::{ExprKind, Pattern, PatternKind};
use crate::core::typecheck::ValueRef;
use crate::core::types::Type;

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn match_pattern(&mut self, pattern: &'a Pattern, subject: ValueId, ty: &Type, fail: Exit) -> LowerResult<()> {
        match &pattern.kind {
            PatternKind::Wildcard => Ok(()),
            PatternKind::Binding { name, is_let } => {
                let local_ty = self
                    .cx
                    .tables
                    .locals
                    .get(&pattern.id)
                    .map(|local| local.ty.clone())
                    .unwrap_or_else(|| ty.clone());
                self.bind_local(pattern.id, name, *is_let, Managed::addr(subject), &local_ty)
            }
            PatternKind::Tuple(elems) => {
                let Type::Tuple(elem_tys) = ty else {
                    return Err(self.unsupported("tuple pattern against a non-tuple", pattern.span));
                };
                for (index, (elem, elem_ty)) in elems.iter().zip(elem_tys).enumerate() {
                    let ir = self.ir(&elem_ty.ty).address_of();
                    let addr = self
                        .b
                        .emit_value(InstKind::TupleElementAddr { addr: subject, index }, ir, Ownership::Trivial);
                    self.match_pattern(elem, addr, &elem_ty.ty, fail)?;
                }
                Ok(())
            }
            PatternKind::EnumCase { payload, .. } => {
                let Some(ValueRef::Decl(element)) = self.cx.tables.refs.get(&pattern.id) else {
                    return Err(self.unsupported("enum case pattern without a resolved case", pattern.span));
                };
                let element = element.decl;
                let subst = self.cx.set.substitution_for(ty);
                let payload_ty = self.element_payload_type(element, &subst);
                let data = self.test_case(subject, ty, element, payload_ty.as_ref(), fail)?;
                let (Some(subpatterns), Some((data, payload_ty))) = (payload, data.zip(payload_ty)) else {
                    return Ok(());
                };
                match (subpatterns.as_slice(), &payload_ty) {
                    ([single], _) => self.match_pattern(single, data, &payload_ty, fail),
                    (many, Type::Tuple(elem_tys)) => {
                        for (index, (sub, elem_ty)) in many.iter().zip(elem_tys).enumerate() {
                            let ir = self.ir(&elem_ty.ty).address_of();
                            let addr = self
                                .b
                                .emit_value(InstKind::TupleElementAddr { addr: data, index }, ir, Ownership::Trivial);
                            self.match_pattern(sub, addr, &elem_ty.ty, fail)?;
                        }
                        Ok(())
                    }
                    _ => Err(self.unsupported("payload pattern arity", pattern.span)),
                }
            }
            PatternKind::OptionalSome(inner) => {
                let Some(payload_ty) = ty.optional_payload().cloned() else {
                    return Err(self.unsupported("'?' pattern against a non-optional", pattern.span));
                };
                let some = self.optional_element("some", pattern.span)?;
                let data = self.test_case(subject, ty, some, Some(&payload_ty), fail)?;
                match data {
                    Some(data) => self.match_pattern(inner, data, &payload_ty, fail),
                    None => Ok(()),
                }
            }
            PatternKind::Expr(expr) if matches!(expr.kind, ExprKind::NilLit) => {
                let none = self.optional_element("none", pattern.span)?;
                self.test_case(subject, ty, none, None, fail).map(|_| ())
            }
            PatternKind::Expr(expr) => {
                let Some(info) = self.cx.tables.calls.get(&pattern.id).cloned() else {
                    return Err(self.unsupported("expression pattern without '~='", pattern.span));
                };
                let matched = self.scoped(|this| {
                    let sources = vec![ArgSource::Expr(expr), ArgSource::Value(Managed::addr(subject), ty.clone())];
                    let result = this.lower_operator_call(&info, sources, pattern.span)?;
                    let bool_ty = this.cx.set.bool_type();
                    Ok(this.borrow(result, &bool_ty))
                })?;
                let pass = self.b.add_block();
                let failed = self.b.add_block();
                self.b.cond_br(matched, pass, failed);
                self.b.switch_to(failed);
                self.emit_cleanups_to(fail.depth)?;
                self.b.br(fail.block, Vec::new());
                self.b.switch_to(pass);
                Ok(())
            }
            PatternKind::CodeCompletion | PatternKind::Error => Err(self.unsupported("invalid pattern", pattern.span)),
        }
    }

    /// Tests whether the enum at `subject` holds `element`. On success,
    /// returns a temporary holding a copy of the payload when asked for.
    fn test_case(
        &mut self,
        subject: ValueId,
        ty: &Type,
        element: crate::core::resolve::DeclId,
        payload_ty: Option<&Type>,
        fail: Exit,
    ) -> LowerResult<Option<ValueId>> {
        let case = self.case_name(element);
        let matched = self.b.add_block();
        let other = self.b.add_block();
        if self.is_address_only(ty) {
            let copy = self.alloc_temp(ty, None);
            self.b.emit(InstKind::CopyAddr {
                src: subject,
                dst: copy,
                take: false,
                init: true,
            });
            self.b.terminate(Terminator::SwitchEnumAddr {
                addr: copy,
                cases: vec![SwitchCase {
                    case: case.clone(),
                    target: matched,
                }],
                default: Some(other),
            });
            self.b.switch_to(other);
            self.b.emit(InstKind::DestroyAddr { addr: copy });
            self.emit_cleanups_to(fail.depth)?;
            self.b.br(fail.block, Vec::new());
            self.b.switch_to(matched);
            let Some(payload_ty) = payload_ty else {
                self.b.emit(InstKind::DestroyAddr { addr: copy });
                return Ok(None);
            };
            let ir = self.ir(payload_ty).address_of();
            let data = self
                .b
                .emit_value(InstKind::UncheckedTakeEnumDataAddr { addr: copy, case }, ir, Ownership::Trivial);
            self.manage_temp(data, payload_ty);
            return Ok(Some(data));
        }

        let qualifier = if self.is_trivial(ty) {
            LoadQualifier::Trivial
        } else {
            LoadQualifier::Copy
        };
        let value = self.b.load(subject, qualifier);
        self.b.terminate(Terminator::SwitchEnum {
            value,
            cases: vec![SwitchCase {
                case,
                target: matched,
            }],
            default: Some(other),
        });
        let enum_ir = self.ir(ty);
        let enum_ownership = self.cx.types.ownership(ty);
        let rest = self.b.add_block_param(other, enum_ir, enum_ownership);
        self.b.switch_to(other);
        if enum_ownership == Ownership::Owned {
            self.b.destroy_value(rest);
        }
        self.emit_cleanups_to(fail.depth)?;
        self.b.br(fail.block, Vec::new());

        let Some(payload_ty) = payload_ty else {
            self.b.switch_to(matched);
            return Ok(None);
        };
        let payload_ir = self.ir(payload_ty);
        let payload_ownership = self.cx.types.ownership(payload_ty);
        let payload = self.b.add_block_param(matched, payload_ir, payload_ownership);
        self.b.switch_to(matched);
        let temp = self.alloc_temp(payload_ty, None);
        let qualifier = self.init_qualifier(payload_ty);
        self.b.store(payload, temp, qualifier);
        self.manage_temp(temp, payload_ty);
        Ok(Some(temp))
    }

    /// Payload type of an enum element under the subject's substitution;
    /// several fields form a tuple.
    pub(super) fn element_payload_type(
        &self,
        element: crate::core::resolve::DeclId,
        subst: &crate::core::types::Substitution,
    ) -> Option<Type> {
        let DeclKind::EnumElement { payload: Some(fields), .. } = &self.cx.set.decl(element).kind else {
            return None;
        };
        let ty = match fields.as_slice() {
            [single] => single.ty.clone(),
            many => Type::Tuple(many.to_vec()),
        };
        Some(self.cx.types.apply(&ty, Some(subst)))
    }
}
