//! Witness tables and the thunks they point at.
//!
//! Every conformance of the current module gets one table. Method and
//! accessor entries name a thunk with the requirement's signature, with
//! `Self` bound to the conforming type, that forwards to the witness.

use crate::core::conformance::{Conformance, ConformanceRef};
use crate::core::diag::Span;
use crate::core::ir::{Convention, FunctionKind, InstKind, IrWitnessTable, Ownership, ValueId, WitnessEntry};
use crate::core::lower::ModuleLowerer;
use crate::core::lower::calls::{EntryPoint, PreparedCall, SelfAccess};
use crate::core::lower::func::{FuncLowerer, LowerResult, Managed};
use crate::core::lower::names::{accessor_symbol, decl_symbol, witness_thunk_symbol};
use crate::core::lower::types::Abstraction;
use crate::core::resolve::{AccessorKind, DeclId, DeclKind, LookupOrigin, Storage};
use crate::core::typecheck::DeclRef;
use crate::core::types::{Substitution, Type};

/// Requirement slot: the requirement and which of its entry points.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Decl,
    Accessor(AccessorKind),
}

impl<'a> ModuleLowerer<'a> {
    pub(super) fn lower_witness_tables(&mut self) {
        let set = self.set;
        for conformance in &set.module(set.current()).conformances {
            let table = self.lower_witness_table(conformance);
            self.module.witness_tables.push(table);
        }
    }

    fn lower_witness_table(&mut self, conformance: &'a Conformance) -> IrWitnessTable {
        let set = self.set;
        let types = self.types;
        let conforming = set.declared_type(conformance.ty_decl);
        let name = types.conformance_name(&conforming, conformance.protocol);
        tracing::trace!(target: "lower", conformance = %name, "lowering witness table");
        let mut entries = Vec::new();
        let DeclKind::Protocol(proto) = &set.decl(conformance.protocol).kind else {
            return IrWitnessTable {
                conformance: name,
                entries,
            };
        };

        for base in &proto.inherited {
            entries.push(WitnessEntry::BaseProtocol {
                protocol: set.decl(*base).name.clone(),
                conformance: types.conformance_name(&conforming, *base),
            });
        }
        for requirement in &proto.members {
            let d = set.decl(*requirement);
            let slots = match &d.kind {
                DeclKind::Func(_) | DeclKind::Constructor { .. } => vec![Slot::Decl],
                DeclKind::Var(info) if info.is_settable() => {
                    vec![Slot::Accessor(AccessorKind::Get), Slot::Accessor(AccessorKind::Set)]
                }
                DeclKind::Subscript { settable: true, .. } => {
                    vec![Slot::Accessor(AccessorKind::Get), Slot::Accessor(AccessorKind::Set)]
                }
                DeclKind::Var(_) | DeclKind::Subscript { .. } => vec![Slot::Accessor(AccessorKind::Get)],
                DeclKind::AssociatedType { .. } => {
                    if let Some(ty) = conformance.assoc_type(*requirement) {
                        entries.push(WitnessEntry::AssociatedType {
                            name: d.name.clone(),
                            ty: types.type_name(ty),
                        });
                    }
                    continue;
                }
                _ => continue,
            };
            let Some(witness) = conformance.witness(*requirement) else {
                continue;
            };
            let thunk_base = witness_thunk_symbol(set, conformance.ty_decl, conformance.protocol, *requirement);
            for slot in slots {
                let (requirement_name, thunk) = match slot {
                    Slot::Decl => (decl_symbol(set, *requirement), thunk_base.clone()),
                    Slot::Accessor(kind) => (
                        accessor_symbol(set, *requirement, kind.suffix()),
                        format!("{thunk_base}!{}", kind.suffix()),
                    ),
                };
                self.lower_thunk(thunk.clone(), conformance, &conforming, *requirement, witness.decl(), slot);
                entries.push(WitnessEntry::Method {
                    requirement: requirement_name,
                    thunk,
                });
            }
        }
        for assoc in &conformance.assoc_conformances {
            let path = assoc
                .path
                .iter()
                .map(|decl| set.decl(*decl).name.as_str())
                .collect::<Vec<_>>()
                .join(".");
            let target = match assoc.conformance {
                Some(ConformanceRef::Indirect(id)) => {
                    let c = set.conformance_by_id(id);
                    types.conformance_name(&set.declared_type(c.ty_decl), c.protocol)
                }
                Some(ConformanceRef::Abstract) => "dependent".to_string(),
                None => "unresolved".to_string(),
            };
            entries.push(WitnessEntry::AssociatedConformance {
                path,
                protocol: set.decl(assoc.protocol).name.clone(),
                conformance: target,
            });
        }
        IrWitnessTable {
            conformance: name,
            entries,
        }
    }

    fn lower_thunk(
        &mut self,
        name: String,
        conformance: &Conformance,
        conforming: &Type,
        requirement: DeclId,
        witness: DeclId,
        slot: Slot,
    ) {
        let set = self.set;
        let types = self.types;
        let abs = match slot {
            Slot::Decl => types.decl_abstraction(requirement),
            Slot::Accessor(kind) => types.accessor_abstraction(requirement, kind),
        };
        let mut subst = Substitution::new();
        if let DeclKind::Protocol(proto) = &set.decl(conformance.protocol).kind {
            subst.insert(proto.self_param, conforming.clone());
        }
        let witness_subst = witness_substitution(self, requirement, witness, conforming);
        let span = set.decl(witness).span;
        let (mut func, entry) = FuncLowerer::new(self, name.clone(), FunctionKind::Thunk, None, &abs, Some(&subst), &[]);
        let result = func.forward_to_witness(&abs, &subst, entry.formals, entry.self_value, conforming, witness, witness_subst, slot, span);
        match result {
            Ok(()) => func.finish(),
            Err(err) => {
                drop(func);
                tracing::debug!(target: "lower", thunk = %name, error = %err, "witness thunk left out");
                self.errors.push(err);
            }
        }
    }
}

/// Maps the witness's own generic parameters to the requirement's, by
/// position, and `Self` of a default implementation to the conforming type.
fn witness_substitution(cx: &ModuleLowerer<'_>, requirement: DeclId, witness: DeclId, conforming: &Type) -> Substitution {
    let set = cx.set;
    let mut subst = Substitution::new();
    for (own, theirs) in set
        .decl(witness)
        .generics
        .params
        .iter()
        .zip(&set.decl(requirement).generics.params)
    {
        subst.insert(*own, Type::GenericParam(*theirs));
    }
    let owner = cx.types.member_context(witness).map(|ctx| set.decl(ctx));
    let extended = owner.and_then(|owner| match &owner.kind {
        DeclKind::Protocol(_) => Some(owner.id),
        DeclKind::Extension(ext) => ext.extended.filter(|decl| set.decl(*decl).is_protocol()),
        _ => None,
    });
    if let Some(proto) = extended {
        if let DeclKind::Protocol(info) = &set.decl(proto).kind {
            subst.insert(info.self_param, conforming.clone());
        }
    }
    subst
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    #[allow(clippy::too_many_arguments)]
    fn forward_to_witness(
        &mut self,
        abs: &Abstraction,
        subst: &Substitution,
        formals: Vec<ValueId>,
        self_value: Option<ValueId>,
        conforming: &Type,
        witness: DeclId,
        witness_subst: Substitution,
        slot: Slot,
        span: Span,
    ) -> LowerResult<()> {
        let types = self.cx.types;
        let mut values = Vec::new();
        for (value, param) in formals.into_iter().zip(&abs.params) {
            let ty = types.apply(&param.ty, Some(subst));
            let m = match param.convention {
                Convention::Owned => self.manage(value),
                Convention::In => self.manage_temp(value, &ty),
                Convention::InGuaranteed | Convention::Inout | Convention::InoutAliasable => Managed::addr(value),
                Convention::Guaranteed | Convention::Trivial | Convention::Out => Managed::value(value),
            };
            values.push((m, ty));
        }
        let access = match (self_value, &abs.self_param) {
            (Some(_), Some(param)) if matches!(param.ty, Type::Metatype(_)) => {
                SelfAccess::Metatype(self.metadata_for(conforming))
            }
            (Some(value), Some(param)) if param.convention.is_indirect() => SelfAccess::Addr(value),
            (Some(value), Some(_)) => SelfAccess::Value(Managed::value(value)),
            _ => SelfAccess::None,
        };
        let result_ty = self.result_ty.clone();
        let set = self.cx.set;
        let d = set.decl(witness);
        let decl_ref = DeclRef {
            decl: witness,
            subst: witness_subst.clone(),
            base: Some(conforming.clone()),
            origin: LookupOrigin::CurrNominal,
            implicit_self: false,
            via_super: false,
        };

        let result = match (slot, &d.kind) {
            (Slot::Accessor(AccessorKind::Get), DeclKind::Var(info)) => {
                if matches!(info.storage, Storage::Stored | Storage::Observed) {
                    let base = self.witness_base(access, span)?;
                    let value_ty = types.apply(&info.ty, Some(&witness_subst));
                    let field = match base {
                        Some(base) => self.project_field(base, conforming, &d.name, &value_ty),
                        None => {
                            let ir = self.ir(&value_ty).address_of();
                            Managed::addr(self.b.emit_value(
                                InstKind::GlobalAddr {
                                    name: decl_symbol(self.cx.set, witness),
                                },
                                ir,
                                Ownership::Trivial,
                            ))
                        }
                    };
                    let copy = self.owned_managed(field, &value_ty);
                    Some(copy)
                } else {
                    Some(self.call_accessor(witness, AccessorKind::Get, &decl_ref, Some(conforming), access, None, &[], span)?)
                }
            }
            (Slot::Accessor(AccessorKind::Set), DeclKind::Var(info)) if info.storage == Storage::Stored => {
                let Some((value, value_ty)) = values.first().cloned() else {
                    return Err(self.unsupported("a setter without a value", span));
                };
                let base = self.witness_base(access, span)?;
                let addr = match base {
                    Some(base) => match self.project_field(base, conforming, &d.name, &value_ty) {
                        Managed::Addr { addr, .. } => addr,
                        Managed::Value { .. } => return Err(self.unsupported("a setter on an immutable base", span)),
                    },
                    None => {
                        let ir = self.ir(&value_ty).address_of();
                        self.b.emit_value(
                            InstKind::GlobalAddr {
                                name: decl_symbol(self.cx.set, witness),
                            },
                            ir,
                            Ownership::Trivial,
                        )
                    }
                };
                self.store_into(value, &value_ty, addr, false);
                None
            }
            (Slot::Accessor(kind), _) => {
                let (value, indices) = match kind {
                    AccessorKind::Get => (None, values.as_slice()),
                    _ => match values.split_first() {
                        Some((value, indices)) => (Some(value.clone()), indices),
                        None => return Err(self.unsupported("a setter without a value", span)),
                    },
                };
                let m = self.call_accessor(witness, kind, &decl_ref, Some(conforming), access, value, indices, span)?;
                (kind == AccessorKind::Get).then_some(m)
            }
            (Slot::Decl, _) => {
                let mark = self.env.mark();
                let result = self.call_witness(witness, &witness_subst, conforming, access, &values, span);
                self.env.reset(mark);
                Some(result?)
            }
        };
        self.return_managed(result, &result_ty)
    }

    /// Instance the witness is reached through, or `None` for static storage.
    fn witness_base(&mut self, access: SelfAccess, span: Span) -> LowerResult<Option<Managed>> {
        match access {
            SelfAccess::Value(m) => Ok(Some(m)),
            SelfAccess::Addr(addr) => Ok(Some(Managed::addr(addr))),
            SelfAccess::Metatype(_) => Ok(None),
            SelfAccess::None => Err(self.unsupported("a witness without a base", span)),
        }
    }

    fn call_witness(
        &mut self,
        witness: DeclId,
        subst: &Substitution,
        conforming: &Type,
        access: SelfAccess,
        values: &[(Managed, Type)],
        span: Span,
    ) -> LowerResult<Managed> {
        let (callee, abs, subst) = self.callee_value(witness, EntryPoint::Decl, subst, Some(conforming), &[], span)?;
        let leading = self.generic_args(&abs, &subst, span)?;
        let formals = self.pass_params(values, &abs.params);
        let self_arg = match &abs.self_param {
            Some(param) => Some(self.self_operand(access, param.convention, conforming, span)?),
            None => None,
        };
        self.emit_apply(
            PreparedCall {
                callee,
                abs,
                subst: Some(subst),
                leading,
                formals,
                captures: Vec::new(),
                self_arg,
            },
            span,
        )
    }
}
