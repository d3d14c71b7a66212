//! Local variable slots of the method being emitted.
//!
//! Declared locals get one slot each for the whole body. Temporaries are
//! pooled: a freed temporary may be handed out again for a later value of
//! the same type, while a retired one stays reserved until the method ends
//! because a reference to it may still be alive.

use std::collections::HashMap;
use std::fmt;

use crate::model::{LocalId, LocalRef, TypeRef};

/// Index of a slot in the method's local signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalSlot(pub u16);

impl fmt::Display for LocalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Bound to a declared local.
    Declared,
    /// Temporary currently holding a live value.
    TempInUse,
    /// Temporary available for reuse.
    TempFree,
    /// Temporary that may be referenced until the end of the method.
    TempRetired,
}

#[derive(Debug, Clone)]
struct SlotInfo {
    ty: TypeRef,
    /// Holds a reference to a `ty` rather than a `ty`.
    by_ref: bool,
    state: SlotState,
}

#[derive(Debug, Default)]
pub struct LocalSlots {
    slots: Vec<SlotInfo>,
    declared: HashMap<LocalId, LocalSlot>,
}

impl LocalSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `local`, allocating it on first use.
    pub fn define_local(&mut self, local: &LocalRef) -> LocalSlot {
        if let Some(&slot) = self.declared.get(&local.id) {
            return slot;
        }
        let slot = self.push(local.ty.clone(), local.ref_kind.is_by_ref(), SlotState::Declared);
        self.declared.insert(local.id, slot);
        slot
    }

    pub fn slot_of(&self, id: LocalId) -> Option<LocalSlot> {
        self.declared.get(&id).copied()
    }

    /// A temporary of type `ty`, reusing a freed one when possible.
    pub fn allocate_temp(&mut self, ty: &TypeRef) -> LocalSlot {
        self.allocate(ty, false)
    }

    /// A temporary holding a reference to a `ty`.
    pub fn allocate_ref_temp(&mut self, ty: &TypeRef) -> LocalSlot {
        self.allocate(ty, true)
    }

    fn allocate(&mut self, ty: &TypeRef, by_ref: bool) -> LocalSlot {
        let reusable = self.slots.iter().position(|info| {
            info.state == SlotState::TempFree && info.by_ref == by_ref && &info.ty == ty
        });
        match reusable {
            Some(index) => {
                self.slots[index].state = SlotState::TempInUse;
                LocalSlot(index as u16)
            }
            None => self.push(ty.clone(), by_ref, SlotState::TempInUse),
        }
    }

    /// Return a temporary to the pool.
    pub fn free_temp(&mut self, slot: LocalSlot) {
        self.transition(slot, SlotState::TempFree);
    }

    /// Keep a temporary reserved for the rest of the method.
    pub fn retire_temp(&mut self, slot: LocalSlot) {
        self.transition(slot, SlotState::TempRetired);
    }

    pub fn state(&self, slot: LocalSlot) -> Option<SlotState> {
        self.slots.get(slot.0 as usize).map(|info| info.state)
    }

    pub fn slot_type(&self, slot: LocalSlot) -> Option<&TypeRef> {
        self.slots.get(slot.0 as usize).map(|info| &info.ty)
    }

    pub fn is_by_ref(&self, slot: LocalSlot) -> bool {
        self.slots.get(slot.0 as usize).is_some_and(|info| info.by_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn push(&mut self, ty: TypeRef, by_ref: bool, state: SlotState) -> LocalSlot {
        let slot = LocalSlot(self.slots.len() as u16);
        self.slots.push(SlotInfo { ty, by_ref, state });
        slot
    }

    fn transition(&mut self, slot: LocalSlot, state: SlotState) {
        // Only in-use temporaries move; declared locals are never pooled.
        if let Some(info) = self.slots.get_mut(slot.0 as usize) {
            if info.state == SlotState::TempInUse {
                info.state = state;
            }
        }
    }
}
