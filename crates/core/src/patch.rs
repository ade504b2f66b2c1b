//! Binding the two input images into a workflow.
//!
//! Roles are called *first* and *second* (for face swapping: the face
//! source and the target image). Without explicit slots the role of a
//! slot is decided by [`SlotRoles`], which defaults to discovery order:
//! the first slot found in document order receives the first asset and
//! the second slot receives the second asset. Graph semantics are not
//! consulted, so callers with ambiguous templates should name the slots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;
use crate::graph::GraphDocument;
use crate::slots::{AssetSlot, SlotLocator};
use crate::types::AssetReference;

/// Caller-named slots for both roles, bypassing discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitSlotPair {
    pub first: AssetSlot,
    pub second: AssetSlot,
}

/// Which discovered slot (by discovery index) receives which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRoles {
    pub first_index: usize,
    pub second_index: usize,
}

impl SlotRoles {
    /// First discovered slot -> first asset, second -> second asset.
    pub const DISCOVERY_ORDER: SlotRoles = SlotRoles {
        first_index: 0,
        second_index: 1,
    };

    /// Second discovered slot -> first asset, first -> second asset.
    pub const SWAPPED: SlotRoles = SlotRoles {
        first_index: 1,
        second_index: 0,
    };
}

impl Default for SlotRoles {
    fn default() -> Self {
        Self::DISCOVERY_ORDER
    }
}

/// Where each role ended up after a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundSlots {
    pub first: AssetSlot,
    pub second: AssetSlot,
}

/// Binds asset references into copies of a workflow template.
#[derive(Debug, Default)]
pub struct GraphPatcher {
    locator: SlotLocator,
    roles: SlotRoles,
}

impl GraphPatcher {
    pub fn new(locator: SlotLocator, roles: SlotRoles) -> Self {
        Self { locator, roles }
    }

    pub fn with_roles(roles: SlotRoles) -> Self {
        Self {
            locator: SlotLocator::default(),
            roles,
        }
    }

    /// Bind `first` and `second` into a deep copy of `template`.
    ///
    /// The template itself is never modified, whether or not the patch
    /// succeeds.
    pub fn patch(
        &self,
        template: &GraphDocument,
        first: &AssetReference,
        second: &AssetReference,
        explicit: Option<&ExplicitSlotPair>,
    ) -> Result<(GraphDocument, BoundSlots), PatchError> {
        let bound = self.resolve_slots(template, explicit)?;

        let mut patched = template.clone();
        write_slot(&mut patched, &bound.first, first)?;
        write_slot(&mut patched, &bound.second, second)?;

        tracing::debug!(
            first_slot = %bound.first,
            second_slot = %bound.second,
            first_asset = %first,
            second_asset = %second,
            "Bound asset references into workflow",
        );

        Ok((patched, bound))
    }

    /// Decide which two slots receive the first and second asset.
    pub fn resolve_slots(
        &self,
        doc: &GraphDocument,
        explicit: Option<&ExplicitSlotPair>,
    ) -> Result<BoundSlots, PatchError> {
        if let Some(pair) = explicit {
            ensure_slot_exists(doc, &pair.first)?;
            ensure_slot_exists(doc, &pair.second)?;
            if pair.first == pair.second {
                return Err(PatchError::InsufficientSlots { found: 1 });
            }
            return Ok(BoundSlots {
                first: pair.first.clone(),
                second: pair.second.clone(),
            });
        }

        let slots = self
            .locator
            .find_asset_slots(doc)
            .map_err(|none| PatchError::InsufficientSlots {
                found: none.found.len(),
            })?;

        let SlotRoles {
            first_index,
            second_index,
        } = self.roles;
        let (Some(first), Some(second)) = (slots.get(first_index), slots.get(second_index)) else {
            return Err(PatchError::InsufficientSlots { found: slots.len() });
        };
        if first_index == second_index {
            return Err(PatchError::InsufficientSlots { found: 1 });
        }

        if slots.len() > 2 {
            tracing::warn!(
                found = slots.len(),
                first_slot = %first,
                second_slot = %second,
                "Workflow has more than two asset slots; the others are left unchanged",
            );
        }

        Ok(BoundSlots {
            first: first.clone(),
            second: second.clone(),
        })
    }
}

/// [`GraphPatcher::patch`] with default discovery rules and role order.
pub fn patch(
    template: &GraphDocument,
    first: &AssetReference,
    second: &AssetReference,
    explicit: Option<&ExplicitSlotPair>,
) -> Result<GraphDocument, PatchError> {
    GraphPatcher::default()
        .patch(template, first, second, explicit)
        .map(|(doc, _)| doc)
}

fn ensure_slot_exists(doc: &GraphDocument, slot: &AssetSlot) -> Result<(), PatchError> {
    let present = doc
        .node(&slot.node_id)
        .is_some_and(|node| node.parameters.contains_key(&slot.parameter));
    if present {
        Ok(())
    } else {
        Err(slot_not_found(slot))
    }
}

fn write_slot(
    doc: &mut GraphDocument,
    slot: &AssetSlot,
    reference: &AssetReference,
) -> Result<(), PatchError> {
    let value = doc
        .node_mut(&slot.node_id)
        .and_then(|node| node.parameters.get_mut(&slot.parameter))
        .ok_or_else(|| slot_not_found(slot))?;
    *value = Value::String(reference.as_str().to_string());
    Ok(())
}

fn slot_not_found(slot: &AssetSlot) -> PatchError {
    PatchError::SlotNotFound {
        node_id: slot.node_id.clone(),
        parameter: slot.parameter.clone(),
    }
}
