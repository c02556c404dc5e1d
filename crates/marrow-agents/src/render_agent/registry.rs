// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Owning table of the live variants.

use marrow_lanes::scene_lane::Variant;

/// An opaque reference to a variant owned by the orchestrator.
///
/// The index of a destroyed variant is recycled with a bumped generation, so a
/// handle kept past `destroy_variant` never reaches the variant that reuses its
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantHandle {
    index: u32,
    generation: u32,
}

impl VariantHandle {
    /// Slot index of the handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    variant: Option<Box<Variant>>,
}

/// Slots of variants with a free list of recycled indices.
#[derive(Debug, Default)]
pub(crate) struct VariantRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl VariantRegistry {
    pub fn insert(&mut self, variant: Variant) -> VariantHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.variant = Some(Box::new(variant));
            VariantHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                variant: Some(Box::new(variant)),
            });
            VariantHandle {
                index,
                generation: 0,
            }
        }
    }

    pub fn remove(&mut self, handle: VariantHandle) -> Option<Box<Variant>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let variant = slot.variant.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(variant)
    }

    pub fn get(&self, handle: VariantHandle) -> Option<&Variant> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.variant.as_deref())
    }

    pub fn get_mut(&mut self, handle: VariantHandle) -> Option<&mut Variant> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.variant.as_deref_mut())
    }

    /// Every slot, in index order, for the scheduler to move variants in and out.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut Option<Box<Variant>>> {
        self.slots.iter_mut().map(|slot| &mut slot.variant)
    }

    /// Live variants in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.slots.iter().filter_map(|slot| slot.variant.as_deref())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    /// Frees every occupied slot whose variant was taken and never put back,
    /// invalidating its handles. Returns the number of slots freed.
    pub fn reclaim_vacant(&mut self) -> usize {
        let mut listed = vec![false; self.slots.len()];
        for &index in &self.free {
            listed[index as usize] = true;
        }
        let mut reclaimed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.variant.is_none() && !listed[index] {
                slot.generation += 1;
                self.free.push(index as u32);
                reclaimed += 1;
            }
        }
        self.live -= reclaimed;
        reclaimed
    }

    pub fn drain(&mut self) -> Vec<Box<Variant>> {
        self.live = 0;
        self.free.clear();
        self.slots
            .drain(..)
            .filter_map(|slot| slot.variant)
            .collect()
    }
}
