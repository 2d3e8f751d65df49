// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::{common::EntityId, server::world::phys::MoveKind};

use cgmath::{Vector3, Zero};

bitflags! {
    pub struct EntityFlags: u16 {
        const FLY            = 0b0000000000001;
        const SWIM           = 0b0000000000010;
        const CONVEYOR       = 0b0000000000100;
        const CLIENT         = 0b0000000001000;
        const IN_WATER       = 0b0000000010000;
        const MONSTER        = 0b0000000100000;
        const GOD_MODE       = 0b0000001000000;
        const NO_TARGET      = 0b0000010000000;
        const ITEM           = 0b0000100000000;
        const ON_GROUND      = 0b0001000000000;
        const PARTIAL_GROUND = 0b0010000000000;
        const WATER_JUMP     = 0b0100000000000;
        const JUMP_RELEASED  = 0b1000000000000;
    }
}

#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum EntitySolid {
    Not = 0,
    Trigger = 1,
    BBox = 2,
    SlideBox = 3,
    Bsp = 4,
}

/// The collision-relevant state of an entity.
///
/// The absolute bounds and touched leaves are derived data, recomputed by the world whenever the
/// entity is linked.
#[derive(Clone, Debug)]
pub struct Entity {
    pub origin: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
    pub solid: EntitySolid,
    pub move_kind: MoveKind,
    pub flags: EntityFlags,
    pub owner: Option<EntityId>,

    /// Index into the world's model list; 0 is the null model.
    pub model_index: usize,

    /// Whether this entity reacts to being touched.
    pub has_touch: bool,

    abs_min: Vector3<f32>,
    abs_max: Vector3<f32>,
    leaves: Vec<usize>,
}

impl Entity {
    pub fn new() -> Entity {
        Entity {
            origin: Vector3::zero(),
            velocity: Vector3::zero(),
            min: Vector3::zero(),
            max: Vector3::zero(),
            solid: EntitySolid::Not,
            move_kind: MoveKind::None,
            flags: EntityFlags::empty(),
            owner: None,
            model_index: 0,
            has_touch: false,
            abs_min: Vector3::zero(),
            abs_max: Vector3::zero(),
            leaves: Vec::new(),
        }
    }

    pub fn set_min_max_size(&mut self, min: Vector3<f32>, max: Vector3<f32>) {
        debug!("Setting entity bounds: min = {:?} max = {:?}", min, max);
        self.min = min;
        self.max = max;
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Returns the minimum of the padded world-space bounding box computed at the last link.
    pub fn abs_min(&self) -> Vector3<f32> {
        self.abs_min
    }

    pub fn abs_max(&self) -> Vector3<f32> {
        self.abs_max
    }

    /// Returns the world leaves this entity overlapped when it was last linked.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Recomputes the padded absolute bounding box from the current origin and bounds.
    ///
    /// Items are padded generously on the horizontal axes so they are easier to pick up.
    pub(crate) fn update_abs_bounds(&mut self) {
        let mut abs_min = self.origin + self.min;
        let mut abs_max = self.origin + self.max;

        if self.flags.contains(EntityFlags::ITEM) {
            abs_min.x -= 15.0;
            abs_min.y -= 15.0;
            abs_max.x += 15.0;
            abs_max.y += 15.0;
        } else {
            abs_min -= Vector3::new(1.0, 1.0, 1.0);
            abs_max += Vector3::new(1.0, 1.0, 1.0);
        }

        self.abs_min = abs_min;
        self.abs_max = abs_max;
    }

    pub(crate) fn set_leaves(&mut self, leaves: Vec<usize>) {
        self.leaves = leaves;
    }
}

impl Default for Entity {
    fn default() -> Entity {
        Entity::new()
    }
}

/// Returns true if the boxes `[min_a, max_a]` and `[min_b, max_b]` overlap or touch.
pub fn abs_overlap(
    min_a: Vector3<f32>,
    max_a: Vector3<f32>,
    min_b: Vector3<f32>,
    max_b: Vector3<f32>,
) -> bool {
    (0..3).all(|i| min_a[i] <= max_b[i] && max_a[i] >= min_b[i])
}
