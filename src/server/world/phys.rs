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

use crate::common::EntityId;

use cgmath::{Vector3, Zero};

#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum MoveKind {
    None = 0,
    AngleNoClip = 1,
    AngleClip = 2,
    Walk = 3,
    Step = 4,
    Fly = 5,
    Toss = 6,
    Push = 7,
    NoClip = 8,
    FlyMissile = 9,
    Bounce = 10,
}

#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum CollideKind {
    Normal = 0,
    NoMonsters = 1,
    Missile = 2,
}

/// Half-extent of the box used when a missile is tested against monsters.
pub const MISSILE_MONSTER_EXTENT: f32 = 15.0;

#[derive(Debug)]
pub struct Collide {
    // the ID of the entity being moved
    pub e_id: Option<EntityId>,

    // the minimum extent of the entire move
    pub move_min: Vector3<f32>,

    // the maximum extent of the entire move
    pub move_max: Vector3<f32>,

    // the minimum extent of the moving object
    pub min: Vector3<f32>,

    // the maximum extent of the moving object
    pub max: Vector3<f32>,

    // the minimum extent of the moving object when colliding with a monster
    pub monster_min: Vector3<f32>,

    // the maximum extent of the moving object when colliding with a monster
    pub monster_max: Vector3<f32>,

    // the start point of the move
    pub start: Vector3<f32>,

    // the end point of the move
    pub end: Vector3<f32>,

    // how this move collides with other entities
    pub kind: CollideKind,
}

impl Collide {
    /// Describes a move of the box `[min, max]` from `start` to `end`.
    ///
    /// Missiles get an enlarged box against monsters; the region swept by the whole move is
    /// computed from that box.
    pub fn new(
        e_id: Option<EntityId>,
        start: Vector3<f32>,
        min: Vector3<f32>,
        max: Vector3<f32>,
        end: Vector3<f32>,
        kind: CollideKind,
    ) -> Collide {
        let (monster_min, monster_max) = match kind {
            CollideKind::Missile => {
                let extent = Vector3::new(
                    MISSILE_MONSTER_EXTENT,
                    MISSILE_MONSTER_EXTENT,
                    MISSILE_MONSTER_EXTENT,
                );
                (-extent, extent)
            }
            _ => (min, max),
        };

        let (move_min, move_max) = bounds_for_move(start, monster_min, monster_max, end);

        Collide {
            e_id,
            move_min,
            move_max,
            min,
            max,
            monster_min,
            monster_max,
            start,
            end,
            kind,
        }
    }
}

/// Returns the box swept by `[min, max]` moving from `start` to `end`, padded by one unit.
pub fn bounds_for_move(
    start: Vector3<f32>,
    min: Vector3<f32>,
    max: Vector3<f32>,
    end: Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    let mut box_min = Vector3::zero();
    let mut box_max = Vector3::zero();

    for i in 0..3 {
        if end[i] > start[i] {
            box_min[i] = start[i] + min[i] - 1.0;
            box_max[i] = end[i] + max[i] + 1.0;
        } else {
            box_min[i] = end[i] + min[i] - 1.0;
            box_max[i] = start[i] + max[i] + 1.0;
        }
    }

    (box_min, box_max)
}
