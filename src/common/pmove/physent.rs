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

//! The set of obstacles a player is moved against.

use crate::common::{
    bsp::{BspCollisionHull, BspError, BspLeafContents, BspModel},
    pmove::{PlayerTracer, MAX_PHYSENTS, PLAYER_MAXS, PLAYER_MINS},
    trace::Trace,
    EntityId,
};

use arrayvec::ArrayVec;
use cgmath::Vector3;

#[derive(Clone, Debug)]
pub enum PhysEntKind<'a> {
    /// A brush model, clipped against with its player-sized hull.
    Brush(&'a BspModel),

    /// An axis-aligned box relative to the entity origin.
    Box {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
}

/// An obstacle near the player.
#[derive(Clone, Debug)]
pub struct PhysEnt<'a> {
    pub origin: Vector3<f32>,

    /// The entity this obstacle stands for.
    pub info: EntityId,

    pub kind: PhysEntKind<'a>,
}

impl<'a> PhysEnt<'a> {
    fn hull(&self) -> Result<BspCollisionHull, BspError> {
        match self.kind {
            PhysEntKind::Brush(bmodel) => bmodel.hull(1),
            PhysEntKind::Box { min, max } => {
                BspCollisionHull::for_bounds(min - PLAYER_MAXS, max - PLAYER_MINS)
            }
        }
    }
}

/// The world plus every nearby obstacle, in the order they are tested.
///
/// Entry 0 is always the world model.
#[derive(Clone, Debug)]
pub struct PhysEntList<'a> {
    ents: ArrayVec<PhysEnt<'a>, MAX_PHYSENTS>,
}

impl<'a> PhysEntList<'a> {
    pub fn new(world: &'a BspModel) -> PhysEntList<'a> {
        let mut ents = ArrayVec::new();
        ents.push(PhysEnt {
            origin: world.origin(),
            info: EntityId::WORLD,
            kind: PhysEntKind::Brush(world),
        });

        PhysEntList { ents }
    }

    /// Adds an obstacle. Returns false, leaving the list unchanged, if the list is full.
    pub fn push(&mut self, ent: PhysEnt<'a>) -> bool {
        match self.ents.try_push(ent) {
            Ok(()) => true,
            Err(e) => {
                debug!("physent list full, dropping {:?}", e.element().info);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhysEnt<'a>> {
        self.ents.iter()
    }

    fn world(&self) -> &PhysEnt<'a> {
        &self.ents[0]
    }
}

impl<'a> PlayerTracer for PhysEntList<'a> {
    type Error = BspError;

    fn player_move(
        &self,
        start: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<(Trace, Option<EntityId>), BspError> {
        let mut total = Trace::clear(start, end);
        let mut total_ent = None;

        for pe in self.ents.iter() {
            let hull = pe.hull()?;
            let trace = hull
                .trace(start - pe.origin, end - pe.origin)?
                .adjust(pe.origin);

            // ties go to the earlier obstacle
            if trace.ratio() < total.ratio() {
                total = trace;
                total_ent = Some(pe.info);
            }
        }

        Ok((total, total_ent))
    }

    fn point_contents(&self, point: Vector3<f32>) -> Result<BspLeafContents, BspError> {
        let world = self.world();
        match world.kind {
            PhysEntKind::Brush(bmodel) => bmodel.hull(0)?.contents_at_point(point - world.origin),
            PhysEntKind::Box { .. } => Ok(BspLeafContents::Empty),
        }
    }

    fn test_position(&self, point: Vector3<f32>) -> Result<bool, BspError> {
        for pe in self.ents.iter() {
            if pe.hull()?.contents_at_point(point - pe.origin)? == BspLeafContents::Solid {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::bsp::BoxMapBuilder;

    fn floor() -> BspModel {
        BoxMapBuilder::new()
            .add_box(
                Vector3::new(-512.0, -512.0, -64.0),
                Vector3::new(512.0, 512.0, 0.0),
                BspLeafContents::Solid,
            )
            .add_box(
                Vector3::new(200.0, -512.0, 0.0),
                Vector3::new(400.0, 512.0, 64.0),
                BspLeafContents::Water,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_world_only() {
        let world = floor();
        let list = PhysEntList::new(&world);
        assert_eq!(list.len(), 1);

        let (trace, ent) = list
            .player_move(Vector3::new(0.0, 0.0, 100.0), Vector3::new(0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(ent, Some(EntityId::WORLD));
        assert!((trace.end_point().z - 24.0).abs() < 0.1);

        let (trace, ent) = list
            .player_move(Vector3::new(0.0, 0.0, 100.0), Vector3::new(50.0, 0.0, 100.0))
            .unwrap();
        assert_eq!(ent, None);
        assert_eq!(trace.ratio(), 1.0);
        assert!(!trace.all_solid());
    }

    #[test]
    fn test_nearest_obstacle_wins() {
        let world = floor();
        let mut list = PhysEntList::new(&world);
        list.push(PhysEnt {
            origin: Vector3::new(100.0, 0.0, 24.0),
            info: EntityId(7),
            kind: PhysEntKind::Box {
                min: Vector3::new(-16.0, -16.0, -24.0),
                max: Vector3::new(16.0, 16.0, 32.0),
            },
        });
        list.push(PhysEnt {
            origin: Vector3::new(200.0, 0.0, 24.0),
            info: EntityId(8),
            kind: PhysEntKind::Box {
                min: Vector3::new(-16.0, -16.0, -24.0),
                max: Vector3::new(16.0, 16.0, 32.0),
            },
        });

        let (trace, ent) = list
            .player_move(Vector3::new(0.0, 0.0, 24.0), Vector3::new(300.0, 0.0, 24.0))
            .unwrap();
        assert_eq!(ent, Some(EntityId(7)));

        // the two boxes touch at x = 100 - 32
        assert!((trace.end_point().x - 68.0).abs() < 0.1);
        assert_eq!(trace.plane().unwrap().normal(), Vector3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_position_and_contents() {
        let world = floor();
        let mut list = PhysEntList::new(&world);
        assert!(list.test_position(Vector3::new(0.0, 0.0, 24.0)).unwrap());
        assert!(!list.test_position(Vector3::new(0.0, 0.0, 20.0)).unwrap());

        list.push(PhysEnt {
            origin: Vector3::new(0.0, 0.0, 100.0),
            info: EntityId(3),
            kind: PhysEntKind::Box {
                min: Vector3::new(-8.0, -8.0, -8.0),
                max: Vector3::new(8.0, 8.0, 8.0),
            },
        });
        assert!(!list.test_position(Vector3::new(0.0, 0.0, 100.0)).unwrap());

        assert_eq!(
            list.point_contents(Vector3::new(300.0, 0.0, 32.0)).unwrap(),
            BspLeafContents::Water
        );
        assert_eq!(
            list.point_contents(Vector3::new(0.0, 0.0, -32.0)).unwrap(),
            BspLeafContents::Solid
        );
        assert_eq!(
            list.point_contents(Vector3::new(0.0, 0.0, 32.0)).unwrap(),
            BspLeafContents::Empty
        );
    }

    #[test]
    fn test_list_caps_silently() {
        let world = floor();
        let mut list = PhysEntList::new(&world);
        for i in 1..MAX_PHYSENTS {
            assert!(list.push(PhysEnt {
                origin: Vector3::new(0.0, 0.0, 0.0),
                info: EntityId(i),
                kind: PhysEntKind::Box {
                    min: Vector3::new(0.0, 0.0, 0.0),
                    max: Vector3::new(1.0, 1.0, 1.0),
                },
            }));
        }

        assert!(!list.push(PhysEnt {
            origin: Vector3::new(0.0, 0.0, 0.0),
            info: EntityId(99),
            kind: PhysEntKind::Box {
                min: Vector3::new(0.0, 0.0, 0.0),
                max: Vector3::new(1.0, 1.0, 1.0),
            },
        }));
        assert_eq!(list.len(), MAX_PHYSENTS);
    }
}
