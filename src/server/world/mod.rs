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

//! The server's view of the world: entity storage, the area grid and collision queries.

mod entity;
pub mod phys;

pub use self::{
    entity::{abs_overlap, Entity, EntityFlags, EntitySolid},
    phys::{bounds_for_move, Collide, CollideKind, MoveKind},
};

use crate::common::{
    bsp::{BspCollisionHull, BspData, BspError, BspLeafContents, BspModel},
    model::Model,
    pmove::{PhysEnt, PhysEntKind, PhysEntList, PlayerTracer, PLAYER_MAXS, PLAYER_MINS},
    trace::Trace,
    EntityId,
};

use std::rc::Rc;

use arrayvec::ArrayVec;
use cgmath::Vector3;
use thiserror::Error;

const AREA_DEPTH: usize = 4;
const AREA_NODES: usize = 32;
const MAX_ENTITIES: usize = 600;

// half-extent of the region searched for obstacles near a moving player
const PMOVE_EXTENT: f32 = 256.0;

#[derive(Error, Debug)]
pub enum WorldError {
    #[error("No entity with ID {0:?}")]
    NoSuchEntity(EntityId),
    #[error("No vacant entity slots")]
    NoVacantSlots,
    #[error("The world entity cannot be removed")]
    RemoveWorld,
    #[error("No world model was provided")]
    NoWorldModel,
    #[error("No model with index {0}")]
    NoSuchModel(usize),
    #[error("Model {0} is not a brush model")]
    NonBrushModel(usize),
    #[error("Brush entity {id:?} must have MoveKind::Push (has {kind:?})")]
    BspWithoutPush { id: EntityId, kind: MoveKind },
    #[error("Entity {id:?} has min bound {min:?} exceeding max bound {max:?}")]
    BadBounds {
        id: EntityId,
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
    #[error("Area grid exceeds its node budget")]
    AreaNodeOverflow,
    #[error("BSP error: {0}")]
    Bsp(#[from] BspError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AreaBranchAxis {
    X = 0,
    Y = 1,
}

#[derive(Copy, Clone, Debug)]
struct AreaBranch {
    axis: AreaBranchAxis,
    dist: f32,
    front: usize,
    back: usize,
}

#[derive(Copy, Clone, Debug)]
enum AreaNodeKind {
    Branch(AreaBranch),
    Leaf,
}

#[derive(Debug)]
struct AreaNode {
    kind: AreaNodeKind,
    triggers: Vec<EntityId>,
    solids: Vec<EntityId>,
}

// The area grid is a 2-D binary partition of the world's bounds. Each branch splits the wider of
// its X and Y extents at the midpoint, and its front child covers the upper half. With square
// bounds the first two levels look like this, numbered depth-first:
//
//   y
//   ^  +-------+-------+
//   |  |   9   |   2   |    node 1 splits the upper half on X
//   |  +-------+-------+    node 0 splits on Y
//   |  |  24   |  17   |    node 16 splits the lower half on X
//   |  +-------+-------+
//   +---------------------> x
//
// An entity is stored at the deepest node whose region fully contains its absolute bounds.
impl AreaNode {
    fn new() -> AreaNode {
        AreaNode {
            kind: AreaNodeKind::Leaf,
            triggers: Vec::new(),
            solids: Vec::new(),
        }
    }

    /// Generate the area grid covering `[mins, maxs]`.
    fn generate(
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
    ) -> Result<ArrayVec<AreaNode, AREA_NODES>, WorldError> {
        let mut nodes = ArrayVec::new();
        AreaNode::create(&mut nodes, 0, mins, maxs)?;
        debug!("Generated area grid with {} nodes", nodes.len());
        Ok(nodes)
    }

    fn create(
        nodes: &mut ArrayVec<AreaNode, AREA_NODES>,
        depth: usize,
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
    ) -> Result<usize, WorldError> {
        let index = nodes.len();
        nodes
            .try_push(AreaNode::new())
            .map_err(|_| WorldError::AreaNodeOverflow)?;

        if depth == AREA_DEPTH {
            return Ok(index);
        }

        let size = maxs - mins;
        let axis = if size.x > size.y {
            AreaBranchAxis::X
        } else {
            AreaBranchAxis::Y
        };

        let dist = 0.5 * (maxs[axis as usize] + mins[axis as usize]);

        let mut front_mins = mins;
        front_mins[axis as usize] = dist;

        let mut back_maxs = maxs;
        back_maxs[axis as usize] = dist;

        let front = AreaNode::create(nodes, depth + 1, front_mins, maxs)?;
        let back = AreaNode::create(nodes, depth + 1, mins, back_maxs)?;

        nodes[index].kind = AreaNodeKind::Branch(AreaBranch {
            axis,
            dist,
            front,
            back,
        });

        Ok(index)
    }
}

#[derive(Debug)]
struct AreaEntity {
    entity: Entity,
    area_id: Option<usize>,
}

#[derive(Debug)]
enum AreaEntitySlot {
    Vacant,
    Occupied(AreaEntity),
}

// The closest obstruction found so far by a move.
#[derive(Debug)]
struct Clip {
    trace: Trace,
    entity: Option<EntityId>,
}

impl Clip {
    fn new(trace: Trace, entity: EntityId) -> Clip {
        let entity = if trace.impact_ratio() < 1.0 || trace.start_solid() {
            Some(entity)
        } else {
            None
        };

        Clip { trace, entity }
    }

    // A trace that never leaves solid always wins. Otherwise the nearest impact wins, and a start
    // inside any obstacle marks the result as stuck without replacing the impact.
    fn merge(&mut self, trace: Trace, e_id: EntityId) {
        if trace.all_solid() {
            self.trace = trace;
            self.entity = Some(e_id);
            return;
        }

        let start_solid = trace.start_solid();
        if trace.impact_ratio() < self.trace.impact_ratio() {
            let was_start_solid = self.trace.start_solid();
            self.trace = trace;
            self.trace.or_start_solid(was_start_solid);
            self.entity = Some(e_id);
        } else if start_solid {
            self.trace.or_start_solid(true);
            if self.entity.is_none() {
                self.entity = Some(e_id);
            }
        }
    }
}

/// A representation of the current state of the game world.
#[derive(Debug)]
pub struct World {
    area_nodes: ArrayVec<AreaNode, AREA_NODES>,
    slots: Box<[AreaEntitySlot]>,
    models: Vec<Model>,
}

impl World {
    /// Creates a world from the map's brush models. The first model is the world itself.
    ///
    /// Model index 0 is reserved for the null model, so the world model has index 1 and entity 0
    /// is the world entity.
    pub fn create(mut brush_models: Vec<Model>) -> Result<World, WorldError> {
        let (min, max) = match brush_models.first().and_then(|m| m.brush()) {
            Some(bmodel) => (bmodel.min(), bmodel.max()),
            None => return Err(WorldError::NoWorldModel),
        };

        let area_nodes = AreaNode::generate(min, max)?;

        let mut models = Vec::with_capacity(brush_models.len() + 1);
        models.push(Model::none());
        models.append(&mut brush_models);

        let mut world_entity = Entity::new();
        world_entity.model_index = 1;
        world_entity.solid = EntitySolid::Bsp;
        world_entity.move_kind = MoveKind::Push;
        world_entity.set_min_max_size(min, max);

        let mut slots = Vec::with_capacity(MAX_ENTITIES);
        slots.push(AreaEntitySlot::Occupied(AreaEntity {
            entity: world_entity,
            area_id: None,
        }));
        for _ in 0..MAX_ENTITIES - 1 {
            slots.push(AreaEntitySlot::Vacant);
        }

        Ok(World {
            area_nodes,
            slots: slots.into_boxed_slice(),
            models,
        })
    }

    /// Adds a model and returns its index.
    pub fn add_model(&mut self, model: Model) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn model(&self, model_id: usize) -> Result<&Model, WorldError> {
        self.models
            .get(model_id)
            .ok_or(WorldError::NoSuchModel(model_id))
    }

    fn brush_model(&self, model_id: usize) -> Result<&BspModel, WorldError> {
        self.model(model_id)?
            .brush()
            .ok_or(WorldError::NonBrushModel(model_id))
    }

    /// Returns the world's own brush model.
    pub fn world_model(&self) -> Result<&BspModel, WorldError> {
        self.brush_model(1)
    }

    fn world_bsp(&self) -> Result<Rc<BspData>, WorldError> {
        Ok(self.world_model()?.bsp_data())
    }

    /// Places an entity in the first vacant slot. The entity is not linked.
    pub fn alloc_entity(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        for (i, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if let AreaEntitySlot::Vacant = *slot {
                *slot = AreaEntitySlot::Occupied(AreaEntity {
                    entity,
                    area_id: None,
                });

                return Ok(EntityId(i));
            }
        }

        Err(WorldError::NoVacantSlots)
    }

    /// Unlink an entity from the world and remove it.
    pub fn remove_entity(&mut self, e_id: EntityId) -> Result<(), WorldError> {
        if e_id.is_world() {
            return Err(WorldError::RemoveWorld);
        }

        self.area_entity(e_id)?;
        self.unlink_entity(e_id)?;
        self.slots[e_id.0] = AreaEntitySlot::Vacant;
        debug!("Removed entity {}", e_id.0);

        Ok(())
    }

    pub fn entity_exists(&self, e_id: EntityId) -> bool {
        matches!(self.slots.get(e_id.0), Some(AreaEntitySlot::Occupied(_)))
    }

    fn area_entity(&self, e_id: EntityId) -> Result<&AreaEntity, WorldError> {
        match self.slots.get(e_id.0) {
            Some(AreaEntitySlot::Occupied(ref e)) => Ok(e),
            _ => Err(WorldError::NoSuchEntity(e_id)),
        }
    }

    fn area_entity_mut(&mut self, e_id: EntityId) -> Result<&mut AreaEntity, WorldError> {
        match self.slots.get_mut(e_id.0) {
            Some(AreaEntitySlot::Occupied(ref mut e)) => Ok(e),
            _ => Err(WorldError::NoSuchEntity(e_id)),
        }
    }

    pub fn entity(&self, e_id: EntityId) -> Result<&Entity, WorldError> {
        Ok(&self.area_entity(e_id)?.entity)
    }

    /// Changes to the returned entity's position or bounds take effect at the next link.
    pub fn entity_mut(&mut self, e_id: EntityId) -> Result<&mut Entity, WorldError> {
        Ok(&mut self.area_entity_mut(e_id)?.entity)
    }

    /// Returns the ID of the area node this entity is linked into, if any.
    pub fn entity_area(&self, e_id: EntityId) -> Result<Option<usize>, WorldError> {
        Ok(self.area_entity(e_id)?.area_id)
    }

    /// Sets an entity's model and resizes the entity to the model's bounds.
    pub fn set_entity_model(&mut self, e_id: EntityId, model_id: usize) -> Result<(), WorldError> {
        let (min, max) = {
            let model = self.model(model_id)?;
            (model.min(), model.max())
        };

        let ent = self.entity_mut(e_id)?;
        ent.model_index = model_id;
        ent.set_min_max_size(min, max);

        Ok(())
    }

    pub fn unlink_entity(&mut self, e_id: EntityId) -> Result<(), WorldError> {
        let area_id = match self.slots.get_mut(e_id.0) {
            // if this entity has been removed or freed, do nothing
            Some(AreaEntitySlot::Vacant) => return Ok(()),
            Some(AreaEntitySlot::Occupied(ref mut e)) => match e.area_id.take() {
                Some(i) => i,
                // entity not linked
                None => return Ok(()),
            },
            None => return Err(WorldError::NoSuchEntity(e_id)),
        };

        let node = &mut self.area_nodes[area_id];
        if let Some(pos) = node.triggers.iter().position(|&t| t == e_id) {
            debug!("Unlinking entity {} from area {} triggers", e_id.0, area_id);
            node.triggers.remove(pos);
        } else if let Some(pos) = node.solids.iter().position(|&s| s == e_id) {
            debug!("Unlinking entity {} from area {} solids", e_id.0, area_id);
            node.solids.remove(pos);
        }

        Ok(())
    }

    /// Relinks an entity at its current position without notifying triggers.
    pub fn link_entity(&mut self, e_id: EntityId) -> Result<(), WorldError> {
        self.link(e_id)?;
        Ok(())
    }

    /// Relinks an entity at its current position, then calls `touch(world, trigger, e_id)` for
    /// every trigger with a touch behavior that the entity's bounds overlap.
    ///
    /// The callback may relink or remove any entity, including the two it is given.
    pub fn link_entity_touching<F>(&mut self, e_id: EntityId, mut touch: F) -> Result<(), WorldError>
    where
        F: FnMut(&mut World, EntityId, EntityId) -> Result<(), WorldError>,
    {
        if self.link(e_id)? {
            self.touch_links(e_id, 0, &mut touch)?;
        }

        Ok(())
    }

    // Returns true if the entity ended up in the area grid.
    fn link(&mut self, e_id: EntityId) -> Result<bool, WorldError> {
        // don't link the world entity
        if e_id.is_world() {
            return Ok(false);
        }

        // if this entity has been removed or freed, do nothing
        match self.slots.get(e_id.0) {
            Some(AreaEntitySlot::Occupied(_)) => (),
            Some(AreaEntitySlot::Vacant) => return Ok(false),
            None => return Err(WorldError::NoSuchEntity(e_id)),
        }

        self.unlink_entity(e_id)?;

        let (abs_min, abs_max, model_index, solid) = {
            let ent = self.entity_mut(e_id)?;
            if (0..3).any(|i| ent.min[i] > ent.max[i]) {
                return Err(WorldError::BadBounds {
                    id: e_id,
                    min: ent.min,
                    max: ent.max,
                });
            }

            debug!(
                "origin = {:?} mins = {:?} maxs = {:?}",
                ent.origin, ent.min, ent.max
            );
            ent.update_abs_bounds();
            (ent.abs_min(), ent.abs_max(), ent.model_index, ent.solid)
        };

        // record the map leaves this entity overlaps
        let leaves = if model_index != 0 {
            self.world_bsp()?.find_touched_leaves(abs_min, abs_max)?
        } else {
            Vec::new()
        };
        self.entity_mut(e_id)?.set_leaves(leaves);

        if solid == EntitySolid::Not {
            // this entity has no touch interaction, we're done
            return Ok(false);
        }

        let mut node_id = 0;
        while let AreaNodeKind::Branch(b) = self.area_nodes[node_id].kind {
            if abs_min[b.axis as usize] > b.dist {
                node_id = b.front;
            } else if abs_max[b.axis as usize] < b.dist {
                node_id = b.back;
            } else {
                // entity spans both sides of the plane
                break;
            }
        }

        if solid == EntitySolid::Trigger {
            debug!("Linking entity {} into area {} triggers", e_id.0, node_id);
            self.area_nodes[node_id].triggers.push(e_id);
        } else {
            debug!("Linking entity {} into area {} solids", e_id.0, node_id);
            self.area_nodes[node_id].solids.push(e_id);
        }
        self.area_entity_mut(e_id)?.area_id = Some(node_id);

        Ok(true)
    }

    fn abs_bounds(&self, e_id: EntityId) -> Option<(Vector3<f32>, Vector3<f32>)> {
        self.area_entity(e_id)
            .ok()
            .map(|e| (e.entity.abs_min(), e.entity.abs_max()))
    }

    fn touch_links<F>(&mut self, e_id: EntityId, area_id: usize, touch: &mut F) -> Result<(), WorldError>
    where
        F: FnMut(&mut World, EntityId, EntityId) -> Result<(), WorldError>,
    {
        // the callback may change this list, so walk a copy
        let triggers = self.area_nodes[area_id].triggers.clone();

        for trigger_id in triggers {
            if trigger_id == e_id {
                continue;
            }

            // skip triggers removed or moved by an earlier callback
            if !self.area_nodes[area_id].triggers.contains(&trigger_id) {
                continue;
            }

            let (ent_min, ent_max) = match self.abs_bounds(e_id) {
                Some(b) => b,
                None => return Ok(()),
            };

            let trigger = self.entity(trigger_id)?;
            if !trigger.has_touch || trigger.solid != EntitySolid::Trigger {
                continue;
            }

            if !abs_overlap(ent_min, ent_max, trigger.abs_min(), trigger.abs_max()) {
                continue;
            }

            debug!("Entity {} touched trigger {}", e_id.0, trigger_id.0);
            touch(self, trigger_id, e_id)?;
        }

        if let AreaNodeKind::Branch(b) = self.area_nodes[area_id].kind {
            let (ent_min, ent_max) = match self.abs_bounds(e_id) {
                Some(b) => b,
                None => return Ok(()),
            };

            if ent_max[b.axis as usize] > b.dist {
                self.touch_links(e_id, b.front, touch)?;
            }

            if ent_min[b.axis as usize] < b.dist {
                self.touch_links(e_id, b.back, touch)?;
            }
        }

        Ok(())
    }

    /// Lists the solid entities linked into any area node the box `[min, max]` reaches.
    ///
    /// Entities are listed in area-grid order and are not tested against the box themselves.
    pub fn collect_candidates(&self, min: Vector3<f32>, max: Vector3<f32>) -> Vec<EntityId> {
        let mut candidates = Vec::new();
        self.collect_candidates_r(0, min, max, &mut candidates);
        candidates
    }

    fn collect_candidates_r(
        &self,
        area_id: usize,
        min: Vector3<f32>,
        max: Vector3<f32>,
        candidates: &mut Vec<EntityId>,
    ) {
        let area = &self.area_nodes[area_id];
        candidates.extend(area.solids.iter().copied());

        if let AreaNodeKind::Branch(ref b) = area.kind {
            if max[b.axis as usize] > b.dist {
                self.collect_candidates_r(b.front, min, max, candidates);
            }

            if min[b.axis as usize] < b.dist {
                self.collect_candidates_r(b.back, min, max, candidates);
            }
        }
    }

    /// Returns the hull to trace a box `[min, max]` through against this entity, along with the
    /// offset from world space into the hull's space.
    pub fn hull_for_entity(
        &self,
        e_id: EntityId,
        min: Vector3<f32>,
        max: Vector3<f32>,
    ) -> Result<(BspCollisionHull, Vector3<f32>), WorldError> {
        let ent = self.entity(e_id)?;

        match ent.solid {
            EntitySolid::Bsp => {
                if ent.move_kind != MoveKind::Push {
                    return Err(WorldError::BspWithoutPush {
                        id: e_id,
                        kind: ent.move_kind,
                    });
                }

                let bmodel = self.brush_model(ent.model_index)?;

                // pick the precomputed hull closest to the moving box
                let size = max - min;
                let hull_index = if size.x < 3.0 {
                    0
                } else if size.x <= 32.0 {
                    1
                } else {
                    2
                };

                let hull = bmodel.hull(hull_index)?;
                let offset = hull.min() - min + ent.origin;
                Ok((hull, offset))
            }

            _ => {
                let hull = BspCollisionHull::for_bounds(ent.min - max, ent.max - min)?;
                Ok((hull, ent.origin))
            }
        }
    }

    /// Traces the box `[min, max]` from `start` to `end` against a single entity.
    pub fn collide_move_with_entity(
        &self,
        e_id: EntityId,
        start: Vector3<f32>,
        min: Vector3<f32>,
        max: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<Trace, WorldError> {
        let (hull, offset) = self.hull_for_entity(e_id, min, max)?;
        Ok(hull.trace(start - offset, end - offset)?.adjust(offset))
    }

    /// Traces the box `[min, max]` from `start` to `end` against the world and every solid entity
    /// in the way, returning the nearest obstruction.
    ///
    /// The entity `e_id`, along with its owner and anything it owns, is ignored. The returned
    /// entity is `None` if nothing was hit.
    pub fn move_entity(
        &self,
        e_id: Option<EntityId>,
        start: Vector3<f32>,
        min: Vector3<f32>,
        max: Vector3<f32>,
        end: Vector3<f32>,
        kind: CollideKind,
    ) -> Result<(Trace, Option<EntityId>), WorldError> {
        let world_trace = self.collide_move_with_entity(EntityId::WORLD, start, min, max, end)?;
        debug!(
            "End position after collision test with world hull: {:?}",
            world_trace.end_point()
        );

        let mut clip = Clip::new(world_trace, EntityId::WORLD);
        let collide = Collide::new(e_id, start, min, max, end, kind);
        self.collide(&collide, &mut clip)?;

        Ok((clip.trace, clip.entity))
    }

    fn collide(&self, collide: &Collide, clip: &mut Clip) -> Result<(), WorldError> {
        for touch in self.collect_candidates(collide.move_min, collide.move_max) {
            if clip.trace.all_solid() {
                return Ok(());
            }

            // don't collide an entity with itself
            if collide.e_id == Some(touch) {
                continue;
            }

            let other = self.entity(touch)?;
            match other.solid {
                // if the other entity has no collision, skip it
                EntitySolid::Not => continue,

                // a trigger whose solid type changed after it was linked
                EntitySolid::Trigger => {
                    warn!("Trigger {} in area solids list", touch.0);
                    continue;
                }

                // don't collide with monsters if the collide specifies not to do so
                EntitySolid::BBox | EntitySolid::SlideBox
                    if collide.kind == CollideKind::NoMonsters =>
                {
                    continue
                }

                _ => (),
            }

            // if bounding boxes never intersect, skip this entity
            if !abs_overlap(
                collide.move_min,
                collide.move_max,
                other.abs_min(),
                other.abs_max(),
            ) {
                continue;
            }

            if let Some(e_id) = collide.e_id {
                let ent = self.entity(e_id)?;

                // points never interact
                if ent.size().x != 0.0 && other.size().x == 0.0 {
                    continue;
                }

                // don't collide against owner or owned entities
                if other.owner == Some(e_id) || ent.owner == Some(touch) {
                    continue;
                }
            }

            let trace = if other.flags.contains(EntityFlags::MONSTER) {
                self.collide_move_with_entity(
                    touch,
                    collide.start,
                    collide.monster_min,
                    collide.monster_max,
                    collide.end,
                )?
            } else {
                self.collide_move_with_entity(
                    touch,
                    collide.start,
                    collide.min,
                    collide.max,
                    collide.end,
                )?
            };

            clip.merge(trace, touch);
        }

        Ok(())
    }

    /// Returns the contents of the world at `point`. Currents count as water.
    pub fn point_contents(&self, point: Vector3<f32>) -> Result<BspLeafContents, WorldError> {
        let contents = self.world_model()?.hull(0)?.contents_at_point(point)?;
        Ok(contents.without_current())
    }

    /// Returns true if the entity is stuck in the world or another solid entity.
    pub fn test_entity_position(&self, e_id: EntityId) -> Result<bool, WorldError> {
        let (origin, min, max) = {
            let ent = self.entity(e_id)?;
            (ent.origin, ent.min, ent.max)
        };

        let (trace, _) =
            self.move_entity(Some(e_id), origin, min, max, origin, CollideKind::Normal)?;
        Ok(trace.start_solid())
    }

    /// Builds the list of obstacles a player may run into this tick: the world plus every solid
    /// entity within reach of the player's origin.
    pub fn add_links_to_pmove(&self, player: EntityId) -> Result<PhysEntList<'_>, WorldError> {
        let origin = self.entity(player)?.origin;
        let extent = Vector3::new(PMOVE_EXTENT, PMOVE_EXTENT, PMOVE_EXTENT);
        let (min, max) = (origin - extent, origin + extent);

        let mut physents = PhysEntList::new(self.world_model()?);

        for c_id in self.collect_candidates(min, max) {
            if c_id == player {
                continue;
            }

            let other = self.entity(c_id)?;
            if other.owner == Some(player) {
                continue;
            }

            let kind = match other.solid {
                EntitySolid::Bsp => PhysEntKind::Brush(self.brush_model(other.model_index)?),
                EntitySolid::BBox | EntitySolid::SlideBox => PhysEntKind::Box {
                    min: other.min,
                    max: other.max,
                },
                _ => continue,
            };

            if !abs_overlap(min, max, other.abs_min(), other.abs_max()) {
                continue;
            }

            if !physents.push(PhysEnt {
                origin: other.origin,
                info: c_id,
                kind,
            }) {
                break;
            }
        }

        Ok(physents)
    }
}

/// Moves a player against the live world, tracing through every solid entity rather than a
/// prebuilt obstacle list.
pub struct WorldPlayerTracer<'a> {
    world: &'a World,
    player: EntityId,
}

impl<'a> WorldPlayerTracer<'a> {
    pub fn new(world: &'a World, player: EntityId) -> WorldPlayerTracer<'a> {
        WorldPlayerTracer { world, player }
    }
}

impl<'a> PlayerTracer for WorldPlayerTracer<'a> {
    type Error = WorldError;

    fn player_move(
        &self,
        start: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<(Trace, Option<EntityId>), WorldError> {
        self.world.move_entity(
            Some(self.player),
            start,
            PLAYER_MINS,
            PLAYER_MAXS,
            end,
            CollideKind::Normal,
        )
    }

    fn point_contents(&self, point: Vector3<f32>) -> Result<BspLeafContents, WorldError> {
        Ok(self.world.world_model()?.hull(0)?.contents_at_point(point)?)
    }

    fn test_position(&self, point: Vector3<f32>) -> Result<bool, WorldError> {
        let (trace, _) = self.player_move(point, point)?;
        Ok(!trace.start_solid())
    }
}
