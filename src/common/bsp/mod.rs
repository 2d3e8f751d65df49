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

//! BSP collision data and the hull tracer.
//!
//! # Data Structure
//!
//! The binary space partitioning tree, or BSP, is the central data structure used by the Quake
//! engine for collision detection. At its core, the BSP tree is a binary search tree with each
//! node representing a subspace of the map. The tree is navigated using the planes stored in each
//! node; each child represents one side of the plane.
//!
//! A map carries three collision hulls. Hull 0 is the render tree itself, with each leaf replaced
//! by its contents, and is used for point-sized objects. Hulls 1 and 2 are precomputed clipping
//! trees with the solid geometry expanded by the standard player and large-monster bounding boxes,
//! so that tracing a single point through them is equivalent to sweeping the box through hull 0.
//!
//! ## Nodes
//!
//! Each node stores the ID of the plane which splits it and two children. A child is either
//! another node or a leaf content classification. The front child (index 0) lies on the positive
//! side of the plane, including the plane itself.

mod boxmap;

use std::rc::Rc;

use crate::common::{
    math::{BoxSide, Hyperplane},
    trace::Trace,
};

use arrayvec::ArrayVec;
use cgmath::{Vector3, Zero};
use thiserror::Error;

pub use self::boxmap::BoxMapBuilder;

// the on-disk format reserves a 4th hull, but it is never used.
pub const MAX_HULLS: usize = 3;

/// The maximum number of world leaves recorded for a single entity.
pub const MAX_ENT_LEAVES: usize = 16;

const DIST_EPSILON: f32 = 0.03125;

/// Clipping bounds of hull 1, sized for players.
pub const HULL1_MIN: Vector3<f32> = Vector3 {
    x: -16.0,
    y: -16.0,
    z: -24.0,
};
pub const HULL1_MAX: Vector3<f32> = Vector3 {
    x: 16.0,
    y: 16.0,
    z: 32.0,
};

/// Clipping bounds of hull 2, sized for large monsters.
pub const HULL2_MIN: Vector3<f32> = Vector3 {
    x: -32.0,
    y: -32.0,
    z: -24.0,
};
pub const HULL2_MAX: Vector3<f32> = Vector3 {
    x: 32.0,
    y: 32.0,
    z: 64.0,
};

#[derive(Error, Debug)]
pub enum BspError {
    #[error("Collision node {id} out of range [{first}, {last}]")]
    BadNode { id: usize, first: usize, last: usize },
    #[error("Plane {0} out of range")]
    BadPlane(usize),
    #[error("Leaf {0} out of range")]
    BadLeaf(usize),
    #[error("Invalid hull index ({0})")]
    BadHullIndex(usize),
    #[error("Min bound {min:?} exceeds max bound {max:?}")]
    BadBounds {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
    #[error("Bad content value: {0}")]
    BadContents(i32),
}

/// The contents of a leaf in the BSP tree, specifying how it should look and behave.
///
/// Contents are ordered: every variant from `Water` onward is some kind of liquid, and files store
/// the negated discriminant.
#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum BspLeafContents {
    /// The leaf has nothing in it. Vision is unobstructed and movement is unimpeded.
    Empty = 1,

    /// The leaf is solid. Physics objects will collide with its surface and may not move inside it.
    Solid = 2,

    /// The leaf is full of water. Movement is done by swimming instead of walking.
    Water = 3,

    /// The leaf is full of acidic slime. Movement is done by swimming and entities take periodic
    /// minor damage.
    Slime = 4,

    /// The leaf is full of lava. Movement is done by swimming and entities take periodic severe
    /// damage.
    Lava = 5,

    Sky = 6,

    // These two are removed during map compilation, but a hand-built hull may still carry them.
    Origin = 7,
    Clip = 8,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the positive
    /// x-direction (east).
    Current0 = 9,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the positive
    /// y-direction (north).
    Current90 = 10,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the negative
    /// x-direction (west).
    Current180 = 11,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the negative
    /// y-direction (south).
    Current270 = 12,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the positive
    /// z-direction (up).
    CurrentUp = 13,

    /// Same as `BspLeafContents::Water`, but the player is constantly pushed in the negative
    /// z-direction (down).
    CurrentDown = 14,
}

impl BspLeafContents {
    /// Decodes a negative content value as stored in map files.
    pub fn from_raw(raw: i32) -> Result<BspLeafContents, BspError> {
        num::FromPrimitive::from_i32(-raw).ok_or(BspError::BadContents(raw))
    }

    /// Returns true for water, slime, lava and the other liquid-or-denser contents.
    pub fn is_liquid(self) -> bool {
        self as i32 >= BspLeafContents::Water as i32
    }

    /// Collapses the water currents into plain water.
    pub fn without_current(self) -> BspLeafContents {
        match self {
            BspLeafContents::Current0
            | BspLeafContents::Current90
            | BspLeafContents::Current180
            | BspLeafContents::Current270
            | BspLeafContents::CurrentUp
            | BspLeafContents::CurrentDown => BspLeafContents::Water,
            c => c,
        }
    }
}

/// Returns the six planes bounding the box `[mins, maxs]`.
///
/// Planes come in max/min pairs for each axis in turn. The box interior is behind each max plane
/// and in front of each min plane.
pub fn box_planes(mins: Vector3<f32>, maxs: Vector3<f32>) -> [Hyperplane; 6] {
    [
        // front plane (positive x)
        Hyperplane::axis_x(maxs.x),
        // back plane (negative x)
        Hyperplane::axis_x(mins.x),
        // left plane (positive y)
        Hyperplane::axis_y(maxs.y),
        // right plane (negative y)
        Hyperplane::axis_y(mins.y),
        // top plane (positive z)
        Hyperplane::axis_z(maxs.z),
        // bottom plane (negative z)
        Hyperplane::axis_z(mins.z),
    ]
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BspCollisionNodeChild {
    Node(usize),
    Contents(BspLeafContents),
}

#[derive(Clone, Debug)]
pub struct BspCollisionNode {
    pub plane_id: usize,
    pub children: [BspCollisionNodeChild; 2],
}

#[derive(Clone, Debug)]
pub struct BspCollisionHull {
    planes: Rc<Box<[Hyperplane]>>,
    nodes: Rc<Box<[BspCollisionNode]>>,
    head: BspCollisionNodeChild,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
}

impl BspCollisionHull {
    /// Constructs a hull rooted at `head`.
    ///
    /// `mins` and `maxs` give the bounds of the box this hull was expanded by.
    pub fn new(
        planes: Rc<Box<[Hyperplane]>>,
        nodes: Rc<Box<[BspCollisionNode]>>,
        head: BspCollisionNodeChild,
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
    ) -> BspCollisionHull {
        BspCollisionHull {
            planes,
            nodes,
            head,
            mins,
            maxs,
        }
    }

    /// Constructs a collision hull with the given minimum and maximum bounds.
    ///
    /// This generates six planes which intersect to form a rectangular prism. The interior of the
    /// prism is `BspLeafContents::Solid`; the exterior is `BspLeafContents::Empty`. Node `i` is
    /// split by plane `i`, with one child empty and the other leading to node `i + 1`, so the
    /// solid leaf is only reached by passing all six planes.
    pub fn for_bounds(
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
    ) -> Result<BspCollisionHull, BspError> {
        debug!(
            "Generating collision hull for min = {:?} max = {:?}",
            mins, maxs
        );

        if mins.x > maxs.x || mins.y > maxs.y || mins.z > maxs.z {
            return Err(BspError::BadBounds {
                min: mins,
                max: maxs,
            });
        }

        let planes = box_planes(mins, maxs).to_vec();

        let nodes = (0..6)
            .map(|i| {
                let next = if i == 5 {
                    BspCollisionNodeChild::Contents(BspLeafContents::Solid)
                } else {
                    BspCollisionNodeChild::Node(i + 1)
                };

                let mut children = [next; 2];
                children[i & 1] = BspCollisionNodeChild::Contents(BspLeafContents::Empty);

                BspCollisionNode {
                    plane_id: i,
                    children,
                }
            })
            .collect::<Vec<_>>();

        Ok(BspCollisionHull {
            planes: Rc::new(planes.into_boxed_slice()),
            nodes: Rc::new(nodes.into_boxed_slice()),
            head: BspCollisionNodeChild::Node(0),
            mins: Vector3::zero(),
            maxs: Vector3::zero(),
        })
    }

    /// Returns the root of this hull.
    pub fn head(&self) -> BspCollisionNodeChild {
        self.head
    }

    /// Returns the minimum clipping bound of this hull.
    pub fn min(&self) -> Vector3<f32> {
        self.mins
    }

    /// Returns the maximum clipping bound of this hull.
    pub fn max(&self) -> Vector3<f32> {
        self.maxs
    }

    // nodes reachable from this hull lie between its head and the end of the shared node array
    fn node(&self, id: usize) -> Result<&BspCollisionNode, BspError> {
        let first = match self.head {
            BspCollisionNodeChild::Node(n) => n,
            BspCollisionNodeChild::Contents(_) => 0,
        };

        if id < first || id >= self.nodes.len() {
            return Err(BspError::BadNode {
                id,
                first,
                last: self.nodes.len().saturating_sub(1),
            });
        }

        Ok(&self.nodes[id])
    }

    fn plane(&self, id: usize) -> Result<&Hyperplane, BspError> {
        self.planes.get(id).ok_or(BspError::BadPlane(id))
    }

    /// Returns the leaf contents at the given point in this hull.
    pub fn contents_at_point(&self, point: Vector3<f32>) -> Result<BspLeafContents, BspError> {
        self.contents_at_point_node(self.head, point)
    }

    /// Returns the leaf contents at the given point, starting the descent from `node`.
    pub fn contents_at_point_node(
        &self,
        node: BspCollisionNodeChild,
        point: Vector3<f32>,
    ) -> Result<BspLeafContents, BspError> {
        let mut current = node;

        loop {
            match current {
                BspCollisionNodeChild::Contents(c) => return Ok(c),
                BspCollisionNodeChild::Node(n) => {
                    let node = self.node(n)?;
                    let plane = self.plane(node.plane_id)?;
                    current = node.children[plane.point_side(point) as usize];
                }
            }
        }
    }

    /// Traces a point from `start` to `end` through this hull.
    pub fn trace(&self, start: Vector3<f32>, end: Vector3<f32>) -> Result<Trace, BspError> {
        self.trace_node(self.head, start, end)
    }

    /// Traces a point from `start` to `end`, starting the descent from `node`.
    pub fn trace_node(
        &self,
        node: BspCollisionNodeChild,
        start: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<Trace, BspError> {
        let mut trace = Trace::new(start, end);
        self.recursive_trace(node, 0.0, 1.0, start, end, &mut trace)?;
        Ok(trace)
    }

    // Returns Ok(false) once the trace has stopped, either against a plane or inside a solid.
    fn recursive_trace(
        &self,
        node: BspCollisionNodeChild,
        start_ratio: f32,
        end_ratio: f32,
        start: Vector3<f32>,
        end: Vector3<f32>,
        trace: &mut Trace,
    ) -> Result<bool, BspError> {
        let node_id = match node {
            BspCollisionNodeChild::Contents(c) => {
                trace.visit_leaf(c);
                return Ok(true);
            }
            BspCollisionNodeChild::Node(n) => n,
        };

        let node = self.node(node_id)?;
        let plane = self.plane(node.plane_id)?;

        let start_dist = plane.point_dist(start);
        let end_dist = plane.point_dist(end);

        // start -> end falls entirely on one side of the plane
        if start_dist >= 0.0 && end_dist >= 0.0 {
            return self.recursive_trace(
                node.children[0],
                start_ratio,
                end_ratio,
                start,
                end,
                trace,
            );
        }

        if start_dist < 0.0 && end_dist < 0.0 {
            return self.recursive_trace(
                node.children[1],
                start_ratio,
                end_ratio,
                start,
                end,
                trace,
            );
        }

        // put the crosspoint DIST_EPSILON units on the near side
        let mut frac = if start_dist < 0.0 {
            (start_dist + DIST_EPSILON) / (start_dist - end_dist)
        } else {
            (start_dist - DIST_EPSILON) / (start_dist - end_dist)
        };
        frac = frac.max(0.0).min(1.0);

        let mut mid_ratio = start_ratio + (end_ratio - start_ratio) * frac;
        let mut mid = start + (end - start) * frac;
        let side = (start_dist < 0.0) as usize;

        // move up to the node
        if !self.recursive_trace(node.children[side], start_ratio, mid_ratio, start, mid, trace)? {
            return Ok(false);
        }

        let far = node.children[side ^ 1];
        if self.contents_at_point_node(far, mid)? != BspLeafContents::Solid {
            // go past the node
            return self.recursive_trace(far, mid_ratio, end_ratio, mid, end, trace);
        }

        // never got out of the solid area
        if trace.all_solid() {
            return Ok(false);
        }

        // the other side of the node is solid, this is the impact point
        let impact_plane = if side == 0 {
            plane.clone()
        } else {
            -plane.clone()
        };

        // floating-point drift near corners can leave the midpoint inside a solid
        while self.contents_at_point(mid)? == BspLeafContents::Solid {
            frac -= 0.1;
            if frac < 0.0 {
                debug!("backup past 0");
                trace.set_impact(mid, mid_ratio, impact_plane);
                return Ok(false);
            }

            mid_ratio = start_ratio + (end_ratio - start_ratio) * frac;
            mid = start + (end - start) * frac;
        }

        trace.set_impact(mid, mid_ratio, impact_plane);
        Ok(false)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BspRenderNodeChild {
    Node(usize),
    Leaf(usize),
}

#[derive(Clone, Debug)]
pub struct BspRenderNode {
    pub plane_id: usize,
    pub children: [BspRenderNodeChild; 2],
}

#[derive(Clone, Debug)]
pub struct BspLeaf {
    pub contents: BspLeafContents,
}

#[derive(Debug)]
pub struct BspData {
    pub(crate) planes: Rc<Box<[Hyperplane]>>,
    pub(crate) render_nodes: Box<[BspRenderNode]>,
    pub(crate) leaves: Box<[BspLeaf]>,
    pub(crate) hulls: [BspCollisionHull; MAX_HULLS],
}

impl BspData {
    /// Assembles map data from its planes, render tree, leaves and clipping nodes.
    ///
    /// Hull 0 is derived from the render tree. Hulls 1 and 2 share `clip_nodes` and are rooted at
    /// `clip_heads[0]` and `clip_heads[1]` respectively.
    pub fn new(
        planes: Vec<Hyperplane>,
        render_nodes: Vec<BspRenderNode>,
        leaves: Vec<BspLeaf>,
        clip_nodes: Vec<BspCollisionNode>,
        clip_heads: [BspCollisionNodeChild; 2],
    ) -> Result<BspData, BspError> {
        let planes_rc = Rc::new(planes.into_boxed_slice());

        let mut hull_0_nodes = Vec::with_capacity(render_nodes.len());
        for node in render_nodes.iter() {
            if node.plane_id >= planes_rc.len() {
                return Err(BspError::BadPlane(node.plane_id));
            }

            let mut children = [BspCollisionNodeChild::Contents(BspLeafContents::Solid); 2];
            for (i, child) in node.children.iter().enumerate() {
                children[i] = match *child {
                    BspRenderNodeChild::Node(n) => BspCollisionNodeChild::Node(n),
                    BspRenderNodeChild::Leaf(l) => match leaves.get(l) {
                        Some(leaf) => BspCollisionNodeChild::Contents(leaf.contents),
                        None => return Err(BspError::BadLeaf(l)),
                    },
                };
            }

            hull_0_nodes.push(BspCollisionNode {
                plane_id: node.plane_id,
                children,
            });
        }

        let hull_0 = BspCollisionHull::new(
            planes_rc.clone(),
            Rc::new(hull_0_nodes.into_boxed_slice()),
            BspCollisionNodeChild::Node(0),
            Vector3::zero(),
            Vector3::zero(),
        );

        let clip_nodes_rc = Rc::new(clip_nodes.into_boxed_slice());
        let hull_1 = BspCollisionHull::new(
            planes_rc.clone(),
            clip_nodes_rc.clone(),
            clip_heads[0],
            HULL1_MIN,
            HULL1_MAX,
        );
        let hull_2 = BspCollisionHull::new(
            planes_rc.clone(),
            clip_nodes_rc,
            clip_heads[1],
            HULL2_MIN,
            HULL2_MAX,
        );

        Ok(BspData {
            planes: planes_rc,
            render_nodes: render_nodes.into_boxed_slice(),
            leaves: leaves.into_boxed_slice(),
            hulls: [hull_0, hull_1, hull_2],
        })
    }

    pub fn planes(&self) -> &[Hyperplane] {
        &self.planes
    }

    pub fn render_nodes(&self) -> &[BspRenderNode] {
        &self.render_nodes
    }

    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    pub fn hulls(&self) -> &[BspCollisionHull] {
        &self.hulls
    }

    fn render_node(&self, id: usize) -> Result<&BspRenderNode, BspError> {
        self.render_nodes.get(id).ok_or(BspError::BadNode {
            id,
            first: 0,
            last: self.render_nodes.len().saturating_sub(1),
        })
    }

    /// Locates the leaf containing the given position vector and returns its index.
    pub fn find_leaf<V>(&self, pos: V) -> Result<usize, BspError>
    where
        V: Into<Vector3<f32>>,
    {
        let pos_vec = pos.into();

        let mut node = self.render_node(0)?;
        loop {
            let plane = self
                .planes
                .get(node.plane_id)
                .ok_or(BspError::BadPlane(node.plane_id))?;

            match node.children[plane.point_side(pos_vec) as usize] {
                BspRenderNodeChild::Node(node_id) => node = self.render_node(node_id)?,
                BspRenderNodeChild::Leaf(leaf_id) => return Ok(leaf_id),
            }
        }
    }

    /// Returns the indices of the non-solid leaves overlapping the box `[min, max]`.
    ///
    /// At most `MAX_ENT_LEAVES` leaves are recorded; the rest are ignored.
    pub fn find_touched_leaves(
        &self,
        min: Vector3<f32>,
        max: Vector3<f32>,
    ) -> Result<Vec<usize>, BspError> {
        let mut leaves = ArrayVec::<usize, MAX_ENT_LEAVES>::new();
        self.find_touched_leaves_r(BspRenderNodeChild::Node(0), min, max, &mut leaves)?;
        Ok(leaves.to_vec())
    }

    fn find_touched_leaves_r(
        &self,
        child: BspRenderNodeChild,
        min: Vector3<f32>,
        max: Vector3<f32>,
        leaves: &mut ArrayVec<usize, MAX_ENT_LEAVES>,
    ) -> Result<(), BspError> {
        let node = match child {
            BspRenderNodeChild::Leaf(l) => {
                let leaf = self.leaves.get(l).ok_or(BspError::BadLeaf(l))?;
                if leaf.contents != BspLeafContents::Solid && !leaves.contains(&l) {
                    // a full list just stops recording
                    let _ = leaves.try_push(l);
                }

                return Ok(());
            }
            BspRenderNodeChild::Node(n) => self.render_node(n)?,
        };

        let plane = self
            .planes
            .get(node.plane_id)
            .ok_or(BspError::BadPlane(node.plane_id))?;
        let sides = plane.box_side(min, max);

        if sides.contains(BoxSide::FRONT) {
            self.find_touched_leaves_r(node.children[0], min, max, leaves)?;
        }

        if sides.contains(BoxSide::BACK) {
            self.find_touched_leaves_r(node.children[1], min, max, leaves)?;
        }

        Ok(())
    }
}

/// A brush model: either the world itself or a submodel such as a door or platform.
#[derive(Debug)]
pub struct BspModel {
    pub bsp_data: Rc<BspData>,
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
    pub origin: Vector3<f32>,
    pub collision_node_ids: [BspCollisionNodeChild; MAX_HULLS],
}

impl BspModel {
    pub fn bsp_data(&self) -> Rc<BspData> {
        self.bsp_data.clone()
    }

    /// Returns the minimum extent of this BSP model.
    pub fn min(&self) -> Vector3<f32> {
        self.min
    }

    /// Returns the maximum extent of this BSP model.
    pub fn max(&self) -> Vector3<f32> {
        self.max
    }

    /// Returns the size of this BSP model.
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Returns the origin of this BSP model.
    pub fn origin(&self) -> Vector3<f32> {
        self.origin
    }

    /// Returns collision hull `index` rooted at this model's head node.
    pub fn hull(&self, index: usize) -> Result<BspCollisionHull, BspError> {
        if index >= MAX_HULLS {
            return Err(BspError::BadHullIndex(index));
        }

        let main_hull = &self.bsp_data.hulls[index];
        Ok(BspCollisionHull {
            planes: main_hull.planes.clone(),
            nodes: main_hull.nodes.clone(),
            head: self.collision_node_ids[index],
            mins: main_hull.mins,
            maxs: main_hull.maxs,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use cgmath::InnerSpace;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn test_hull_for_bounds() {
        let hull =
            BspCollisionHull::for_bounds(Vector3::zero(), Vector3::new(1.0, 1.0, 1.0)).unwrap();

        let empty_points = vec![
            // points strictly less than hull min should be empty
            Vector3::new(-1.0, -1.0, -1.0),
            // points strictly greater than hull max should be empty
            Vector3::new(2.0, 2.0, 2.0),
            // points in front of hull should be empty
            Vector3::new(2.0, 0.5, 0.5),
            // points behind hull should be empty
            Vector3::new(-1.0, 0.5, 0.5),
            // points left of hull should be empty
            Vector3::new(0.5, 2.0, 0.5),
            // points right of hull should be empty
            Vector3::new(0.5, -1.0, 0.5),
            // points above hull should be empty
            Vector3::new(0.5, 0.5, 2.0),
            // points below hull should be empty
            Vector3::new(0.5, 0.5, -1.0),
        ];

        for point in empty_points {
            assert_eq!(
                hull.contents_at_point(point).unwrap(),
                BspLeafContents::Empty
            );
        }

        let solid_points = vec![
            // center of the hull should be solid
            Vector3::new(0.5, 0.5, 0.5),
            // various interior corners should be solid
            Vector3::new(0.01, 0.01, 0.01),
            Vector3::new(0.99, 0.01, 0.01),
            Vector3::new(0.01, 0.99, 0.01),
            Vector3::new(0.01, 0.01, 0.99),
            Vector3::new(0.99, 0.99, 0.01),
            Vector3::new(0.99, 0.01, 0.99),
            Vector3::new(0.01, 0.99, 0.99),
            Vector3::new(0.99, 0.99, 0.99),
        ];

        for point in solid_points {
            assert_eq!(
                hull.contents_at_point(point).unwrap(),
                BspLeafContents::Solid
            );
        }
    }

    #[test]
    fn test_hull_for_bounds_rejects_inverted_box() {
        let result =
            BspCollisionHull::for_bounds(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 1.0));
        assert!(matches!(result, Err(BspError::BadBounds { .. })));

        // degenerate boxes are allowed
        assert!(BspCollisionHull::for_bounds(Vector3::zero(), Vector3::zero()).is_ok());
    }

    #[test]
    fn test_contents_from_raw() {
        assert_eq!(
            BspLeafContents::from_raw(-1).unwrap(),
            BspLeafContents::Empty
        );
        assert_eq!(
            BspLeafContents::from_raw(-14).unwrap(),
            BspLeafContents::CurrentDown
        );
        assert!(BspLeafContents::from_raw(3).is_err());
    }

    #[test]
    fn test_contents_is_liquid() {
        assert!(!BspLeafContents::Empty.is_liquid());
        assert!(!BspLeafContents::Solid.is_liquid());
        assert!(BspLeafContents::Water.is_liquid());
        assert!(BspLeafContents::Lava.is_liquid());
        assert!(BspLeafContents::Current90.is_liquid());
        assert_eq!(
            BspLeafContents::CurrentUp.without_current(),
            BspLeafContents::Water
        );
        assert_eq!(
            BspLeafContents::Slime.without_current(),
            BspLeafContents::Slime
        );
    }

    #[test]
    fn test_trace_unobstructed() {
        let hull = BspCollisionHull::for_bounds(
            Vector3::new(-10.0, -10.0, -10.0),
            Vector3::new(10.0, 10.0, 10.0),
        )
        .unwrap();

        let start = Vector3::new(-50.0, 20.0, 0.0);
        let end = Vector3::new(50.0, 20.0, 0.0);
        let trace = hull.trace(start, end).unwrap();
        assert_eq!(trace.ratio(), 1.0);
        assert!(trace.plane().is_none());
        assert!(!trace.all_solid());
        assert!(!trace.start_solid());
        assert!(trace.in_open());
        assert_eq!(trace.end_point(), end);
    }

    #[test]
    fn test_trace_hits_box_face() {
        let hull = BspCollisionHull::for_bounds(
            Vector3::new(-10.0, -10.0, -10.0),
            Vector3::new(10.0, 10.0, 10.0),
        )
        .unwrap();

        let trace = hull
            .trace(Vector3::new(-50.0, 0.0, 0.0), Vector3::new(50.0, 0.0, 0.0))
            .unwrap();

        // the crossing is biased DIST_EPSILON units toward the start
        let expected = (40.0 - DIST_EPSILON) / 100.0;
        assert!((trace.ratio() - expected).abs() < 1e-5);
        assert!((trace.end_point().x - (-10.0 - DIST_EPSILON)).abs() < 1e-3);
        assert_eq!(trace.plane().unwrap().normal(), -Vector3::unit_x());
        assert!(!trace.start_solid());
    }

    #[test]
    fn test_trace_start_solid() {
        let hull = BspCollisionHull::for_bounds(
            Vector3::new(-10.0, -10.0, -10.0),
            Vector3::new(10.0, 10.0, 10.0),
        )
        .unwrap();

        // leaves the box through the +x face
        let trace = hull
            .trace(Vector3::zero(), Vector3::new(50.0, 0.0, 0.0))
            .unwrap();
        assert!(trace.start_solid());
        assert!(!trace.all_solid());
        assert_eq!(trace.ratio(), 0.0);

        // never leaves the box
        let trace = hull
            .trace(Vector3::zero(), Vector3::new(5.0, 0.0, 0.0))
            .unwrap();
        assert!(trace.all_solid());
        assert!(trace.start_solid());
        assert_eq!(trace.ratio(), 0.0);
    }

    #[test]
    fn test_trace_from_contents_node() {
        let hull =
            BspCollisionHull::for_bounds(Vector3::zero(), Vector3::new(1.0, 1.0, 1.0)).unwrap();
        let trace = hull
            .trace_node(
                BspCollisionNodeChild::Contents(BspLeafContents::Water),
                Vector3::zero(),
                Vector3::unit_x(),
            )
            .unwrap();
        assert_eq!(trace.ratio(), 1.0);
        assert!(trace.in_water());
        assert!(!trace.in_open());
    }

    // node 1 splits on x = 10 with solid in front; the root decides everything else
    fn hull_with_root(
        root: Hyperplane,
        root_children: [BspCollisionNodeChild; 2],
    ) -> BspCollisionHull {
        let planes = Rc::new(vec![root, Hyperplane::axis_x(10.0)].into_boxed_slice());
        let nodes = Rc::new(
            vec![
                BspCollisionNode {
                    plane_id: 0,
                    children: root_children,
                },
                BspCollisionNode {
                    plane_id: 1,
                    children: [
                        BspCollisionNodeChild::Contents(BspLeafContents::Solid),
                        BspCollisionNodeChild::Contents(BspLeafContents::Empty),
                    ],
                },
            ]
            .into_boxed_slice(),
        );

        BspCollisionHull::new(
            planes,
            nodes,
            BspCollisionNodeChild::Node(0),
            Vector3::zero(),
            Vector3::zero(),
        )
    }

    #[test]
    fn test_trace_backs_off_solid_midpoint() {
        // everything at x >= 9 is solid from the root, so the crossing at x = 10 lands inside it
        let hull = hull_with_root(
            Hyperplane::axis_x(9.0),
            [
                BspCollisionNodeChild::Contents(BspLeafContents::Solid),
                BspCollisionNodeChild::Node(1),
            ],
        );

        let trace = hull
            .trace_node(
                BspCollisionNodeChild::Node(1),
                Vector3::zero(),
                Vector3::new(20.0, 0.0, 0.0),
            )
            .unwrap();

        // one step of 0.1 back from (10 - 1/32) / 20
        assert!((trace.ratio() - 0.3984375).abs() < 1e-4, "{}", trace.ratio());
        assert!((trace.end_point().x - 7.96875).abs() < 1e-3, "{:?}", trace.end_point());
        assert_eq!(
            trace.plane().unwrap().normal(),
            Vector3::new(-1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_trace_backs_off_past_start() {
        // everything below z = 0 is solid from the root, so no retreat ever leaves it
        let hull = hull_with_root(
            Hyperplane::axis_z(0.0),
            [
                BspCollisionNodeChild::Node(1),
                BspCollisionNodeChild::Contents(BspLeafContents::Solid),
            ],
        );

        let trace = hull
            .trace_node(
                BspCollisionNodeChild::Node(1),
                Vector3::new(0.0, 0.0, -5.0),
                Vector3::new(20.0, 0.0, -5.0),
            )
            .unwrap();

        // every retreat stays solid, so the last point before passing 0 is kept
        assert!(!trace.start_solid());
        assert!((trace.ratio() - 0.0984375).abs() < 1e-4, "{}", trace.ratio());
        let end = trace.end_point();
        assert!((end.x - 1.96875).abs() < 1e-3, "{:?}", end);
        assert_eq!(end.z, -5.0);
        assert_eq!(
            trace.plane().unwrap().normal(),
            Vector3::new(-1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_bad_node_is_an_error() {
        let planes = Rc::new(vec![Hyperplane::axis_x(0.0)].into_boxed_slice());
        let nodes = Rc::new(
            vec![BspCollisionNode {
                plane_id: 0,
                children: [
                    BspCollisionNodeChild::Node(7),
                    BspCollisionNodeChild::Contents(BspLeafContents::Solid),
                ],
            }]
            .into_boxed_slice(),
        );
        let hull = BspCollisionHull::new(
            planes,
            nodes,
            BspCollisionNodeChild::Node(0),
            Vector3::zero(),
            Vector3::zero(),
        );

        assert!(matches!(
            hull.contents_at_point(Vector3::unit_x()),
            Err(BspError::BadNode { id: 7, .. })
        ));
        assert!(hull
            .trace(Vector3::unit_x(), Vector3::unit_x() * 2.0)
            .is_err());
        assert_eq!(
            hull.contents_at_point(-Vector3::unit_x()).unwrap(),
            BspLeafContents::Solid
        );
    }

    // closed-form entry ratio of a segment into an axis-aligned box, if it enters at all
    fn slab_entry(
        start: Vector3<f32>,
        end: Vector3<f32>,
        min: Vector3<f32>,
        max: Vector3<f32>,
    ) -> Option<(f32, f32, usize)> {
        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;
        let mut axis = 0;
        let delta = end - start;

        for i in 0..3 {
            if delta[i] == 0.0 {
                if start[i] < min[i] || start[i] > max[i] {
                    return None;
                }
                continue;
            }

            let mut t0 = (min[i] - start[i]) / delta[i];
            let mut t1 = (max[i] - start[i]) / delta[i];
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            if t0 > t_enter {
                t_enter = t0;
                axis = i;
            }
            t_exit = t_exit.min(t1);
        }

        if t_enter < t_exit {
            Some((t_enter, t_exit, axis))
        } else {
            None
        }
    }

    #[test]
    fn test_box_hull_matches_slab_test() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let min = Vector3::new(-20.0, -10.0, -30.0);
        let max = Vector3::new(20.0, 40.0, 10.0);
        let hull = BspCollisionHull::for_bounds(min, max).unwrap();

        let mut checked = 0;
        for _ in 0..2000 {
            let start = Vector3::new(
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
            );
            let end = Vector3::new(
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
            );

            // keep starts well clear of the box so the epsilon bias can't straddle a face
            let outside = (0..3).any(|i| start[i] < min[i] - 1.0 || start[i] > max[i] + 1.0);
            if !outside {
                continue;
            }

            let trace = hull.trace(start, end).unwrap();
            assert!(trace.ratio() >= 0.0 && trace.ratio() <= 1.0);
            assert!(!trace.start_solid());

            match slab_entry(start, end, min, max) {
                None => {
                    assert_eq!(trace.ratio(), 1.0, "start={:?} end={:?}", start, end);
                }
                Some((t, t_exit, axis)) => {
                    let length = (end - start).magnitude();
                    // skip glancing hits where the epsilon bias dominates
                    if (end - start)[axis].abs() < 1.0
                        || (t - 1.0).abs() * length < 0.5
                        || (t_exit - t) * length < 1.0
                    {
                        continue;
                    }

                    let tolerance = 2.0 * DIST_EPSILON / (end - start)[axis].abs() + 1e-4;
                    assert!(
                        (trace.ratio() - t).abs() <= tolerance,
                        "start={:?} end={:?} trace={} slab={}",
                        start,
                        end,
                        trace.ratio(),
                        t
                    );

                    let normal = trace.plane().unwrap().normal();
                    assert!(normal.dot(end - start) < 0.0);
                    checked += 1;
                }
            }
        }

        assert!(checked > 0);
    }
}
