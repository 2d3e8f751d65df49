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

//! Synthetic maps assembled from axis-aligned boxes.

use std::rc::Rc;

use crate::common::bsp::{
    box_planes, BspCollisionNode, BspCollisionNodeChild, BspData, BspError, BspLeaf,
    BspLeafContents, BspModel, BspRenderNode, BspRenderNodeChild, HULL1_MAX, HULL1_MIN,
    HULL2_MAX, HULL2_MIN,
};
use crate::common::math::{self, Hyperplane};

use cgmath::{Vector3, Zero};

// leaf 0 is always the solid void outside the map
const OUTSIDE_LEAF: usize = 1;

#[derive(Clone, Debug)]
struct MapBox {
    min: Vector3<f32>,
    max: Vector3<f32>,
    contents: BspLeafContents,
}

/// Builds a `BspModel` from a list of boxes.
///
/// Space not covered by any box is empty. Where boxes overlap, the one added first wins. Only
/// solid boxes contribute to the clipping hulls.
#[derive(Clone, Debug, Default)]
pub struct BoxMapBuilder {
    boxes: Vec<MapBox>,
}

// Each box becomes a chain of six nodes, one per bounding plane. A point on the outer side of any
// plane falls through to the next box's chain; a point passing all six is inside the box.
fn box_chain<C>(first_node: usize, inside: C, next: C, node: fn(usize) -> C) -> Vec<[C; 2]>
where
    C: Copy,
{
    (0..6)
        .map(|i| {
            let forward = if i == 5 { inside } else { node(first_node + i + 1) };
            let mut children = [forward; 2];
            children[i & 1] = next;
            children
        })
        .collect()
}

impl BoxMapBuilder {
    pub fn new() -> BoxMapBuilder {
        BoxMapBuilder { boxes: Vec::new() }
    }

    pub fn add_box(
        &mut self,
        min: Vector3<f32>,
        max: Vector3<f32>,
        contents: BspLeafContents,
    ) -> &mut BoxMapBuilder {
        self.boxes.push(MapBox { min, max, contents });
        self
    }

    pub fn build(&self) -> Result<BspModel, BspError> {
        for b in self.boxes.iter() {
            if b.min.x > b.max.x || b.min.y > b.max.y || b.min.z > b.max.z {
                return Err(BspError::BadBounds {
                    min: b.min,
                    max: b.max,
                });
            }
        }

        let mut planes = Vec::new();
        let mut leaves = vec![
            BspLeaf {
                contents: BspLeafContents::Solid,
            },
            BspLeaf {
                contents: BspLeafContents::Empty,
            },
        ];

        let mut render_nodes = Vec::new();
        for (k, b) in self.boxes.iter().enumerate() {
            let first_node = 6 * k;
            let next = if k + 1 < self.boxes.len() {
                BspRenderNodeChild::Node(first_node + 6)
            } else {
                BspRenderNodeChild::Leaf(OUTSIDE_LEAF)
            };

            leaves.push(BspLeaf {
                contents: b.contents,
            });
            let inside = BspRenderNodeChild::Leaf(leaves.len() - 1);

            let plane_base = planes.len();
            planes.extend(box_planes(b.min, b.max).iter().cloned());
            for (i, children) in box_chain(first_node, inside, next, BspRenderNodeChild::Node)
                .into_iter()
                .enumerate()
            {
                render_nodes.push(BspRenderNode {
                    plane_id: plane_base + i,
                    children,
                });
            }
        }

        // an empty map still needs a root to descend from
        if render_nodes.is_empty() {
            planes.push(Hyperplane::axis_z(0.0));
            render_nodes.push(BspRenderNode {
                plane_id: planes.len() - 1,
                children: [BspRenderNodeChild::Leaf(OUTSIDE_LEAF); 2],
            });
        }

        let solids = self
            .boxes
            .iter()
            .filter(|b| b.contents == BspLeafContents::Solid)
            .collect::<Vec<_>>();

        let mut clip_nodes = Vec::new();
        let mut clip_heads = [BspCollisionNodeChild::Contents(BspLeafContents::Empty); 2];
        for (h, &(clip_min, clip_max)) in [(HULL1_MIN, HULL1_MAX), (HULL2_MIN, HULL2_MAX)]
            .iter()
            .enumerate()
        {
            if solids.is_empty() {
                continue;
            }

            clip_heads[h] = BspCollisionNodeChild::Node(clip_nodes.len());
            for (k, b) in solids.iter().enumerate() {
                let first_node = clip_nodes.len();
                let next = if k + 1 < solids.len() {
                    BspCollisionNodeChild::Node(first_node + 6)
                } else {
                    BspCollisionNodeChild::Contents(BspLeafContents::Empty)
                };

                // expand the box so tracing the center point is equivalent to tracing the hull
                let plane_base = planes.len();
                planes.extend(
                    box_planes(b.min - clip_max, b.max - clip_min)
                        .iter()
                        .cloned(),
                );

                let inside = BspCollisionNodeChild::Contents(BspLeafContents::Solid);
                for (i, children) in box_chain(first_node, inside, next, BspCollisionNodeChild::Node)
                    .into_iter()
                    .enumerate()
                {
                    clip_nodes.push(BspCollisionNode {
                        plane_id: plane_base + i,
                        children,
                    });
                }
            }
        }

        let (min, max) = if self.boxes.is_empty() {
            (Vector3::zero(), Vector3::zero())
        } else {
            math::bounds(self.boxes.iter().flat_map(|b| vec![&b.min, &b.max]))
        };

        debug!(
            "Built box map: {} boxes, {} render nodes, {} clip nodes",
            self.boxes.len(),
            render_nodes.len(),
            clip_nodes.len()
        );

        let bsp_data = BspData::new(planes, render_nodes, leaves, clip_nodes, clip_heads)?;

        Ok(BspModel {
            bsp_data: Rc::new(bsp_data),
            min,
            max,
            origin: Vector3::zero(),
            collision_node_ids: [
                BspCollisionNodeChild::Node(0),
                clip_heads[0],
                clip_heads[1],
            ],
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn floor_and_pool() -> BspModel {
        BoxMapBuilder::new()
            .add_box(
                Vector3::new(-512.0, -512.0, -64.0),
                Vector3::new(512.0, 512.0, 0.0),
                BspLeafContents::Solid,
            )
            .add_box(
                Vector3::new(200.0, -100.0, 0.0),
                Vector3::new(400.0, 100.0, 64.0),
                BspLeafContents::Water,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_point_hull_contents() {
        let model = floor_and_pool();
        let hull = model.hull(0).unwrap();

        assert_eq!(
            hull.contents_at_point(Vector3::new(0.0, 0.0, -10.0)).unwrap(),
            BspLeafContents::Solid
        );
        assert_eq!(
            hull.contents_at_point(Vector3::new(0.0, 0.0, 10.0)).unwrap(),
            BspLeafContents::Empty
        );
        assert_eq!(
            hull.contents_at_point(Vector3::new(300.0, 0.0, 10.0)).unwrap(),
            BspLeafContents::Water
        );
        assert_eq!(
            hull.contents_at_point(Vector3::new(300.0, 0.0, 100.0)).unwrap(),
            BspLeafContents::Empty
        );
    }

    #[test]
    fn test_player_hull_is_expanded() {
        let model = floor_and_pool();
        let hull = model.hull(1).unwrap();
        assert_eq!(hull.min(), HULL1_MIN);

        // the player's origin rests 24 units above the floor
        assert_eq!(
            hull.contents_at_point(Vector3::new(0.0, 0.0, 20.0)).unwrap(),
            BspLeafContents::Solid
        );
        assert_eq!(
            hull.contents_at_point(Vector3::new(0.0, 0.0, 24.0)).unwrap(),
            BspLeafContents::Empty
        );

        // water doesn't block
        assert_eq!(
            hull.contents_at_point(Vector3::new(300.0, 0.0, 30.0)).unwrap(),
            BspLeafContents::Empty
        );

        let trace = hull
            .trace(Vector3::new(0.0, 0.0, 100.0), Vector3::new(0.0, 0.0, 0.0))
            .unwrap();
        assert!(trace.ratio() < 1.0);
        assert!((trace.end_point().z - 24.0).abs() < 0.1);
        assert_eq!(trace.plane().unwrap().normal(), Vector3::unit_z());
    }

    #[test]
    fn test_find_leaf_and_touched_leaves() {
        let model = floor_and_pool();
        let data = model.bsp_data();

        let pool_leaf = data.find_leaf(Vector3::new(300.0, 0.0, 10.0)).unwrap();
        assert_eq!(data.leaves()[pool_leaf].contents, BspLeafContents::Water);

        // a box straddling the pool edge touches the pool and the open air but not the floor
        let touched = data
            .find_touched_leaves(Vector3::new(180.0, -10.0, 10.0), Vector3::new(220.0, 10.0, 20.0))
            .unwrap();
        assert_eq!(touched.len(), 2);
        assert!(touched.contains(&pool_leaf));
        assert!(touched.contains(&OUTSIDE_LEAF));
    }

    #[test]
    fn test_empty_map() {
        let model = BoxMapBuilder::new().build().unwrap();
        for h in 0..3 {
            let hull = model.hull(h).unwrap();
            assert_eq!(
                hull.contents_at_point(Vector3::new(1.0, 2.0, 3.0)).unwrap(),
                BspLeafContents::Empty
            );
        }
        assert!(model.hull(3).is_err());
    }

    #[test]
    fn test_model_bounds() {
        let model = floor_and_pool();
        assert_eq!(model.min(), Vector3::new(-512.0, -512.0, -64.0));
        assert_eq!(model.max(), Vector3::new(512.0, 512.0, 64.0));
        assert_eq!(model.size(), Vector3::new(1024.0, 1024.0, 128.0));
    }
}
