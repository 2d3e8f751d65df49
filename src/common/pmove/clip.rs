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

//! Collision response: sliding along surfaces and stepping over ledges.

use crate::common::pmove::{
    normal_z, Mover, PlayerTracer, MAX_CLIP_PLANES, MIN_WALK_NORMAL, STEP_SIZE,
};

use arrayvec::ArrayVec;
use cgmath::{InnerSpace, Vector3, Zero};

const MAX_BUMPS: usize = 4;

// velocity components smaller than this are snapped to zero after clipping
const STOP_THRESHOLD: f32 = 0.1;

bitflags! {
    pub struct CollisionFlags: u8 {
        /// Blocked by a floor.
        const HORIZONTAL = 1;

        /// Blocked by a wall or step.
        const VERTICAL = 2;

        const STOPPED = 4;
    }
}

/// Calculates a new velocity after collision with a surface.
///
/// `overbounce` approximates the elasticity of the collision. A value of `1` reduces the
/// component of `initial` antiparallel to `surface_normal` to zero, while a value of `2` reflects
/// that component to be parallel to `surface_normal`.
pub fn clip_velocity(
    initial: Vector3<f32>,
    surface_normal: Vector3<f32>,
    overbounce: f32,
) -> (Vector3<f32>, CollisionFlags) {
    let mut flags = CollisionFlags::empty();

    if surface_normal.z > 0.0 {
        flags |= CollisionFlags::HORIZONTAL;
    } else if surface_normal.z == 0.0 {
        flags |= CollisionFlags::VERTICAL;
    }

    let change = (overbounce * initial.dot(surface_normal)) * surface_normal;
    let mut out = initial - change;

    for i in 0..3 {
        if out[i].abs() < STOP_THRESHOLD {
            out[i] = 0.0;
        }
    }

    (out, flags)
}

/// Calculates a new velocity after simultaneous collision with every plane in `normals`.
///
/// `last` is the velocity produced by the previous clip; when no single plane yields a velocity
/// that leaves all the others, two planes redirect `last` along their crease. Returns `None` if
/// the mover is wedged between three or more planes.
pub fn velocity_after_multi_collision(
    initial: Vector3<f32>,
    last: Vector3<f32>,
    normals: &[Vector3<f32>],
) -> Option<Vector3<f32>> {
    let mut clipped = last;

    'outer: for (a, normal_a) in normals.iter().enumerate() {
        clipped = clip_velocity(initial, *normal_a, 1.0).0;

        for (b, normal_b) in normals.iter().enumerate() {
            if a != b && clipped.dot(*normal_b) < 0.0 {
                continue 'outer;
            }
        }

        return Some(clipped);
    }

    if normals.len() != 2 {
        return None;
    }

    let dir = normals[0].cross(normals[1]);
    Some(dir * dir.dot(clipped))
}

impl<'a, T> Mover<'a, T>
where
    T: PlayerTracer,
{
    /// Moves along the current velocity for the rest of the frame, sliding along anything hit.
    pub(super) fn fly_move(&mut self) -> Result<CollisionFlags, T::Error> {
        let mut blocked = CollisionFlags::empty();
        let original_velocity = self.pm.velocity;
        let primal_velocity = self.pm.velocity;
        let mut planes = ArrayVec::<Vector3<f32>, MAX_CLIP_PLANES>::new();
        let mut time_left = self.frame_time;

        for _ in 0..MAX_BUMPS {
            let end = self.pm.origin + time_left * self.pm.velocity;
            let (trace, ent) = self.tracer.player_move(self.pm.origin, end)?;

            if trace.start_solid() {
                // trapped in another solid
                self.pm.velocity = Vector3::zero();
                return Ok(CollisionFlags::HORIZONTAL | CollisionFlags::VERTICAL);
            }

            if trace.ratio() > 0.0 {
                self.pm.origin = trace.end_point();
                planes.clear();
            }

            if trace.ratio() == 1.0 {
                break;
            }

            if let Some(e) = ent {
                self.touch(e);
            }

            let normal = match trace.plane() {
                Some(p) => p.normal(),
                None => break,
            };

            if normal.z > MIN_WALK_NORMAL {
                blocked |= CollisionFlags::HORIZONTAL;
            }
            if normal.z == 0.0 {
                blocked |= CollisionFlags::VERTICAL;
            }

            time_left -= time_left * trace.ratio();

            if planes.try_push(normal).is_err() {
                debug!("fly_move: clip plane overflow");
                self.pm.velocity = Vector3::zero();
                blocked |= CollisionFlags::STOPPED;
                break;
            }

            match velocity_after_multi_collision(original_velocity, self.pm.velocity, &planes) {
                Some(v) => self.pm.velocity = v,
                None => {
                    self.pm.velocity = Vector3::zero();
                    blocked |= CollisionFlags::STOPPED;
                    break;
                }
            }

            // turning back on the original direction would oscillate in sloped corners
            if self.pm.velocity.dot(primal_velocity) <= 0.0 {
                self.pm.velocity = Vector3::zero();
                blocked |= CollisionFlags::STOPPED;
                break;
            }
        }

        if self.water_jumping() {
            self.pm.velocity = primal_velocity;
        }

        Ok(blocked)
    }

    /// Moves a grounded player, stepping up onto ledges no higher than `STEP_SIZE`.
    pub(super) fn ground_move(&mut self) -> Result<(), T::Error> {
        self.pm.velocity.z = 0.0;
        if self.pm.velocity == Vector3::zero() {
            return Ok(());
        }

        let mut dest = self.pm.origin + self.pm.velocity * self.frame_time;
        dest.z = self.pm.origin.z;

        let (trace, _) = self.tracer.player_move(self.pm.origin, dest)?;
        if trace.ratio() == 1.0 {
            self.pm.origin = trace.end_point();
            return Ok(());
        }

        let original = self.pm.origin;
        let original_vel = self.pm.velocity;

        // slide along the ground
        let down_flags = self.fly_move()?;
        let down = self.pm.origin;
        let down_vel = self.pm.velocity;

        self.pm.origin = original;
        self.pm.velocity = original_vel;

        // step up, slide, then press back down
        let up_dest = self.pm.origin + Vector3::new(0.0, 0.0, STEP_SIZE);
        let (trace, _) = self.tracer.player_move(self.pm.origin, up_dest)?;
        if !trace.start_solid() {
            self.pm.origin = trace.end_point();
        }

        let up_flags = self.fly_move()?;

        let down_dest = self.pm.origin - Vector3::new(0.0, 0.0, STEP_SIZE);
        let (trace, _) = self.tracer.player_move(self.pm.origin, down_dest)?;
        if normal_z(&trace) < MIN_WALK_NORMAL {
            trace!("ground_move: step lands on a slope, sliding instead");
            self.pm.origin = down;
            self.pm.velocity = down_vel;
            return Ok(());
        }

        if !trace.start_solid() {
            self.pm.origin = trace.end_point();
        }
        let up = self.pm.origin;

        let down_dist = (down.x - original.x).powi(2) + (down.y - original.y).powi(2);
        let up_dist = (up.x - original.x).powi(2) + (up.y - original.y).powi(2);
        trace!(
            "ground_move: down {} ({:?}), up {} ({:?})",
            down_dist,
            down_flags,
            up_dist,
            up_flags
        );

        if down_dist > up_dist {
            self.pm.origin = down;
            self.pm.velocity = down_vel;
        } else {
            self.pm.velocity.z = down_vel.z;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn test_clip_velocity_floor() {
        let (out, flags) = clip_velocity(
            Vector3::new(100.0, 0.0, -50.0),
            Vector3::new(0.0, 0.0, 1.0),
            1.0,
        );
        assert_eq!(out, Vector3::new(100.0, 0.0, 0.0));
        assert_eq!(flags, CollisionFlags::HORIZONTAL);
    }

    #[test]
    fn test_clip_velocity_wall_snaps_residue() {
        let (out, flags) = clip_velocity(
            Vector3::new(-200.0, 0.05, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            1.0,
        );
        assert_eq!(out, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(flags, CollisionFlags::VERTICAL);
    }

    #[test]
    fn test_clip_velocity_ceiling_has_no_flags() {
        let (_, flags) = clip_velocity(
            Vector3::new(0.0, 0.0, 100.0),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn test_clip_velocity_never_drives_into_plane() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);

        for _ in 0..1000 {
            let v = Vector3::new(
                rng.gen_range(-500.0..500.0),
                rng.gen_range(-500.0..500.0),
                rng.gen_range(-500.0..500.0),
            );
            let n = Vector3::new(
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
            );
            if n.magnitude2() < 0.01 {
                continue;
            }
            let n = n.normalize();

            let (out, _) = clip_velocity(v, n, 1.0);

            // each snapped component can shift the dot product by at most STOP_THRESHOLD
            assert!(out.dot(n) >= -0.2, "v = {:?} n = {:?} out = {:?}", v, n, out);
        }
    }

    #[test]
    fn test_multi_collision_crease() {
        // two walls meeting at a convex edge along z
        let normals = [
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
        ];
        let initial = Vector3::new(100.0, 100.0, 50.0);

        let v = velocity_after_multi_collision(initial, initial, &normals).unwrap();
        assert_eq!(v.x, 0.0);
        assert_eq!(v.y, 0.0);
        assert!((v.z - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_multi_collision_single_plane_slides() {
        let normals = [
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let initial = Vector3::new(100.0, 30.0, 0.0);

        let v = velocity_after_multi_collision(initial, initial, &normals).unwrap();
        assert_eq!(v, Vector3::new(0.0, 30.0, 0.0));
    }

    #[test]
    fn test_multi_collision_wedged() {
        let normals = [
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        let initial = Vector3::new(100.0, 100.0, 100.0);

        assert!(velocity_after_multi_collision(initial, initial, &normals).is_none());
    }
}
