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

use std::ops::Neg;

use cgmath::{Angle, Deg, InnerSpace, Vector3, Zero};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Angles {
    pub pitch: Deg<f32>,
    pub roll: Deg<f32>,
    pub yaw: Deg<f32>,
}

impl Angles {
    pub fn zero() -> Angles {
        Angles {
            pitch: Deg(0.0),
            roll: Deg(0.0),
            yaw: Deg(0.0),
        }
    }

    /// Returns the forward, right and up vectors for this orientation.
    ///
    /// Positive pitch looks down, so the forward vector's z-component is `-sin(pitch)`.
    pub fn vectors(&self) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let (sr, cr) = self.roll.sin_cos();

        let forward = Vector3::new(cp * cy, cp * sy, -sp);
        let right = Vector3::new(
            -sr * sp * cy + cr * sy,
            -sr * sp * sy - cr * cy,
            -sr * cp,
        );
        let up = Vector3::new(
            cr * sp * cy + sr * sy,
            cr * sp * sy - sr * cy,
            cr * cp,
        );

        (forward, right, up)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum HyperplaneSide {
    Positive = 0,
    Negative = 1,
}

impl Neg for HyperplaneSide {
    type Output = HyperplaneSide;

    fn neg(self) -> Self::Output {
        match self {
            HyperplaneSide::Positive => HyperplaneSide::Negative,
            HyperplaneSide::Negative => HyperplaneSide::Positive,
        }
    }
}

impl HyperplaneSide {
    pub fn from_dist(dist: f32) -> HyperplaneSide {
        if dist >= 0.0 {
            HyperplaneSide::Positive
        } else {
            HyperplaneSide::Negative
        }
    }
}

bitflags! {
    /// The sides of a hyperplane occupied by an axis-aligned box.
    pub struct BoxSide: u8 {
        const FRONT = 0b01;
        const BACK  = 0b10;
    }
}

#[derive(Copy, Clone, Debug, Eq, FromPrimitive, PartialEq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Clone, Debug, PartialEq)]
enum Alignment {
    Axis(Axis),
    Normal(Vector3<f32>),
}

/// A plane in point-normal form.
///
/// Planes whose normal is exactly a positive unit axis are stored as axis-aligned and only
/// consider that axis during point comparisons. Every plane also carries a sign-bit mask with
/// bit `i` set when component `i` of its normal is negative, which selects the box corners used by
/// `box_side`.
#[derive(Clone, Debug, PartialEq)]
pub struct Hyperplane {
    alignment: Alignment,
    dist: f32,
    sign_bits: u8,
}

impl Neg for Hyperplane {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Hyperplane::from_normal(-self.normal(), -self.dist)
    }
}

impl Hyperplane {
    /// Creates a new hyperplane aligned along the given normal, `dist` units away from the origin.
    ///
    /// If the given normal is equivalent to one of the axis normals, the hyperplane will be optimized
    /// to only consider that axis when performing point comparisons.
    pub fn new(normal: Vector3<f32>, dist: f32) -> Hyperplane {
        match normal {
            n if n == Vector3::unit_x() => Self::axis_x(dist),
            n if n == Vector3::unit_y() => Self::axis_y(dist),
            n if n == Vector3::unit_z() => Self::axis_z(dist),
            _ => Self::from_normal(normal, dist),
        }
    }

    pub fn axis(axis: Axis, dist: f32) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(axis),
            dist,
            sign_bits: 0,
        }
    }

    /// Creates a new hyperplane aligned along the x-axis, `dist` units away from the origin.
    pub fn axis_x(dist: f32) -> Hyperplane {
        Self::axis(Axis::X, dist)
    }

    /// Creates a new hyperplane aligned along the y-axis, `dist` units away from the origin.
    pub fn axis_y(dist: f32) -> Hyperplane {
        Self::axis(Axis::Y, dist)
    }

    /// Creates a new hyperplane aligned along the z-axis, `dist` units away from the origin.
    pub fn axis_z(dist: f32) -> Hyperplane {
        Self::axis(Axis::Z, dist)
    }

    /// Creates a new hyperplane aligned along the given normal, `dist` units away from the origin.
    ///
    /// This function will force the hyperplane alignment to be represented as a normal even if it
    /// is aligned along an axis.
    pub fn from_normal(normal: Vector3<f32>, dist: f32) -> Hyperplane {
        let normal = normal.normalize();
        let mut sign_bits = 0;
        for i in 0..3 {
            if normal[i] < 0.0 {
                sign_bits |= 1 << i;
            }
        }

        Hyperplane {
            alignment: Alignment::Normal(normal),
            dist,
            sign_bits,
        }
    }

    /// Returns the surface normal of this plane.
    pub fn normal(&self) -> Vector3<f32> {
        match self.alignment {
            Alignment::Axis(ax) => match ax {
                Axis::X => Vector3::unit_x(),
                Axis::Y => Vector3::unit_y(),
                Axis::Z => Vector3::unit_z(),
            },
            Alignment::Normal(normal) => normal,
        }
    }

    pub fn dist(&self) -> f32 {
        self.dist
    }

    /// Returns the axis this plane is aligned to, if any.
    pub fn aligned_axis(&self) -> Option<Axis> {
        match self.alignment {
            Alignment::Axis(a) => Some(a),
            Alignment::Normal(_) => None,
        }
    }

    pub fn sign_bits(&self) -> u8 {
        self.sign_bits
    }

    /// Calculates the shortest distance between this hyperplane and the given point.
    pub fn point_dist(&self, point: Vector3<f32>) -> f32 {
        match self.alignment {
            Alignment::Axis(a) => point[a as usize] - self.dist,
            Alignment::Normal(n) => point.dot(n) - self.dist,
        }
    }

    /// Calculates which side of this hyperplane the given point belongs to.
    ///
    /// Points with a distance of 0.0 are considered to be on the positive side.
    pub fn point_side(&self, point: Vector3<f32>) -> HyperplaneSide {
        HyperplaneSide::from_dist(self.point_dist(point))
    }

    /// Determines which sides of this hyperplane the box `[min, max]` occupies.
    pub fn box_side(&self, min: Vector3<f32>, max: Vector3<f32>) -> BoxSide {
        if let Alignment::Axis(a) = self.alignment {
            let a = a as usize;
            return if self.dist <= min[a] {
                BoxSide::FRONT
            } else if self.dist >= max[a] {
                BoxSide::BACK
            } else {
                BoxSide::FRONT | BoxSide::BACK
            };
        }

        // pick the corners nearest to and farthest along the normal
        let mut near = Vector3::zero();
        let mut far = Vector3::zero();
        for i in 0..3 {
            if self.sign_bits & (1 << i) == 0 {
                far[i] = max[i];
                near[i] = min[i];
            } else {
                far[i] = min[i];
                near[i] = max[i];
            }
        }

        let mut side = BoxSide::empty();
        if self.point_dist(far) >= 0.0 {
            side |= BoxSide::FRONT;
        }
        if self.point_dist(near) < 0.0 {
            side |= BoxSide::BACK;
        }

        side
    }
}

pub fn bounds<'a, I>(points: I) -> (Vector3<f32>, Vector3<f32>)
where
    I: IntoIterator<Item = &'a Vector3<f32>>,
{
    let mut min = Vector3::new(32767.0, 32767.0, 32767.0);
    let mut max = Vector3::new(-32768.0, -32768.0, -32768.0);
    for p in points.into_iter() {
        for c in 0..3 {
            min[c] = p[c].min(min[c]);
            max[c] = p[c].max(max[c]);
        }
    }
    (min, max)
}
