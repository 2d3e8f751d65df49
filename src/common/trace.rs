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

//! Results of sweeping a point along a segment through a collision hull.

use crate::common::{bsp::BspLeafContents, math::Hyperplane};

use cgmath::Vector3;

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEndBoundary {
    pub ratio: f32,
    pub plane: Hyperplane,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceEndKind {
    /// This endpoint falls within a leaf.
    Terminal,

    /// This endpoint falls on a leaf boundary (a plane).
    Boundary(TraceEndBoundary),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEnd {
    point: Vector3<f32>,
    kind: TraceEndKind,
}

impl TraceEnd {
    pub fn terminal(point: Vector3<f32>) -> TraceEnd {
        TraceEnd {
            point,
            kind: TraceEndKind::Terminal,
        }
    }

    pub fn boundary(point: Vector3<f32>, ratio: f32, plane: Hyperplane) -> TraceEnd {
        TraceEnd {
            point,
            kind: TraceEndKind::Boundary(TraceEndBoundary { ratio, plane }),
        }
    }

    pub fn point(&self) -> Vector3<f32> {
        self.point
    }

    pub fn kind(&self) -> &TraceEndKind {
        &self.kind
    }
}

/// The outcome of a single trace.
///
/// A fresh trace is `all_solid` and ends at the requested endpoint. Every leaf the segment passes
/// through clears `all_solid` unless it is solid, in which case `start_solid` is raised instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    start: Vector3<f32>,
    end: TraceEnd,
    all_solid: bool,
    start_solid: bool,
    in_open: bool,
    in_water: bool,
}

impl Trace {
    pub fn new(start: Vector3<f32>, end: Vector3<f32>) -> Trace {
        Trace {
            start,
            end: TraceEnd::terminal(end),
            all_solid: true,
            start_solid: false,
            in_open: false,
            in_water: false,
        }
    }

    /// Returns an unobstructed trace from `start` to `end`.
    pub fn clear(start: Vector3<f32>, end: Vector3<f32>) -> Trace {
        Trace {
            all_solid: false,
            ..Trace::new(start, end)
        }
    }

    /// Records the contents of a leaf the segment passed through.
    pub fn visit_leaf(&mut self, contents: BspLeafContents) {
        match contents {
            BspLeafContents::Solid => self.start_solid = true,
            c => {
                self.all_solid = false;
                if c == BspLeafContents::Empty {
                    self.in_open = true;
                } else {
                    self.in_water = true;
                }
            }
        }
    }

    /// Records an impact with `plane` at `point`, `ratio` of the way along the segment.
    pub fn set_impact(&mut self, point: Vector3<f32>, ratio: f32, plane: Hyperplane) {
        self.end = TraceEnd::boundary(point, ratio, plane);
    }

    /// Moves the endpoint without changing the recorded plane.
    pub fn set_end_point(&mut self, point: Vector3<f32>, ratio: f32) {
        match self.end.kind {
            TraceEndKind::Boundary(ref mut b) => b.ratio = ratio,
            TraceEndKind::Terminal => (),
        }
        self.end.point = point;
    }

    /// Translates the trace by `offset`, used to move a trace computed in a hull's local space
    /// back into world space.
    pub fn adjust(self, offset: Vector3<f32>) -> Trace {
        Trace {
            start: self.start + offset,
            end: TraceEnd {
                point: self.end.point + offset,
                kind: self.end.kind,
            },
            ..self
        }
    }

    pub fn start_point(&self) -> Vector3<f32> {
        self.start
    }

    /// Returns the point where this trace stopped.
    ///
    /// A trace which started in a solid never leaves its start point.
    pub fn end_point(&self) -> Vector3<f32> {
        if self.start_solid() {
            self.start
        } else {
            self.end.point
        }
    }

    pub fn end(&self) -> &TraceEnd {
        &self.end
    }

    /// Returns the fraction of the segment traveled before impact.
    pub fn ratio(&self) -> f32 {
        if self.start_solid() {
            0.0
        } else {
            self.impact_ratio()
        }
    }

    /// Returns the impact fraction regardless of whether the trace started in a solid.
    pub fn impact_ratio(&self) -> f32 {
        match self.end.kind {
            TraceEndKind::Boundary(ref b) => b.ratio,
            TraceEndKind::Terminal => 1.0,
        }
    }

    /// Returns the surface the trace collided with, facing back toward the start point.
    pub fn plane(&self) -> Option<&Hyperplane> {
        match self.end.kind {
            TraceEndKind::Boundary(ref b) => Some(&b.plane),
            TraceEndKind::Terminal => None,
        }
    }

    pub fn all_solid(&self) -> bool {
        self.all_solid
    }

    pub fn start_solid(&self) -> bool {
        self.start_solid || self.all_solid
    }

    pub fn in_open(&self) -> bool {
        self.in_open
    }

    pub fn in_water(&self) -> bool {
        self.in_water
    }

    pub fn is_terminal(&self) -> bool {
        match self.end.kind {
            TraceEndKind::Terminal => true,
            TraceEndKind::Boundary(_) => false,
        }
    }

    pub(crate) fn or_start_solid(&mut self, start_solid: bool) {
        self.start_solid |= start_solid;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cgmath::Zero;

    #[test]
    fn test_fresh_trace_is_all_solid() {
        let trace = Trace::new(Vector3::zero(), Vector3::unit_x());
        assert!(trace.all_solid());
        assert!(trace.start_solid());
        assert_eq!(trace.ratio(), 0.0);
        assert_eq!(trace.end_point(), Vector3::zero());
    }

    #[test]
    fn test_visit_empty_leaf() {
        let mut trace = Trace::new(Vector3::zero(), Vector3::unit_x());
        trace.visit_leaf(BspLeafContents::Empty);
        assert!(!trace.all_solid());
        assert!(!trace.start_solid());
        assert!(trace.in_open());
        assert!(!trace.in_water());
        assert_eq!(trace.ratio(), 1.0);
        assert!(trace.plane().is_none());
        assert_eq!(trace.end_point(), Vector3::unit_x());
    }

    #[test]
    fn test_start_solid_pins_ratio() {
        let mut trace = Trace::new(Vector3::zero(), Vector3::unit_x() * 10.0);
        trace.visit_leaf(BspLeafContents::Solid);
        trace.visit_leaf(BspLeafContents::Water);
        trace.set_impact(Vector3::unit_x() * 5.0, 0.5, Hyperplane::axis_x(5.0));
        assert!(!trace.all_solid());
        assert!(trace.start_solid());
        assert!(trace.in_water());
        assert_eq!(trace.ratio(), 0.0);
        assert_eq!(trace.impact_ratio(), 0.5);
        assert_eq!(trace.end_point(), Vector3::zero());
    }

    #[test]
    fn test_adjust() {
        let mut trace = Trace::new(Vector3::zero(), Vector3::unit_x() * 10.0);
        trace.visit_leaf(BspLeafContents::Empty);
        trace.set_impact(Vector3::unit_x() * 5.0, 0.5, Hyperplane::axis_x(5.0));
        let trace = trace.adjust(Vector3::unit_z());
        assert_eq!(trace.start_point(), Vector3::unit_z());
        assert_eq!(trace.end_point(), Vector3::new(5.0, 0.0, 1.0));
        assert_eq!(trace.ratio(), 0.5);
        assert_eq!(trace.plane(), Some(&Hyperplane::axis_x(5.0)));
    }
}
