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

use crate::common::bsp::BspModel;

use cgmath::{Vector3, Zero};

#[derive(Debug)]
pub struct Model {
    name: String,
    kind: ModelKind,
}

#[derive(Debug)]
pub enum ModelKind {
    None,
    Brush(BspModel),

    /// A model with no collision geometry of its own, only a bounding box.
    Point {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
}

impl Model {
    pub fn none() -> Model {
        Model {
            name: String::new(),
            kind: ModelKind::None,
        }
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    /// Construct a new generic model from a brush model.
    pub fn from_brush_model<S>(name: S, brush_model: BspModel) -> Model
    where
        S: AsRef<str>,
    {
        Model {
            name: name.as_ref().to_owned(),
            kind: ModelKind::Brush(brush_model),
        }
    }

    /// Construct a new generic model from the bounds of an alias or sprite model.
    pub fn from_bounds<S>(name: S, min: Vector3<f32>, max: Vector3<f32>) -> Model
    where
        S: AsRef<str>,
    {
        Model {
            name: name.as_ref().to_owned(),
            kind: ModelKind::Point { min, max },
        }
    }

    /// Return the name of this model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the brush model, if this is one.
    pub fn brush(&self) -> Option<&BspModel> {
        match self.kind {
            ModelKind::Brush(ref bmodel) => Some(bmodel),
            _ => None,
        }
    }

    /// Return the minimum extent of this model.
    ///
    /// The null model has zero size.
    pub fn min(&self) -> Vector3<f32> {
        match self.kind {
            ModelKind::None => Vector3::zero(),
            ModelKind::Brush(ref bmodel) => bmodel.min(),
            ModelKind::Point { min, .. } => min,
        }
    }

    /// Return the maximum extent of this model.
    pub fn max(&self) -> Vector3<f32> {
        match self.kind {
            ModelKind::None => Vector3::zero(),
            ModelKind::Brush(ref bmodel) => bmodel.max(),
            ModelKind::Point { max, .. } => max,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::bsp::{BoxMapBuilder, BspLeafContents};

    #[test]
    fn test_model_bounds() {
        let none = Model::none();
        assert!(none.brush().is_none());
        assert_eq!(none.min(), Vector3::zero());

        let point = Model::from_bounds(
            "progs/player.mdl",
            Vector3::new(-16.0, -16.0, -24.0),
            Vector3::new(16.0, 16.0, 32.0),
        );
        assert_eq!(point.name(), "progs/player.mdl");
        assert!(point.brush().is_none());
        assert_eq!(point.max(), Vector3::new(16.0, 16.0, 32.0));

        let bmodel = BoxMapBuilder::new()
            .add_box(
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(64.0, 8.0, 128.0),
                BspLeafContents::Solid,
            )
            .build()
            .unwrap();
        let brush = Model::from_brush_model("*1", bmodel);
        assert!(brush.brush().is_some());
        assert_eq!(brush.max(), Vector3::new(64.0, 8.0, 128.0));
    }
}
