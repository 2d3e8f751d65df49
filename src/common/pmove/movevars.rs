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

use crate::common::console::{ConsoleError, CvarRegistry};

/// Tunables consumed by the player movement code.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoveVars {
    pub gravity: f32,
    pub stop_speed: f32,
    pub max_speed: f32,
    pub spectator_max_speed: f32,
    pub accelerate: f32,

    /// Carried for `sv_airaccelerate`. Air movement is driven by `accelerate` instead.
    pub air_accelerate: f32,

    pub water_accelerate: f32,
    pub friction: f32,
    pub water_friction: f32,

    /// Per-player gravity scale.
    pub ent_gravity: f32,
}

impl Default for MoveVars {
    fn default() -> MoveVars {
        MoveVars {
            gravity: 800.0,
            stop_speed: 100.0,
            max_speed: 320.0,
            spectator_max_speed: 500.0,
            accelerate: 10.0,
            air_accelerate: 0.7,
            water_accelerate: 10.0,
            friction: 4.0,
            water_friction: 4.0,
            ent_gravity: 1.0,
        }
    }
}

pub fn register_cvars(cvars: &CvarRegistry) -> Result<(), ConsoleError> {
    cvars.register("sv_gravity", "800")?;
    cvars.register("sv_stopspeed", "100")?;
    cvars.register("sv_maxspeed", "320")?;
    cvars.register("sv_spectatormaxspeed", "500")?;
    cvars.register("sv_accelerate", "10")?;
    cvars.register("sv_airaccelerate", "0.7")?;
    cvars.register("sv_wateraccelerate", "10")?;
    cvars.register("sv_friction", "4")?;
    cvars.register("sv_waterfriction", "4")?;

    Ok(())
}

impl MoveVars {
    /// Reads the current movement cvars.
    ///
    /// `ent_gravity` is a property of the player rather than the server, so it is left at 1.
    pub fn from_cvars(cvars: &CvarRegistry) -> Result<MoveVars, ConsoleError> {
        Ok(MoveVars {
            gravity: cvars.get_value("sv_gravity")?,
            stop_speed: cvars.get_value("sv_stopspeed")?,
            max_speed: cvars.get_value("sv_maxspeed")?,
            spectator_max_speed: cvars.get_value("sv_spectatormaxspeed")?,
            accelerate: cvars.get_value("sv_accelerate")?,
            air_accelerate: cvars.get_value("sv_airaccelerate")?,
            water_accelerate: cvars.get_value("sv_wateraccelerate")?,
            friction: cvars.get_value("sv_friction")?,
            water_friction: cvars.get_value("sv_waterfriction")?,
            ent_gravity: 1.0,
        })
    }
}
