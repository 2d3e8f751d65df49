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

//! Player movement.
//!
//! A player is advanced one command at a time. Each command runs through a fixed sequence of
//! stages: fixing up the position, classifying the ground and water around the player, handling
//! the jump button, friction, acceleration, and finally moving through the world and sliding
//! along whatever gets in the way. All collision queries go through a `PlayerTracer`, so the same
//! code serves the server (tracing against linked entities) and client prediction (tracing
//! against a list of nearby obstacles).

mod clip;
mod movevars;
mod physent;

pub use self::{
    clip::{clip_velocity, velocity_after_multi_collision, CollisionFlags},
    movevars::{register_cvars, MoveVars},
    physent::{PhysEnt, PhysEntKind, PhysEntList},
};

use crate::common::{
    bsp::BspLeafContents,
    engine,
    math::Angles,
    trace::Trace,
    EntityId,
};

use arrayvec::ArrayVec;
use cgmath::{InnerSpace, Vector3, Zero};
use chrono::Duration;

pub const PLAYER_MINS: Vector3<f32> = Vector3 {
    x: -16.0,
    y: -16.0,
    z: -24.0,
};
pub const PLAYER_MAXS: Vector3<f32> = Vector3 {
    x: 16.0,
    y: 16.0,
    z: 32.0,
};

/// The tallest ledge a player can walk onto.
pub const STEP_SIZE: f32 = 18.0;

/// The maximum number of obstacles and touched entities tracked for one player.
pub const MAX_PHYSENTS: usize = 32;

/// The maximum number of planes a player can slide along at once.
pub const MAX_CLIP_PLANES: usize = 5;

// surfaces steeper than this can't be stood on
const MIN_WALK_NORMAL: f32 = 0.7;

const JUMP_SPEED: f32 = 270.0;

// upward speed at which the player can no longer be on the ground
const LIFTOFF_SPEED: f32 = 180.0;

bitflags! {
    pub struct Buttons: u8 {
        const ATTACK = 1;
        const JUMP = 2;
    }
}

/// How deep a player is submerged.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum WaterLevel {
    Dry = 0,
    Feet = 1,
    Waist = 2,
    Eyes = 3,
}

/// A single movement command from a client.
#[derive(Clone, Debug)]
pub struct MoveCommand {
    pub angles: Angles,
    pub forward_move: f32,
    pub side_move: f32,
    pub up_move: f32,
    pub buttons: Buttons,
    pub frame_time: Duration,
}

impl MoveCommand {
    /// A command that does nothing for `frame_time`.
    pub fn idle(frame_time: Duration) -> MoveCommand {
        MoveCommand {
            angles: Angles::zero(),
            forward_move: 0.0,
            side_move: 0.0,
            up_move: 0.0,
            buttons: Buttons::empty(),
            frame_time,
        }
    }
}

/// The movement state of a single player.
#[derive(Clone, Debug)]
pub struct PlayerMove {
    pub origin: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub angles: Angles,
    pub old_buttons: Buttons,

    /// Time remaining in a jump out of the water. Collision response is suppressed while it runs.
    pub water_jump_time: Duration,

    pub dead: bool,
    pub spectator: bool,

    /// The entity the player is standing on, if any.
    pub on_ground: Option<EntityId>,
    pub water_level: WaterLevel,
    pub water_type: BspLeafContents,

    touched: ArrayVec<EntityId, MAX_PHYSENTS>,
}

/// Collision queries needed to move a player.
///
/// Every query is made with the player's bounding box; positions are the box origin.
pub trait PlayerTracer {
    type Error;

    /// Traces the player's box from `start` to `end`, returning the nearest hit and the entity
    /// that caused it.
    fn player_move(
        &self,
        start: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<(Trace, Option<EntityId>), Self::Error>;

    /// Returns the contents of the static world at `point`.
    fn point_contents(&self, point: Vector3<f32>) -> Result<BspLeafContents, Self::Error>;

    /// Returns true if the player's box fits at `point`.
    fn test_position(&self, point: Vector3<f32>) -> Result<bool, Self::Error>;
}

impl PlayerMove {
    pub fn new(origin: Vector3<f32>) -> PlayerMove {
        PlayerMove {
            origin,
            velocity: Vector3::zero(),
            angles: Angles::zero(),
            old_buttons: Buttons::empty(),
            water_jump_time: Duration::zero(),
            dead: false,
            spectator: false,
            on_ground: None,
            water_level: WaterLevel::Dry,
            water_type: BspLeafContents::Empty,
            touched: ArrayVec::new(),
        }
    }

    /// Returns the entities touched during the last command, in the order they were hit.
    pub fn touched(&self) -> &[EntityId] {
        &self.touched
    }

    /// Advances this player by one command.
    ///
    /// Errors are only returned for corrupt collision data; a player that ends up stuck is left
    /// where it is.
    pub fn run<T>(
        &mut self,
        cmd: &MoveCommand,
        vars: &MoveVars,
        tracer: &T,
    ) -> Result<(), T::Error>
    where
        T: PlayerTracer,
    {
        let frame_time = engine::duration_to_f32(cmd.frame_time);
        self.touched.clear();

        let mut mover = Mover {
            pm: self,
            cmd,
            vars,
            tracer,
            frame_time,
        };

        // spectators are never nudged out of solids
        if mover.pm.spectator {
            mover.spectator_move();
            return Ok(());
        }

        mover.nudge_position()?;

        mover.pm.angles = cmd.angles;

        mover.categorize_position()?;

        if mover.pm.water_level >= WaterLevel::Waist {
            mover.check_water_jump()?;
        }

        // falling cancels a water jump
        if mover.pm.velocity.z < 0.0 {
            mover.pm.water_jump_time = Duration::zero();
        }

        if cmd.buttons.contains(Buttons::JUMP) {
            mover.jump_button();
        } else {
            mover.pm.old_buttons.remove(Buttons::JUMP);
        }

        mover.friction()?;

        if mover.pm.water_level >= WaterLevel::Waist {
            mover.water_move()?;
        } else {
            mover.air_move()?;
        }

        mover.categorize_position()
    }
}

/// Advances `pm` by one command. See `PlayerMove::run`.
pub fn run_player_move<T>(
    pm: &mut PlayerMove,
    cmd: &MoveCommand,
    vars: &MoveVars,
    tracer: &T,
) -> Result<(), T::Error>
where
    T: PlayerTracer,
{
    pm.run(cmd, vars, tracer)
}

// Returns the z-component of the hit surface normal, or 0 if nothing was hit.
fn normal_z(trace: &Trace) -> f32 {
    trace.plane().map(|p| p.normal().z).unwrap_or(0.0)
}

// Normalizes `v`, returning it with its original length. The zero vector is left as-is.
fn normalize_or_zero(v: Vector3<f32>) -> (Vector3<f32>, f32) {
    let len = v.magnitude();
    if len == 0.0 {
        (v, 0.0)
    } else {
        (v / len, len)
    }
}

// Snaps a coordinate to the 1/8-unit precision used on the wire.
fn quantize(f: f32) -> f32 {
    (f * 8.0) as i32 as f32 * 0.125
}

// The state of a single command in progress.
struct Mover<'a, T> {
    pm: &'a mut PlayerMove,
    cmd: &'a MoveCommand,
    vars: &'a MoveVars,
    tracer: &'a T,
    frame_time: f32,
}

impl<'a, T> Mover<'a, T>
where
    T: PlayerTracer,
{
    fn water_jumping(&self) -> bool {
        self.pm.water_jump_time > Duration::zero()
    }

    // extra touches beyond the limit are dropped
    fn touch(&mut self, e_id: EntityId) {
        let _ = self.pm.touched.try_push(e_id);
    }

    /// Snaps the origin to network precision, then searches the neighboring 1/8-unit positions
    /// for one that isn't stuck in a solid.
    fn nudge_position(&mut self) -> Result<(), T::Error> {
        const SIGNS: [f32; 3] = [0.0, -1.0, 1.0];

        let base = Vector3::new(
            quantize(self.pm.origin.x),
            quantize(self.pm.origin.y),
            quantize(self.pm.origin.z),
        );

        for z in SIGNS.iter() {
            for x in SIGNS.iter() {
                for y in SIGNS.iter() {
                    let candidate = base + Vector3::new(*x, *y, *z) * 0.125;
                    if self.tracer.test_position(candidate)? {
                        self.pm.origin = candidate;
                        return Ok(());
                    }
                }
            }
        }

        debug!("nudge_position: stuck at {:?}", base);
        self.pm.origin = base;
        Ok(())
    }

    /// Determines whether the player is on the ground and how deep in liquid it is.
    fn categorize_position(&mut self) -> Result<(), T::Error> {
        if self.pm.velocity.z > LIFTOFF_SPEED {
            self.pm.on_ground = None;
        } else {
            let point = self.pm.origin - Vector3::new(0.0, 0.0, 1.0);
            let (trace, ground_ent) = self.tracer.player_move(self.pm.origin, point)?;

            self.pm.on_ground = if normal_z(&trace) < MIN_WALK_NORMAL {
                None
            } else {
                ground_ent
            };

            if self.pm.on_ground.is_some() {
                self.pm.water_jump_time = Duration::zero();
                if !trace.start_solid() {
                    self.pm.origin = trace.end_point();
                }
            }

            if let Some(e) = ground_ent {
                if !e.is_world() {
                    self.touch(e);
                }
            }
        }

        self.pm.water_level = WaterLevel::Dry;
        self.pm.water_type = BspLeafContents::Empty;

        let mut point = self.pm.origin;
        point.z = self.pm.origin.z + PLAYER_MINS.z + 1.0;
        let contents = self.tracer.point_contents(point)?;
        if contents.is_liquid() {
            self.pm.water_type = contents;
            self.pm.water_level = WaterLevel::Feet;

            point.z = self.pm.origin.z + (PLAYER_MINS.z + PLAYER_MAXS.z) * 0.5;
            if self.tracer.point_contents(point)?.is_liquid() {
                self.pm.water_level = WaterLevel::Waist;

                point.z = self.pm.origin.z + 22.0;
                if self.tracer.point_contents(point)?.is_liquid() {
                    self.pm.water_level = WaterLevel::Eyes;
                }
            }
        }

        Ok(())
    }

    fn jump_button(&mut self) {
        if self.pm.dead {
            // don't jump again until released
            self.pm.old_buttons.insert(Buttons::JUMP);
            return;
        }

        if self.water_jumping() {
            self.pm.water_jump_time =
                self.pm.water_jump_time - engine::duration_from_f32(self.frame_time);
            if self.pm.water_jump_time < Duration::zero() {
                self.pm.water_jump_time = Duration::zero();
            }
            return;
        }

        if self.pm.water_level >= WaterLevel::Waist {
            // swimming, not jumping
            self.pm.on_ground = None;
            self.pm.velocity.z = match self.pm.water_type {
                BspLeafContents::Water => 100.0,
                BspLeafContents::Slime => 80.0,
                _ => 50.0,
            };
            return;
        }

        if self.pm.on_ground.is_none() {
            return;
        }

        // don't pogo stick
        if self.pm.old_buttons.contains(Buttons::JUMP) {
            return;
        }

        self.pm.on_ground = None;
        self.pm.velocity.z += JUMP_SPEED;
        self.pm.old_buttons.insert(Buttons::JUMP);
    }

    /// Launches the player out of the water if it is facing a ledge it can climb onto.
    fn check_water_jump(&mut self) -> Result<(), T::Error> {
        if self.water_jumping() {
            return Ok(());
        }

        // only hop out if not plunging in
        if self.pm.velocity.z < -LIFTOFF_SPEED {
            return Ok(());
        }

        let (mut forward, _, _) = self.pm.angles.vectors();
        forward.z = 0.0;
        let (forward, _) = normalize_or_zero(forward);

        let mut spot = self.pm.origin + 24.0 * forward;
        spot.z += 8.0;
        if self.tracer.point_contents(spot)? != BspLeafContents::Solid {
            return Ok(());
        }

        spot.z += 24.0;
        if self.tracer.point_contents(spot)? != BspLeafContents::Empty {
            return Ok(());
        }

        debug!("water jump from {:?}", self.pm.origin);
        self.pm.velocity = forward * 50.0;
        self.pm.velocity.z = 310.0;
        self.pm.water_jump_time = Duration::seconds(2);
        self.pm.old_buttons.insert(Buttons::JUMP);

        Ok(())
    }

    /// Applies ground and water friction.
    fn friction(&mut self) -> Result<(), T::Error> {
        if self.water_jumping() {
            return Ok(());
        }

        let speed = self.pm.velocity.magnitude();
        if speed < 1.0 {
            self.pm.velocity.x = 0.0;
            self.pm.velocity.y = 0.0;
            return Ok(());
        }

        let mut friction = self.vars.friction;

        // if the leading edge is over a dropoff, increase friction
        if self.pm.on_ground.is_some() {
            let mut start = self.pm.origin + self.pm.velocity / speed * 16.0;
            start.z = self.pm.origin.z + PLAYER_MINS.z;
            let mut stop = start;
            stop.z = start.z - 34.0;

            let (trace, _) = self.tracer.player_move(start, stop)?;
            if trace.ratio() == 1.0 {
                friction *= 2.0;
            }
        }

        let mut drop = 0.0;
        if self.pm.water_level >= WaterLevel::Waist {
            drop += speed
                * self.vars.water_friction
                * self.pm.water_level as i32 as f32
                * self.frame_time;
        } else if self.pm.on_ground.is_some() {
            let control = speed.max(self.vars.stop_speed);
            drop += control * friction * self.frame_time;
        }

        let new_speed = (speed - drop).max(0.0) / speed;
        self.pm.velocity *= new_speed;

        Ok(())
    }

    fn accelerate(&mut self, wish_dir: Vector3<f32>, wish_speed: f32, accel: f32) {
        if self.pm.dead || self.water_jumping() {
            return;
        }

        let current_speed = self.pm.velocity.dot(wish_dir);
        let add_speed = wish_speed - current_speed;
        if add_speed <= 0.0 {
            return;
        }

        let accel_speed = (accel * self.frame_time * wish_speed).min(add_speed);
        self.pm.velocity += accel_speed * wish_dir;
    }

    // like accelerate, but the speed gained is capped so the player has limited air control
    fn air_accelerate(&mut self, wish_dir: Vector3<f32>, wish_speed: f32, accel: f32) {
        if self.pm.dead || self.water_jumping() {
            return;
        }

        let wish_spd = wish_speed.min(30.0);
        let current_speed = self.pm.velocity.dot(wish_dir);
        let add_speed = wish_spd - current_speed;
        if add_speed <= 0.0 {
            return;
        }

        let accel_speed = (accel * wish_speed * self.frame_time).min(add_speed);
        self.pm.velocity += accel_speed * wish_dir;
    }

    fn water_move(&mut self) -> Result<(), T::Error> {
        let (forward, right, _) = self.pm.angles.vectors();
        let mut wish_vel = forward * self.cmd.forward_move + right * self.cmd.side_move;

        if self.cmd.forward_move == 0.0 && self.cmd.side_move == 0.0 && self.cmd.up_move == 0.0 {
            // sink
            wish_vel.z -= 60.0;
        } else {
            wish_vel.z += self.cmd.up_move;
        }

        let (wish_dir, mut wish_speed) = normalize_or_zero(wish_vel);
        if wish_speed > self.vars.max_speed {
            wish_speed = self.vars.max_speed;
        }
        wish_speed *= 0.7;

        self.accelerate(wish_dir, wish_speed, self.vars.water_accelerate);

        // assume it is a stair or a slope, so press down from stepheight above
        let dest = self.pm.origin + self.frame_time * self.pm.velocity;
        let mut start = dest;
        start.z += STEP_SIZE + 1.0;

        let (trace, _) = self.tracer.player_move(start, dest)?;
        if !trace.start_solid() {
            self.pm.origin = trace.end_point();
            return Ok(());
        }

        self.fly_move()?;
        Ok(())
    }

    fn air_move(&mut self) -> Result<(), T::Error> {
        let (mut forward, mut right, _) = self.pm.angles.vectors();
        forward.z = 0.0;
        right.z = 0.0;
        let (forward, _) = normalize_or_zero(forward);
        let (right, _) = normalize_or_zero(right);

        let mut wish_vel = forward * self.cmd.forward_move + right * self.cmd.side_move;
        wish_vel.z = 0.0;

        let (wish_dir, mut wish_speed) = normalize_or_zero(wish_vel);
        if wish_speed > self.vars.max_speed {
            wish_speed = self.vars.max_speed;
        }

        let gravity = self.vars.ent_gravity * self.vars.gravity * self.frame_time;

        if self.pm.on_ground.is_some() {
            self.pm.velocity.z = 0.0;
            self.accelerate(wish_dir, wish_speed, self.vars.accelerate);
            self.pm.velocity.z -= gravity;
            self.ground_move()
        } else {
            self.air_accelerate(wish_dir, wish_speed, self.vars.accelerate);
            self.pm.velocity.z -= gravity;
            self.fly_move()?;
            Ok(())
        }
    }

    /// Moves a spectator, which never collides with anything.
    fn spectator_move(&mut self) {
        let speed = self.pm.velocity.magnitude();
        if speed < 1.0 {
            self.pm.velocity = Vector3::zero();
        } else {
            let friction = self.vars.friction * 1.5;
            let control = speed.max(self.vars.stop_speed);
            let drop = control * friction * self.frame_time;

            let new_speed = (speed - drop).max(0.0) / speed;
            self.pm.velocity *= new_speed;
        }

        let (forward, right, _) = self.pm.angles.vectors();
        let (forward, _) = normalize_or_zero(forward);
        let (right, _) = normalize_or_zero(right);

        let mut wish_vel = forward * self.cmd.forward_move + right * self.cmd.side_move;
        wish_vel.z += self.cmd.up_move;

        let (wish_dir, mut wish_speed) = normalize_or_zero(wish_vel);
        if wish_speed > self.vars.spectator_max_speed {
            wish_speed = self.vars.spectator_max_speed;
        }

        let current_speed = self.pm.velocity.dot(wish_dir);
        let add_speed = wish_speed - current_speed;
        if add_speed > 0.0 {
            let accel_speed = (self.vars.accelerate * self.frame_time * wish_speed).min(add_speed);
            self.pm.velocity += accel_speed * wish_dir;
        }

        self.pm.origin += self.frame_time * self.pm.velocity;
    }
}
