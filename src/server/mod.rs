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

pub mod world;

use crate::common::{
    pmove::{MoveCommand, MoveVars, PlayerMove},
    EntityId,
};

use self::world::{EntityFlags, World, WorldError};

/// Runs one movement command for the player entity `player`.
///
/// The entity's position and velocity are loaded into `pm`, moved against everything near the
/// player and written back. The player is then relinked, calling `touch(world, other, player)`
/// for each trigger it overlaps and then once for each entity with a touch behavior that it ran
/// into. Spectators are relinked without touching anything.
pub fn run_player_command<F>(
    world: &mut World,
    player: EntityId,
    pm: &mut PlayerMove,
    cmd: &MoveCommand,
    vars: &MoveVars,
    mut touch: F,
) -> Result<(), WorldError>
where
    F: FnMut(&mut World, EntityId, EntityId) -> Result<(), WorldError>,
{
    {
        let ent = world.entity(player)?;
        pm.origin = ent.origin;
        pm.velocity = ent.velocity;
    }

    {
        let physents = world.add_links_to_pmove(player)?;
        debug!(
            "Moving player {} against {} obstacles",
            player.0,
            physents.len()
        );
        pm.run(cmd, vars, &physents)?;
    }

    {
        let ent = world.entity_mut(player)?;
        ent.origin = pm.origin;
        ent.velocity = pm.velocity;
        ent.flags.set(EntityFlags::ON_GROUND, pm.on_ground.is_some());
    }

    if pm.spectator {
        return world.link_entity(player);
    }

    world.link_entity_touching(player, &mut touch)?;

    let mut seen = Vec::new();
    for &other in pm.touched() {
        if seen.contains(&other) {
            continue;
        }
        seen.push(other);

        // an earlier touch may have removed it
        if !world.entity_exists(other) || !world.entity(other)?.has_touch {
            continue;
        }

        touch(world, other, player)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{
        bsp::{BoxMapBuilder, BspLeafContents},
        model::Model,
        pmove::{PLAYER_MAXS, PLAYER_MINS},
    };
    use crate::server::world::{Entity, EntitySolid};

    use cgmath::Vector3;
    use chrono::Duration;

    fn world() -> World {
        let floor = BoxMapBuilder::new()
            .add_box(
                Vector3::new(-512.0, -512.0, -64.0),
                Vector3::new(512.0, 512.0, 0.0),
                BspLeafContents::Solid,
            )
            .build()
            .unwrap();

        World::create(vec![Model::from_brush_model("maps/floor.bsp", floor)]).unwrap()
    }

    fn spawn_player(world: &mut World, origin: Vector3<f32>) -> EntityId {
        let mut ent = Entity::new();
        ent.origin = origin;
        ent.solid = EntitySolid::SlideBox;
        ent.set_min_max_size(PLAYER_MINS, PLAYER_MAXS);

        let e_id = world.alloc_entity(ent).unwrap();
        world.link_entity(e_id).unwrap();
        e_id
    }

    fn spawn_trigger(world: &mut World, origin: Vector3<f32>) -> EntityId {
        let mut ent = Entity::new();
        ent.origin = origin;
        ent.solid = EntitySolid::Trigger;
        ent.has_touch = true;
        ent.set_min_max_size(
            Vector3::new(-32.0, -32.0, -32.0),
            Vector3::new(32.0, 32.0, 32.0),
        );

        let e_id = world.alloc_entity(ent).unwrap();
        world.link_entity(e_id).unwrap();
        e_id
    }

    fn tick() -> MoveCommand {
        MoveCommand::idle(Duration::milliseconds(100))
    }

    #[test]
    fn test_walk_into_trigger() {
        let mut world = world();
        let vars = MoveVars::default();
        let player = spawn_player(&mut world, Vector3::new(0.0, 0.0, 24.0));
        let trigger = spawn_trigger(&mut world, Vector3::new(60.0, 0.0, 24.0));

        let mut pm = PlayerMove::new(Vector3::new(0.0, 0.0, 24.0));
        let mut cmd = tick();
        cmd.forward_move = 200.0;

        let mut touched = Vec::new();
        run_player_command(&mut world, player, &mut pm, &cmd, &vars, |_, other, e| {
            touched.push((other, e));
            Ok(())
        })
        .unwrap();

        assert_eq!(touched, vec![(trigger, player)]);

        let ent = world.entity(player).unwrap();
        assert!((ent.origin.x - 20.0).abs() < 1e-3, "{:?}", ent.origin);
        assert!((ent.velocity.x - 200.0).abs() < 1e-3);
        assert!(ent.flags.contains(EntityFlags::ON_GROUND));
        assert!(ent.abs_max().x > 36.0);
    }

    #[test]
    fn test_touch_standing_entity_once() {
        let mut world = world();
        let vars = MoveVars::default();

        let mut pad = Entity::new();
        pad.origin = Vector3::new(0.0, 0.0, 8.0);
        pad.solid = EntitySolid::BBox;
        pad.has_touch = true;
        pad.set_min_max_size(
            Vector3::new(-32.0, -32.0, -8.0),
            Vector3::new(32.0, 32.0, 0.0),
        );
        let pad = world.alloc_entity(pad).unwrap();
        world.link_entity(pad).unwrap();

        let player = spawn_player(&mut world, Vector3::new(0.0, 0.0, 32.0));
        let mut pm = PlayerMove::new(Vector3::new(0.0, 0.0, 32.0));

        let mut touched = Vec::new();
        run_player_command(&mut world, player, &mut pm, &tick(), &vars, |_, other, e| {
            touched.push((other, e));
            Ok(())
        })
        .unwrap();

        assert_eq!(pm.on_ground, Some(pad));
        assert_eq!(touched, vec![(pad, player)]);
        assert!((world.entity(player).unwrap().origin.z - 32.0).abs() < 1e-3);
    }

    #[test]
    fn test_spectator_touches_nothing() {
        let mut world = world();
        let vars = MoveVars::default();
        let player = spawn_player(&mut world, Vector3::new(0.0, 0.0, 24.0));
        spawn_trigger(&mut world, Vector3::new(0.0, 0.0, 24.0));

        let mut pm = PlayerMove::new(Vector3::new(0.0, 0.0, 24.0));
        pm.spectator = true;

        let mut touched = Vec::new();
        run_player_command(&mut world, player, &mut pm, &tick(), &vars, |_, other, _| {
            touched.push(other);
            Ok(())
        })
        .unwrap();

        assert!(touched.is_empty());
        assert_eq!(world.entity_area(player).unwrap(), Some(0));
    }
}
