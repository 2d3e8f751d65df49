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

extern crate cgmath;
extern crate chrono;
extern crate clipmove;
extern crate docopt;
extern crate env_logger;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use std::process::exit;

use clipmove::{
    common::{
        bsp::{BoxMapBuilder, BspLeafContents},
        console::CvarRegistry,
        engine,
        model::Model,
        pmove::{self, Buttons, MoveCommand, MoveVars, PlayerMove, PLAYER_MAXS, PLAYER_MINS},
    },
    server::{
        self,
        world::{Entity, EntitySolid, World},
    },
};

use cgmath::{Deg, Vector3};
use docopt::Docopt;

#[derive(Deserialize)]
struct Args {
    flag_ticks: usize,
    flag_forward: f32,
    flag_yaw: f32,
    flag_frametime: f32,
    flag_gravity: Option<String>,
    flag_friction: Option<String>,
    flag_jump: bool,
    flag_h: bool,
    flag_help: bool,
    flag_version: bool,
}

const USAGE: &'static str = "
Usage: pmove-test [options]

Runs a player through a small test map and prints its state after every tick.

Options:
    --ticks=<n>          Number of commands to run. [default: 30]
    --forward=<speed>    Forward move speed. [default: 320]
    --yaw=<deg>          View yaw in degrees. [default: 0]
    --frametime=<secs>   Length of each command. [default: 0.05]
    --gravity=<g>        Override sv_gravity.
    --friction=<f>       Override sv_friction.
    --jump               Hold the jump button.

    -h, --help           Show this message and exit.
        --version        Print version information and exit.
";

const VERSION: &'static str = "
pmove-test 0.1
Copyright © 2018 Cormac O'Brien
Released under the terms of the MIT License
";

// A floor with a stair step, a wall at the far end and a pool off to the side.
fn test_map() -> Result<Model, String> {
    let bmodel = BoxMapBuilder::new()
        .add_box(
            Vector3::new(-1024.0, -1024.0, -64.0),
            Vector3::new(1024.0, 1024.0, 0.0),
            BspLeafContents::Solid,
        )
        .add_box(
            Vector3::new(128.0, -128.0, 0.0),
            Vector3::new(1024.0, 128.0, 16.0),
            BspLeafContents::Solid,
        )
        .add_box(
            Vector3::new(512.0, -1024.0, 16.0),
            Vector3::new(576.0, 1024.0, 256.0),
            BspLeafContents::Solid,
        )
        .add_box(
            Vector3::new(-512.0, 256.0, 0.0),
            Vector3::new(-128.0, 640.0, 64.0),
            BspLeafContents::Water,
        )
        .build()
        .map_err(|e| e.to_string())?;

    Ok(Model::from_brush_model("maps/test.bsp", bmodel))
}

fn setup_vars(args: &Args) -> Result<MoveVars, String> {
    let cvars = CvarRegistry::new();
    pmove::register_cvars(&cvars).map_err(|e| e.to_string())?;

    if let Some(ref g) = args.flag_gravity {
        cvars.set("sv_gravity", g.as_str()).map_err(|e| e.to_string())?;
    }

    if let Some(ref f) = args.flag_friction {
        cvars.set("sv_friction", f.as_str()).map_err(|e| e.to_string())?;
    }

    MoveVars::from_cvars(&cvars).map_err(|e| e.to_string())
}

fn run(args: &Args) -> Result<(), String> {
    let vars = setup_vars(args)?;
    info!("Movement vars: {:?}", vars);

    let mut world = World::create(vec![test_map()?]).map_err(|e| e.to_string())?;

    let mut player = Entity::new();
    player.origin = Vector3::new(0.0, 0.0, 24.0);
    player.solid = EntitySolid::SlideBox;
    player.set_min_max_size(PLAYER_MINS, PLAYER_MAXS);
    let player = world.alloc_entity(player).map_err(|e| e.to_string())?;
    world.link_entity(player).map_err(|e| e.to_string())?;

    let mut cmd = MoveCommand::idle(engine::duration_from_f32(args.flag_frametime));
    cmd.angles.yaw = Deg(args.flag_yaw);
    cmd.forward_move = args.flag_forward;
    if args.flag_jump {
        cmd.buttons.insert(Buttons::JUMP);
    }

    let mut pm = PlayerMove::new(Vector3::new(0.0, 0.0, 24.0));
    for tick in 0..args.flag_ticks {
        server::run_player_command(&mut world, player, &mut pm, &cmd, &vars, |_, other, _| {
            println!("  touched entity {}", other.0);
            Ok(())
        })
        .map_err(|e| e.to_string())?;

        println!(
            "{:3}: origin = ({:8.3}, {:8.3}, {:8.3}) velocity = ({:8.3}, {:8.3}, {:8.3}) \
             ground = {:?} water = {:?}",
            tick,
            pm.origin.x,
            pm.origin.y,
            pm.origin.z,
            pm.velocity.x,
            pm.velocity.y,
            pm.velocity.z,
            pm.on_ground,
            pm.water_level,
        );
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if args.flag_help || args.flag_h {
        println!("{}", USAGE);
        exit(0);
    }

    if args.flag_version {
        println!("{}", VERSION);
        exit(0);
    }

    if let Err(why) = run(&args) {
        println!("pmove-test failed: {}", why);
        exit(1);
    }
}
