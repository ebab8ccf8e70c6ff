//! Demo behaviour set: explorers lifting the fog, loggers felling trees and a manager that
//! takes a daily census and puts idle hands back to work.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context as _, Result};
use gridsim_fsm::{State, StateKind};
use gridsim_nav::{Adjacency, Cell, GoalPredicate, Grid, Terrain};
use gridsim_world::{Context, Goto, MessageKind, Spawn, Telegram, World, GOTO};
use tracing::{debug, info};

use crate::config::SimConfig;

pub const EXPLORE: StateKind = StateKind("explore");
pub const LOG: StateKind = StateKind("log");
pub const IDLE: StateKind = StateKind("idle");
pub const MANAGE: StateKind = StateKind("manage");
const SURVEY: StateKind = StateKind("survey");

pub const CENSUS: MessageKind = MessageKind("census");

/// Cells around the camp where the crew starts.
const CAMP_RADIUS: u32 = 3;
const EXPLORER_SPEED: f32 = 1.5;

pub type SimWorld = World<Unit>;

#[derive(Debug, Default, Clone)]
pub struct Unit {
    pub felled: u32,
    pub revealed: usize,
    pub censuses: Vec<Census>,
}

/// Head count per activity, taken once a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Census {
    pub day: u64,
    pub exploring: usize,
    pub logging: usize,
    pub walking: usize,
    pub idle: usize,
}

/// Waits for the manager to hand out work.
pub struct Idle;

impl State<SimWorld> for Idle {
    fn kind(&self) -> StateKind {
        IDLE
    }
}

/// Heads for the nearest hidden cell, over and over, until nothing is hidden.
pub struct Explore;

impl State<SimWorld> for Explore {
    fn kind(&self) -> StateKind {
        EXPLORE
    }

    fn execute(&mut self, ctx: &mut Context<'_, Unit>, _step: f32) {
        let scout = Goto::nearest(GoalPredicate::fogged()).or_else(Box::new(Idle));
        ctx.layer_state(scout.boxed());
    }
}

/// Global state of explorers: uncovers the cells around wherever the agent stands.
pub struct Survey;

impl State<SimWorld> for Survey {
    fn kind(&self) -> StateKind {
        SURVEY
    }

    fn execute(&mut self, ctx: &mut Context<'_, Unit>, _step: f32) {
        let Some(location) = ctx.world.location(ctx.agent) else {
            return;
        };
        let revealed = ctx.world.reveal(location).len();
        if let Some(unit) = ctx.world.agent_mut(ctx.agent) {
            unit.data.revealed += revealed;
        }
    }
}

/// Walks up to a known tree, fells it and moves on to the next one.
pub struct Logger {
    chop_hours: f32,
    felling: Option<(Cell, f32)>,
}

impl Logger {
    pub fn new(chop_hours: f32) -> Self {
        Self {
            chop_hours,
            felling: None,
        }
    }
}

impl State<SimWorld> for Logger {
    fn kind(&self) -> StateKind {
        LOG
    }

    fn execute(&mut self, ctx: &mut Context<'_, Unit>, step: f32) {
        let Some(location) = ctx.world.location(ctx.agent) else {
            return;
        };

        let Some((tree, left)) = self.felling else {
            match adjacent_tree(ctx.world.grid(), location) {
                Some(tree) => self.felling = Some((tree, self.chop_hours)),
                None => {
                    let walk = Goto::nearest(GoalPredicate::new(|grid, cell| {
                        adjacent_tree(grid, cell).is_some()
                    }))
                    .or_else(Box::new(Idle));
                    ctx.layer_state(walk.boxed());
                }
            }
            return;
        };

        let left = left - step;
        if left > 0.0 {
            self.felling = Some((tree, left));
            return;
        }
        self.felling = None;

        // Someone else may have got there first.
        if ctx.world.grid().terrain(tree) != Terrain::Tree {
            return;
        }
        if ctx.world.set_tile(tree, Terrain::Stump, None).is_ok() {
            debug!(agent = ctx.agent, %tree, "tree felled");
            if let Some(unit) = ctx.world.agent_mut(ctx.agent) {
                unit.data.felled += 1;
            }
        }
    }
}

/// First discovered tree orthogonally next to `cell`.
fn adjacent_tree(grid: &Grid, cell: Cell) -> Option<Cell> {
    Adjacency::Four
        .offsets()
        .iter()
        .map(|&(dx, dy)| cell.offset(dx, dy))
        .find(|&next| grid.terrain(next) == Terrain::Tree && !grid.is_fogged(next))
}

/// Takes a census at a fixed hour each day and turns idle agents into loggers.
pub struct Manager {
    census_hour: f64,
    chop_hours: f32,
}

impl Manager {
    pub fn new(census_hour: f64, chop_hours: f32) -> Self {
        Self {
            census_hour,
            chop_hours,
        }
    }
}

impl State<SimWorld> for Manager {
    fn kind(&self) -> StateKind {
        MANAGE
    }

    fn enter(&mut self, ctx: &mut Context<'_, Unit>) {
        let census = Telegram::to(ctx.agent, ctx.agent, CENSUS);
        ctx.world.dispatch_scheduled(self.census_hour, census);
    }

    fn on_message(&mut self, ctx: &mut Context<'_, Unit>, telegram: &Telegram) -> bool {
        if !telegram.is(CENSUS) {
            return false;
        }
        let world = &mut *ctx.world;

        let census = Census {
            day: world.day(),
            exploring: world.agents_in_state(EXPLORE, None).len(),
            logging: world.agents_in_state(LOG, None).len(),
            walking: world.agents_in_state(GOTO, None).len(),
            idle: world.agents_in_state(IDLE, None).len(),
        };
        info!(
            day = census.day,
            clock = %world.format_clock(),
            exploring = census.exploring,
            logging = census.logging,
            walking = census.walking,
            idle = census.idle,
            "census"
        );

        for id in world.agents_in_state(IDLE, None) {
            world.change_state(id, Box::new(Logger::new(self.chop_hours)), true, true);
        }
        if let Some(manager) = world.agent_mut(ctx.agent) {
            manager.data.censuses.push(census);
        }

        let hours = world.config().hours_per_day;
        world.dispatch(Telegram::to(ctx.agent, ctx.agent, CENSUS), hours);
        true
    }
}

/// Ids of the agents spawned by [`populate`].
#[derive(Debug, Clone)]
pub struct Roster {
    pub camp: Cell,
    pub manager: u64,
    pub explorers: Vec<u64>,
    pub loggers: Vec<u64>,
}

/// Pitch a camp on a random free cell and spawn the crew around it.
pub fn populate(world: &mut SimWorld, config: &SimConfig) -> Result<Roster> {
    let camp = world
        .place_random("camp")
        .context("map has no free cell for the camp")?;
    world.reveal(camp);

    let manager = world.register(
        Spawn::new(
            Unit::default(),
            Box::new(Manager::new(config.census_hour, config.chop_hours)),
        )
        .at(camp),
    );

    let mut explorers = Vec::with_capacity(config.explorers);
    for _ in 0..config.explorers {
        let at = world
            .random_free_cell(Some(camp), Some(CAMP_RADIUS))
            .unwrap_or(camp);
        let spawn = Spawn::new(Unit::default(), Box::new(Explore))
            .at(at)
            .with_speed(EXPLORER_SPEED)
            .with_global(Box::new(Survey));
        explorers.push(world.register(spawn));
    }

    let mut loggers = Vec::with_capacity(config.loggers);
    for _ in 0..config.loggers {
        let at = world
            .random_free_cell(Some(camp), Some(CAMP_RADIUS))
            .unwrap_or(camp);
        let spawn = Spawn::new(Unit::default(), Box::new(Logger::new(config.chop_hours))).at(at);
        loggers.push(world.register(spawn));
    }

    debug!(%camp, agents = world.len(), "crew spawned");
    Ok(Roster {
        camp,
        manager,
        explorers,
        loggers,
    })
}

/// End-of-run report.
#[derive(Debug, Clone)]
pub struct Summary {
    pub day: u64,
    pub clock: String,
    pub states: BTreeMap<&'static str, usize>,
    pub felled: u32,
    pub revealed: usize,
    pub hidden: usize,
    pub censuses: usize,
}

impl Summary {
    pub fn collect(world: &SimWorld) -> Self {
        let mut states = BTreeMap::new();
        for id in world.agent_ids() {
            if let Some(kind) = world.state_of(id) {
                *states.entry(kind.name()).or_insert(0) += 1;
            }
        }
        let grid = world.grid();
        Self {
            day: world.day(),
            clock: world.format_clock(),
            states,
            felled: world.agents().map(|agent| agent.data.felled).sum(),
            revealed: world.agents().map(|agent| agent.data.revealed).sum(),
            hidden: grid.cells().filter(|&cell| grid.is_fogged(cell)).count(),
            censuses: world.agents().map(|agent| agent.data.censuses.len()).sum(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation summary")?;
        writeln!(f, "==================")?;
        writeln!(f, "Day {}, {}", self.day, self.clock)?;
        writeln!(f)?;
        writeln!(f, "Agents by state:")?;
        for (state, count) in &self.states {
            writeln!(f, "  {state:<10} {count}")?;
        }
        writeln!(f)?;
        writeln!(f, "Trees felled:   {}", self.felled)?;
        writeln!(f, "Cells revealed: {}", self.revealed)?;
        writeln!(f, "Cells hidden:   {}", self.hidden)?;
        write!(f, "Censuses taken: {}", self.censuses)
    }
}
