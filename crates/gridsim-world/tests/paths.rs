use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gridsim_fsm::{State, StateKind};
use gridsim_nav::{Cell, GoalPredicate, Grid, PathOutcome, Terrain};
use gridsim_world::{
    Context, Goto, PathReply, Spawn, Telegram, World, WorldConfig, ARRIVAL, GOTO, PATH_FAILED,
    PATH_READY,
};

const IDLE: StateKind = StateKind("idle");
const CELEBRATE: StateKind = StateKind("celebrate");
const TIMEOUT: Duration = Duration::from_secs(10);

/// Kinds of telegrams received, plus the tickets of any path replies.
#[derive(Debug, Default, Clone)]
struct Log {
    kinds: Vec<&'static str>,
    tickets: Vec<u64>,
    arrivals: Vec<Cell>,
}

struct Idle;

impl State<World<Log>> for Idle {
    fn kind(&self) -> StateKind {
        IDLE
    }

    fn on_message(&mut self, ctx: &mut Context<'_, Log>, telegram: &Telegram) -> bool {
        let Some(agent) = ctx.world.agent_mut(ctx.agent) else {
            return false;
        };
        agent.data.kinds.push(telegram.kind.0);
        if let Some(reply) = telegram.payload::<PathReply>() {
            agent.data.tickets.push(reply.ticket.0);
        }
        if telegram.is(ARRIVAL) {
            if let Some(&cell) = telegram.payload::<Cell>() {
                agent.data.arrivals.push(cell);
            }
        }
        true
    }
}

struct Celebrate;

impl State<World<Log>> for Celebrate {
    fn kind(&self) -> StateKind {
        CELEBRATE
    }
}

fn world_with(grid: Grid, workers: usize) -> World<Log> {
    World::new(
        grid,
        WorldConfig {
            path_workers: workers,
            ..WorldConfig::default()
        },
    )
    .unwrap()
}

fn spawn_idle(world: &mut World<Log>, at: Cell) -> u64 {
    world.register(Spawn::new(Log::default(), Box::new(Idle)).at(at))
}

fn log(world: &World<Log>, id: u64) -> Log {
    world.agent(id).unwrap().data.clone()
}

#[test]
fn goto_walks_then_resumes_interrupted_state() {
    let mut world = world_with(Grid::new(6, 1).unwrap(), 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));
    let watcher = spawn_idle(&mut world, Cell::new(5, 0));

    world.change_state(walker, Goto::to(Cell::new(3, 0)).boxed(), false, true);
    assert_eq!(world.state_of(walker), Some(GOTO));

    world.tick(1.0);
    assert_eq!(world.location(walker), Some(Cell::new(1, 0)));
    world.tick(1.0);
    assert_eq!(world.location(walker), Some(Cell::new(2, 0)));
    world.tick(1.0);

    assert_eq!(world.location(walker), Some(Cell::new(3, 0)));
    assert_eq!(world.state_of(walker), Some(IDLE));
    assert_eq!(log(&world, watcher).arrivals, vec![Cell::new(3, 0)]);
    assert_eq!(log(&world, walker).kinds, Vec::<&str>::new());
}

#[test]
fn goto_failure_reverts_and_broadcasts() {
    let mut grid = Grid::new(5, 5).unwrap();
    for y in 0..5 {
        grid.set_tile(Cell::new(2, y), Terrain::Rock, None).unwrap();
    }
    let mut world = world_with(grid, 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));
    let watcher = spawn_idle(&mut world, Cell::new(0, 4));

    world.change_state(walker, Goto::to(Cell::new(4, 4)).boxed(), false, true);
    world.tick(1.0);

    assert_eq!(world.state_of(walker), Some(IDLE));
    assert_eq!(world.location(walker), Some(Cell::new(0, 0)));
    assert_eq!(log(&world, watcher).kinds, vec!["path_failed"]);
    assert_eq!(PATH_FAILED.0, "path_failed");
}

#[test]
fn goto_failure_state_replaces_revert() {
    let mut grid = Grid::new(3, 1).unwrap();
    grid.set_tile(Cell::new(1, 0), Terrain::Water, None).unwrap();
    let mut world = world_with(grid, 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));

    let goto = Goto::to(Cell::new(2, 0)).or_else(Box::new(Celebrate));
    world.change_state(walker, goto.boxed(), false, true);
    world.tick(1.0);

    assert_eq!(world.state_of(walker), Some(CELEBRATE));
}

#[test]
fn goto_follow_up_state_runs_on_arrival() {
    let mut world = world_with(Grid::new(3, 3).unwrap(), 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));

    let goto = Goto::along(vec![Cell::new(0, 0), Cell::new(1, 1)]).then(Box::new(Celebrate));
    world.change_state(walker, goto.boxed(), true, true);
    world.tick(1.0);

    assert_eq!(world.location(walker), Some(Cell::new(1, 1)));
    assert_eq!(world.state_of(walker), Some(CELEBRATE));
}

#[test]
fn heavy_terrain_slows_walking() {
    let mut grid = Grid::new(3, 1).unwrap();
    grid.set_tile(Cell::new(1, 0), Terrain::Swamp, None).unwrap();
    let mut world = world_with(grid, 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));

    let route = vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0)];
    world.change_state(walker, Goto::along(route).boxed(), false, true);

    world.tick(1.0);
    assert_eq!(world.location(walker), Some(Cell::new(1, 0)));
    world.tick(1.0);
    assert_eq!(world.location(walker), Some(Cell::new(1, 0)));
    world.tick(1.0);
    assert_eq!(world.location(walker), Some(Cell::new(2, 0)));
    assert_eq!(world.state_of(walker), Some(IDLE));
}

#[test]
fn long_steps_charge_each_cell_its_own_weight() {
    let mut grid = Grid::new(5, 1).unwrap();
    grid.set_tile(Cell::new(1, 0), Terrain::Swamp, None).unwrap();
    let mut world = world_with(grid, 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));

    let route = (0..5).map(|x| Cell::new(x, 0)).collect();
    world.change_state(walker, Goto::along(route).boxed(), false, true);

    // One unit leaves the ground cell, the second is half of the swamp.
    world.tick(2.0);
    assert_eq!(world.location(walker), Some(Cell::new(1, 0)));
    // One unit finishes the swamp, two more cross ground.
    world.tick(3.0);
    assert_eq!(world.location(walker), Some(Cell::new(4, 0)));
    assert_eq!(world.state_of(walker), Some(IDLE));
}

#[test]
fn blocked_route_aborts_mid_walk() {
    let mut world = world_with(Grid::new(4, 1).unwrap(), 0);
    let walker = spawn_idle(&mut world, Cell::new(0, 0));
    let route = vec![Cell::new(1, 0), Cell::new(2, 0), Cell::new(3, 0)];
    world.change_state(walker, Goto::along(route).boxed(), false, true);

    world.tick(1.0);
    world.set_tile(Cell::new(2, 0), Terrain::Rock, None).unwrap();
    world.tick(1.0);

    assert_eq!(world.location(walker), Some(Cell::new(1, 0)));
    assert_eq!(world.state_of(walker), Some(IDLE));
}

#[test]
fn path_results_reach_the_requesting_agent() {
    let mut world = world_with(Grid::new(4, 4).unwrap(), 0);
    let agent = spawn_idle(&mut world, Cell::new(0, 0));

    let ticket = world.request_path(agent, Cell::new(3, 3), false).unwrap();
    assert_eq!(world.pending_paths(), 1);
    assert!(log(&world, agent).kinds.is_empty());

    world.tick(1.0);

    let log = log(&world, agent);
    assert_eq!(log.kinds, vec![PATH_READY.0]);
    assert_eq!(log.tickets, vec![ticket.0]);
    assert_eq!(world.pending_paths(), 0);
}

#[test]
fn unknown_agent_cannot_request_a_path() {
    let mut world = world_with(Grid::new(4, 4).unwrap(), 0);
    assert!(world.request_path(5, Cell::new(1, 1), false).is_none());
    assert!(world
        .request_path_nearest(5, GoalPredicate::fogged(), false)
        .is_none());
}

#[test]
fn cancelled_requests_are_discarded() {
    let mut world = world_with(Grid::new(4, 4).unwrap(), 0);
    let agent = spawn_idle(&mut world, Cell::new(0, 0));

    world.request_path(agent, Cell::new(3, 3), false).unwrap();
    world.cancel_paths(agent);
    let fresh = world.request_path(agent, Cell::new(2, 2), false).unwrap();
    assert_eq!(world.settle_paths(TIMEOUT), 2);

    assert_eq!(log(&world, agent).tickets, vec![fresh.0]);
}

#[test]
fn cancelling_one_ticket_keeps_the_others() {
    let mut world = world_with(Grid::new(4, 4).unwrap(), 0);
    let agent = spawn_idle(&mut world, Cell::new(0, 0));

    let dropped = world.request_path(agent, Cell::new(3, 3), false).unwrap();
    let kept = world.request_path(agent, Cell::new(2, 2), false).unwrap();
    assert!(world.cancel_path(dropped));
    assert_eq!(world.settle_paths(TIMEOUT), 2);

    assert_eq!(log(&world, agent).tickets, vec![kept.0]);
    assert!(!world.cancel_path(kept));
}

#[test]
fn abandoned_goto_leaves_earlier_requests_alone() {
    let mut world = world_with(Grid::new(4, 4).unwrap(), 0);
    let agent = spawn_idle(&mut world, Cell::new(0, 0));

    let own = world.request_path(agent, Cell::new(3, 3), false).unwrap();
    world.change_state(agent, Goto::to(Cell::new(2, 0)).boxed(), false, true);
    world.change_state(agent, Box::new(Idle), true, false);
    assert_eq!(world.pending_paths(), 2);
    assert_eq!(world.settle_paths(TIMEOUT), 2);

    let log = log(&world, agent);
    assert_eq!(log.tickets, vec![own.0]);
    assert_eq!(log.kinds, vec![PATH_READY.0]);
}

#[test]
fn callbacks_run_with_worker_threads() {
    let mut world = world_with(Grid::new(16, 16).unwrap(), 2);
    let results: Rc<RefCell<Vec<PathOutcome>>> = Rc::default();

    for goal in [Cell::new(15, 15), Cell::new(0, 15), Cell::new(15, 0)] {
        let results = results.clone();
        world.path(Cell::new(0, 0), goal, true, move |_, outcome| {
            results.borrow_mut().push(outcome);
        });
    }
    assert_eq!(world.settle_paths(TIMEOUT), 3);

    let results = results.borrow();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|outcome| outcome.success));
}

#[test]
fn callbacks_can_mutate_the_world() {
    let mut grid = Grid::new(5, 1).unwrap();
    grid.set_tile(Cell::new(4, 0), Terrain::Tree, None).unwrap();
    let mut world = world_with(grid, 0);

    let next_to_tree =
        GoalPredicate::new(|grid, cell| grid.terrain(cell.offset(1, 0)) == Terrain::Tree);
    world.path_nearest(Cell::new(0, 0), next_to_tree, false, |world, outcome| {
        let cell = outcome.goal().unwrap();
        world.set_tile(cell.offset(1, 0), Terrain::Stump, None).unwrap();
    });
    world.tick(1.0);

    assert_eq!(world.grid().terrain(Cell::new(4, 0)), Terrain::Stump);
}

#[test]
fn fog_hides_cells_until_revealed() {
    let world_config = WorldConfig {
        fog: true,
        reveal_radius: 1,
        path_workers: 0,
        ..WorldConfig::default()
    };
    let mut world: World<Log> = World::new(Grid::new(6, 6).unwrap(), world_config).unwrap();
    assert!(world.is_fogged(Cell::new(2, 2)));

    let revealed = world.reveal(Cell::new(2, 2));
    assert_eq!(revealed.len(), 9);
    assert!(!world.is_fogged(Cell::new(3, 3)));
    assert!(world.reveal(Cell::new(2, 2)).is_empty());

    world.set_fog(Cell::new(3, 3), true).unwrap();
    assert!(world.is_fogged(Cell::new(3, 3)));
}

#[test]
fn goto_respects_fog_unless_allowed() {
    let world_config = WorldConfig {
        fog: true,
        path_workers: 0,
        ..WorldConfig::default()
    };
    let mut world: World<Log> = World::new(Grid::new(6, 1).unwrap(), world_config).unwrap();
    let cautious = spawn_idle(&mut world, Cell::new(0, 0));
    let bold = spawn_idle(&mut world, Cell::new(0, 0));

    world.change_state(cautious, Goto::to(Cell::new(5, 0)).boxed(), false, true);
    world.change_state(
        bold,
        Goto::to(Cell::new(5, 0)).through_fog(true).boxed(),
        false,
        true,
    );
    world.tick(1.0);

    assert_eq!(world.state_of(cautious), Some(IDLE));
    assert_eq!(world.location(cautious), Some(Cell::new(0, 0)));
    assert_eq!(world.state_of(bold), Some(GOTO));
    assert_eq!(world.location(bold), Some(Cell::new(1, 0)));
}

#[test]
fn nearest_goto_heads_for_the_fog_edge() {
    let world_config = WorldConfig {
        fog: true,
        reveal_radius: 1,
        path_workers: 0,
        ..WorldConfig::default()
    };
    let mut world: World<Log> = World::new(Grid::new(8, 1).unwrap(), world_config).unwrap();
    world.reveal(Cell::new(1, 0));
    let scout = spawn_idle(&mut world, Cell::new(0, 0));

    world.change_state(scout, Goto::nearest(GoalPredicate::fogged()).boxed(), false, true);
    world.tick(1.0);
    world.tick(1.0);
    world.tick(1.0);

    assert_eq!(world.location(scout), Some(Cell::new(3, 0)));
    assert_eq!(world.state_of(scout), Some(IDLE));
}
