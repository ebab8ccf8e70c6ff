//! Background path planning.
//!
//! Requests travel to the workers over one channel and results come back over another. The
//! simulation thread drains results once per tick and applies them itself; workers only ever
//! read an immutable grid snapshot.

use core::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::{
    a_star_search, dijkstras_nearest, Adjacency, Cell, Grid, Heuristic, PathOutcome,
    PathWorkerError, SearchOptions, Terrain,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Goal test for nearest-cell searches, evaluated on worker threads.
#[derive(Clone)]
pub struct GoalPredicate(Arc<dyn Fn(&Grid, Cell) -> bool + Send + Sync>);

impl GoalPredicate {
    pub fn new(predicate: impl Fn(&Grid, Cell) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Nearest undiscovered cell.
    pub fn fogged() -> Self {
        Self::new(|grid, cell| grid.is_fogged(cell))
    }

    pub fn terrain(terrain: Terrain) -> Self {
        Self::new(move |grid, cell| grid.terrain(cell) == terrain)
    }

    pub fn any_of(cells: impl IntoIterator<Item = Cell>) -> Self {
        let cells: Vec<Cell> = cells.into_iter().collect();
        Self::new(move |_, cell| cells.contains(&cell))
    }

    pub fn matches(&self, grid: &Grid, cell: Cell) -> bool {
        (self.0)(grid, cell)
    }
}

impl fmt::Debug for GoalPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GoalPredicate(..)")
    }
}

#[derive(Debug, Clone)]
pub enum PathGoal {
    /// Shortest path to a fixed cell.
    Cell(Cell),
    /// Cheapest path to any cell satisfying the predicate.
    Nearest(GoalPredicate),
}

#[derive(Debug, Clone)]
pub struct PathRequest {
    pub id: RequestId,
    pub origin: Cell,
    pub goal: PathGoal,
    /// Allow the search to expand undiscovered cells.
    pub through_fog: bool,
    pub grid: Arc<Grid>,
}

impl PathRequest {
    /// Run the search this request describes.
    ///
    /// Without `through_fog`, undiscovered cells are skipped, except the goal itself so that a
    /// fogged target (or the edge of the fog) stays reachable.
    pub fn execute(&self, settings: &PlannerSettings) -> PathOutcome {
        let grid = &*self.grid;
        let base = SearchOptions::new(settings.adjacency)
            .with_heuristic(settings.heuristic)
            .with_cost_multiplier(settings.cost_multiplier);

        match &self.goal {
            PathGoal::Cell(goal) => {
                let goal = *goal;
                let visible = |cell: Cell| cell == goal || !grid.is_fogged(cell);
                let options = if self.through_fog {
                    base
                } else {
                    base.with_filter(&visible)
                };
                a_star_search(grid, self.origin, goal, &options)
            }
            PathGoal::Nearest(predicate) => {
                let visible = |cell: Cell| !grid.is_fogged(cell) || predicate.matches(grid, cell);
                let options = if self.through_fog {
                    base
                } else {
                    base.with_filter(&visible)
                };
                dijkstras_nearest(grid, self.origin, |cell| predicate.matches(grid, cell), &options)
            }
        }
    }
}

/// Search parameters applied to every request a worker pool runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerSettings {
    pub adjacency: Adjacency,
    pub heuristic: Heuristic,
    pub cost_multiplier: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            adjacency: Adjacency::Eight,
            heuristic: Heuristic::Diagonal,
            cost_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub id: RequestId,
    pub outcome: PathOutcome,
}

enum Mode {
    Inline,
    Threaded {
        requests: Option<Sender<PathRequest>>,
        workers: Vec<JoinHandle<()>>,
    },
}

/// Request queue plus zero or more search threads.
///
/// With zero workers searches run inline inside [`PathWorker::submit`], but results are still
/// only observable through [`PathWorker::try_drain`], so callers see the same ordering in both
/// modes. With workers, completion order is not request order.
pub struct PathWorker {
    settings: PlannerSettings,
    mode: Mode,
    completed_tx: Sender<Completed>,
    completed_rx: Receiver<Completed>,
    next_id: u64,
    in_flight: usize,
}

impl PathWorker {
    pub fn new(worker_count: usize, settings: PlannerSettings) -> Result<Self, PathWorkerError> {
        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        if worker_count == 0 {
            return Ok(Self::with_mode(Mode::Inline, settings, completed_tx, completed_rx));
        }

        let (requests_tx, requests_rx) = crossbeam_channel::unbounded::<PathRequest>();
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let requests = requests_rx.clone();
            let completed = completed_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("gridsim-path-{index}"))
                .spawn(move || worker_loop(index, requests, completed, settings))
                .map_err(|source| PathWorkerError::Spawn { index, source })?;
            workers.push(handle);
        }
        debug!(workers = worker_count, "path workers started");

        Ok(Self::with_mode(
            Mode::Threaded {
                requests: Some(requests_tx),
                workers,
            },
            settings,
            completed_tx,
            completed_rx,
        ))
    }

    /// A pool that searches on the calling thread.
    pub fn inline(settings: PlannerSettings) -> Self {
        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        Self::with_mode(Mode::Inline, settings, completed_tx, completed_rx)
    }

    fn with_mode(
        mode: Mode,
        settings: PlannerSettings,
        completed_tx: Sender<Completed>,
        completed_rx: Receiver<Completed>,
    ) -> Self {
        Self {
            settings,
            mode,
            completed_tx,
            completed_rx,
            next_id: 0,
            in_flight: 0,
        }
    }

    pub fn settings(&self) -> PlannerSettings {
        self.settings
    }

    pub fn worker_count(&self) -> usize {
        match &self.mode {
            Mode::Inline => 0,
            Mode::Threaded { workers, .. } => workers.len(),
        }
    }

    /// Requests submitted whose results have not been drained yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Queue a search against `grid` and return immediately.
    pub fn submit(
        &mut self,
        origin: Cell,
        goal: PathGoal,
        through_fog: bool,
        grid: Arc<Grid>,
    ) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.in_flight += 1;

        let request = PathRequest {
            id,
            origin,
            goal,
            through_fog,
            grid,
        };
        trace!(request = id.0, %origin, through_fog, "path request submitted");

        let request = match &self.mode {
            Mode::Threaded {
                requests: Some(requests),
                ..
            } => match requests.send(request) {
                Ok(()) => return id,
                Err(err) => {
                    warn!(request = id.0, "path workers are gone, searching inline");
                    err.into_inner()
                }
            },
            _ => request,
        };

        let outcome = request.execute(&self.settings);
        // The receiver lives in `self`, so this cannot fail.
        let _ = self.completed_tx.send(Completed { id, outcome });
        id
    }

    /// Every result that has completed so far, without blocking.
    pub fn try_drain(&mut self) -> Vec<Completed> {
        let done: Vec<Completed> = self.completed_rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Block for the next result, up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completed> {
        if self.in_flight == 0 {
            return None;
        }
        match self.completed_rx.recv_timeout(timeout) {
            Ok(done) => {
                self.in_flight -= 1;
                Some(done)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Close the request queue and join every worker. Requests already queued are still
    /// searched; their results stay drainable.
    pub fn shutdown(&mut self) {
        let Mode::Threaded { requests, workers } = &mut self.mode else {
            return;
        };
        if requests.take().is_none() && workers.is_empty() {
            return;
        }

        let mut panicked = 0usize;
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            warn!(panicked, "path workers panicked");
        }
        debug!("path workers stopped");
    }
}

impl Drop for PathWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PathWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathWorker")
            .field("settings", &self.settings)
            .field("workers", &self.worker_count())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

fn worker_loop(
    index: usize,
    requests: Receiver<PathRequest>,
    completed: Sender<Completed>,
    settings: PlannerSettings,
) {
    for request in requests.iter() {
        let outcome = request.execute(&settings);
        trace!(
            worker = index,
            request = request.id.0,
            success = outcome.success,
            len = outcome.path.len(),
            "path search finished"
        );
        if completed
            .send(Completed {
                id: request.id,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }
}
