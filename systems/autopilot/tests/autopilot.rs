use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use snake_ensemble_core::{
    AgentId, AgentView, Command, Direction, EdgePolicy, Event, GridPosition, GridSize, Role,
};
use snake_ensemble_system_autopilot::{
    Autopilot, DeadlineDecisions, Decision, DecisionContext, DecisionError, DecisionSource,
    GreedyHeuristic,
};
use snake_ensemble_world::{self as world, query, RosterEntry, SessionConfig, World};

fn world_with(entries: Vec<RosterEntry>, policy: EdgePolicy) -> World {
    let mut config = SessionConfig::empty(GridSize::new(8), policy);
    config.roster = entries;
    World::new(config).expect("roster fits")
}

fn step<S>(world: &mut World, autopilot: &mut Autopilot, source: &mut S) -> Vec<Event>
where
    S: DecisionSource + ?Sized,
{
    let mut commands = Vec::new();
    autopilot.plan(
        &query::agent_view(world),
        query::grid_size(world),
        query::edge_policy(world),
        source,
        &mut commands,
    );

    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    world::apply(world, Command::Tick, &mut events);
    events
}

#[test]
fn greedy_heuristic_reaches_a_target_on_an_empty_grid() {
    let mut world = world_with(
        vec![RosterEntry::new(Role::Bass)
            .with_body([GridPosition::new(1, 1)])
            .with_heading(Direction::Right)
            .with_target(GridPosition::new(6, 4))],
        EdgePolicy::Lethal,
    );
    let mut autopilot = Autopilot::new();
    let mut source = GreedyHeuristic::new();

    let grew = (0..8).any(|_| {
        step(&mut world, &mut autopilot, &mut source)
            .iter()
            .any(|event| matches!(event, Event::AgentTicked(tick) if tick.grew))
    });

    assert!(grew, "the target is eight moves away");
    assert_eq!(query::agent(&world, AgentId::new(0)).map(|a| a.body.len()), Some(2));
}

#[test]
fn human_agents_are_never_steered() {
    let mut world = world_with(
        vec![RosterEntry::new(Role::Lead)
            .with_body([GridPosition::new(3, 3)])
            .with_heading(Direction::Right)
            .with_target(GridPosition::new(3, 0))
            .human()],
        EdgePolicy::Wrap,
    );
    let mut autopilot = Autopilot::new();

    let _ = step(&mut world, &mut autopilot, &mut GreedyHeuristic::new());

    assert_eq!(autopilot.last_stats().consulted, 0);
    let agent = query::agent(&world, AgentId::new(0)).expect("agent exists");
    assert_eq!(agent.head(), GridPosition::new(4, 3), "keeps the human heading");
}

#[test]
fn failing_sources_let_agents_continue_straight() {
    struct Broken;

    impl DecisionSource for Broken {
        fn decide(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
            Err(DecisionError::Failed("model missing".into()))
        }
    }

    let mut world = world_with(
        vec![RosterEntry::new(Role::Pad)
            .with_body([GridPosition::new(2, 5)])
            .with_heading(Direction::Up)
            .with_target(GridPosition::new(7, 7))],
        EdgePolicy::Wrap,
    );
    let mut autopilot = Autopilot::new();
    let mut source: Box<dyn DecisionSource> = Box::new(Broken);

    let events = step(&mut world, &mut autopilot, &mut source);

    assert_eq!(autopilot.last_stats().failures, 1);
    let moved_straight = events.iter().any(|event| {
        matches!(event, Event::AgentTicked(tick) if tick.head == GridPosition::new(2, 4))
    });
    assert!(moved_straight);
}

struct Slow {
    delay: Duration,
    answer: Direction,
}

impl DecisionSource for Slow {
    fn decide(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
        thread::sleep(self.delay);
        Ok(Decision::Turn(self.answer))
    }
}

fn sample_view() -> AgentView {
    let world = world_with(
        vec![RosterEntry::new(Role::Perc)
            .with_body([GridPosition::new(4, 4)])
            .with_heading(Direction::Left)
            .with_target(GridPosition::new(0, 0))],
        EdgePolicy::Wrap,
    );
    query::agent_view(&world)
}

#[test]
fn deadline_wrapper_forwards_timely_answers() {
    let view = sample_view();
    let agent = view.iter().next().expect("one agent");
    let ctx = DecisionContext {
        agent,
        target: agent.target,
        agents: &view,
        grid_size: GridSize::new(8),
        edge_policy: EdgePolicy::Wrap,
    };
    let mut source = DeadlineDecisions::spawn(GreedyHeuristic::new(), Duration::from_secs(5));

    assert_eq!(source.decide(&ctx), Ok(Decision::Turn(Direction::Up)));
}

#[test]
fn deadline_wrapper_times_out_and_discards_late_answers() {
    let view = sample_view();
    let agent = view.iter().next().expect("one agent");
    let ctx = DecisionContext {
        agent,
        target: agent.target,
        agents: &view,
        grid_size: GridSize::new(8),
        edge_policy: EdgePolicy::Wrap,
    };
    let mut source = DeadlineDecisions::spawn(
        Slow {
            delay: Duration::from_millis(150),
            answer: Direction::Down,
        },
        Duration::from_millis(10),
    );

    assert_eq!(
        source.decide(&ctx),
        Err(DecisionError::TimedOut { budget_ms: 10 })
    );

    // the first answer has landed by now and is dropped before the next request
    thread::sleep(Duration::from_millis(200));
    assert_eq!(
        source.decide(&ctx),
        Err(DecisionError::TimedOut { budget_ms: 10 })
    );
}

struct SlowFirst {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl DecisionSource for SlowFirst {
    fn decide(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            thread::sleep(self.delay);
        }
        Ok(Decision::Turn(Direction::Up))
    }
}

#[test]
fn deadline_wrapper_never_queues_behind_a_busy_worker() {
    let view = sample_view();
    let agent = view.iter().next().expect("one agent");
    let ctx = DecisionContext {
        agent,
        target: agent.target,
        agents: &view,
        grid_size: GridSize::new(8),
        edge_policy: EdgePolicy::Wrap,
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let mut source = DeadlineDecisions::spawn(
        SlowFirst {
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(200),
        },
        Duration::from_millis(50),
    );

    for _ in 0..10 {
        assert_eq!(
            source.decide(&ctx),
            Err(DecisionError::TimedOut { budget_ms: 50 })
        );
    }

    thread::sleep(Duration::from_millis(400));
    assert_eq!(source.decide(&ctx), Ok(Decision::Turn(Direction::Up)));
    assert_eq!(calls.load(Ordering::SeqCst), 2, "busy calls never reach the worker");
}

#[test]
fn dropping_the_deadline_wrapper_does_not_wait_for_a_busy_worker() {
    let view = sample_view();
    let agent = view.iter().next().expect("one agent");
    let ctx = DecisionContext {
        agent,
        target: agent.target,
        agents: &view,
        grid_size: GridSize::new(8),
        edge_policy: EdgePolicy::Wrap,
    };
    let mut source = DeadlineDecisions::spawn(
        Slow {
            delay: Duration::from_millis(500),
            answer: Direction::Down,
        },
        Duration::from_millis(5),
    );
    assert!(source.decide(&ctx).is_err());

    let started = Instant::now();
    drop(source);

    assert!(started.elapsed() < Duration::from_millis(250));
}
