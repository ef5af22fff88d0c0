use snake_ensemble_core::{
    AgentId, Command, ControlMode, ControlRejection, EdgePolicy, Event, GridSize, Role,
};
use snake_ensemble_world::{self as world, query, RosterEntry, SessionConfig, World};

fn id(value: u32) -> AgentId {
    AgentId::new(value)
}

fn autonomous_world(count: usize) -> World {
    let mut config = SessionConfig::empty(GridSize::new(8), EdgePolicy::Wrap);
    config.roster = Role::ALL
        .iter()
        .cycle()
        .take(count)
        .map(|role| RosterEntry::new(*role))
        .collect();
    World::new(config).expect("roster fits")
}

fn apply(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn grant(world: &mut World, agent: AgentId) -> Vec<Event> {
    apply(
        world,
        Command::SetHumanControl {
            agent,
            enabled: true,
        },
    )
}

fn control_of(world: &World, agent: AgentId) -> ControlMode {
    query::agent(world, agent).expect("agent exists").control
}

#[test]
fn third_human_grant_evicts_the_oldest_holder() {
    let mut world = autonomous_world(3);
    let _ = grant(&mut world, id(0));
    let _ = grant(&mut world, id(1));

    let events = grant(&mut world, id(2));

    assert_eq!(
        events,
        vec![
            Event::ControlChanged {
                agent: id(0),
                mode: ControlMode::Autonomous,
                evicted: true,
            },
            Event::ControlChanged {
                agent: id(2),
                mode: ControlMode::Human,
                evicted: false,
            },
        ]
    );
    assert_eq!(control_of(&world, id(0)), ControlMode::Autonomous);
    assert_eq!(control_of(&world, id(1)), ControlMode::Human);
    assert_eq!(control_of(&world, id(2)), ControlMode::Human);
    assert_eq!(query::human_control(&world), vec![id(1), id(2)]);
}

#[test]
fn evicted_agents_keep_simulating() {
    let mut world = autonomous_world(3);
    for agent in 0..3 {
        let _ = grant(&mut world, id(agent));
    }

    let events = apply(&mut world, Command::Tick);
    let evicted = events
        .iter()
        .find_map(|event| match event {
            Event::AgentTicked(tick) if tick.agent == id(0) => Some(*tick),
            _ => None,
        })
        .expect("evicted agent still ticks");

    assert_eq!(evicted.control, ControlMode::Autonomous);
    assert_eq!(query::agent_view(&world).len(), 3);
}

#[test]
fn granting_a_current_holder_changes_nothing() {
    let mut world = autonomous_world(2);
    let _ = grant(&mut world, id(0));
    let _ = grant(&mut world, id(1));

    assert!(grant(&mut world, id(0)).is_empty());
    assert_eq!(query::human_control(&world), vec![id(0), id(1)]);
}

#[test]
fn revoking_hands_the_agent_back_to_autopilot() {
    let mut world = autonomous_world(2);
    let _ = grant(&mut world, id(1));

    let events = apply(
        &mut world,
        Command::SetHumanControl {
            agent: id(1),
            enabled: false,
        },
    );

    assert_eq!(
        events,
        vec![Event::ControlChanged {
            agent: id(1),
            mode: ControlMode::Autonomous,
            evicted: false,
        }]
    );
    assert!(query::human_control(&world).is_empty());

    let repeated = apply(
        &mut world,
        Command::SetHumanControl {
            agent: id(1),
            enabled: false,
        },
    );
    assert!(repeated.is_empty(), "revoking twice is a no-op");
}

#[test]
fn removing_a_holder_purges_its_slot() {
    let mut world = autonomous_world(3);
    let _ = grant(&mut world, id(0));
    let _ = grant(&mut world, id(1));

    let events = apply(&mut world, Command::RemoveAgent { agent: id(0) });
    assert_eq!(events, vec![Event::AgentRemoved { agent: id(0) }]);
    assert_eq!(query::human_control(&world), vec![id(1)]);
    assert!(query::agent(&world, id(0)).is_none());

    let events = grant(&mut world, id(2));
    assert_eq!(events.len(), 1, "a free slot needs no eviction");

    let tick = apply(&mut world, Command::Tick);
    assert!(!tick
        .iter()
        .any(|event| matches!(event, Event::Fault { .. })));
}

#[test]
fn toggle_flips_between_modes() {
    let mut world = autonomous_world(1);

    let _ = apply(&mut world, Command::ToggleControl { agent: id(0) });
    assert_eq!(control_of(&world, id(0)), ControlMode::Human);

    let _ = apply(&mut world, Command::ToggleControl { agent: id(0) });
    assert_eq!(control_of(&world, id(0)), ControlMode::Autonomous);
    assert!(query::human_control(&world).is_empty());
}

#[test]
fn control_requests_for_unknown_agents_are_rejected() {
    let mut world = autonomous_world(1);

    for command in [
        Command::SetHumanControl {
            agent: id(7),
            enabled: true,
        },
        Command::ToggleControl { agent: id(7) },
        Command::RemoveAgent { agent: id(7) },
    ] {
        assert_eq!(
            apply(&mut world, command),
            vec![Event::ControlRejected {
                agent: id(7),
                reason: ControlRejection::UnknownAgent,
            }]
        );
    }
    assert!(query::human_control(&world).is_empty());
}

#[test]
fn identities_are_never_reused_after_removal() {
    let mut world = autonomous_world(2);
    let _ = apply(&mut world, Command::RemoveAgent { agent: id(1) });

    let events = apply(&mut world, Command::AddAgent { role: Role::Perc });

    assert!(matches!(
        events.as_slice(),
        [Event::AgentAdded { agent, role: Role::Perc, .. }] if *agent == id(2)
    ));
    let snapshot = query::agent(&world, id(2)).expect("new agent exists");
    assert_eq!(snapshot.control, ControlMode::Autonomous);
}
