mod common;

use common::{agent_with, neutral_agent, say, tick, FakeWorld, StepRouter};
use contracts::{
    AgentAction, AgentConfig, Location, ObjectiveKind, ObstacleKind, Phase, TickOutput,
    TrustBelief, TrustMode,
};

const CRITICAL: &str = "critically injured man";
const MILD: &str = "mildly injured woman";

/// Agent standing two tiles south of the doormat of `area 1`, with a second
/// room far to the east so skipping one room never triggers a global re-search.
fn two_room_world() -> FakeWorld {
    FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_room(2, 20, 0)
        .with_drop_zone(CRITICAL, Location::new(10, 10))
}

fn run(
    agent: &mut rescue_core::RescueAgent,
    world: &mut FakeWorld,
    router: &mut StepRouter,
    ticks: u64,
) -> Vec<TickOutput> {
    (0..ticks).map(|_| tick(agent, world, router, &[])).collect()
}

fn sent(outputs: &[TickOutput], needle: &str) -> usize {
    outputs
        .iter()
        .flat_map(|output| output.status_messages())
        .filter(|content| content.contains(needle))
        .count()
}

#[test]
fn search_then_found_is_consistent_and_raises_willingness() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(0, 0));
    let mut router = StepRouter::default();

    tick(&mut agent, &mut world, &mut router, &[say("Search: 3")]);
    let output = tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Found: critically injured man in area 3")],
    );

    assert!(output.belief.willingness > 0.06);
    let record = agent
        .state()
        .ledger
        .victim(CRITICAL)
        .expect("victim recorded");
    assert_eq!(record.room, "area 3");
    assert!(!record.is_located());
    assert!(agent.state().ledger.is_searched("area 3"));
}

#[test]
fn found_in_unannounced_area_lowers_willingness() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(0, 0));
    let mut router = StepRouter::default();

    let output = tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Found: mildly injured boy in area 5")],
    );

    assert!((output.belief.willingness + 0.08).abs() < 1e-9);
    assert!(agent
        .state()
        .ledger
        .is_discovered("mildly injured boy"));
}

#[test]
fn messages_from_other_senders_are_ignored() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(0, 0));
    let mut router = StepRouter::default();

    let stranger = contracts::InboundMessage::new("RescueBot", "Search: 2");
    let output = tick(&mut agent, &mut world, &mut router, &[stranger]);

    assert_eq!(output.belief, TrustBelief::default());
    assert!(!agent.state().ledger.is_searched("area 2"));
}

#[test]
fn all_areas_searched_with_missing_victims_fires_once() {
    let build = |zones: usize| {
        let mut world = FakeWorld::new(Location::new(0, 40));
        for index in 0..14 {
            world = world.with_room(index + 1, i64::from(index) * 5, 0);
        }
        for zone in 0..zones {
            world = world.with_drop_zone(
                &format!("critically injured man {zone}"),
                Location::new(zone as i64, 30),
            );
        }
        // Keeps the agent in its greeting phase.
        world.teammate = Some(Location::new(0, 41));
        world
    };
    let searches: Vec<_> = (1..=14).map(|area| say(&format!("Search: {area}"))).collect();

    let mut reference = neutral_agent();
    let mut quiet = build(0);
    let mut router = StepRouter::default();
    let expected = tick(&mut reference, &mut quiet, &mut router, &searches)
        .belief
        .willingness;

    let mut agent = neutral_agent();
    let mut world = build(8);
    let mut router = StepRouter::default();
    let first = tick(&mut agent, &mut world, &mut router, &searches);
    assert!(first.belief.willingness < expected - 0.2);
    assert_eq!(first.phase, Phase::Intro);

    for output in run(&mut agent, &mut world, &mut router, 5) {
        assert_eq!(output.belief, first.belief);
    }
}

#[test]
fn never_trust_pins_the_belief() {
    let config = AgentConfig {
        trust_mode: TrustMode::NeverTrust,
        ..AgentConfig::default()
    };
    let mut agent = agent_with(config, TrustBelief::new(0.4, 0.4));
    let mut world = FakeWorld::new(Location::new(0, 0));
    let mut router = StepRouter::default();
    let pinned = TrustBelief::new(-1.0, -1.0);

    let inboxes = [
        vec![say("Found: critically injured man in 4")],
        vec![say("Collect: mildly injured cat in 6")],
        vec![say("Continue")],
        vec![],
    ];
    for inbox in &inboxes {
        let output = tick(&mut agent, &mut world, &mut router, inbox);
        assert_eq!(output.belief, pinned);
    }
    assert!(agent.state().ledger.is_discovered("critically injured man"));
}

#[test]
fn waiting_on_a_rock_is_idempotent_until_the_timeout() {
    let mut agent = neutral_agent();
    let mut world = two_room_world().block_door(1, ObstacleKind::Rock);
    let mut router = StepRouter::default();

    let approach = run(&mut agent, &mut world, &mut router, 3);
    assert_eq!(approach[2].phase, Phase::RemoveObstacleIfNeeded);
    let ledger = serde_json::to_value(&agent.state().ledger).expect("ledger serializes");
    let belief = agent.belief();

    let waiting = run(&mut agent, &mut world, &mut router, 160);
    for output in &waiting {
        assert_eq!(output.phase, Phase::RemoveObstacleIfNeeded);
        assert_eq!(output.action, None);
        assert_eq!(output.belief, belief);
    }
    assert_eq!(
        serde_json::to_value(&agent.state().ledger).expect("ledger serializes"),
        ledger
    );
    let all: Vec<_> = approach.iter().chain(&waiting).cloned().collect();
    assert_eq!(sent(&all, "Found rock blocking area 1"), 1);

    // Asked at tick 2 with a 160-tick timeout; tick 163 is the first overrun.
    let overrun = tick(&mut agent, &mut world, &mut router, &[]);
    assert_eq!(overrun.tick, 163);
    assert!((overrun.belief.competence + 0.2).abs() < 1e-9);
    assert!(agent.state().ledger.is_skipped("area 1"));
    assert_eq!(agent.state().door.as_ref().map(|door| door.room.as_str()), Some("area 2"));
}

#[test]
fn stones_removed_alone_after_joint_wait_times_out() {
    let mut agent = neutral_agent();
    let mut world = two_room_world().block_door(1, ObstacleKind::Stones);
    let mut router = StepRouter::default();

    let mut outputs = run(&mut agent, &mut world, &mut router, 5);
    outputs.push(tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Remove together")],
    ));
    outputs.extend(run(&mut agent, &mut world, &mut router, 150));

    let removal = outputs
        .iter()
        .find(|output| matches!(output.action, Some(AgentAction::RemoveObject { .. })))
        .expect("stones eventually removed");
    assert_eq!(removal.tick, 146);
    assert!((removal.belief.competence + 0.2).abs() < 1e-9);
    assert_eq!(
        removal.action,
        Some(AgentAction::RemoveObject {
            object_id: "stones_1".to_string()
        })
    );
    assert_eq!(sent(&outputs, "Please come to area 1 to remove stones together."), 1);
    assert_eq!(sent(&outputs, "because you took too long to come"), 1);
}

#[test]
fn remove_alone_reply_clears_stones_immediately() {
    let mut agent = neutral_agent();
    let mut world = two_room_world().block_door(1, ObstacleKind::Stones);
    let mut router = StepRouter::default();

    run(&mut agent, &mut world, &mut router, 3);
    let output = tick(&mut agent, &mut world, &mut router, &[say("Remove alone")]);

    assert_eq!(
        output.action,
        Some(AgentAction::RemoveObject {
            object_id: "stones_1".to_string()
        })
    );
    assert_eq!(output.phase, Phase::EnterRoom);
    assert_eq!(output.belief, TrustBelief::default());
}

#[test]
fn reply_outside_a_question_is_dropped() {
    let mut agent = neutral_agent();
    let mut world = two_room_world().block_door(1, ObstacleKind::Rock);
    let mut router = StepRouter::default();

    run(&mut agent, &mut world, &mut router, 3);
    // Rock questions only accept "Remove" or "Continue".
    let output = tick(&mut agent, &mut world, &mut router, &[say("Remove alone")]);

    assert_eq!(output.phase, Phase::RemoveObstacleIfNeeded);
    assert!(agent
        .state()
        .negotiation
        .as_ref()
        .is_some_and(|negotiation| negotiation.is_waiting()));
}

#[test]
fn claimed_victim_missing_from_area_is_purged() {
    let mut agent = neutral_agent();
    let mut world = two_room_world();
    let mut router = StepRouter::default();

    let first = tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Search: 1"), say(&format!("Found: {CRITICAL} in 1"))],
    );
    assert_eq!(agent.state().goal_victim.as_deref(), Some(CRITICAL));
    let outputs = run(&mut agent, &mut world, &mut router, 40);

    assert!(agent.state().ledger.victim(CRITICAL).is_none());
    assert_eq!(
        sent(
            &outputs,
            "critically injured man not present in area 1 because I searched the whole area"
        ),
        1
    );
    let last = outputs.last().expect("ticks ran");
    assert!(last.belief.willingness < first.belief.willingness - 0.1);
}

#[test]
fn mild_victim_rescued_alone_after_reply() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_victim(MILD, Location::new(1, 1))
        .with_drop_zone(MILD, Location::new(1, 8));
    let mut router = StepRouter::default();

    let mut outputs = run(&mut agent, &mut world, &mut router, 12);
    assert_eq!(sent(&outputs, "Found mildly injured woman in area 1."), 1);
    outputs.push(tick(&mut agent, &mut world, &mut router, &[say("Rescue alone")]));
    outputs.extend(run(&mut agent, &mut world, &mut router, 40));

    let carry = outputs
        .iter()
        .find_map(|output| match &output.action {
            Some(AgentAction::CarryObject {
                object_id,
                human_name,
            }) => Some((object_id.clone(), human_name.clone())),
            _ => None,
        })
        .expect("victim picked up");
    assert_eq!(carry, ("mildly injured woman_obj".to_string(), "human".to_string()));
    assert!(outputs
        .iter()
        .any(|output| matches!(output.action, Some(AgentAction::Drop { .. }))));
    assert_eq!(world.score, 3);
    assert!(agent.state().ledger.is_collected(MILD));
    assert!(!agent.state().carrying);
    assert_eq!(sent(&outputs, "Delivered mildly injured woman at the drop zone."), 1);
}

#[test]
fn critical_victim_carried_together_rewards_the_teammate() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_victim(CRITICAL, Location::new(1, 1))
        .with_drop_zone(CRITICAL, Location::new(1, 8));
    let mut router = StepRouter::default();

    run(&mut agent, &mut world, &mut router, 8);
    tick(&mut agent, &mut world, &mut router, &[say("Rescue")]);

    let mut reached = false;
    for _ in 0..30 {
        let output = tick(&mut agent, &mut world, &mut router, &[]);
        if output.phase == Phase::TakeVictim {
            reached = true;
            break;
        }
    }
    assert!(reached, "agent reached the victim");

    world.victims.clear();
    world.teammate = Some(Location::new(1, 2));
    world.teammate_carrying = Some(CRITICAL.to_string());
    let output = tick(&mut agent, &mut world, &mut router, &[]);

    assert_eq!(output.action, None);
    assert!(agent.state().ledger.is_collected(CRITICAL));
    assert!(agent.state().carrying_together);
    assert!(output.belief.competence > 0.04);
    assert!(output.belief.willingness > 0.02);
}

#[test]
fn critical_victim_deferred_when_teammate_never_comes() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_room(2, 20, 0)
        .with_victim(CRITICAL, Location::new(1, 1))
        .with_drop_zone(CRITICAL, Location::new(1, 8));
    let mut router = StepRouter::default();

    run(&mut agent, &mut world, &mut router, 8);
    tick(&mut agent, &mut world, &mut router, &[say("Rescue")]);
    let outputs = run(&mut agent, &mut world, &mut router, 150);

    assert_eq!(sent(&outputs, "Timeout exceeded, I will continue searching."), 1);
    assert!(agent.state().ledger.is_deferred(CRITICAL));
    assert!(!agent.state().ledger.is_collected(CRITICAL));
    let last = outputs.last().expect("ticks ran");
    assert!(last.belief.competence < -0.1);
}

#[test]
fn mild_joint_wait_falls_back_to_carrying_alone() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_victim(MILD, Location::new(1, 1))
        .with_drop_zone(MILD, Location::new(1, 8));
    let mut router = StepRouter::default();

    let mut outputs = run(&mut agent, &mut world, &mut router, 12);
    let agreed = tick(&mut agent, &mut world, &mut router, &[say("Rescue together")]);
    assert!((agreed.belief.competence - 0.05).abs() < 1e-9);
    outputs.push(agreed);
    outputs.extend(run(&mut agent, &mut world, &mut router, 200));

    assert_eq!(sent(&outputs, "Please come to area 1 to carry mildly injured woman together."), 1);
    assert_eq!(sent(&outputs, "Timeout exceeded, I will carry mildly injured woman myself."), 1);
    let carry = outputs
        .iter()
        .position(|output| matches!(output.action, Some(AgentAction::CarryObject { .. })))
        .expect("victim carried alone");
    assert!(outputs[carry].tick > 100);
    assert_eq!(world.score, 3);
    assert!(agent
        .state()
        .ledger
        .objectives(ObjectiveKind::Rescue)
        .iter()
        .all(|objective| !objective.is_open()));

    // The abandoned rescue is not judged again by a later joint carry.
    let settled = agent.belief();
    assert!((settled.competence - (0.05 - 0.1998)).abs() < 1e-9);
    world.teammate_carrying = Some(CRITICAL.to_string());
    let output = tick(&mut agent, &mut world, &mut router, &[]);
    assert_eq!(output.action, None);
    assert!(agent.state().carrying_together);
    assert_eq!(output.belief, settled);
}

#[test]
fn exhausting_every_area_restarts_the_search() {
    let boy = "mildly injured boy";
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_drop_zone(boy, Location::new(1, 8));
    let mut router = StepRouter::default();

    let mut outputs = vec![tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Found: mildly injured boy in area 5")],
    )];
    assert!(agent.state().ledger.is_deferred(boy));

    let mut reset = None;
    for _ in 0..100 {
        let before = agent.belief().willingness;
        let output = tick(&mut agent, &mut world, &mut router, &[]);
        let after = output.belief.willingness;
        outputs.push(output);
        if after < -0.3 {
            reset = Some(after - before);
            break;
        }
    }
    let delta = reset.expect("every area searched");
    assert!((delta + 0.398976).abs() < 1e-9);
    assert!(agent.state().ledger.searched_rooms().is_empty());

    outputs.extend(run(&mut agent, &mut world, &mut router, 10));
    assert_eq!(sent(&outputs, "Going to re-search all areas."), 1);
}

#[test]
fn victim_reported_collected_but_still_lying_in_an_area() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(1, 6))
        .with_room(1, 0, 0)
        .with_room(2, 20, 0)
        .with_victim(MILD, Location::new(21, 1))
        .with_drop_zone(MILD, Location::new(1, 8))
        .with_drop_zone(CRITICAL, Location::new(10, 10));
    let mut router = StepRouter::default();

    let first = tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Collect: mildly injured woman in area 1")],
    );
    assert!(first.belief.willingness < -0.09);
    assert!(agent.state().ledger.is_collected(MILD));

    let mut delta = None;
    for _ in 0..80 {
        let before = agent.belief().willingness;
        let output = tick(&mut agent, &mut world, &mut router, &[]);
        if !agent.state().ledger.is_collected(MILD) {
            delta = Some(output.belief.willingness - before);
            break;
        }
    }
    let delta = delta.expect("victim seen again");
    assert!(delta < -0.49 && delta > -0.51);
    assert!(agent.state().ledger.is_discovered(MILD));
}

#[test]
fn trusted_teammate_asking_for_help_is_joined() {
    let mut agent = agent_with(AgentConfig::default(), TrustBelief::new(0.5, 0.0));
    let mut world = two_room_world();
    let mut router = StepRouter::default();

    let mut outputs = vec![tick(
        &mut agent,
        &mut world,
        &mut router,
        &[say("Remove: at area 2")],
    )];
    assert!((outputs[0].belief.willingness - 0.02).abs() < 1e-9);
    assert!(agent.state().helping_remove);
    assert_eq!(agent.state().door.as_ref().map(|door| door.room.as_str()), Some("area 2"));

    outputs.extend(run(&mut agent, &mut world, &mut router, 3));
    assert_eq!(sent(&outputs, "Moving to area 2 to help you remove an obstacle."), 1);
    assert_eq!(sent(&outputs, "Moving to area 1"), 0);
}

#[test]
fn every_tick_broadcasts_the_score() {
    let mut agent = neutral_agent();
    let mut world = FakeWorld::new(Location::new(0, 0));
    world.score = 9;
    let mut router = StepRouter::default();

    for output in run(&mut agent, &mut world, &mut router, 3) {
        assert_eq!(output.messages[0].content, "Our score is 9.");
        assert!(output.messages.len() <= 2);
    }
}
