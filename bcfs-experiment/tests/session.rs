mod common;

use bcfs_core::{BlockKind, ResponseKey, Side, TrialType};
use bcfs_experiment::session::STANDBY_MESSAGE;
use bcfs_experiment::transcript::TranscriptSink;
use bcfs_experiment::{
    CsvTranscript, ExitReason, MemoryTranscript, RecordingDisplay, SessionAssets, SessionConfig,
    SessionError, SessionEvent, SessionOrchestrator, SessionPlan,
};
use bcfs_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;

use common::{STEP_MS, correct_key, images, session_started_row};

type Orchestrator = SessionOrchestrator<MemoryTranscript, ManualTimer, StdRng>;

fn assets() -> SessionAssets {
    SessionAssets {
        masks: images("mask", 4),
        stimuli: images("stim", 3),
        practice_stimuli: Some(images("practice", 2)),
    }
}

fn practice_plan(sequence: Vec<Side>, auto_progress: bool) -> SessionPlan {
    let trials = sequence.len();
    SessionPlan {
        practice: Some(SessionConfig::practice("p9", trials, sequence)),
        main: SessionConfig::main("p9", 2),
        auto_progress,
        standby_ms: 2_000,
    }
}

fn orchestrator(plan: SessionPlan, timer: &ManualTimer) -> Orchestrator {
    SessionOrchestrator::new(
        plan,
        assets(),
        MemoryTranscript::new(),
        timer.clone(),
        StdRng::seed_from_u64(3),
    )
}

fn run_for(
    session: &mut Orchestrator,
    timer: &ManualTimer,
    display: &mut RecordingDisplay,
    ms: u64,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for _ in 0..ms / STEP_MS {
        timer.advance_ms(STEP_MS);
        events.extend(session.on_timer(display));
    }
    events
}

/// One correct trial answered after `rt_ms`, followed by a short pause.
fn answer(
    session: &mut Orchestrator,
    timer: &ManualTimer,
    display: &mut RecordingDisplay,
    rt_ms: u64,
) -> Vec<SessionEvent> {
    let mut events = session.handle_key(ResponseKey::Space, display);
    let row = session_started_row(&events).unwrap();
    events.extend(run_for(session, timer, display, rt_ms));
    events.extend(session.handle_key(correct_key(row), display));
    events.extend(run_for(session, timer, display, 300));
    events
}

/// Runs a practice block where trials with the mask on `slow` take 900ms
/// and the others 400ms.
fn run_practice(
    session: &mut Orchestrator,
    timer: &ManualTimer,
    display: &mut RecordingDisplay,
    sequence: &[Side],
    slow: Side,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for side in sequence {
        let rt = if *side == slow { 900 } else { 400 };
        events.extend(answer(session, timer, display, rt));
    }
    events
}

#[test]
fn practice_hands_off_to_main_with_estimated_side() {
    let timer = ManualTimer::new();
    let sequence = vec![Side::Left, Side::Left, Side::Left, Side::Right, Side::Right, Side::Right];
    let mut session = orchestrator(practice_plan(sequence.clone(), true), &timer);
    let mut display = RecordingDisplay::new();

    let started = session.start(&mut display).unwrap();
    assert_eq!(
        started,
        vec![SessionEvent::BlockStarted {
            kind: BlockKind::Practice,
            suppressor_side: Side::Left
        }]
    );
    assert!(matches!(session.start(&mut display), Err(SessionError::AlreadyStarted)));

    let events = run_practice(&mut session, &timer, &mut display, &sequence, Side::Left);
    assert!(events.contains(&SessionEvent::BlockFlushed {
        kind: BlockKind::Practice,
        path: None,
        records: 6
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::DominanceEstimated {
            suppress: Side::Right,
            ..
        }
    )));
    assert!(session.in_standby());
    assert_eq!(display.messages().last(), Some(&STANDBY_MESSAGE));

    // Input is ignored during standby.
    assert!(session.handle_key(ResponseKey::Space, &mut display).is_empty());

    let resumed = run_for(&mut session, &timer, &mut display, 2_000);
    assert!(resumed.contains(&SessionEvent::BlockStarted {
        kind: BlockKind::Main,
        suppressor_side: Side::Right
    }));
    let controller = session.controller().unwrap();
    assert_eq!(controller.trial_count(), 0);
    assert!(controller.records().is_empty());
    assert_eq!(controller.mask_side(), Side::Right);
    assert!(!controller.config().switch_enabled);

    answer(&mut session, &timer, &mut display, 500);
    let end = answer(&mut session, &timer, &mut display, 500);
    assert!(end.contains(&SessionEvent::ReturnToConfiguration {
        reason: ExitReason::Completed
    }));
    assert!(session.is_finished());

    let sink = session.sink();
    let practice = sink.records(BlockKind::Practice);
    assert_eq!(practice.len(), 6);
    assert!(practice.iter().all(|r| r.trial_type == TrialType::Practice));
    assert!(practice.iter().all(|r| r.image_reference.starts_with("practice")));
    let main = sink.records(BlockKind::Main);
    assert_eq!(main.len(), 2);
    assert!(main.iter().all(|r| r.suppressor_side == Side::Right));
    assert!(main.iter().all(|r| r.image_reference.starts_with("stim")));
}

#[test]
fn insufficient_practice_falls_back_to_configured_side() {
    let timer = ManualTimer::new();
    let sequence = vec![Side::Right, Side::Right, Side::Right];
    let mut plan = practice_plan(sequence.clone(), true);
    plan.main.initial_suppressor_side = Side::Left;
    let mut session = orchestrator(plan, &timer);
    let mut display = RecordingDisplay::new();

    session.start(&mut display).unwrap();
    let events = run_practice(&mut session, &timer, &mut display, &sequence, Side::Right);
    let fallback = events.iter().find_map(|e| match e {
        SessionEvent::DominanceFallback { default, analysis } => Some((*default, *analysis)),
        _ => None,
    });
    let (default, analysis) = fallback.unwrap();
    assert_eq!(default, Side::Left);
    assert_eq!(analysis.left.trials, 0);
    assert_eq!(analysis.right.trials, 3);

    let resumed = run_for(&mut session, &timer, &mut display, 2_000);
    assert!(resumed.contains(&SessionEvent::BlockStarted {
        kind: BlockKind::Main,
        suppressor_side: Side::Left
    }));
}

#[test]
fn practice_without_auto_progress_returns_to_configuration() {
    let timer = ManualTimer::new();
    let sequence = vec![Side::Left, Side::Right];
    let mut session = orchestrator(practice_plan(sequence.clone(), false), &timer);
    let mut display = RecordingDisplay::new();

    session.start(&mut display).unwrap();
    let events = run_practice(&mut session, &timer, &mut display, &sequence, Side::Left);
    assert!(events.contains(&SessionEvent::ReturnToConfiguration {
        reason: ExitReason::Completed
    }));
    assert_eq!(session.exit_reason(), Some(ExitReason::Completed));
    assert!(session.controller().is_none());
    assert_eq!(session.sink().records(BlockKind::Practice).len(), 2);
    assert!(session.sink().records(BlockKind::Main).is_empty());
}

#[test]
fn abort_flushes_what_was_recorded() {
    let timer = ManualTimer::new();
    let mut session = orchestrator(SessionPlan::main_only(SessionConfig::main("p9", 5)), &timer);
    let mut display = RecordingDisplay::new();

    session.start(&mut display).unwrap();
    answer(&mut session, &timer, &mut display, 600);
    session.handle_key(ResponseKey::Space, &mut display);

    let events = session.handle_key(ResponseKey::Q, &mut display);
    assert!(events.contains(&SessionEvent::BlockFlushed {
        kind: BlockKind::Main,
        path: None,
        records: 1
    }));
    assert!(events.contains(&SessionEvent::ReturnToConfiguration {
        reason: ExitReason::Aborted
    }));
    assert_eq!(session.next_deadline(), None);
    assert!(session.handle_key(ResponseKey::Space, &mut display).is_empty());
}

#[test]
fn abort_during_standby_skips_main_block() {
    let timer = ManualTimer::new();
    let sequence = vec![Side::Left, Side::Left, Side::Right, Side::Right];
    let mut session = orchestrator(practice_plan(sequence.clone(), true), &timer);
    let mut display = RecordingDisplay::new();

    session.start(&mut display).unwrap();
    run_practice(&mut session, &timer, &mut display, &sequence, Side::Right);
    assert!(session.in_standby());
    assert!(session.next_deadline().is_some());

    let events = session.handle_key(ResponseKey::Q, &mut display);
    assert_eq!(
        events,
        vec![SessionEvent::ReturnToConfiguration {
            reason: ExitReason::Aborted
        }]
    );
    assert!(run_for(&mut session, &timer, &mut display, 3_000).is_empty());
    assert!(session.sink().records(BlockKind::Main).is_empty());
}

#[test]
fn window_close_aborts_running_block() {
    let timer = ManualTimer::new();
    let mut session = orchestrator(SessionPlan::main_only(SessionConfig::main("p9", 5)), &timer);
    let mut display = RecordingDisplay::new();

    session.start(&mut display).unwrap();
    session.handle_key(ResponseKey::Space, &mut display);
    let events = session.abort(&mut display);
    assert!(events.contains(&SessionEvent::ReturnToConfiguration {
        reason: ExitReason::Aborted
    }));
    assert_eq!(session.sink().blocks.len(), 1);
    assert!(session.abort(&mut display).is_empty());
}

#[test]
fn main_block_resumes_from_practice_transcript() {
    let dir = tempfile::tempdir().unwrap();

    // Write a practice transcript the way a separate practice run would.
    let timer = ManualTimer::new();
    let sequence = vec![Side::Left, Side::Left, Side::Left, Side::Right, Side::Right, Side::Right];
    let mut practice = SessionOrchestrator::new(
        practice_plan(sequence.clone(), false),
        assets(),
        CsvTranscript::new(dir.path()),
        timer.clone(),
        StdRng::seed_from_u64(5),
    );
    let mut display = RecordingDisplay::new();
    practice.start(&mut display).unwrap();
    let mut path = None;
    for side in &sequence {
        let mut events = practice.handle_key(ResponseKey::Space, &mut display);
        let row = session_started_row(&events).unwrap();
        let rt = if *side == Side::Right { 900 } else { 400 };
        for _ in 0..rt / STEP_MS {
            timer.advance_ms(STEP_MS);
            events.extend(practice.on_timer(&mut display));
        }
        events.extend(practice.handle_key(correct_key(row), &mut display));
        timer.advance_ms(300);
        events.extend(practice.on_timer(&mut display));
        path = path.or_else(|| {
            events.iter().find_map(|e| match e {
                SessionEvent::BlockFlushed { path, .. } => path.clone(),
                _ => None,
            })
        });
    }
    let path = path.unwrap();

    let mut main = orchestrator(practice_plan(sequence, true), &timer);
    let events = main.resume_main(&path, &mut display).unwrap();
    assert!(matches!(
        events[0],
        SessionEvent::DominanceEstimated {
            suppress: Side::Left,
            ..
        }
    ));
    assert_eq!(
        events[1],
        SessionEvent::BlockStarted {
            kind: BlockKind::Main,
            suppressor_side: Side::Left
        }
    );
    assert_eq!(main.controller().unwrap().config().kind, BlockKind::Main);
}

#[test]
fn resume_from_missing_transcript_fails() {
    let timer = ManualTimer::new();
    let mut session = orchestrator(SessionPlan::main_only(SessionConfig::main("p9", 2)), &timer);
    let mut display = RecordingDisplay::new();
    let result = session.resume_main("does/not/exist.csv", &mut display);
    assert!(matches!(result, Err(SessionError::Transcript(_))));
    assert!(!session.is_finished());
}

#[test]
fn memory_sink_records_participant() {
    let mut sink = MemoryTranscript::new();
    sink.flush(BlockKind::Main, "p9", &[]).unwrap();
    assert_eq!(sink.blocks[0].1, "p9");
}
