mod common;

use bcfs_core::{Accuracy, ReactionTime, ResponseKey, Side, TrialType};
use bcfs_experiment::config::default_practice_sequence;
use bcfs_experiment::{
    ControllerEvent, ControllerPhase, RecordingDisplay, SessionConfig, TrialController,
};
use bcfs_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;

use common::{correct_key, images, run_for, started_row, wrong_key};

fn controller(config: SessionConfig, timer: &ManualTimer) -> TrialController<ManualTimer, StdRng> {
    TrialController::new(
        config,
        &images("mask", 4),
        &images("stim", 3),
        timer.clone(),
        StdRng::seed_from_u64(42),
    )
    .unwrap()
}

/// Runs one full trial: confirm, wait `rt_ms`, answer, wait out the ITI.
fn trial(
    ctrl: &mut TrialController<ManualTimer, StdRng>,
    timer: &ManualTimer,
    display: &mut RecordingDisplay,
    rt_ms: u64,
    correct: bool,
) -> Vec<ControllerEvent> {
    let started = ctrl.handle_key(ResponseKey::Space, display);
    let row = started_row(&started).unwrap();
    run_for(ctrl, timer, display, rt_ms);
    let key = if correct { correct_key(row) } else { wrong_key(row) };
    let mut events = ctrl.handle_key(key, display);
    events.extend(run_for(ctrl, timer, display, 1_000));
    events
}

#[test]
fn three_trial_block_records_and_completes() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();
    assert_eq!(ctrl.phase(), ControllerPhase::AwaitingStart);

    trial(&mut ctrl, &timer, &mut display, 500, true);
    assert_eq!(ctrl.phase(), ControllerPhase::InterTrial);
    trial(&mut ctrl, &timer, &mut display, 700, false);
    let last = trial(&mut ctrl, &timer, &mut display, 300, false);

    assert!(last.contains(&ControllerEvent::BlockComplete));
    assert_eq!(ctrl.phase(), ControllerPhase::SessionComplete);
    assert_eq!(ctrl.trial_count(), 3);
    assert_eq!(ctrl.pending_timers(), 0);

    let records = ctrl.records();
    assert_eq!(records.len(), 3);
    let accuracies: Vec<Accuracy> = records.iter().map(|r| r.accuracy).collect();
    assert_eq!(
        accuracies,
        [Accuracy::Correct, Accuracy::Incorrect, Accuracy::Incorrect]
    );
    assert_eq!(records[0].reaction_time_ms, ReactionTime::Measured(500.0));
    assert_eq!(records[1].reaction_time_ms, ReactionTime::Measured(700.0));
    assert!(records.iter().all(|r| r.trial_type == TrialType::Main));
    let numbers: Vec<usize> = records.iter().map(|r| r.trial_number).collect();
    assert_eq!(numbers, [1, 2, 3]);
    assert_eq!(records[0].image_reference, "stim0.png");
    assert_eq!(records[2].image_reference, "stim2.png");
}

#[test]
fn completed_block_ignores_everything_but_abort() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 1), &timer);
    let mut display = RecordingDisplay::new();
    trial(&mut ctrl, &timer, &mut display, 400, true);
    assert_eq!(ctrl.phase(), ControllerPhase::SessionComplete);

    timer.advance_ms(1_000);
    assert_eq!(
        ctrl.handle_key(ResponseKey::Space, &mut display),
        vec![ControllerEvent::InputIgnored {
            key: ResponseKey::Space
        }]
    );
    assert_eq!(ctrl.trial_count(), 1);
    assert_eq!(
        ctrl.handle_key(ResponseKey::Q, &mut display),
        vec![ControllerEvent::Aborted]
    );
}

#[test]
fn keys_inside_debounce_window_are_dropped() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();

    ctrl.handle_key(ResponseKey::Space, &mut display);
    run_for(&mut ctrl, &timer, &mut display, 150);
    let events = ctrl.handle_key(ResponseKey::A, &mut display);
    assert_eq!(events, vec![ControllerEvent::InputDebounced { key: ResponseKey::A }]);
    assert_eq!(ctrl.phase(), ControllerPhase::Presenting);
    assert!(ctrl.records().is_empty());

    run_for(&mut ctrl, &timer, &mut display, 60);
    let events = ctrl.handle_key(ResponseKey::A, &mut display);
    assert!(matches!(events[0], ControllerEvent::TrialCompleted(_)));
    assert_eq!(ctrl.trial_count(), 1);
}

#[test]
fn abort_bypasses_debounce_and_cancels_timers() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();

    trial(&mut ctrl, &timer, &mut display, 500, true);
    ctrl.handle_key(ResponseKey::Space, &mut display);
    assert!(ctrl.pending_timers() > 0);

    let events = ctrl.handle_key(ResponseKey::Q, &mut display);
    assert_eq!(events, vec![ControllerEvent::Aborted]);
    assert_eq!(ctrl.phase(), ControllerPhase::Aborted);
    assert_eq!(ctrl.pending_timers(), 0);
    assert_eq!(ctrl.next_deadline(), None);
    assert!(!ctrl.is_presenting());
    assert_eq!(ctrl.records().len(), 1);

    timer.advance_ms(500);
    assert_eq!(
        ctrl.handle_key(ResponseKey::A, &mut display),
        vec![ControllerEvent::InputIgnored { key: ResponseKey::A }]
    );
}

#[test]
fn switch_happens_once_after_configured_trial() {
    let timer = ManualTimer::new();
    let mut config = SessionConfig::main("p1", 6);
    config.switch_enabled = true;
    config.switch_after_trial = 2;
    let mut ctrl = controller(config, &timer);
    let mut display = RecordingDisplay::new();

    let before = (ctrl.mask_side(), ctrl.stimulus_side());
    assert_eq!(before, (Side::Left, Side::Right));

    let mut switches = 0;
    for n in 1..=6 {
        let events = trial(&mut ctrl, &timer, &mut display, 300, true);
        switches += events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::SuppressorSwitched { .. }))
            .count();
        if n >= 2 {
            assert!(ctrl.switch_applied());
            assert_eq!((ctrl.mask_side(), ctrl.stimulus_side()), (Side::Right, Side::Left));
        } else {
            assert!(!ctrl.switch_applied());
        }
    }
    assert_eq!(switches, 1);

    let sides: Vec<Side> = ctrl.records().iter().map(|r| r.suppressor_side).collect();
    assert_eq!(
        sides,
        [Side::Left, Side::Left, Side::Right, Side::Right, Side::Right, Side::Right]
    );
}

#[test]
fn practice_block_follows_side_sequence() {
    let timer = ManualTimer::new();
    let sequence = default_practice_sequence();
    let mut ctrl = controller(SessionConfig::practice("p1", 20, sequence.clone()), &timer);
    let mut display = RecordingDisplay::new();

    for n in 1..=20 {
        trial(&mut ctrl, &timer, &mut display, 250, true);
        if n == 5 {
            assert_eq!(ctrl.mask_side(), sequence[5]);
            assert_ne!(ctrl.mask_side(), sequence[0]);
        }
    }
    assert_eq!(ctrl.phase(), ControllerPhase::SessionComplete);

    let sides: Vec<Side> = ctrl.records().iter().map(|r| r.suppressor_side).collect();
    assert_eq!(sides, sequence);
    assert!(ctrl.records().iter().all(|r| r.trial_type == TrialType::Practice));
    assert!(!ctrl.switch_applied());
}

#[test]
fn position_key_after_iti_message_is_logged() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();

    let row = started_row(&ctrl.handle_key(ResponseKey::Space, &mut display)).unwrap();
    run_for(&mut ctrl, &timer, &mut display, 400);
    ctrl.handle_key(correct_key(row), &mut display);

    let shown = run_for(&mut ctrl, &timer, &mut display, 600);
    assert!(shown.contains(&ControllerEvent::ItiMessageShown));
    assert_eq!(display.messages(), vec!["Press SPACE to continue"]);

    let events = ctrl.handle_key(correct_key(row), &mut display);
    let iti = match &events[0] {
        ControllerEvent::ItiLogged(record) => record.clone(),
        other => panic!("expected ITI record, got {other:?}"),
    };
    assert!(matches!(events[1], ControllerEvent::TrialStarted { trial_number: 2, .. }));
    assert_eq!(iti.trial_type, TrialType::Iti);
    assert_eq!(iti.trial_number, 1);
    assert_eq!(iti.stimulus_row, row);
    assert_eq!(iti.accuracy, Accuracy::Correct);
    assert_eq!(iti.reaction_time_ms, ReactionTime::Measured(100.0));
    assert_eq!(ctrl.records().len(), 2);
    assert_eq!(ctrl.trial_count(), 1);
    assert_eq!(ctrl.phase(), ControllerPhase::Presenting);
}

#[test]
fn iti_record_scores_position_against_finished_trial() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();

    let row = started_row(&ctrl.handle_key(ResponseKey::Space, &mut display)).unwrap();
    run_for(&mut ctrl, &timer, &mut display, 400);
    ctrl.handle_key(correct_key(row), &mut display);
    run_for(&mut ctrl, &timer, &mut display, 600);

    let events = ctrl.handle_key(wrong_key(row), &mut display);
    match &events[0] {
        ControllerEvent::ItiLogged(record) => {
            assert_eq!(record.stimulus_row, row);
            assert_eq!(record.accuracy, Accuracy::Incorrect);
            assert_eq!(record.response_key, wrong_key(row));
        }
        other => panic!("expected ITI record, got {other:?}"),
    }
}

#[test]
fn position_key_before_iti_message_just_starts_next_trial() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 3), &timer);
    let mut display = RecordingDisplay::new();

    ctrl.handle_key(ResponseKey::Space, &mut display);
    run_for(&mut ctrl, &timer, &mut display, 400);
    ctrl.handle_key(ResponseKey::A, &mut display);
    run_for(&mut ctrl, &timer, &mut display, 250);

    let events = ctrl.handle_key(ResponseKey::Z, &mut display);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ControllerEvent::TrialStarted { .. }));
    assert_eq!(ctrl.records().len(), 1);

    // The pending ITI message belongs to the finished trial and never shows.
    let later = run_for(&mut ctrl, &timer, &mut display, 1_000);
    assert!(!later.contains(&ControllerEvent::ItiMessageShown));
    assert!(display.messages().is_empty());
}

#[test]
fn unanswered_ramp_freezes_until_response() {
    let timer = ManualTimer::new();
    let mut config = SessionConfig::main("p1", 2);
    config.blend_duration_ms = 3_000;
    let mut ctrl = controller(config, &timer);
    let mut display = RecordingDisplay::new();

    let row = started_row(&ctrl.handle_key(ResponseKey::Space, &mut display)).unwrap();
    let events = run_for(&mut ctrl, &timer, &mut display, 4_000);
    let finished = events
        .iter()
        .filter(|e| **e == ControllerEvent::StimulusRampFinished)
        .count();
    assert_eq!(finished, 1);
    assert!((ctrl.stimulus_alpha() - 0.99).abs() < 1e-6);
    assert!(ctrl.is_presenting());

    let events = ctrl.handle_key(correct_key(row), &mut display);
    match &events[0] {
        ControllerEvent::TrialCompleted(record) => {
            assert_eq!(record.reaction_time_ms, ReactionTime::Measured(4_000.0));
            assert_eq!(record.accuracy, Accuracy::Correct);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn slow_event_pump_still_completes_ramp_on_time() {
    let timer = ManualTimer::new();
    let mut config = SessionConfig::main("p1", 2);
    config.blend_duration_ms = 3_000;
    let mut ctrl = controller(config, &timer);
    let mut display = RecordingDisplay::new();

    ctrl.handle_key(ResponseKey::Space, &mut display);
    let mut events = Vec::new();
    for _ in 0..25 {
        timer.advance_ms(120);
        events.extend(ctrl.on_timer(&mut display));
    }
    assert!((ctrl.stimulus_alpha() - 0.99).abs() < 1e-6);
    assert!(events.contains(&ControllerEvent::StimulusRampFinished));

    let alphas = display.alphas();
    assert!(alphas.windows(2).all(|w| w[0] <= w[1]));
    // Halfway through the blend the weight reflects elapsed time.
    let mut config = SessionConfig::main("p1", 2);
    config.blend_duration_ms = 3_000;
    let mut halfway = controller(config, &timer);
    let mut display = RecordingDisplay::new();
    halfway.handle_key(ResponseKey::Space, &mut display);
    for _ in 0..12 {
        timer.advance_ms(125);
        halfway.on_timer(&mut display);
    }
    assert!((halfway.stimulus_alpha() - 0.5).abs() < 1e-3);
}

#[test]
fn space_as_response_scores_zero() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 2), &timer);
    let mut display = RecordingDisplay::new();

    ctrl.handle_key(ResponseKey::Space, &mut display);
    run_for(&mut ctrl, &timer, &mut display, 300);
    ctrl.handle_key(ResponseKey::Space, &mut display);
    assert_eq!(ctrl.records()[0].accuracy, Accuracy::Incorrect);
    assert_eq!(ctrl.records()[0].response_key, ResponseKey::Space);
}

#[test]
fn trial_count_never_exceeds_total() {
    let timer = ManualTimer::new();
    let mut ctrl = controller(SessionConfig::main("p1", 2), &timer);
    let mut display = RecordingDisplay::new();

    let keys = [
        ResponseKey::Space,
        ResponseKey::A,
        ResponseKey::Z,
        ResponseKey::Space,
        ResponseKey::A,
    ];
    let mut last = 0;
    for i in 0..40 {
        ctrl.handle_key(keys[i % keys.len()], &mut display);
        run_for(&mut ctrl, &timer, &mut display, 70 * (i as u64 % 5));
        assert!(ctrl.trial_count() >= last);
        assert!(ctrl.trial_count() <= 2);
        last = ctrl.trial_count();
    }
    assert_eq!(ctrl.phase(), ControllerPhase::SessionComplete);
}

#[test]
fn invalid_config_is_rejected() {
    let timer = ManualTimer::new();
    let mut config = SessionConfig::main("p1", 3);
    config.mask_cycle_ms = 5;
    let result = TrialController::new(
        config,
        &images("mask", 1),
        &images("stim", 1),
        timer,
        StdRng::seed_from_u64(1),
    );
    assert!(result.is_err());
}
