use std::num::{NonZeroU64, NonZeroUsize};

use steady_state::{
    DetectionMode, Solo, StepContext, StepMetrics, SteadyStateConfig, SteadyStateController,
    SteadyStateError,
    estimation::{estimated_hours_remaining, required_samples},
    metrics::{ESTIMATED_TOTAL_TIME, STEADY_STATE_ACHIEVED},
};

const SPEED: &str = "time/seconds_per_iter";
const SPEED_AVG10: &str = "time/seconds_per_iter_averaged10";
const MODEL: u64 = 125_000_000;
const BATCH: usize = 8;

fn config(window: usize, steps_before_stop: u64) -> SteadyStateConfig {
    SteadyStateConfig {
        window_size: NonZeroUsize::new(window).unwrap(),
        steps_before_stop,
        ..Default::default()
    }
}

fn speed(value: f64) -> StepMetrics {
    [(SPEED, value)].into_iter().collect()
}

fn ctx(step: u64) -> StepContext<'static> {
    StepContext::new(step, &MODEL, &BATCH)
}

#[tokio::test]
async fn stops_after_the_configured_steps_in_steady_state() {
    let mut controller = SteadyStateController::new(config(3, 2), Solo).unwrap();

    let mut stops = Vec::new();
    let mut achieved = Vec::new();
    for step in 0..5 {
        let decision = controller.on_step_end(&speed(0.5), &ctx(step)).await.unwrap();
        stops.push(decision.should_stop);
        achieved.push(decision.steady_state_achieved);
    }

    assert_eq!(achieved, vec![false, false, true, true, true]);
    assert_eq!(stops, vec![false, false, false, false, true]);
    assert_eq!(controller.steps_since_achieved(), 2);
}

#[tokio::test]
async fn steady_state_is_latched() {
    let mut controller = SteadyStateController::new(config(3, 100), Solo).unwrap();

    for step in 0..3 {
        controller.on_step_end(&speed(0.5), &ctx(step)).await.unwrap();
    }
    assert!(controller.steady_state_achieved());

    let mut last = controller.steps_since_achieved();
    for (step, value) in [(3, 5.0), (4, 0.01), (5, 100.0)] {
        let decision = controller.on_step_end(&speed(value), &ctx(step)).await.unwrap();
        assert!(decision.steady_state_achieved);
        assert!(controller.steps_since_achieved() > last);
        last = controller.steps_since_achieved();
    }

    // Windows are frozen once steady state is reached.
    let window = controller.windows().unwrap().iteration_speed();
    assert!(window.values().all(|v| v == 0.5));
}

#[tokio::test]
async fn never_stops_when_disabled() {
    let config = SteadyStateConfig {
        stop_on_steady_state: false,
        ..config(2, 0)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();

    for step in 0..10 {
        let decision = controller.on_step_end(&speed(1.0), &ctx(step)).await.unwrap();
        assert!(!decision.should_stop);
        assert!(decision.summary.is_none());
    }
    assert!(controller.steady_state_achieved());
}

#[tokio::test]
async fn drifting_speed_is_not_steady() {
    let mut controller = SteadyStateController::new(config(3, 0), Solo).unwrap();

    for step in 0..10 {
        let value = 1.0 / (step + 1) as f64;
        let decision = controller.on_step_end(&speed(value), &ctx(step)).await.unwrap();
        assert!(!decision.steady_state_achieved);
        assert_eq!(decision.published_metrics(), vec![(STEADY_STATE_ACHIEVED, 0.0)]);
    }
}

#[tokio::test]
async fn missing_metrics_are_skipped() {
    let mut controller = SteadyStateController::new(config(2, 0), Solo).unwrap();

    for step in 0..5 {
        let decision = controller
            .on_step_end(&StepMetrics::new(), &ctx(step))
            .await
            .unwrap();
        assert!(!decision.steady_state_achieved);
    }
    assert!(controller.windows().unwrap().iteration_speed().is_empty());
}

#[tokio::test]
async fn averaged_metrics_are_ingested_when_configured() {
    let config = SteadyStateConfig {
        average: Some(10),
        ..config(2, 0)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();

    let metrics: StepMetrics = [(SPEED, 9.0), (SPEED_AVG10, 0.5)].into_iter().collect();
    for step in 0..2 {
        controller.on_step_end(&metrics, &ctx(step)).await.unwrap();
    }

    let window = controller.windows().unwrap().iteration_speed();
    assert_eq!(window.values().collect::<Vec<_>>(), vec![0.5, 0.5]);
    assert!(controller.steady_state_achieved());
}

#[tokio::test]
async fn utilization_mode_watches_every_rank() {
    let config = SteadyStateConfig {
        mode: DetectionMode::Utilization,
        ..config(2, 0)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();

    let metrics: StepMetrics = [("gpu_stats/utilization_rank0", 96.0)].into_iter().collect();
    let first = controller.on_step_end(&metrics, &ctx(0)).await.unwrap();
    assert!(!first.steady_state_achieved);

    let second = controller.on_step_end(&metrics, &ctx(1)).await.unwrap();
    assert!(second.steady_state_achieved);
    assert!(second.should_stop);
}

#[tokio::test]
async fn infers_model_size_and_batch_size() {
    let mut controller = SteadyStateController::new(config(2, 0), Solo).unwrap();
    assert_eq!(controller.num_params(), None);
    assert_eq!(controller.batch_size(), None);

    let model = 42_u64;
    let batch = vec![(); 16];
    let ctx = StepContext::new(0, &model, &batch);
    controller.on_step_end(&StepMetrics::new(), &ctx).await.unwrap();

    assert_eq!(controller.num_params(), Some(42));
    assert_eq!(controller.batch_size(), Some(16));

    // Inference happens once.
    let other = [(); 4];
    let ctx = StepContext::new(1, &model, &other);
    controller.on_step_end(&StepMetrics::new(), &ctx).await.unwrap();
    assert_eq!(controller.batch_size(), Some(16));
}

#[tokio::test]
async fn empty_sizes_are_retried_on_later_steps() {
    let mut controller = SteadyStateController::new(config(2, 0), Solo).unwrap();

    let (no_params, no_batch) = (0_u64, 0_usize);
    let ctx = StepContext::new(0, &no_params, &no_batch);
    controller.on_step_end(&StepMetrics::new(), &ctx).await.unwrap();
    assert_eq!(controller.num_params(), None);
    assert_eq!(controller.batch_size(), None);

    let (model, batch) = (42_u64, 8_usize);
    let ctx = StepContext::new(1, &model, &batch);
    controller.on_step_end(&StepMetrics::new(), &ctx).await.unwrap();
    assert_eq!(controller.num_params(), Some(42));
    assert_eq!(controller.batch_size(), Some(8));
}

#[tokio::test]
async fn configured_sizes_take_precedence() {
    let config = SteadyStateConfig {
        num_params: NonZeroU64::new(1_000),
        batch_size: NonZeroUsize::new(4),
        ..config(2, 0)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();
    controller.on_step_end(&StepMetrics::new(), &ctx(0)).await.unwrap();

    assert_eq!(controller.num_params(), Some(1_000));
    assert_eq!(controller.batch_size(), Some(4));
}

#[tokio::test]
async fn estimates_training_time_once_steady() {
    let config = SteadyStateConfig {
        target_loss: Some(3.0),
        ..config(2, 1)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();
    let metrics: StepMetrics = [(SPEED, 0.5), (SPEED_AVG10, 0.5)].into_iter().collect();

    let first = controller.on_step_end(&metrics, &ctx(0)).await.unwrap();
    assert_eq!(first.estimated_total_hours, None);

    let second = controller.on_step_end(&metrics, &ctx(1)).await.unwrap();
    let required = required_samples(3.0, Some(MODEL)).unwrap();
    let expected = estimated_hours_remaining(required - BATCH as u64, 1, BATCH, 0.5);
    assert_eq!(second.estimated_total_hours, Some(expected));
    assert!(!second.should_stop);
    assert!(second
        .published_metrics()
        .contains(&(ESTIMATED_TOTAL_TIME, expected)));
    assert_eq!(controller.num_samples_required().unwrap(), required);

    let third = controller.on_step_end(&metrics, &ctx(2)).await.unwrap();
    assert!(third.should_stop);
    let summary = third.summary.unwrap();
    assert_eq!(summary.seconds_per_batch, Some(0.5));
    assert_eq!(summary.batch_size, Some(BATCH));
    assert!(summary.to_string().contains("Estimated total time"));
}

#[tokio::test]
async fn estimate_falls_back_to_the_window_average() {
    let config = SteadyStateConfig {
        target_loss: Some(3.0),
        ..config(2, 10)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();

    controller.on_step_end(&speed(0.5), &ctx(0)).await.unwrap();
    let decision = controller.on_step_end(&speed(0.5), &ctx(1)).await.unwrap();

    let required = required_samples(3.0, Some(MODEL)).unwrap();
    let expected = estimated_hours_remaining(required - BATCH as u64, 1, BATCH, 0.5);
    assert_eq!(decision.estimated_total_hours, Some(expected));
}

#[tokio::test]
async fn unreachable_target_loss_is_fatal() {
    let config = SteadyStateConfig {
        target_loss: Some(1.5),
        ..config(2, 10)
    };
    let mut controller = SteadyStateController::new(config, Solo).unwrap();

    controller.on_step_end(&speed(0.5), &ctx(0)).await.unwrap();
    let err = controller.on_step_end(&speed(0.5), &ctx(1)).await.unwrap_err();
    assert!(matches!(err, SteadyStateError::UnreachableLoss { .. }));
}

#[test]
fn required_samples_preconditions() {
    let controller = SteadyStateController::new(config(2, 0), Solo).unwrap();
    assert!(matches!(
        controller.num_samples_required(),
        Err(SteadyStateError::InvalidConfig(_))
    ));

    let config = SteadyStateConfig {
        target_loss: Some(3.0),
        ..config(2, 0)
    };
    let controller = SteadyStateController::new(config, Solo).unwrap();
    assert!(matches!(
        controller.num_samples_required(),
        Err(SteadyStateError::MissingParameterCount)
    ));
}

#[test]
fn invalid_configuration_fails_before_any_step() {
    assert!(SteadyStateConfig::from_json_str(r#"{ "mode": "loss_curve" }"#).is_err());
    assert!("speed".parse::<DetectionMode>().is_err());

    let config = SteadyStateConfig {
        rtol: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        SteadyStateController::new(config, Solo),
        Err(SteadyStateError::InvalidConfig(_))
    ));
}
