//! Car-following and telemetry behaviour of a single vehicle

use route_learning_sim::simulation::{
    LeadSnapshot, RoadId, SimVehicle, TripRecord, VehicleLabel, VehicleParams,
};

const DT: f64 = 1.0 / 20.0;

fn test_params() -> VehicleParams {
    VehicleParams {
        length: 5.0,
        min_gap: 4.0,
        time_headway: 1.0,
        v_max: 15.0,
        a_max: 1.0,
        b_max: 3.0,
    }
}

fn test_vehicle() -> (SimVehicle, TripRecord) {
    let label = VehicleLabel(1);
    (
        SimVehicle::new(label, test_params(), vec![RoadId(0), RoadId(1)]),
        TripRecord::new(label),
    )
}

fn stationary_lead(x: f64) -> LeadSnapshot {
    LeadSnapshot {
        label: VehicleLabel(0),
        x,
        v: 0.0,
        length: 5.0,
    }
}

#[test]
fn test_free_flow_acceleration() {
    let (mut vehicle, mut record) = test_vehicle();

    let mut last_x = vehicle.x;
    let mut last_v = vehicle.v;
    for _ in 0..60 {
        vehicle.update(None, DT, &mut record);
        assert!(vehicle.x >= last_x, "Position went backwards");
        assert!(vehicle.v >= last_v, "Free-flow speed dropped");
        assert!(vehicle.v < vehicle.v_max);
        last_x = vehicle.x;
        last_v = vehicle.v;
    }

    // First tick only picks up the initial acceleration
    assert!((vehicle.v - 2.95).abs() < 0.01, "v = {}", vehicle.v);
    assert!(vehicle.x > 4.0 && vehicle.x < 4.6, "x = {}", vehicle.x);
    assert!((record.total_time - 59.0 * DT).abs() < 1e-9);
    assert!((vehicle.total_time - record.total_time).abs() < 1e-12);
}

#[test]
fn test_follower_too_close_holds_until_gap_reopens() {
    let (mut vehicle, mut record) = test_vehicle();
    let lead = stationary_lead(3.0);

    for _ in 0..10 {
        vehicle.update(Some(&lead), DT, &mut record);
        assert!(vehicle.is_stopped(), "Follower should be held");
        assert!(vehicle.a <= 0.0);
        assert_eq!(vehicle.v, 0.0);
    }
    // The arbiter never stopped it; only the gap did
    assert!(!vehicle.stopped);

    let lead = stationary_lead(20.0);
    vehicle.update(Some(&lead), DT, &mut record);
    assert!(!vehicle.is_stopped(), "Hold should clear once the gap is positive");
    assert!(vehicle.a > 0.0);
}

#[test]
fn test_stop_brakes_without_reversing() {
    let (mut vehicle, mut record) = test_vehicle();
    vehicle.v = 10.0;
    vehicle.stop();

    let mut last_v = vehicle.v;
    for _ in 0..200 {
        vehicle.update(None, DT, &mut record);
        assert!(vehicle.a <= 0.0);
        assert!(vehicle.v >= 0.0);
        assert!(vehicle.v <= last_v);
        last_v = vehicle.v;
    }
    assert!(vehicle.v < 10.0);

    vehicle.unstop();
    vehicle.update(None, DT, &mut record);
    assert!(vehicle.a > 0.0);
}

#[test]
fn test_overshooting_deceleration_clamps_to_rest() {
    let (mut vehicle, mut record) = test_vehicle();
    vehicle.x = 10.0;
    vehicle.v = 0.1;
    vehicle.a = -10.0;

    vehicle.update(None, DT, &mut record);

    assert_eq!(vehicle.v, 0.0);
    // Backs off to where it actually came to rest
    assert!((vehicle.x - 10.0005).abs() < 1e-9, "x = {}", vehicle.x);
    assert!(vehicle.a >= 0.0);
}

#[test]
fn test_hard_braking_never_moves_backwards() {
    let (mut vehicle, mut record) = test_vehicle();
    vehicle.x = 10.0;
    vehicle.v = 0.1;
    vehicle.a = -1.8;

    // v + a*dt stays positive but v*dt + a*dt^2/2 does not
    vehicle.update(None, DT, &mut record);

    assert!((vehicle.v - 0.01).abs() < 1e-12);
    assert_eq!(vehicle.x, 10.0);
}

#[test]
fn test_slow_and_unslow() {
    let (mut vehicle, _) = test_vehicle();
    vehicle.slow(7.5);
    assert_eq!(vehicle.v_max, 7.5);
    assert_eq!(vehicle.params.v_max, 15.0);
    vehicle.unslow();
    assert_eq!(vehicle.v_max, 15.0);
}

#[test]
fn test_stopped_time_attributed_to_leader() {
    let (mut vehicle, mut record) = test_vehicle();
    vehicle.x = 10.0;
    vehicle.stop();
    let lead = stationary_lead(100.0);

    for _ in 0..10 {
        vehicle.update(Some(&lead), DT, &mut record);
    }

    assert_eq!(record.road_order, vec![RoadId(0), RoadId(1)]);
    assert_eq!(record.leading_vehicles, vec![Some(VehicleLabel(0))]);
    assert!((record.stopped_time[0] - 10.0 * DT).abs() < 1e-9);
    assert_eq!(record.stopped_time[1], 0.0);
    // Not at the head of a queue
    assert_eq!(record.stopped_while_front[0], 0.0);
}

#[test]
fn test_front_stop_time_recorded() {
    let (mut vehicle, mut record) = test_vehicle();
    vehicle.x = 90.0;
    vehicle.be_front = true;
    vehicle.stop();

    for _ in 0..4 {
        vehicle.update(None, DT, &mut record);
    }

    assert_eq!(record.leading_vehicles, vec![None]);
    assert_eq!(record.stopped_time[0], 0.0);
    assert!((record.stopped_while_front[0] - 4.0 * DT).abs() < 1e-9);
    assert!((record.front_stop_time_on(RoadId(0)) - 4.0 * DT).abs() < 1e-9);
    assert_eq!(record.front_stop_time_on(RoadId(7)), 0.0);
}

#[test]
fn test_vehicle_params_validation() {
    assert!(VehicleParams::default().is_valid());
    assert!(test_params().is_valid());

    let zero_speed = VehicleParams {
        v_max: 0.0,
        ..test_params()
    };
    assert!(!zero_speed.is_valid());

    let no_gap = VehicleParams {
        min_gap: 0.0,
        ..test_params()
    };
    assert!(no_gap.is_valid());
}
