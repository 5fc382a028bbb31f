//! Case loading and validation from JSON

use gridplan_core::{GridError, PlanningCase, Topology};
use serde_json::{json, Value};

fn radial_case() -> Value {
    json!({
        "name": "three-bus radial",
        "params": { "stages": 2, "years_per_stage": 5 },
        "buses": [
            { "id": 0, "load_mw": [0.0, 0.0] },
            { "id": 1, "load_mw": [1.0, 1.2] },
            { "id": 2, "load_mw": [0.0, 0.8] }
        ],
        "lines": [
            { "id": 0, "from_bus": 0, "to_bus": 1, "resistance_ohm": 0.2,
              "reactance_ohm": 0.3, "existing_capacity_mva": 5.0, "existing": true },
            { "id": 1, "from_bus": 1, "to_bus": 2, "resistance_ohm": 0.2,
              "reactance_ohm": 0.3, "new_capacity_mva": 5.0, "investment_cost": 4.0e4,
              "existing": false }
        ],
        "substations": [
            { "id": 0, "bus": 0, "existing_capacity_mva": 10.0, "existing": true }
        ],
        "scenarios": [
            { "days": 365.0, "load_profile": [0.7, 1.0], "wind_profile": [0.2, 0.4] }
        ]
    })
}

fn load(value: &Value) -> PlanningCase {
    PlanningCase::from_json_str(&value.to_string()).unwrap()
}

#[test]
fn radial_case_loads_and_validates() {
    let case = load(&radial_case());
    case.validate().unwrap();

    assert_eq!(case.num_stages(), 2);
    assert_eq!(case.num_scenarios(), 1);
    assert_eq!(case.candidate_lines().count(), 1);
    assert!(case.generators.is_empty());
    // Missing params fall back to defaults
    assert_eq!(case.params.cost_shed, 200.0);
    assert!((case.total_load(1) - 2.0).abs() < 1e-12);
}

#[test]
fn candidate_lines_count_for_reachability() {
    let case = load(&radial_case());
    let reached = Topology::new(&case).reachable_from_substations(&case);
    assert_eq!(reached, vec![true, true, true]);
}

#[test]
fn dangling_bus_reference_is_reported() {
    let mut value = radial_case();
    value["lines"][1]["to_bus"] = json!(7);
    let err = load(&value).validate().unwrap_err();
    assert!(matches!(err, GridError::UnknownBus { bus: 7, .. }), "{err}");
}

#[test]
fn load_vector_must_cover_every_stage() {
    let mut value = radial_case();
    value["buses"][2]["load_mw"] = json!([0.5]);
    let err = load(&value).validate().unwrap_err();
    assert!(matches!(
        err,
        GridError::LengthMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}

#[test]
fn profile_lengths_must_match_hours() {
    let mut value = radial_case();
    value["scenarios"][0]["wind_profile"] = json!([0.2]);
    let err = load(&value).validate().unwrap_err();
    assert!(err.to_string().contains("wind_profile of scenario 0"), "{err}");
}

#[test]
fn isolated_load_is_unreachable() {
    let mut value = radial_case();
    value["lines"].as_array_mut().unwrap().pop();
    let err = load(&value).validate().unwrap_err();
    assert!(matches!(err, GridError::Unreachable(2)));
}

#[test]
fn ids_must_be_positional() {
    let mut value = radial_case();
    value["buses"][1]["id"] = json!(5);
    let err = load(&value).validate().unwrap_err();
    assert!(err.to_string().contains("bus at position 1 has id 5"), "{err}");
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = PlanningCase::from_json_str("{\"buses\": [").unwrap_err();
    assert!(matches!(err, GridError::Parse(_)));
}
