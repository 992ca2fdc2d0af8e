use mood_trip::{
    schemas::{deserialize_structured, SchemaValidator},
    CompletionSchema, TripError, TripPlan,
};
use serde_json::{json, Value};

fn sample() -> Value {
    serde_json::from_str(mood_trip::ReplayGenerator::sample_text()).unwrap()
}

#[test]
fn test_schema_has_correct_structure() {
    let schema = TripPlan::schema().schema_json();

    assert_eq!(schema["type"], "object");
    let properties = schema["properties"].as_object().unwrap();
    for field in [
        "id",
        "title",
        "mood",
        "destination",
        "timeframe",
        "budget",
        "itinerary",
        "accommodations",
        "transport",
    ] {
        assert!(properties.contains_key(field), "missing `{field}`");
    }

    let required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(required.contains(&"itinerary"));
    assert!(required.contains(&"budget"));
    assert!(required.contains(&"title"));
}

#[test]
fn test_response_format_names_the_schema() {
    let format = TripPlan::schema().response_format();
    assert_eq!(format["type"], "json_schema");
    assert_eq!(format["json_schema"]["name"], "trip_plan");
    assert_eq!(format["json_schema"]["schema"], *TripPlan::schema().schema_json());
}

#[test]
fn test_sample_plan_validates() {
    let validator = SchemaValidator::new(TripPlan::schema()).unwrap();
    assert!(validator.violations(&sample()).is_empty());
}

#[test]
fn test_unknown_fields_are_tolerated() {
    let validator = SchemaValidator::new(TripPlan::schema()).unwrap();
    let mut value = sample();
    value["weather"] = json!("sunny");
    value["destination"]["region"] = json!("Kansai");
    assert!(validator.is_valid(&value));
    assert!(deserialize_structured::<TripPlan>(&value).is_ok());
}

#[test]
fn test_missing_and_mistyped_fields_are_reported_with_paths() {
    let validator = SchemaValidator::new(TripPlan::schema()).unwrap();
    let mut value = sample();
    value.as_object_mut().unwrap().remove("title");
    value["budget"]["total"] = json!("lots");
    value["itinerary"][0]["activities"][0]["category"] = json!("karaoke");

    let violations = validator.violations(&value);
    let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"<root>"));
    assert!(paths.contains(&"/budget/total"));
    assert!(paths
        .iter()
        .any(|p| p.starts_with("/itinerary/0/activities/0")));
}

#[test]
fn test_deserialize_reports_first_bad_path() {
    let mut value = sample();
    value["transport"][1]["departure"] = json!("next tuesday");

    match deserialize_structured::<TripPlan>(&value) {
        Err(TripError::SchemaViolation { message, .. }) => {
            assert!(message.contains("transport[1].departure"), "{message}");
        }
        other => panic!("expected a schema violation, got {other:?}"),
    }
}
