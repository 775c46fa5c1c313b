use serde_yaml::{Mapping, Number, Value};
use tracing::info;

use crate::document::{load_document, store_document, DocumentEditor};
use crate::error::MissionEditError;
use crate::missions::{ensure_local_sets, MISSIONS_KEY, STATUS_KEY};
use crate::yaml::key;

pub const EPILOGUE_SET: &str = "missionset_main_cityepilogue";
pub const EPILOGUE_MISSION: &str = "mission_main_cityepilogue";
pub const EPILOGUE_CURSOR: &str = "cursor_cityepilogue_missioncomplete";

pub const COMPLETED_POST_FINISHED: &str = "Completed_PostFinished";
pub const COMPLETED_FINISHING: &str = "Completed_Finishing";
pub const DEACTIVATED_POST_FINISHED: &str = "Deactivated_PostFinished";

pub const OBJECTIVE_STATUSES: [&str; 3] = [
    COMPLETED_POST_FINISHED,
    COMPLETED_FINISHING,
    DEACTIVATED_POST_FINISHED,
];

const FINAL_FLAGS: &[&str] = &[
    "missioncomplete",
    "rewardsgranted",
    "turnedin",
    "epiloguewatched",
];

// (objective, status, updatecount)
const OBJECTIVES: &[(&str, &str, Option<i64>)] = &[
    ("obj_travel_tothecity", COMPLETED_POST_FINISHED, None),
    ("obj_meet_resistance", COMPLETED_POST_FINISHED, None),
    ("obj_talkto_lilith", COMPLETED_POST_FINISHED, None),
    ("obj_defeat_timekeeper_remnants", COMPLETED_POST_FINISHED, Some(3)),
    ("obj_return_tobase", COMPLETED_FINISHING, None),
    ("obj_celebrate", COMPLETED_FINISHING, None),
    ("obj_optional_explore_city", DEACTIVATED_POST_FINISHED, None),
    ("obj_waypoint_epilogue", DEACTIVATED_POST_FINISHED, None),
];

// Mission set forcing the final story mission into its fully resolved state.
// Built fresh on every call.
pub fn build_epilogue_patch() -> Value {
    let mut final_flags = Mapping::new();
    for flag in FINAL_FLAGS {
        final_flags.insert(key(flag), Value::Bool(true));
    }

    let mut objectives = Mapping::new();
    for (name, status, update_count) in OBJECTIVES {
        let mut objective = Mapping::new();
        objective.insert(key(STATUS_KEY), key(status));
        if let Some(count) = update_count {
            objective.insert(key("updatecount"), Value::Number(Number::from(*count)));
        }
        objectives.insert(key(name), Value::Mapping(objective));
    }

    let mut mission = Mapping::new();
    mission.insert(key(STATUS_KEY), key("Active"));
    mission.insert(key("cursorposition"), key(EPILOGUE_CURSOR));
    mission.insert(key("final"), Value::Mapping(final_flags));
    mission.insert(key("objectives"), Value::Mapping(objectives));

    let mut missions = Mapping::new();
    missions.insert(key(EPILOGUE_MISSION), Value::Mapping(mission));

    let mut set = Mapping::new();
    set.insert(key(MISSIONS_KEY), Value::Mapping(missions));
    Value::Mapping(set)
}

pub fn apply_epilogue_patch(document: &mut Value) -> &mut Value {
    ensure_local_sets(document).insert(key(EPILOGUE_SET), build_epilogue_patch());
    document
}

// Standalone read-modify-write against the editor.
pub fn patch_epilogue(editor: &mut dyn DocumentEditor) -> Result<(), MissionEditError> {
    let mut document = load_document(editor)?;
    apply_epilogue_patch(&mut document);
    store_document(editor, &document)?;
    info!("patched {} to its completed state", EPILOGUE_MISSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        apply_epilogue_patch, build_epilogue_patch, patch_epilogue, EPILOGUE_MISSION,
        EPILOGUE_SET, OBJECTIVE_STATUSES,
    };
    use crate::document::MemoryEditor;
    use serde_yaml::{Mapping, Value};

    fn epilogue_mission(patch: &Value) -> &Mapping {
        let missions = patch
            .get("missions")
            .and_then(Value::as_mapping)
            .expect("missions");
        assert_eq!(missions.len(), 1);
        missions
            .get(EPILOGUE_MISSION)
            .and_then(Value::as_mapping)
            .expect("epilogue mission")
    }

    #[test]
    fn patch_has_expected_shape() {
        let patch = build_epilogue_patch();
        let mission = epilogue_mission(&patch);

        assert_eq!(mission.get("status").and_then(Value::as_str), Some("Active"));
        assert!(mission.get("cursorposition").is_some());

        let final_flags = mission.get("final").and_then(Value::as_mapping).expect("final");
        assert!(!final_flags.is_empty());
        assert!(final_flags.values().all(|flag| flag.as_bool() == Some(true)));

        let objectives = mission
            .get("objectives")
            .and_then(Value::as_mapping)
            .expect("objectives");
        assert!(!objectives.is_empty());
        let mut update_counts = 0;
        for objective in objectives.values() {
            let status = objective.get("status").and_then(Value::as_str).expect("status");
            assert!(OBJECTIVE_STATUSES.contains(&status), "unexpected status {status}");
            if let Some(count) = objective.get("updatecount") {
                assert!(count.as_i64().is_some());
                update_counts += 1;
            }
        }
        assert_eq!(update_counts, 1);
    }

    #[test]
    fn patch_is_fresh_each_call() {
        let mut first = build_epilogue_patch();
        first
            .as_mapping_mut()
            .expect("patch mapping")
            .insert(Value::String("tampered".into()), Value::Bool(true));
        let second = build_epilogue_patch();
        assert_ne!(first, second);
        assert!(second.get("tampered").is_none());
    }

    #[test]
    fn apply_replaces_only_the_epilogue_set() {
        let mut document: Value = serde_yaml::from_str(
            r#"
missions:
  local_sets:
    missionset_main_cityepilogue:
      missions:
        mission_main_cityepilogue: {status: Active}
    missionset_side_a: {missions: {}}
state: {char_name: Vex}
"#,
        )
        .expect("parse");

        apply_epilogue_patch(&mut document);

        let sets = document["missions"]["local_sets"]
            .as_mapping()
            .expect("local_sets");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets.get(EPILOGUE_SET), Some(&build_epilogue_patch()));
        assert!(sets.get("missionset_side_a").is_some());
        assert_eq!(document["state"]["char_name"].as_str(), Some("Vex"));
    }

    #[test]
    fn patch_epilogue_round_trips_through_editor() {
        let mut editor = MemoryEditor::new("state: {char_name: Rafa}\n");
        patch_epilogue(&mut editor).expect("patch");

        let document: Value = serde_yaml::from_str(editor.as_str()).expect("parse output");
        assert_eq!(
            document["missions"]["local_sets"][EPILOGUE_SET],
            build_epilogue_patch()
        );
    }

    #[test]
    fn patch_epilogue_leaves_malformed_text_untouched() {
        let mut editor = MemoryEditor::new("state: [unterminated");
        let err = patch_epilogue(&mut editor).expect_err("malformed");
        assert!(err.is_parse_failure());
        assert_eq!(editor.as_str(), "state: [unterminated");
    }
}
