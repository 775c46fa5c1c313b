use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::catalog::MissionSetSelection;
use crate::yaml::{
    as_mapping, ensure_child_mapping, ensure_mapping, get_mapping, get_string, key,
    value_key_to_string,
};

pub const MISSIONS_KEY: &str = "missions";
pub const LOCAL_SETS_KEY: &str = "local_sets";
pub const STATUS_KEY: &str = "status";

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MissionStatus {
    pub set: String,
    pub mission: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionSummary {
    pub missions: Vec<MissionStatus>,
    pub active_missions: Vec<MissionStatus>,
}

// `missions.local_sets`, created (or reset, if it held something other than a
// mapping) on the way down.
pub fn ensure_local_sets(document: &mut Value) -> &mut Mapping {
    let root = ensure_mapping(document);
    let missions = ensure_child_mapping(root, MISSIONS_KEY);
    ensure_child_mapping(missions, LOCAL_SETS_KEY)
}

pub fn merge_missionsets<'d>(
    document: &'d mut Value,
    selection: &MissionSetSelection<'_>,
) -> &'d mut Value {
    let local_sets = ensure_local_sets(document);
    for (name, set) in selection.iter() {
        let replaced = local_sets.insert(key(name), set.clone()).is_some();
        debug!(missionset = name, replaced, "merged mission set");
    }
    document
}

pub fn summarize_missions(document: &Value) -> MissionSummary {
    let mut summary = MissionSummary::default();
    let Some(local_sets) = as_mapping(document)
        .and_then(|root| get_mapping(root, MISSIONS_KEY))
        .and_then(|missions| get_mapping(missions, LOCAL_SETS_KEY))
    else {
        return summary;
    };

    for (set_key, set_value) in local_sets {
        let set_name = value_key_to_string(set_key).unwrap_or_default();
        let Some(missions) = as_mapping(set_value).and_then(|set| get_mapping(set, MISSIONS_KEY))
        else {
            continue;
        };
        for (mission_key, mission_value) in missions {
            let status = as_mapping(mission_value).and_then(|mission| get_string(mission, STATUS_KEY));
            let mission_status = MissionStatus {
                set: set_name.clone(),
                mission: value_key_to_string(mission_key).unwrap_or_default(),
                status,
            };
            if mission_status
                .status
                .as_deref()
                .map(mission_status_is_active)
                .unwrap_or(false)
            {
                summary.active_missions.push(mission_status.clone());
            }
            summary.missions.push(mission_status);
        }
    }

    summary.missions.sort();
    summary.active_missions.sort();
    summary
}

pub fn mission_status_is_active(status: &str) -> bool {
    let lowered = status.to_ascii_lowercase();
    if lowered.is_empty()
        || lowered == "none"
        || lowered.contains("complete")
        || lowered.contains("finished")
        || lowered.contains("deactivated")
        || lowered.contains("inactive")
    {
        return false;
    }

    lowered.contains("active")
        || lowered.contains("inprogress")
        || lowered.contains("started")
        || lowered.contains("running")
        || lowered.contains("pending")
}
