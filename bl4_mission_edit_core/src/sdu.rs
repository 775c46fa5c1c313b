use std::collections::BTreeMap;

use anyhow::Result;
use serde_yaml::{Mapping, Number, Value};
use tracing::info;

use crate::document::{load_document, store_document, DocumentEditor};
use crate::yaml::{
    as_mapping, ensure_child_mapping, ensure_mapping, get_mapping, get_sequence, get_string, key,
    mapping_mut, sequence_mut,
};

pub const SDU_GRAPH: &str = "sdu_upgrades";
pub const SDU_GROUP_DEF: &str = "Oak2_GlobalProgressGraph_Group";

// Node name prefix and highest tier for each SDU family.
pub const SDU_FAMILIES: &[(&str, i32)] = &[
    ("Ammo_Pistol_", 7),
    ("Ammo_SMG_", 7),
    ("Ammo_AR_", 7),
    ("Ammo_SG_", 7),
    ("Ammo_SR_", 7),
    ("Backpack_", 8),
    ("Bank_", 8),
    ("Lost_Loot_", 8),
];

pub fn sdu_tier_cost(tier: i32) -> i64 {
    match tier {
        1 => 5,
        2 => 10,
        3 => 20,
        4 => 30,
        5 => 50,
        6 => 80,
        7 => 120,
        8 => 235,
        _ => 0,
    }
}

// Unlock hook: every SDU family at its top tier.
pub fn max_sdu_points(editor: &mut dyn DocumentEditor) -> Result<()> {
    let mut document = load_document(editor)?;
    apply_max_sdu_levels(&mut document);
    store_document(editor, &document)?;
    info!("raised every SDU family to its top tier");
    Ok(())
}

pub fn apply_max_sdu_levels(document: &mut Value) {
    let progression = progression_mut(document);
    let graphs_value = progression
        .entry(key("graphs"))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if sequence_mut(graphs_value).is_none() {
        *graphs_value = Value::Sequence(Vec::new());
    }
    let Some(graphs) = sequence_mut(graphs_value) else {
        return;
    };

    let mut sdu_found = false;
    for graph in graphs.iter_mut() {
        let Some(graph_map) = mapping_mut(graph) else {
            continue;
        };
        if get_string(graph_map, "name").as_deref() != Some(SDU_GRAPH) {
            continue;
        }
        sdu_found = true;
        graph_map.insert(key("nodes"), Value::Sequence(max_tier_nodes()));
    }

    if !sdu_found {
        let mut graph_map = Mapping::new();
        graph_map.insert(key("name"), key(SDU_GRAPH));
        graph_map.insert(key("group_def_name"), key(SDU_GROUP_DEF));
        graph_map.insert(key("nodes"), Value::Sequence(max_tier_nodes()));
        graphs.push(Value::Mapping(graph_map));
    }
}

// Highest unlocked tier per family prefix, read back from the SDU graph.
pub fn sdu_tiers(document: &Value) -> BTreeMap<String, i32> {
    let mut tiers = BTreeMap::new();
    let Some(root) = as_mapping(document) else {
        return tiers;
    };
    let progression = get_mapping(root, "state")
        .and_then(|state| get_mapping(state, "progression"))
        .or_else(|| get_mapping(root, "progression"));
    let Some(graphs) = progression.and_then(|progression| get_sequence(progression, "graphs")) else {
        return tiers;
    };

    let nodes = graphs
        .iter()
        .filter_map(as_mapping)
        .filter(|graph| get_string(graph, "name").as_deref() == Some(SDU_GRAPH))
        .filter_map(|graph| get_sequence(graph, "nodes"))
        .flatten()
        .filter_map(as_mapping);
    for node in nodes {
        let Some(name) = get_string(node, "name") else {
            continue;
        };
        let Some((prefix, _)) = SDU_FAMILIES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
        else {
            continue;
        };
        let Ok(tier) = name[prefix.len()..].parse::<i32>() else {
            continue;
        };
        let slot = tiers.entry(prefix.to_string()).or_insert(0);
        *slot = (*slot).max(tier);
    }
    tiers
}

// `state.progression` when the save keeps it there, otherwise root `progression`.
fn progression_mut(document: &mut Value) -> &mut Mapping {
    let root = ensure_mapping(document);
    let in_state = get_mapping(root, "state")
        .and_then(|state| get_mapping(state, "progression"))
        .is_some();
    let parent = if in_state {
        ensure_child_mapping(root, "state")
    } else {
        root
    };
    ensure_child_mapping(parent, "progression")
}

fn max_tier_nodes() -> Vec<Value> {
    let mut nodes = Vec::new();
    for (prefix, max_tier) in SDU_FAMILIES {
        for tier in 1..=*max_tier {
            let mut node_map = Mapping::new();
            node_map.insert(key("name"), Value::String(format!("{prefix}{tier:02}")));
            node_map.insert(
                key("points_spent"),
                Value::Number(Number::from(sdu_tier_cost(tier))),
            );
            nodes.push(Value::Mapping(node_map));
        }
    }
    nodes
}
