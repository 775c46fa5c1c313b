use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::catalog::MissionCatalog;
use crate::document::{load_document, store_document, DocumentEditor};
use crate::epilogue::patch_epilogue;
use crate::error::MissionEditError;
use crate::missions::merge_missionsets;

pub type UnlockHook<'a> = Box<dyn FnMut(&mut dyn DocumentEditor) -> anyhow::Result<()> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    StoryValues,
    VaultDoors,
    SafehouseDiscovery,
    SduPoints,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::StoryValues => "story_values",
            HookKind::VaultDoors => "vault_doors",
            HookKind::SafehouseDiscovery => "safehouse_discovery",
            HookKind::SduPoints => "sdu_points",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Optional unlock steps run after the mission sets are merged. Empty slots are skipped.
#[derive(Default)]
pub struct UnlockHooks<'a> {
    pub story_values: Option<UnlockHook<'a>>,
    pub vault_doors: Option<UnlockHook<'a>>,
    pub safehouse_discovery: Option<UnlockHook<'a>>,
    pub sdu_points: Option<UnlockHook<'a>>,
}

impl<'a> UnlockHooks<'a> {
    pub fn with_story_values(
        mut self,
        hook: impl FnMut(&mut dyn DocumentEditor) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.story_values = Some(Box::new(hook));
        self
    }

    pub fn with_vault_doors(
        mut self,
        hook: impl FnMut(&mut dyn DocumentEditor) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.vault_doors = Some(Box::new(hook));
        self
    }

    pub fn with_safehouse_discovery(
        mut self,
        hook: impl FnMut(&mut dyn DocumentEditor) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.safehouse_discovery = Some(Box::new(hook));
        self
    }

    pub fn with_sdu_points(
        mut self,
        hook: impl FnMut(&mut dyn DocumentEditor) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.sdu_points = Some(Box::new(hook));
        self
    }

    fn slot_mut(&mut self, kind: HookKind) -> &mut Option<UnlockHook<'a>> {
        match kind {
            HookKind::StoryValues => &mut self.story_values,
            HookKind::VaultDoors => &mut self.vault_doors,
            HookKind::SafehouseDiscovery => &mut self.safehouse_discovery,
            HookKind::SduPoints => &mut self.sdu_points,
        }
    }
}

impl fmt::Debug for UnlockHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockHooks")
            .field("story_values", &self.story_values.is_some())
            .field("vault_doors", &self.vault_doors.is_some())
            .field("safehouse_discovery", &self.safehouse_discovery.is_some())
            .field("sdu_points", &self.sdu_points.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MissionNamespaces {
    pub all: String,
    pub story: String,
    pub safehouse: String,
    pub silo: String,
}

impl Default for MissionNamespaces {
    fn default() -> Self {
        Self {
            all: "missionset_".into(),
            story: "missionset_main".into(),
            safehouse: "missionset_zoneactivity_safehouse".into(),
            silo: "missionset_zoneactivity_silo".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    pub merged_sets: usize,
    pub epilogue_patched: bool,
    pub hooks_run: Vec<HookKind>,
    pub hooks_skipped: Vec<HookKind>,
    pub hooks_failed: Vec<(HookKind, String)>,
}

pub struct MissionUnlocker<'a> {
    catalog: &'a MissionCatalog,
    editor: &'a mut dyn DocumentEditor,
    namespaces: MissionNamespaces,
    hooks: UnlockHooks<'a>,
}

impl<'a> MissionUnlocker<'a> {
    pub fn new(catalog: &'a MissionCatalog, editor: &'a mut dyn DocumentEditor) -> Self {
        Self {
            catalog,
            editor,
            namespaces: MissionNamespaces::default(),
            hooks: UnlockHooks::default(),
        }
    }

    pub fn with_namespaces(mut self, namespaces: MissionNamespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_hooks(mut self, hooks: UnlockHooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn complete_all_missions(&mut self) -> Result<UnlockReport, MissionEditError> {
        let mut report = UnlockReport::default();
        let stem = self.namespaces.all.clone();
        report.merged_sets += self.merge_namespace(&stem)?;
        self.run_epilogue_patch(&mut report)?;
        self.run_hooks(
            &[
                HookKind::StoryValues,
                HookKind::VaultDoors,
                HookKind::SafehouseDiscovery,
                HookKind::SduPoints,
            ],
            &mut report,
        );
        info!(merged = report.merged_sets, "completed all missions");
        Ok(report)
    }

    pub fn complete_story_missions(&mut self) -> Result<UnlockReport, MissionEditError> {
        let mut report = UnlockReport::default();
        let story = self.namespaces.story.clone();
        report.merged_sets += self.merge_namespace(&story)?;
        self.run_epilogue_patch(&mut report)?;
        self.run_hooks(&[HookKind::StoryValues], &mut report);
        info!(merged = report.merged_sets, "completed story missions");
        Ok(report)
    }

    pub fn complete_safehouse_missions(&mut self) -> Result<UnlockReport, MissionEditError> {
        let mut report = UnlockReport::default();
        let safehouse = self.namespaces.safehouse.clone();
        let silo = self.namespaces.silo.clone();
        report.merged_sets += self.merge_namespace(&safehouse)?;
        report.merged_sets += self.merge_namespace(&silo)?;
        self.run_hooks(
            &[HookKind::SafehouseDiscovery, HookKind::SduPoints],
            &mut report,
        );
        info!(merged = report.merged_sets, "completed safehouse and silo missions");
        Ok(report)
    }

    // One full read-modify-write cycle per namespace.
    fn merge_namespace(&mut self, prefix: &str) -> Result<usize, MissionEditError> {
        let mut document = load_document(&*self.editor)?;
        let selection = self.catalog.select_by_prefix(prefix);
        merge_missionsets(&mut document, &selection);
        store_document(&mut *self.editor, &document)?;
        debug!(prefix, merged = selection.len(), "merged catalog namespace");
        Ok(selection.len())
    }

    // Re-reads the editor, so it sees whatever the merge step stored.
    fn run_epilogue_patch(&mut self, report: &mut UnlockReport) -> Result<(), MissionEditError> {
        patch_epilogue(&mut *self.editor)?;
        report.epilogue_patched = true;
        Ok(())
    }

    fn run_hooks(&mut self, kinds: &[HookKind], report: &mut UnlockReport) {
        for &kind in kinds {
            let Some(hook) = self.hooks.slot_mut(kind).as_mut() else {
                debug!(hook = %kind, "unlock hook not available, skipping");
                report.hooks_skipped.push(kind);
                continue;
            };
            match hook(&mut *self.editor) {
                Ok(()) => {
                    debug!(hook = %kind, "ran unlock hook");
                    report.hooks_run.push(kind);
                }
                Err(err) => {
                    warn!(hook = %kind, "unlock hook failed: {:#}", err);
                    report.hooks_failed.push((kind, format!("{err:#}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::anyhow;
    use serde_yaml::{Mapping, Value};

    use super::{HookKind, MissionNamespaces, MissionUnlocker, UnlockHooks};
    use crate::catalog::MissionCatalog;
    use crate::document::{load_document, DocumentEditor, MemoryEditor};
    use crate::epilogue::{build_epilogue_patch, EPILOGUE_SET};

    const CATALOG: &str = r#"
missionset_main_x:
  a: 1
missionset_side_y:
  b: 2
missionset_zoneactivity_safehouse_a:
  c: 3
missionset_zoneactivity_silo_b:
  d: 4
"#;

    fn catalog() -> MissionCatalog {
        MissionCatalog::from_yaml_str(CATALOG).expect("catalog")
    }

    fn parse(text: &str) -> Value {
        serde_yaml::from_str(text).expect("parse yaml")
    }

    fn local_sets(editor: &MemoryEditor) -> Mapping {
        parse(editor.as_str())["missions"]["local_sets"]
            .as_mapping()
            .cloned()
            .expect("local_sets")
    }

    #[test]
    fn complete_story_merges_main_sets_and_patches_epilogue() {
        let catalog = catalog();
        let mut editor = MemoryEditor::new("missions: {local_sets: {foo: 1}}");

        let report = MissionUnlocker::new(&catalog, &mut editor)
            .complete_story_missions()
            .expect("complete story");

        let mut expected = Mapping::new();
        expected.insert("foo".into(), 1.into());
        expected.insert("missionset_main_x".into(), parse("{a: 1}"));
        expected.insert(EPILOGUE_SET.into(), build_epilogue_patch());
        assert_eq!(local_sets(&editor), expected);
        assert_eq!(report.merged_sets, 1);
        assert!(report.epilogue_patched);
        assert_eq!(report.hooks_skipped, vec![HookKind::StoryValues]);
    }

    #[test]
    fn complete_all_on_empty_document_adds_only_missions() {
        let catalog = catalog();
        let mut editor = MemoryEditor::new("{}");

        let report = MissionUnlocker::new(&catalog, &mut editor)
            .complete_all_missions()
            .expect("complete all");

        let document = parse(editor.as_str());
        let root_keys: Vec<_> = document
            .as_mapping()
            .expect("root")
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(root_keys, vec!["missions"]);

        let sets = local_sets(&editor);
        assert_eq!(sets.len(), catalog.len() + 1);
        for name in catalog.names() {
            assert_eq!(sets.get(name), catalog.get(name), "{name}");
        }
        assert_eq!(sets.get(EPILOGUE_SET), Some(&build_epilogue_patch()));
        assert_eq!(report.merged_sets, 4);
        assert_eq!(report.hooks_skipped.len(), 4);
    }

    #[test]
    fn malformed_document_is_left_untouched() {
        let catalog = catalog();
        let calls = RefCell::new(Vec::new());
        let malformed = "missions: {local_sets: [";
        let mut editor = MemoryEditor::new(malformed);

        let hooks = UnlockHooks::default()
            .with_story_values(|_| {
                calls.borrow_mut().push(HookKind::StoryValues);
                Ok(())
            })
            .with_sdu_points(|_| {
                calls.borrow_mut().push(HookKind::SduPoints);
                Ok(())
            });
        let mut unlocker = MissionUnlocker::new(&catalog, &mut editor).with_hooks(hooks);

        for result in [
            unlocker.complete_all_missions(),
            unlocker.complete_story_missions(),
            unlocker.complete_safehouse_missions(),
        ] {
            let err = result.expect_err("parse failure");
            assert!(err.is_parse_failure());
        }
        drop(unlocker);

        assert_eq!(editor.as_str(), malformed);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn complete_safehouse_merges_both_namespaces_without_epilogue() {
        let catalog = catalog();
        let mut editor = MemoryEditor::new("state: {char_name: Vex}\n");

        let report = MissionUnlocker::new(&catalog, &mut editor)
            .complete_safehouse_missions()
            .expect("complete safehouse");

        let sets = local_sets(&editor);
        let names: Vec<_> = sets.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            names,
            vec!["missionset_zoneactivity_safehouse_a", "missionset_zoneactivity_silo_b"]
        );
        assert!(!report.epilogue_patched);
        assert_eq!(report.merged_sets, 2);
        assert_eq!(
            report.hooks_skipped,
            vec![HookKind::SafehouseDiscovery, HookKind::SduPoints]
        );
        assert_eq!(parse(editor.as_str())["state"]["char_name"].as_str(), Some("Vex"));
    }

    #[test]
    fn hooks_run_in_order_after_the_epilogue_is_stored() {
        let catalog = catalog();
        let calls = RefCell::new(Vec::new());
        let mut editor = MemoryEditor::new("{}");

        let record = |kind: HookKind| {
            let calls = &calls;
            move |editor: &mut dyn DocumentEditor| -> anyhow::Result<()> {
                let document = load_document(editor)?;
                let patched = document["missions"]["local_sets"].get(EPILOGUE_SET).is_some();
                calls.borrow_mut().push((kind, patched));
                Ok(())
            }
        };
        let hooks = UnlockHooks::default()
            .with_story_values(record(HookKind::StoryValues))
            .with_vault_doors(record(HookKind::VaultDoors))
            .with_safehouse_discovery(record(HookKind::SafehouseDiscovery))
            .with_sdu_points(record(HookKind::SduPoints));

        let report = MissionUnlocker::new(&catalog, &mut editor)
            .with_hooks(hooks)
            .complete_all_missions()
            .expect("complete all");

        let expected_order = vec![
            HookKind::StoryValues,
            HookKind::VaultDoors,
            HookKind::SafehouseDiscovery,
            HookKind::SduPoints,
        ];
        assert_eq!(report.hooks_run, expected_order);
        assert!(report.hooks_skipped.is_empty());
        assert_eq!(
            calls.into_inner(),
            expected_order
                .into_iter()
                .map(|kind| (kind, true))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn missing_and_failing_hooks_do_not_block_later_hooks() {
        let catalog = catalog();
        let calls = RefCell::new(Vec::new());
        let mut editor = MemoryEditor::new("{}");

        let hooks = UnlockHooks::default()
            .with_story_values(|_| Err(anyhow!("story flags unavailable")))
            .with_sdu_points(|_| {
                calls.borrow_mut().push(HookKind::SduPoints);
                Ok(())
            });

        let report = MissionUnlocker::new(&catalog, &mut editor)
            .with_hooks(hooks)
            .complete_all_missions()
            .expect("complete all");

        assert_eq!(report.hooks_run, vec![HookKind::SduPoints]);
        assert_eq!(
            report.hooks_skipped,
            vec![HookKind::VaultDoors, HookKind::SafehouseDiscovery]
        );
        assert_eq!(report.hooks_failed.len(), 1);
        assert_eq!(report.hooks_failed[0].0, HookKind::StoryValues);
        assert!(report.hooks_failed[0].1.contains("story flags unavailable"));
        assert_eq!(calls.into_inner(), vec![HookKind::SduPoints]);
    }

    #[test]
    fn custom_namespaces_change_the_selection() {
        let catalog = catalog();
        let mut editor = MemoryEditor::new("{}");
        let namespaces = MissionNamespaces {
            story: "missionset_side".into(),
            ..MissionNamespaces::default()
        };

        MissionUnlocker::new(&catalog, &mut editor)
            .with_namespaces(namespaces)
            .complete_story_missions()
            .expect("complete story");

        let sets = local_sets(&editor);
        assert!(sets.get("missionset_side_y").is_some());
        assert!(sets.get("missionset_main_x").is_none());
    }

    #[test]
    fn namespaces_deserialize_with_defaults() {
        let namespaces: MissionNamespaces =
            serde_yaml::from_str("silo: missionset_zoneactivity_silo_dlc").expect("parse");
        assert_eq!(namespaces.silo, "missionset_zoneactivity_silo_dlc");
        assert_eq!(namespaces.all, MissionNamespaces::default().all);
    }

    #[test]
    fn operations_are_idempotent() {
        let catalog = catalog();
        let mut editor = MemoryEditor::new("missions: {local_sets: {foo: 1}}");
        let mut unlocker = MissionUnlocker::new(&catalog, &mut editor);
        unlocker.complete_all_missions().expect("first run");
        drop(unlocker);
        let first = editor.as_str().to_string();

        MissionUnlocker::new(&catalog, &mut editor)
            .complete_all_missions()
            .expect("second run");
        assert_eq!(editor.as_str(), first);
    }
}
