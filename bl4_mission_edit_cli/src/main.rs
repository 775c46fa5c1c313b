mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use bl4_mission_edit_core::document::{SavFileEditor, YamlFileEditor};
use bl4_mission_edit_core::lists::{extract_locations, extract_rewards, merge_list_file};
use bl4_mission_edit_core::missions::summarize_missions;
use bl4_mission_edit_core::sav::{decrypt_sav_to_yaml, encrypt_yaml_to_sav};
use bl4_mission_edit_core::sdu::max_sdu_points;
use bl4_mission_edit_core::tables::{
    merge_table, parse_table, table_to_compressed_blob, table_to_yaml,
};
use bl4_mission_edit_core::{
    load_document, DocumentEditor, MissionCatalog, MissionEditError, MissionUnlocker, TableKind,
    UnlockHooks, UnlockReport,
};
use clap::{Parser, Subcommand};
use serde_yaml::Mapping;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::MissionEditConfig;

/// Mission unlocker for Borderlands 4 saves.
#[derive(Parser)]
#[command(name = "bl4-mission-edit", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Mission catalog (plain YAML or compressed blob).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Steam/Epic user id used to decrypt .sav files.
    #[arg(long, global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge every catalog mission set and finish the epilogue.
    CompleteAll { save: PathBuf },

    /// Merge the main story mission sets and finish the epilogue.
    CompleteStory { save: PathBuf },

    /// Merge the safehouse and silo mission sets.
    CompleteSafehouse { save: PathBuf },

    /// Print every mission in the save and which are still active.
    Status { save: PathBuf },

    /// Copy the save's mission sets into a catalog file.
    ///
    /// Sets already in the catalog are replaced whole by the save's copy, so a
    /// mission present only in the old catalog entry of that set is dropped.
    ExtractMissionsets {
        save: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write `<output stem>_compressed.txt`.
        #[arg(long)]
        compressed: bool,
    },

    /// Merge the save's open-world collectibles into a YAML table.
    ExtractCollectibles {
        save: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write `<output stem>_compressed.txt`.
        #[arg(long)]
        compressed: bool,
    },

    /// Merge the profile's global unlockables into a YAML table.
    ExtractUnlockables {
        profile: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write `<output stem>_compressed.txt`.
        #[arg(long)]
        compressed: bool,
    },

    /// Merge discovered locations (or unique rewards) into a text list.
    ExtractList {
        save: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        rewards: bool,
        /// Blob path; defaults to `<output stem>_compressed.txt`.
        #[arg(long)]
        compressed: Option<PathBuf>,
    },

    /// Decrypt a .sav file to YAML.
    Decrypt {
        sav: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Encrypt a YAML file to .sav.
    Encrypt {
        yaml: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy)]
enum UnlockMode {
    All,
    Story,
    Safehouse,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bl4_mission_edit=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MissionEditConfig::load(cli.config.as_deref())?
        .with_overrides(cli.catalog, cli.user_id);

    match cli.command {
        Command::CompleteAll { save } => run_unlock(&config, &save, UnlockMode::All),
        Command::CompleteStory { save } => run_unlock(&config, &save, UnlockMode::Story),
        Command::CompleteSafehouse { save } => run_unlock(&config, &save, UnlockMode::Safehouse),
        Command::Status { save } => print_status(&config, &save),
        Command::ExtractMissionsets {
            save,
            output,
            compressed,
        } => extract_missionsets(&config, &save, &output, compressed),
        Command::ExtractCollectibles {
            save,
            output,
            compressed,
        } => extract_table(&config, TableKind::Collectibles, &save, &output, compressed),
        Command::ExtractUnlockables {
            profile,
            output,
            compressed,
        } => extract_table(&config, TableKind::Unlockables, &profile, &output, compressed),
        Command::ExtractList {
            save,
            output,
            rewards,
            compressed,
        } => extract_list(&config, &save, &output, rewards, compressed.as_deref()),
        Command::Decrypt { sav, output } => decrypt(&config, &sav, &output),
        Command::Encrypt { yaml, output } => encrypt(&config, &yaml, &output),
    }
}

fn is_sav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("sav"))
        .unwrap_or(false)
}

fn require_user_id(config: &MissionEditConfig) -> Result<&str> {
    config
        .save
        .user_id
        .as_deref()
        .ok_or_else(|| anyhow!("a user id is required for .sav files (--user-id or [save] user_id)"))
}

fn open_editor(config: &MissionEditConfig, path: &Path) -> Result<Box<dyn DocumentEditor>> {
    if is_sav(path) {
        let user_id = require_user_id(config)?;
        Ok(Box::new(SavFileEditor::new(path, user_id)))
    } else {
        Ok(Box::new(YamlFileEditor::new(path)))
    }
}

fn load_catalog(config: &MissionEditConfig) -> Result<MissionCatalog> {
    let Some(path) = config.catalog.path.as_deref() else {
        bail!("no mission catalog configured (--catalog or [catalog] path)");
    };
    MissionCatalog::load(path)
}

fn run_unlock(config: &MissionEditConfig, save: &Path, mode: UnlockMode) -> Result<()> {
    let catalog = load_catalog(config)?;
    let mut editor = open_editor(config, save)?;

    let mut hooks = UnlockHooks::default();
    if config.hooks.sdu_points {
        hooks = hooks.with_sdu_points(max_sdu_points);
    }

    let mut unlocker = MissionUnlocker::new(&catalog, editor.as_mut())
        .with_namespaces(config.namespaces.clone())
        .with_hooks(hooks);
    let report = match mode {
        UnlockMode::All => unlocker.complete_all_missions(),
        UnlockMode::Story => unlocker.complete_story_missions(),
        UnlockMode::Safehouse => unlocker.complete_safehouse_missions(),
    }
    .map_err(|err| unlock_error(save, err))?;

    print_report(save, &report);
    Ok(())
}

// Only a parse failure guarantees nothing was written; later steps may fail
// after an earlier merge already landed.
fn unlock_error(save: &Path, err: MissionEditError) -> anyhow::Error {
    if err.is_parse_failure() {
        anyhow::Error::new(err).context(format!("{} was left unchanged", save.display()))
    } else {
        anyhow::Error::new(err).context(format!("failed to update {}", save.display()))
    }
}

fn compressed_sibling(path: &Path) -> PathBuf {
    let mut name = path.with_extension("").into_os_string();
    name.push("_compressed.txt");
    PathBuf::from(name)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn print_report(save: &Path, report: &UnlockReport) {
    println!("{}: merged {} mission sets", save.display(), report.merged_sets);
    if report.epilogue_patched {
        println!("  epilogue patched");
    }
    for hook in &report.hooks_run {
        println!("  hook {hook}: ok");
    }
    for hook in &report.hooks_skipped {
        println!("  hook {hook}: not available");
    }
    for (hook, message) in &report.hooks_failed {
        println!("  hook {hook}: failed ({message})");
    }
}

fn print_status(config: &MissionEditConfig, save: &Path) -> Result<()> {
    let editor = open_editor(config, save)?;
    let document = load_document(editor.as_ref())?;
    let summary = summarize_missions(&document);

    for mission in &summary.missions {
        println!(
            "{} / {}: {}",
            mission.set,
            mission.mission,
            mission.status.as_deref().unwrap_or("-")
        );
    }
    println!(
        "{} missions, {} still active",
        summary.missions.len(),
        summary.active_missions.len()
    );
    Ok(())
}

fn extract_missionsets(
    config: &MissionEditConfig,
    save: &Path,
    output: &Path,
    compressed: bool,
) -> Result<()> {
    let editor = open_editor(config, save)?;
    let document = load_document(editor.as_ref())?;
    let extracted = MissionCatalog::extract_from_save(&document);

    let mut catalog = if output.exists() {
        MissionCatalog::load(output)?
    } else {
        MissionCatalog::default()
    };
    let extracted_count = extracted.len();
    let added = catalog.absorb(extracted);

    write_file(output, &catalog.to_yaml_string()?)?;
    if compressed {
        write_file(&compressed_sibling(output), &catalog.to_compressed_blob()?)?;
    }
    info!(
        extracted = extracted_count,
        added,
        total = catalog.len(),
        "wrote mission catalog {}",
        output.display()
    );
    Ok(())
}

fn extract_list(
    config: &MissionEditConfig,
    save: &Path,
    output: &Path,
    rewards: bool,
    compressed: Option<&Path>,
) -> Result<()> {
    let editor = open_editor(config, save)?;
    let document = load_document(editor.as_ref())?;
    let entries = if rewards {
        extract_rewards(&document)
    } else {
        extract_locations(&document)
    };

    let existing = if output.exists() {
        fs::read_to_string(output).with_context(|| format!("failed to read {}", output.display()))?
    } else {
        String::new()
    };
    let merged = merge_list_file(&existing, &entries);
    if merged.added == 0 {
        info!(
            extracted = merged.extracted,
            "no new entries for {}, nothing written",
            output.display()
        );
        return Ok(());
    }

    write_file(output, &merged.to_text())?;
    let blob_path = compressed
        .map(Path::to_path_buf)
        .unwrap_or_else(|| compressed_sibling(output));
    write_file(&blob_path, &merged.to_compressed_blob()?)?;

    info!(
        extracted = merged.extracted,
        added = merged.added,
        total = merged.entries.len(),
        "wrote list {}",
        output.display()
    );
    Ok(())
}

fn extract_table(
    config: &MissionEditConfig,
    kind: TableKind,
    save: &Path,
    output: &Path,
    compressed: bool,
) -> Result<()> {
    let editor = open_editor(config, save)?;
    let document = load_document(editor.as_ref())?;
    let extracted = kind.extract(&document);
    let extracted_count = extracted.len();

    let mut table = if output.exists() {
        let existing = fs::read_to_string(output)
            .with_context(|| format!("failed to read {}", output.display()))?;
        parse_table(&existing).with_context(|| format!("failed to load {}", output.display()))?
    } else {
        Mapping::new()
    };
    merge_table(&mut table, extracted);

    write_file(output, &table_to_yaml(&table)?)?;
    if compressed {
        write_file(&compressed_sibling(output), &table_to_compressed_blob(&table)?)?;
    }
    info!(
        extracted = extracted_count,
        total = table.len(),
        "wrote {} table {}",
        kind.name(),
        output.display()
    );
    Ok(())
}

fn decrypt(config: &MissionEditConfig, sav: &Path, output: &Path) -> Result<()> {
    let user_id = require_user_id(config)?;
    let encrypted = fs::read(sav).with_context(|| format!("failed to read {}", sav.display()))?;
    let yaml_bytes = decrypt_sav_to_yaml(&encrypted, user_id)
        .with_context(|| format!("failed to decrypt {}", sav.display()))?;
    fs::write(output, yaml_bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("decrypted {} to {}", sav.display(), output.display());
    Ok(())
}

fn encrypt(config: &MissionEditConfig, yaml: &Path, output: &Path) -> Result<()> {
    let user_id = require_user_id(config)?;
    let yaml_bytes = fs::read(yaml).with_context(|| format!("failed to read {}", yaml.display()))?;
    let encrypted = encrypt_yaml_to_sav(&yaml_bytes, user_id)?;
    fs::write(output, encrypted)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("encrypted {} to {}", yaml.display(), output.display());
    Ok(())
}
