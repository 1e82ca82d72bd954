use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::dataset::fingerprint_bytes;
use crate::encoding::CategoryEncoder;
use crate::features::StandardScaler;
use crate::forest::RandomForest;

pub const FORMAT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "ipl_score_model.json";
pub const TEAM_ENCODER_FILE: &str = "team_encoder.json";
pub const VENUE_ENCODER_FILE: &str = "venue_encoder.json";
pub const SCALER_FILE: &str = "scaler.json";

pub const ARTIFACT_FILES: [&str; 4] = [MODEL_FILE, TEAM_ENCODER_FILE, VENUE_ENCODER_FILE, SCALER_FILE];

static BUNDLE: OnceCell<Result<ArtifactBundle>> = OnceCell::new();

/// Every artifact file carries the id of the training run that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    bundle_id: String,
    payload: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub generated_at: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub rmse: f64,
    #[serde(default)]
    pub mae: f64,
    pub source_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelFile {
    meta: BundleMeta,
    forest: RandomForest,
}

/// Model, both encoders and the scaler of one training run. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub bundle_id: String,
    pub meta: BundleMeta,
    pub model: RandomForest,
    pub team_encoder: CategoryEncoder,
    pub venue_encoder: CategoryEncoder,
    pub scaler: StandardScaler,
}

impl ArtifactBundle {
    /// Structural checks shared by save and load.
    pub fn check(&self) -> Result<()> {
        if self.team_encoder.len() < 2 {
            return Err(anyhow!("team encoder needs at least two teams"));
        }
        if self.venue_encoder.is_empty() {
            return Err(anyhow!("venue encoder is empty"));
        }
        if !self.team_encoder.is_canonical() || !self.venue_encoder.is_canonical() {
            return Err(anyhow!("encoder classes are not in ascending order"));
        }
        self.scaler.check_layout().context("scaler layout")?;
        self.model.check().context("model")?;
        Ok(())
    }
}

pub fn new_bundle_id(generated_at: &str, source_fingerprint: &str) -> String {
    let digest = fingerprint_bytes(format!("{generated_at}|{source_fingerprint}").as_bytes());
    digest[..16].to_string()
}

pub fn artifact_paths(dir: &Path) -> Vec<PathBuf> {
    ARTIFACT_FILES.iter().map(|name| dir.join(name)).collect()
}

pub fn missing_artifacts(dir: &Path) -> Vec<PathBuf> {
    artifact_paths(dir)
        .into_iter()
        .filter(|path| !path.is_file())
        .collect()
}

/// Writes all four files as temporaries first and only then swaps them in, so a
/// failed run never replaces part of an existing bundle.
pub fn save_bundle(dir: &Path, bundle: &ArtifactBundle) -> Result<()> {
    bundle.check().context("refusing to save inconsistent bundle")?;
    fs::create_dir_all(dir).with_context(|| format!("create artifact dir {}", dir.display()))?;

    let id = &bundle.bundle_id;
    let staged = [
        (
            MODEL_FILE,
            to_json(
                id,
                &ModelFile {
                    meta: bundle.meta.clone(),
                    forest: bundle.model.clone(),
                },
            )?,
        ),
        (TEAM_ENCODER_FILE, to_json(id, &bundle.team_encoder)?),
        (VENUE_ENCODER_FILE, to_json(id, &bundle.venue_encoder)?),
        (SCALER_FILE, to_json(id, &bundle.scaler)?),
    ];

    let mut written: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(staged.len());
    for (name, json) in staged {
        let target = dir.join(name);
        let tmp = target.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp, json) {
            for (tmp, _) in &written {
                let _ = fs::remove_file(tmp);
            }
            let _ = fs::remove_file(&tmp);
            return Err(err).with_context(|| format!("write {}", tmp.display()));
        }
        written.push((tmp, target));
    }

    swap_in(&written)
}

/// Renames each staged file over its target, keeping the old file as `.json.bak`
/// until all four are in place. Any failure puts the old files back and removes
/// every temporary.
fn swap_in(staged: &[(PathBuf, PathBuf)]) -> Result<()> {
    let mut swapped: Vec<(&Path, PathBuf, bool)> = Vec::with_capacity(staged.len());
    for (tmp, target) in staged {
        let backup = target.with_extension("json.bak");
        let had_previous = target.is_file();
        let step = || -> std::io::Result<()> {
            if had_previous {
                fs::rename(target, &backup)?;
            }
            fs::rename(tmp, target)
        };
        if let Err(err) = step() {
            if had_previous && backup.is_file() && !target.exists() {
                let _ = fs::rename(&backup, target);
            }
            roll_back(staged, &swapped);
            return Err(err).with_context(|| format!("swap {}", target.display()));
        }
        swapped.push((target.as_path(), backup, had_previous));
    }
    for (_, backup, had_previous) in &swapped {
        if *had_previous {
            let _ = fs::remove_file(backup);
        }
    }
    Ok(())
}

fn roll_back(staged: &[(PathBuf, PathBuf)], swapped: &[(&Path, PathBuf, bool)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
    for (target, backup, had_previous) in swapped.iter().rev() {
        if *had_previous {
            let _ = fs::rename(backup, target);
        } else {
            let _ = fs::remove_file(target);
        }
    }
}

pub fn load_bundle(dir: &Path) -> Result<ArtifactBundle> {
    let missing = missing_artifacts(dir);
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(anyhow!("missing artifacts: {names}"));
    }

    let model: Envelope<ModelFile> = read_json(&dir.join(MODEL_FILE))?;
    let team: Envelope<CategoryEncoder> = read_json(&dir.join(TEAM_ENCODER_FILE))?;
    let venue: Envelope<CategoryEncoder> = read_json(&dir.join(VENUE_ENCODER_FILE))?;
    let scaler: Envelope<StandardScaler> = read_json(&dir.join(SCALER_FILE))?;

    let headers = [
        (MODEL_FILE, model.format_version, model.bundle_id.as_str()),
        (TEAM_ENCODER_FILE, team.format_version, team.bundle_id.as_str()),
        (VENUE_ENCODER_FILE, venue.format_version, venue.bundle_id.as_str()),
        (SCALER_FILE, scaler.format_version, scaler.bundle_id.as_str()),
    ];
    for (name, version, id) in headers {
        if version != FORMAT_VERSION {
            return Err(anyhow!(
                "{name} has format version {version}, expected {FORMAT_VERSION}"
            ));
        }
        if id != model.bundle_id {
            return Err(anyhow!(
                "{name} belongs to bundle {id}, model belongs to {}; retrain to rebuild the set",
                model.bundle_id
            ));
        }
    }

    let bundle = ArtifactBundle {
        bundle_id: model.bundle_id,
        meta: model.payload.meta,
        model: model.payload.forest,
        team_encoder: team.payload,
        venue_encoder: venue.payload,
        scaler: scaler.payload,
    };
    bundle.check()?;
    Ok(bundle)
}

/// Process-wide bundle from `config::artifact_dir()`, loaded on first call only.
/// A failed load is cached as well; the caller must not fall back to anything.
pub fn global_bundle() -> Result<&'static ArtifactBundle, &'static anyhow::Error> {
    BUNDLE
        .get_or_init(|| load_bundle(&config::artifact_dir()))
        .as_ref()
}

fn to_json<T: Serialize>(bundle_id: &str, payload: &T) -> Result<String> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        bundle_id: bundle_id.to_string(),
        payload,
    };
    serde_json::to_string(&envelope).context("serialize artifact")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Envelope<T>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str::<Envelope<T>>(&raw).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_id_depends_on_both_inputs() {
        let a = new_bundle_id("2026-01-01T00:00:00Z", "abc");
        assert_eq!(a.len(), 16);
        assert_eq!(a, new_bundle_id("2026-01-01T00:00:00Z", "abc"));
        assert_ne!(a, new_bundle_id("2026-01-01T00:00:01Z", "abc"));
        assert_ne!(a, new_bundle_id("2026-01-01T00:00:00Z", "abd"));
    }

    #[test]
    fn missing_dir_lists_all_four() {
        let dir = std::env::temp_dir().join("ipl_score_missing_artifacts_probe");
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(missing_artifacts(&dir).len(), 4);
        assert!(load_bundle(&dir).is_err());
    }
}
