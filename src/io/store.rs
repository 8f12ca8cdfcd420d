//! Filesystem artifact store with atomic publication

use super::bundle::{ArtifactBundle, Manifest, Metadata, ScalerDocument};
use crate::model::ModelWeights;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const RUNS_DIR: &str = "runs";
const LATEST: &str = "LATEST";
const MANIFEST: &str = "manifest.json";
const WEIGHTS: &str = "weights.json";
const SCALER_X: &str = "scaler_x.json";
const SCALER_Y: &str = "scaler_y.json";
const METADATA: &str = "metadata.json";

/// Which stored bundle to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    /// Bundle the `LATEST` pointer names
    Latest,
    Run(String),
}

impl FromStr for ArtifactRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Run(s.to_string())
        })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Run(id) => f.write_str(id),
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn check_run_id(run_id: &str) -> Result<()> {
    let valid = !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::Configuration(format!("invalid run id {run_id:?}")))
    }
}

/// Versioned bundle storage rooted at one directory
///
/// ```text
/// <root>/
///   LATEST                 run id of the newest complete bundle
///   runs/<run_id>/
///     weights.json  scaler_x.json  scaler_y.json  metadata.json
///     manifest.json        SHA-256 of the four files above
/// ```
///
/// A bundle is written to a staging directory and renamed into `runs/` only
/// once complete, so readers never observe a partial bundle.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    /// Persist `bundle` as a new immutable version and point `LATEST` at it
    ///
    /// Returns the bundle directory. A run id that already exists is a
    /// configuration error; existing versions are never modified.
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<PathBuf> {
        let run_id = bundle.run_id();
        check_run_id(run_id)?;
        if let Some(problem) = bundle.inconsistency() {
            return Err(Error::Configuration(format!("refusing to save bundle: {problem}")));
        }

        let runs = self.root.join(RUNS_DIR);
        fs::create_dir_all(&runs)?;
        let final_dir = runs.join(run_id);
        if final_dir.exists() {
            return Err(Error::Configuration(format!("run {run_id} already exists")));
        }

        let staging = self.root.join(format!(".staging-{run_id}-{}", std::process::id()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let written = self.write_documents(&staging, bundle).and_then(|()| {
            fs::rename(&staging, &final_dir)?;
            Ok(())
        });
        if let Err(e) = written {
            // best effort; the staging dir is never read
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let pointer_tmp = self.root.join(format!("{LATEST}.{run_id}.tmp"));
        fs::write(&pointer_tmp, run_id)?;
        fs::rename(&pointer_tmp, self.root.join(LATEST))?;

        tracing::info!(run_id, path = %final_dir.display(), "artifact bundle saved");
        Ok(final_dir)
    }

    fn write_documents(&self, dir: &Path, bundle: &ArtifactBundle) -> Result<()> {
        let run_id = bundle.run_id().to_string();
        let documents = [
            (WEIGHTS, serde_json::to_vec(&bundle.weights)?),
            (
                SCALER_X,
                serde_json::to_vec_pretty(&ScalerDocument {
                    run_id: run_id.clone(),
                    params: bundle.scaler_x.clone(),
                })?,
            ),
            (
                SCALER_Y,
                serde_json::to_vec_pretty(&ScalerDocument {
                    run_id: run_id.clone(),
                    params: bundle.scaler_y.clone(),
                })?,
            ),
            (METADATA, serde_json::to_vec_pretty(&bundle.metadata)?),
        ];

        let mut manifest = Manifest {
            run_id,
            created_at: bundle.metadata.created_at,
            files: Default::default(),
        };
        for (name, bytes) in &documents {
            fs::write(dir.join(name), bytes)?;
            manifest.files.insert((*name).to_string(), sha256_hex(bytes));
        }
        fs::write(dir.join(MANIFEST), serde_json::to_vec_pretty(&manifest)?)?;
        Ok(())
    }

    /// Run id the `LATEST` pointer names, if any bundle was saved
    pub fn latest_run_id(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(LATEST)) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load and verify a bundle
    ///
    /// Missing bundles are [`Error::ArtifactNotFound`]; unreadable files,
    /// digest mismatches and run-id disagreements are [`Error::CorruptArtifact`].
    pub fn load(&self, reference: &ArtifactRef) -> Result<ArtifactBundle> {
        let run_id = match reference {
            ArtifactRef::Run(id) => id.clone(),
            ArtifactRef::Latest => self.latest_run_id()?.ok_or_else(|| {
                Error::ArtifactNotFound(format!("no bundle saved under {}", self.root.display()))
            })?,
        };
        check_run_id(&run_id).map_err(|_| Error::ArtifactNotFound(format!("run {run_id:?}")))?;
        let dir = self.run_dir(&run_id);
        if !dir.is_dir() {
            return Err(Error::ArtifactNotFound(format!("run {run_id} ({})", dir.display())));
        }

        let manifest: Manifest = parse(MANIFEST, &read_piece(&dir, MANIFEST)?)?;
        let verified = |name: &str| -> Result<Vec<u8>> {
            let bytes = read_piece(&dir, name)?;
            let expected = manifest
                .files
                .get(name)
                .ok_or_else(|| Error::CorruptArtifact(format!("{name} missing from manifest")))?;
            let actual = sha256_hex(&bytes);
            if &actual != expected {
                return Err(Error::CorruptArtifact(format!(
                    "{name} digest mismatch in run {run_id}"
                )));
            }
            Ok(bytes)
        };

        let weights: ModelWeights = parse(WEIGHTS, &verified(WEIGHTS)?)?;
        let scaler_x: ScalerDocument = parse(SCALER_X, &verified(SCALER_X)?)?;
        let scaler_y: ScalerDocument = parse(SCALER_Y, &verified(SCALER_Y)?)?;
        let metadata: Metadata = parse(METADATA, &verified(METADATA)?)?;

        let ids = [
            (MANIFEST, &manifest.run_id),
            (WEIGHTS, &weights.run_id),
            (SCALER_X, &scaler_x.run_id),
            (SCALER_Y, &scaler_y.run_id),
            (METADATA, &metadata.run_id),
        ];
        if let Some((name, id)) = ids.iter().find(|(_, id)| **id != run_id) {
            return Err(Error::CorruptArtifact(format!(
                "{name} belongs to run {id}, expected {run_id}"
            )));
        }

        let bundle = ArtifactBundle {
            weights,
            scaler_x: scaler_x.params,
            scaler_y: scaler_y.params,
            metadata,
        };
        if let Some(problem) = bundle.inconsistency() {
            return Err(Error::CorruptArtifact(problem));
        }
        tracing::debug!(run_id = %run_id, "artifact bundle loaded");
        Ok(bundle)
    }

    /// Stored run ids, oldest first
    pub fn list(&self) -> Result<Vec<String>> {
        let runs = self.root.join(RUNS_DIR);
        let entries = match fs::read_dir(&runs) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().into_owned();
            let created = read_piece(&entry.path(), MANIFEST)
                .and_then(|bytes| parse::<Manifest>(MANIFEST, &bytes))
                .map(|m| m.created_at)
                .ok();
            found.push((created, run_id));
        }
        found.sort();
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }
}

fn read_piece(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| Error::CorruptArtifact(format!("cannot read {name}: {e}")))
}

fn parse<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::CorruptArtifact(format!("{name}: {e}")))
}
