use crate::error::SiloError;
use crate::model::SILO_FORMAT_VERSION;
use crate::model::Silo;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub enum SiloLoad {
    Missing,
    Loaded(Box<Silo>),
    ResetAfterCorruption,
}

/// Loads a persisted silo, discarding files that are unreadable or were
/// written by another format version.
pub fn load_silo(path: &Path) -> Result<SiloLoad, SiloError> {
    if !path.exists() {
        return Ok(SiloLoad::Missing);
    }
    let buf = fs::read(path)?;
    let outcome = match bincode::deserialize::<Silo>(&buf) {
        Ok(silo) if silo.header.format_version == SILO_FORMAT_VERSION => {
            return Ok(SiloLoad::Loaded(Box::new(silo)));
        }
        Ok(silo) => format!(
            "format version {} (expected {SILO_FORMAT_VERSION})",
            silo.header.format_version
        ),
        Err(err) => err.to_string(),
    };
    warn!("silo at {path:?} is unusable ({outcome}); it will be recompiled");
    if let Err(remove_err) = fs::remove_file(path) {
        warn!("failed to remove unusable silo {path:?}: {remove_err}");
    }
    Ok(SiloLoad::ResetAfterCorruption)
}

/// Writes `silo` to `tmp_path` and renames it over `path`, so readers of
/// `path` never observe a partially written file.
pub fn save_silo(path: &Path, tmp_path: &Path, silo: &Silo) -> Result<(), SiloError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = bincode::serialize(silo)?;
    {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
