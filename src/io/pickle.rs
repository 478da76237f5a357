//! Writing score collections as Python pickles for an external renderer.
//!
//! Each file holds a list of dicts, one per score, in collection order:
//! `{"name", "shape", "values", "vmin", "vmax", "cmap"}`. `values` is the
//! row-major grid with NaN for missing cells, `vmin`/`vmax` are `None` when
//! the score has no display range.

use super::error::IOError;
use crate::scores::{Palette, ScoreCollection};
use log::{debug, trace};
use serde::Serialize;
use serde_pickle::SerOptions;
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

#[derive(Serialize)]
struct ScoreRecord<'a> {
    name: &'a str,
    shape: (usize, usize),
    values: Vec<f64>,
    vmin: Option<f64>,
    vmax: Option<f64>,
    cmap: Palette,
}

fn records(scores: &ScoreCollection) -> Vec<ScoreRecord<'_>> {
    scores
        .iter()
        .map(|(name, grid)| ScoreRecord {
            name,
            shape: grid.values().dim(),
            values: grid.values().iter().copied().collect(),
            vmin: grid.vmin(),
            vmax: grid.vmax(),
            cmap: grid.palette(),
        })
        .collect()
}

/// Write `scores` to a new pickle file at `path`, replacing any existing file.
///
/// # Errors
///
/// Will return [`IOError::StdIO`] if the file can't be created, or
/// [`IOError::Pickle`] if serialization fails.
pub fn write_scores(path: &Path, scores: &ScoreCollection) -> Result<(), IOError> {
    trace!("start write_scores");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_pickle::to_writer(&mut writer, &records(scores), SerOptions::new())?;
    writer.flush()?;
    debug!("wrote {} scores to {}", scores.len(), path.display());
    Ok(())
}

/// Sibling of `path` that a file is written to before being renamed into place.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(OsString::new, OsString::from);
    name.push(".part");
    path.with_file_name(name)
}

/// Write several score collections so that either all files appear, or none do.
///
/// Every collection is first written next to its destination with a `.part`
/// suffix. Only once all of them are written are they renamed into place. On
/// failure the partial files are removed and existing destinations are left
/// untouched.
///
/// # Errors
///
/// Will return the first [`IOError`] raised by [`write_scores`] or by a rename.
pub fn write_all_scores(files: &[(PathBuf, ScoreCollection)]) -> Result<(), IOError> {
    trace!("start write_all_scores");
    let partials: Vec<PathBuf> = files.iter().map(|(path, _)| partial_path(path)).collect();

    let written = files
        .iter()
        .zip(partials.iter())
        .try_for_each(|((_, scores), partial)| write_scores(partial, scores));
    if let Err(err) = written {
        for partial in &partials {
            // may not exist yet
            let _ = fs::remove_file(partial);
        }
        return Err(err);
    }

    for ((path, _), partial) in files.iter().zip(partials.iter()) {
        if let Err(err) = fs::rename(partial, path) {
            for partial in &partials {
                let _ = fs::remove_file(partial);
            }
            return Err(err.into());
        }
    }
    trace!("end write_all_scores");
    Ok(())
}
