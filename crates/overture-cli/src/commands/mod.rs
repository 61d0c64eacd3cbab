mod check;
mod run;

use std::path::PathBuf;

use anyhow::{bail, Result};
use overture_config::DEFAULT_FILENAMES;

pub use check::check;
pub use run::run;

fn config_path(file: Option<String>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(PathBuf::from(file));
    }

    for filename in DEFAULT_FILENAMES {
        let path = PathBuf::from(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    bail!(
        "no configuration file given and none of {} found",
        DEFAULT_FILENAMES.join(", ")
    )
}
