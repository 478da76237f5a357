//! Input and Ouput data file format modules

pub mod collocated;
pub mod error;
pub mod pickle;

use crate::{
    constants::{REFERENCE_LABEL, TEST_LABEL},
    masking::MaskingContext,
};
use std::path::PathBuf;

pub use collocated::read_collocated;
pub use pickle::{write_all_scores, write_scores};

/// Groups together parameters related to I/O
#[derive(Debug, Default, Clone)]
pub struct IOContext {
    // in
    /// The path to the collocated .csv input file
    pub collocated_in: PathBuf,

    // out
    /// Directory the score files are written to
    pub output_dir: PathBuf,
    /// Year of the collocated data, used in output file names
    pub year: String,
    /// Month of the collocated data, used in output file names
    pub month: String,
}

impl IOContext {
    /// Path of the score file for variable `var` (`CMA`, `CPH`, `CTTH`) and one
    /// masking combination, e.g.
    /// `CMA_SEVIRI_CALIOP_201907_DNT-DAY_SATZ-70.0.pkl`.
    pub fn score_path(&self, var: &str, masking: &MaskingContext) -> PathBuf {
        let satz = match masking.satz_limit {
            Some(limit) => format!("{:?}", limit),
            None => "None".into(),
        };
        self.output_dir.join(format!(
            "{}_{}_{}_{}{}_DNT-{}_SATZ-{}.pkl",
            var,
            TEST_LABEL,
            REFERENCE_LABEL,
            self.year,
            self.month,
            masking.illumination,
            satz
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::IlluminationMode;

    #[test]
    fn test_score_path() {
        let io_ctx = IOContext {
            output_dir: PathBuf::from("/tmp/out"),
            year: "2019".into(),
            month: "07".into(),
            ..IOContext::default()
        };
        let masking = MaskingContext {
            illumination: IlluminationMode::Day,
            satz_limit: Some(70.0),
        };
        assert_eq!(
            io_ctx.score_path("CMA", &masking),
            PathBuf::from("/tmp/out/CMA_SEVIRI_CALIOP_201907_DNT-DAY_SATZ-70.0.pkl")
        );
        assert_eq!(
            io_ctx.score_path("CTTH", &MaskingContext::default()),
            PathBuf::from("/tmp/out/CTTH_SEVIRI_CALIOP_201907_DNT-ALL_SATZ-None.pkl")
        );
    }
}
