//! Command Line Interface helpers for cloudval

use crate::{
    constants::{
        DEFAULT_CHUNK_SIZE, DEFAULT_CTTH_MIN_COUNT, DEFAULT_GRID_RESOLUTION_DEG,
        NOBS_DISPLAY_THRESHOLD,
    },
    ctth::CtthContext,
    error::{
        CLIError::InvalidCommandLineArgument,
        ConfigurationError,
        ValidationError::{self, ClapError, DryRun},
    },
    extract::{extract_fields, DatasetKind, VfmDecoder},
    fields::{Geolocation, PixelFields},
    grid::{CellIndex, LatLonGrid, TargetGrid},
    io::{read_collocated, write_all_scores, IOContext},
    masking::{IlluminationMode, MaskingContext},
    pipeline::{ValidationContext, ValidationOutput},
    scores::ScoreCollection,
    stats::{nanmean, weighted_spatial_average},
    with_increment_duration,
};
use clap::{
    arg, command,
    ErrorKind::{ArgumentNotFound, DisplayHelp, DisplayVersion},
    PossibleValue,
    ValueHint::{DirPath, FilePath},
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, error, info, trace, warn};
use ndarray::Array2;
use prettytable::{format as prettyformat, row, table};
use std::{
    collections::HashMap,
    ffi::OsString,
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

/// Args for validating a collocation file.
#[derive(Debug, Clone)]
pub struct CloudvalContext {
    /// Input / output paths
    pub io_ctx: IOContext,
    /// The test product the collocation file holds
    pub dataset: DatasetKind,
    /// Illumination modes to validate, one combination each
    pub illumination_modes: Vec<IlluminationMode>,
    /// Satellite zenith angle limits to validate, one combination each
    pub satz_limits: Vec<Option<f64>>,
    /// Validation parameters shared by every combination
    pub validation_ctx: ValidationContext,
    /// Cells with fewer pixels than this are hidden in cloud mask and phase output
    pub nobs_threshold: u64,
    /// The grid pixels are binned onto
    pub grid: LatLonGrid,
    /// Whether to draw a progress bar
    pub draw_progress: bool,
}

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match GIT_HEAD_REF {
        Some(hr) => {
            let dirty = GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                GIT_COMMIT_HASH.unwrap_or("<unknown>"),
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {}", hr)?;
        }
        None => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {}", BUILT_TIME_UTC)?;
    writeln!(f, "         with compiler {}", RUSTC_VERSION)?;
    writeln!(f)?;
    Ok(())
}

fn fmt_satz_limit(satz_limit: &Option<f64>) -> String {
    match satz_limit {
        Some(limit) => format!("{}°", limit),
        None => "none".into(),
    }
}

impl Display for CloudvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        writeln!(
            f,
            "collocation file:     {}",
            self.io_ctx.collocated_in.display()
        )?;
        writeln!(f, "dataset:              {}", self.dataset)?;
        writeln!(
            f,
            "period:               {}-{}",
            self.io_ctx.year, self.io_ctx.month
        )?;
        writeln!(
            f,
            "grid:                 {}x{} cells of {}°",
            self.grid.shape().0,
            self.grid.shape().1,
            self.grid.resolution_deg()
        )?;

        let mut combination_table = table!(["", "illumination", "satz limit"]);
        combination_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
        for (combination_idx, (satz_limit, mode)) in self
            .satz_limits
            .iter()
            .cartesian_product(self.illumination_modes.iter())
            .enumerate()
        {
            combination_table.add_row(row![r =>
                format!("c{}:", combination_idx),
                mode,
                fmt_satz_limit(satz_limit)
            ]);
        }
        writeln!(
            f,
            "Combinations (illumination={}, satz={}):\n{}",
            self.illumination_modes.len(),
            self.satz_limits.len(),
            combination_table
        )?;

        writeln!(
            f,
            "Will hide cloud mask and phase cells with fewer than {} pixels.",
            self.nobs_threshold
        )?;
        write!(f, "{}", self.validation_ctx.ctth)?;
        writeln!(
            f,
            "Will aggregate {} pixels per chunk.",
            self.validation_ctx.chunk_size
        )?;
        writeln!(
            f,
            "Will write score files to {}",
            self.io_ctx.output_dir.display()
        )?;
        Ok(())
    }
}

impl CloudvalContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, ValidationError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Validate gridded SEVIRI cloud products against collocated CALIOP \
                    retrievals, writing per-cell verification scores.")
            .args(&[
                // input options
                arg!(-i --input <PATH> "Collocated CALIOP / SEVIRI .csv file")
                    .value_hint(FilePath)
                    .help_heading("INPUT"),
                arg!(--dataset <KIND> "The test product in the collocation file")
                    .required(false)
                    .possible_values([
                        PossibleValue::new("CCI").help("ESA Cloud_cci, cci_* columns"),
                        PossibleValue::new("CLAAS")
                            .alias("CLAAS3")
                            .help("CM SAF CLAAS, pps_* columns"),
                    ])
                    .ignore_case(true)
                    .default_value("CCI")
                    .help_heading("INPUT"),
                arg!(--year <YEAR> "Year of the collocated data")
                    .help_heading("INPUT"),
                arg!(--month <MONTH> "Month of the collocated data, 01-12")
                    .help_heading("INPUT"),
                arg!(--"dry-run" "Just print the summary and exit"),
                arg!(--"no-draw-progress" "do not show progress bars"),

                // selection options
                arg!(--dnt <MODES>... "Illumination modes to validate")
                    .help_heading("SELECTION")
                    .multiple_values(true)
                    .required(false)
                    .possible_values([
                        PossibleValue::new("ALL").help("all pixels"),
                        PossibleValue::new("DAY").help("solar zenith below 80°"),
                        PossibleValue::new("NIGHT").help("solar zenith above 95°"),
                        PossibleValue::new("TWILIGHT").help("solar zenith from 80° to 95°"),
                    ])
                    .ignore_case(true)
                    .default_value("ALL"),
                arg!(--satz <LIMITS>... "Satellite zenith angle limits [deg] to validate, or none")
                    .help_heading("SELECTION")
                    .multiple_values(true)
                    .required(false)
                    .default_value("none"),

                // scoring options
                arg!(--"ctth-min-count" <COUNT> "Hide height / temperature cells with fewer \
                        contributing pixels")
                    .help_heading("SCORING")
                    .required(false),
                arg!(--"nobs-threshold" <COUNT> "Hide cloud mask / phase cells with fewer pixels")
                    .help_heading("SCORING")
                    .required(false),
                arg!(--"opacity-groups" "Also report opaque / transparent height biases")
                    .help_heading("SCORING"),
                arg!(--"grid-resolution" <DEGREES> "Size of the grid cells")
                    .help_heading("SCORING")
                    .required(false),

                // resource limit options
                arg!(--"chunk-size" <PIXELS> "Number of pixels per aggregation task")
                    .help_heading("RESOURCE LIMITS")
                    .required(false),

                // output options
                arg!(-o --"output-dir" <DIR> "Directory to write score files to")
                    .value_hint(DirPath)
                    .help_heading("OUTPUT")
                    .required(false)
                    .default_value("."),
            ]);
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_io_matches(matches: &clap::ArgMatches) -> Result<IOContext, ValidationError> {
        let year = match matches.value_of("year") {
            Some(year) => year.to_string(),
            _ => unreachable!("--year <YEAR> is required, enforced by clap"),
        };
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::CLIError(InvalidCommandLineArgument {
                option: "--year <YEAR>".into(),
                expected: "a four digit year".into(),
                received: year,
            }));
        }
        let month = match matches.value_of_t::<u32>("month") {
            Ok(month) if (1..=12).contains(&month) => format!("{:02}", month),
            Err(err) if err.kind() != ArgumentNotFound => {
                return Err(ValidationError::CLIError(InvalidCommandLineArgument {
                    option: "--month <MONTH>".into(),
                    expected: "a month number, 01-12".into(),
                    received: matches.value_of("month").unwrap_or_default().into(),
                }))
            }
            Ok(month) => {
                return Err(ValidationError::CLIError(InvalidCommandLineArgument {
                    option: "--month <MONTH>".into(),
                    expected: "a month number, 01-12".into(),
                    received: format!("{}", month),
                }))
            }
            Err(_) => unreachable!("--month <MONTH> is required, enforced by clap"),
        };
        Ok(IOContext {
            collocated_in: match matches.value_of_t::<PathBuf>("input") {
                Ok(path) => path,
                _ => unreachable!("--input <PATH> is required, enforced by clap"),
            },
            output_dir: matches.value_of("output-dir").unwrap_or(".").into(),
            year,
            month,
        })
    }

    fn parse_selection_matches(
        matches: &clap::ArgMatches,
    ) -> Result<(Vec<IlluminationMode>, Vec<Option<f64>>), ValidationError> {
        let illumination_modes = matches
            .values_of("dnt")
            .map(|modes| {
                modes
                    .map(IlluminationMode::from_str)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_else(|| vec![IlluminationMode::All]);

        let satz_limits = matches
            .values_of("satz")
            .map(|limits| limits.map(parse_satz_limit).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_else(|| vec![None]);

        Ok((
            illumination_modes.into_iter().unique().collect(),
            satz_limits,
        ))
    }

    fn parse_validation_matches(
        matches: &clap::ArgMatches,
    ) -> Result<ValidationContext, ValidationError> {
        let min_count = match matches.value_of_t::<u64>("ctth-min-count") {
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Ok(0) => {
                return Err(ConfigurationError::InvalidParameter {
                    parameter: "--ctth-min-count".into(),
                    expected: "at least one pixel".into(),
                    received: "0".into(),
                }
                .into())
            }
            Ok(count) => count,
            Err(_) => DEFAULT_CTTH_MIN_COUNT,
        };
        let chunk_size = match matches.value_of_t::<usize>("chunk-size") {
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Ok(0) => {
                return Err(ConfigurationError::InvalidParameter {
                    parameter: "--chunk-size".into(),
                    expected: "at least one pixel".into(),
                    received: "0".into(),
                }
                .into())
            }
            Ok(size) => size,
            Err(_) => DEFAULT_CHUNK_SIZE,
        };
        Ok(ValidationContext {
            masking: MaskingContext::default(),
            ctth: CtthContext {
                min_count,
                with_opacity_groups: matches.is_present("opacity-groups"),
            },
            chunk_size,
        })
    }

    /// Parse an iterator of arguments, `args` into a `CloudvalContext`.
    ///
    /// # Errors
    ///
    /// Can raise:
    /// - [`ValidationError::ClapError`] if clap cannot parse `args`
    /// - [`ValidationError::Configuration`] for an unknown dataset kind or
    ///     illumination mode, or an out of range parameter.
    /// - [`ValidationError::CLIError`] if the arguments are invalid.
    /// - [`ValidationError::DryRun`] if `--dry-run` was given.
    pub fn from_args<I, T>(args: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        let io_ctx = Self::parse_io_matches(&matches)?;
        let dataset = DatasetKind::from_str(matches.value_of("dataset").unwrap_or("CCI"))?;
        let (illumination_modes, satz_limits) = Self::parse_selection_matches(&matches)?;
        let validation_ctx = Self::parse_validation_matches(&matches)?;
        let nobs_threshold = match matches.value_of_t::<u64>("nobs-threshold") {
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Ok(threshold) => threshold,
            Err(_) => NOBS_DISPLAY_THRESHOLD,
        };
        let grid = match matches.value_of_t::<f64>("grid-resolution") {
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Ok(resolution) => LatLonGrid::new(resolution)?,
            Err(_) => LatLonGrid::new(DEFAULT_GRID_RESOLUTION_DEG)?,
        };

        let result = Self {
            io_ctx,
            dataset,
            illumination_modes,
            satz_limits,
            validation_ctx,
            nobs_threshold,
            grid,
            draw_progress: !matches.is_present("no-draw-progress"),
        };

        info!("{}", &result);

        if matches.is_present("dry-run") {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// The masking combinations to validate, zenith limit major.
    pub fn combinations(&self) -> Vec<MaskingContext> {
        self.satz_limits
            .iter()
            .cartesian_product(self.illumination_modes.iter())
            .map(|(&satz_limit, &illumination)| MaskingContext {
                illumination,
                satz_limit,
            })
            .collect()
    }

    /// Read the collocation file into pixel fields and their grid cells.
    fn read(
        &self,
        durations: &mut HashMap<String, Duration>,
    ) -> Result<(PixelFields, CellIndex), ValidationError> {
        let names = self.dataset.field_names();
        let raw = with_increment_duration!(
            durations,
            "read",
            read_collocated(&self.io_ctx.collocated_in, &names.all())?
        );
        let (fields, geo): (PixelFields, Geolocation) = with_increment_duration!(
            durations,
            "extract",
            extract_fields(&raw, &names, &VfmDecoder)?
        );
        info!("read {} collocated pixels", fields.len());
        let index = with_increment_duration!(durations, "index", self.grid.index(&geo)?);
        if index.num_outside() > 0 {
            warn!("{} pixels fall outside the grid", index.num_outside());
        }
        Ok((fields, index))
    }

    /// Validate one combination and write its score files.
    fn run_combination(
        &self,
        masking: MaskingContext,
        fields: &PixelFields,
        index: &CellIndex,
        cell_latitudes: &Array2<f64>,
        durations: &mut HashMap<String, Duration>,
    ) -> Result<(), ValidationError> {
        let validation_ctx = ValidationContext {
            masking,
            ..self.validation_ctx
        };
        let output = validation_ctx.validate(fields, index, durations)?;
        log_scatter(&masking, &output);

        let files: Vec<(PathBuf, ScoreCollection)> = output
            .collections()
            .iter()
            .map(|&(var, scores)| {
                let scores = if var == "CTTH" {
                    scores.clone()
                } else {
                    scores.suppressed_by_nobs(self.nobs_threshold)
                };
                (self.io_ctx.score_path(var, &masking), scores)
            })
            .collect();
        with_increment_duration!(durations, "write", write_all_scores(&files)?);

        for ((var, _), (_, scores)) in output.collections().iter().zip(files.iter()) {
            info!(
                "{} scores for DNT-{} SATZ-{}:\n{}",
                var,
                masking.illumination,
                fmt_satz_limit(&masking.satz_limit),
                summary_table(scores, cell_latitudes)
            );
        }
        Ok(())
    }

    /// Read the collocation file, then validate and write every combination.
    ///
    /// A combination which fails is logged and skipped.
    ///
    /// # Errors
    ///
    /// can raise:
    /// - [`ValidationError::IO`] if the collocation file can't be read.
    /// - [`ValidationError::ShapeMismatch`] if its columns are inconsistent.
    pub fn run(self) -> Result<HashMap<String, Duration>, ValidationError> {
        // used to time large operations
        let mut durations = HashMap::<String, Duration>::new();

        let (fields, index) = self.read(&mut durations)?;
        let cell_latitudes = self.grid.cell_latitudes();

        let combinations = self.combinations();

        let draw_target = if self.draw_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let progress = ProgressBar::with_draw_target(Some(combinations.len() as u64), draw_target);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut num_failed = 0;
        for masking in combinations {
            progress.set_message(format!(
                "{} {}",
                masking.illumination,
                fmt_satz_limit(&masking.satz_limit)
            ));
            if let Err(err) =
                self.run_combination(masking, &fields, &index, &cell_latitudes, &mut durations)
            {
                error!(
                    "validation failed for DNT-{} SATZ-{}: {}",
                    masking.illumination,
                    fmt_satz_limit(&masking.satz_limit),
                    err
                );
                num_failed += 1;
            }
            progress.inc(1);
        }
        progress.finish();

        if num_failed > 0 {
            warn!("{} combinations failed", num_failed);
        }
        Ok(durations)
    }
}

/// Parse a satellite zenith angle limit, a non-negative number of degrees or `none`.
fn parse_satz_limit(value: &str) -> Result<Option<f64>, ConfigurationError> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(limit) if limit.is_finite() && limit >= 0.0 => Ok(Some(limit)),
        _ => Err(ConfigurationError::InvalidParameter {
            parameter: "--satz".into(),
            expected: "a non-negative angle in degrees, or none".into(),
            received: value.into(),
        }),
    }
}

/// A plain and an area weighted mean of every score.
fn summary_table(scores: &ScoreCollection, cell_latitudes: &Array2<f64>) -> prettytable::Table {
    let mut summary = table!(["", "mean", "weighted mean"]);
    summary.set_format(*prettyformat::consts::FORMAT_CLEAN);
    for (name, grid) in scores.iter() {
        summary.add_row(row![r =>
            format!("{}:", name),
            format!("{:.4}", nanmean(grid.values())),
            format!("{:.4}", weighted_spatial_average(grid.values(), cell_latitudes.view()))
        ]);
    }
    summary
}

fn log_scatter(masking: &MaskingContext, output: &ValidationOutput) {
    for (quantity, fit) in [
        ("height", output.scatter.height),
        ("temperature", output.scatter.temperature),
    ] {
        match fit {
            Some(fit) => info!(
                "DNT-{} SATZ-{} scatter {}: {}",
                masking.illumination,
                fmt_satz_limit(&masking.satz_limit),
                quantity,
                fit
            ),
            None => warn!(
                "DNT-{} SATZ-{} scatter {}: not enough pairs to fit",
                masking.illumination,
                fmt_satz_limit(&masking.satz_limit),
                quantity
            ),
        }
    }
}

/// Parse `args`, run the validation and report durations. Returns the
/// process exit code.
pub fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T> + Debug,
    T: Into<OsString> + Clone,
{
    let cloudval_ctx = match CloudvalContext::from_args(args) {
        Ok(cloudval_ctx) => cloudval_ctx,
        Err(DryRun {}) => {
            info!("Dry run. No files will be written.");
            return 0;
        }
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match cloudval_ctx.run() {
        Ok(durations) => {
            info!(
                "total duration: {:?}",
                durations
                    .into_iter()
                    .sorted()
                    .fold(Duration::ZERO, |duration_sum, (name, duration)| {
                        info!("{} duration: {:?}", name, duration);
                        duration_sum + duration
                    })
            );
            0
        }
        Err(e) => {
            eprintln!("validation error: {e}");
            1
        }
    }
}
