//! Activity filter engine.
//!
//! Three independent predicates are evaluated per activity:
//!
//! - **name**: any configured substring occurs in the display name (case-insensitive)
//! - **type**: any configured substring occurs in the type key (case-sensitive)
//! - **radius**: the start location lies within the radius of a reference coordinate
//!
//! Each dimension is a [`Criterion`]: an `Unset` dimension always passes.
//! The predicates are then combined with [`CombineMode::And`] or
//! [`CombineMode::Or`]. Activity types on the [`SkipList`] are rejected before
//! any predicate runs, in both modes.
//!
//! Under `Or`, an unset dimension makes the whole disjunction true, so `Or`
//! only restricts anything when all three dimensions are engaged. The engine
//! keeps that behavior and logs a warning when it applies.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{DownloaderError, OptionExt, Result};
use crate::geo_utils::within_radius;
use crate::{Activity, Coordinate};

/// Activity types that are never downloaded by default.
pub const DEFAULT_SKIPPED_TYPES: &[&str] = &["breathwork"];

// ============================================================================
// Configuration Types
// ============================================================================

/// One filter dimension: either not engaged, or engaged with a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion<T> {
    /// Filter not engaged, the predicate passes every activity
    Unset,
    Engaged(T),
}

impl<T> Default for Criterion<T> {
    fn default() -> Self {
        Criterion::Unset
    }
}

impl<T> Criterion<T> {
    pub fn is_engaged(&self) -> bool {
        matches!(self, Criterion::Engaged(_))
    }

    pub fn engaged(&self) -> Option<&T> {
        match self {
            Criterion::Engaged(value) => Some(value),
            Criterion::Unset => None,
        }
    }
}

impl<T> From<Option<T>> for Criterion<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Criterion::Engaged(v),
            None => Criterion::Unset,
        }
    }
}

/// How the three predicates are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CombineMode {
    #[default]
    And,
    Or,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::And => write!(f, "and"),
            CombineMode::Or => write!(f, "or"),
        }
    }
}

impl FromStr for CombineMode {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(CombineMode::And),
            "or" => Ok(CombineMode::Or),
            other => Err(DownloaderError::Config {
                message: format!("unknown filter type '{}', expected 'and' or 'or'", other),
            }),
        }
    }
}

/// Radius filter with its resolved reference coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusFilter {
    pub reference: Coordinate,
    pub radius_km: f64,
}

/// Activity type keys that are always excluded (exact match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipList {
    types: HashSet<String>,
}

impl SkipList {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// A skip list that excludes nothing.
    pub fn empty() -> Self {
        Self {
            types: HashSet::new(),
        }
    }

    pub fn contains(&self, type_key: &str) -> bool {
        self.types.contains(type_key)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new(DEFAULT_SKIPPED_TYPES.iter().copied())
    }
}

/// Resolved, read-only filter configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterConfig {
    pub names: Criterion<Vec<String>>,
    pub types: Criterion<Vec<String>>,
    pub radius: Criterion<RadiusFilter>,
    pub mode: CombineMode,
    pub skip: SkipList,
}

impl FilterConfig {
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Criterion::Engaged(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Criterion::Engaged(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_radius(mut self, reference: Coordinate, radius_km: f64) -> Self {
        self.radius = Criterion::Engaged(RadiusFilter {
            reference,
            radius_km,
        });
        self
    }

    pub fn with_mode(mut self, mode: CombineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_skip_list(mut self, skip: SkipList) -> Self {
        self.skip = skip;
        self
    }

    /// Number of engaged dimensions (0 to 3).
    pub fn engaged_dimensions(&self) -> usize {
        [
            self.names.is_engaged(),
            self.types.is_engaged(),
            self.radius.is_engaged(),
        ]
        .iter()
        .filter(|&&engaged| engaged)
        .count()
    }

    /// True when `Or` mode passes every activity that is not skip-listed.
    pub fn is_permissive_or(&self) -> bool {
        self.mode == CombineMode::Or && self.engaged_dimensions() < 3
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Name predicate: unset passes; otherwise any entry is a case-insensitive
/// substring of the display name.
pub fn name_matches(activity: &Activity, names: &Criterion<Vec<String>>) -> bool {
    let Some(names) = names.engaged() else {
        return true;
    };
    let name = activity.name.to_lowercase();
    names.iter().any(|n| name.contains(&n.to_lowercase()))
}

/// Type predicate: unset passes; otherwise any entry is a substring of the
/// type key, with exact casing.
pub fn type_matches(activity: &Activity, types: &Criterion<Vec<String>>) -> bool {
    let Some(types) = types.engaged() else {
        return true;
    };
    let type_key = activity.type_key();
    types.iter().any(|t| type_key.contains(t.as_str()))
}

/// Radius predicate: unset passes; otherwise the start coordinate must be
/// within the radius. Activities without a start coordinate never match.
pub fn radius_matches(activity: &Activity, radius: &Criterion<RadiusFilter>) -> bool {
    let Some(filter) = radius.engaged() else {
        return true;
    };
    match activity.start() {
        Some(start) => within_radius(&filter.reference, &start, filter.radius_km),
        None => {
            debug!(
                "[Filter] Activity {} has no start coordinate, outside radius",
                activity.id
            );
            false
        }
    }
}

/// Decide whether an activity passes the filter configuration.
pub fn is_valid(activity: &Activity, config: &FilterConfig) -> bool {
    if config.skip.contains(activity.type_key()) {
        debug!(
            "[Filter] Skipping activity {} with type {}",
            activity.id,
            activity.type_key()
        );
        return false;
    }

    let name = name_matches(activity, &config.names);
    let kind = type_matches(activity, &config.types);
    let radius = radius_matches(activity, &config.radius);

    match config.mode {
        CombineMode::And => name && kind && radius,
        CombineMode::Or => name || kind || radius,
    }
}

fn warn_if_permissive(config: &FilterConfig) {
    if config.is_permissive_or() {
        warn!(
            "[Filter] OR mode with {} of 3 filters engaged: every activity that is not skip-listed passes",
            config.engaged_dimensions()
        );
    }
}

/// Filter activities, preserving the relative order of survivors.
pub fn filter_activities(activities: &[Activity], config: &FilterConfig) -> Vec<Activity> {
    info!("[Filter] Filtering {} activities", activities.len());
    warn_if_permissive(config);

    let filtered: Vec<Activity> = activities
        .iter()
        .filter(|a| {
            debug!(
                "[Filter] Activity {} type={} name={:?}",
                a.id,
                a.type_key(),
                a.name
            );
            let keep = is_valid(a, config);
            if !keep {
                debug!("[Filter] Activity {:?} filtered out", a.name);
            }
            keep
        })
        .cloned()
        .collect();

    info!(
        "[Filter] After filtering, {} activities left over",
        filtered.len()
    );
    filtered
}

/// Parallel version of [`filter_activities`]; output order matches the input.
#[cfg(feature = "parallel")]
pub fn filter_activities_parallel(activities: &[Activity], config: &FilterConfig) -> Vec<Activity> {
    use rayon::prelude::*;

    info!(
        "[Filter] Filtering {} activities in parallel",
        activities.len()
    );
    warn_if_permissive(config);

    let filtered: Vec<Activity> = activities
        .par_iter()
        .filter(|a| is_valid(a, config))
        .cloned()
        .collect();

    info!(
        "[Filter] After filtering, {} activities left over",
        filtered.len()
    );
    filtered
}

// ============================================================================
// Argument Normalization
// ============================================================================

/// Parse a coordinate of the form `(latitude,longitude)`.
///
/// Surrounding whitespace and the parentheses are optional.
pub fn parse_coordinate(input: &str) -> Result<Coordinate> {
    debug!("[Filter] Parse coordinate string: {}", input);

    let invalid = |message: &str| DownloaderError::InvalidCoordinate {
        input: input.to_string(),
        message: message.to_string(),
    };

    let trimmed = input.trim();
    let inner = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let inner = inner.strip_suffix(')').unwrap_or(inner);

    let (lat, lon) = inner
        .split_once(',')
        .ok_or_else(|| invalid("expected \"(latitude,longitude)\""))?;

    let parse = |part: &str, what: &str| -> Result<f64> {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| invalid(&format!("{} '{}' is not a number", what, part.trim())))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(&format!("{} must be finite", what)))
        }
    };

    Ok(Coordinate::new(
        parse(lat, "latitude")?,
        parse(lon, "longitude")?,
    ))
}

/// Something that can answer "start coordinate of the most recent activity".
pub trait ReferenceSource {
    fn latest_start(&self) -> Option<Coordinate>;
}

impl ReferenceSource for [Activity] {
    /// Start coordinate of the most recently started activity that has one.
    fn latest_start(&self) -> Option<Coordinate> {
        self.iter()
            .filter(|a| a.start().is_some())
            .max_by_key(|a| a.begin_timestamp)
            .and_then(Activity::start)
    }
}

impl ReferenceSource for Option<Coordinate> {
    fn latest_start(&self) -> Option<Coordinate> {
        *self
    }
}

/// Raw filter options as supplied by the user.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub names: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    pub start_coordinate: Option<Coordinate>,
    pub radius_km: Option<f64>,
    pub mode: CombineMode,
    /// Replaces the default skip list when set
    pub skip_types: Option<Vec<String>>,
}

impl FilterOptions {
    /// Whether any filter dimension was requested.
    pub fn has_filters(&self) -> bool {
        self.names.is_some() || self.types.is_some() || self.radius_km.is_some()
    }

    /// Validate the options and resolve the reference coordinate.
    ///
    /// `source` is only consulted when a radius is given without a start
    /// coordinate.
    pub fn resolve<S: ReferenceSource + ?Sized>(self, source: &S) -> Result<FilterConfig> {
        let radius = match (self.radius_km, self.start_coordinate) {
            (None, Some(_)) => {
                return Err(DownloaderError::Config {
                    message: "Providing a start coordinate requires a radius to be specified"
                        .to_string(),
                })
            }
            (None, None) => Criterion::Unset,
            (Some(radius_km), start) => {
                if !radius_km.is_finite() || radius_km < 0.0 {
                    return Err(DownloaderError::InvalidRadius { radius_km });
                }
                let reference = match start {
                    Some(c) => {
                        if !c.is_valid() {
                            warn!(
                                "[Filter] Start coordinate {} is outside latitude [-90, 90] / longitude [-180, 180]",
                                c
                            );
                        }
                        c
                    }
                    None => {
                        debug!("[Filter] Deriving reference coordinate from last activity");
                        source.latest_start().ok_or_no_reference(
                            "no start coordinate given and no activity with a start location",
                        )?
                    }
                };
                debug!("[Filter] Reference coordinate: {}", reference);
                Criterion::Engaged(RadiusFilter {
                    reference,
                    radius_km,
                })
            }
        };

        let skip = match self.skip_types {
            Some(types) => SkipList::new(types),
            None => SkipList::default(),
        };
        if skip.is_empty() {
            info!("[Filter] Skip list is empty, no activity type is excluded");
        } else {
            debug!("[Filter] Skipping {} activity type(s)", skip.len());
        }

        Ok(FilterConfig {
            names: self.names.into(),
            types: self.types.into(),
            radius,
            mode: self.mode,
            skip,
        })
    }
}
