//! Structural validation of configuration documents.
//!
//! Checks a parsed [`Config`] before translation. Detects:
//! - Duplicate IDs
//! - Dangling references (rotations, blocks, groups)
//! - Inverted `[min, max]` bounds
//! - Incompatible attribute combinations
//!
//! Translation ([`Config::into_problem`]) stops at the first problem;
//! this pass instead collects every issue in one sweep, which is what an
//! operator editing a large document wants.

use std::collections::HashSet;

use crate::config::{
    Config, ConsecutiveConfig, CountConfig, CountValue, CoverageConfig, PrerequisiteConfig,
};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A name references an entity that doesn't exist.
    InvalidReference,
    /// A `[min, max]` pair with min above max.
    InvertedBounds,
    /// Attributes that cannot be combined on one entity.
    IncompatibleAttributes,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a configuration document.
///
/// Checks:
/// 1. No duplicate resident, rotation, or block IDs
/// 2. Ranking and vacation-pool entries reference declared rotations
/// 3. `eligible_groups` reference groups some resident declares
/// 4. Vacation weeks reference declared blocks
/// 5. No inverted coverage or count bounds
/// 6. No rotation combining `cool_down` with `consecutive_count`
/// 7. No rotation listing itself as a prerequisite
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resident_ids = HashSet::new();
    let mut resident_groups: HashSet<&str> = HashSet::new();
    for r in &config.residents {
        if !resident_ids.insert(r.resident.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resident ID: {}", r.resident.id),
            ));
        }
        resident_groups.extend(r.resident.groups.iter().map(String::as_str));
    }

    let mut rotation_ids = HashSet::new();
    for r in &config.rotations {
        if !rotation_ids.insert(r.rotation.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate rotation ID: {}", r.rotation.id),
            ));
        }
    }
    let mut rotation_groups: HashSet<&str> = HashSet::new();
    for r in &config.rotations {
        rotation_groups.extend(r.rotation.groups.iter().map(String::as_str));
    }

    let mut block_ids = HashSet::new();
    for b in &config.blocks {
        if !block_ids.insert(b.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate block ID: {b}"),
            ));
        }
    }

    for r in &config.residents {
        for rot in &r.rankings {
            if !rotation_ids.contains(rot.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidReference,
                    format!("Resident {} ranks unknown rotation: {rot}", r.resident.id),
                ));
            }
        }
    }

    for r in &config.rotations {
        let id = r.rotation.id.as_str();

        for group in &r.rotation.eligible_groups {
            if !resident_groups.contains(group.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidReference,
                    format!("Rotation {id} restricts to unknown resident group: {group}"),
                ));
            }
        }

        if let Some(CoverageConfig::Bounds(bounds)) = &r.coverage {
            check_bounds(&mut errors, bounds, &format!("coverage of rotation {id}"));
        }
        if let Some(count) = &r.rot_count {
            check_count(&mut errors, count, &format!("rot_count of rotation {id}"));
        }
        if let Some(count) = &r.rot_count_including_history {
            check_count(
                &mut errors,
                count,
                &format!("rot_count_including_history of rotation {id}"),
            );
        }
        if let Some(ConsecutiveConfig::Full { count: 0, .. } | ConsecutiveConfig::Count(0)) =
            r.consecutive_count
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvertedBounds,
                format!("Rotation {id} declares a zero-length consecutive run"),
            ));
        }
        if r.cool_down.is_some() && r.consecutive_count.is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::IncompatibleAttributes,
                format!("Rotation {id} combines cool_down with consecutive_count"),
            ));
        }
        match &r.prerequisite {
            Some(PrerequisiteConfig::List(names)) if names.iter().any(|n| n == id) => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidReference,
                    format!("Rotation {id} lists itself as a prerequisite"),
                ));
            }
            Some(PrerequisiteConfig::Counts(map)) if map.contains_key(id) => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidReference,
                    format!("Rotation {id} lists itself as a prerequisite"),
                ));
            }
            _ => {}
        }
    }

    if let Some(vacation) = &config.vacation {
        for week in &vacation.weeks {
            if !block_ids.contains(week.block.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidReference,
                    format!("Vacation week {} names unknown block: {}", week.week, week.block),
                ));
            }
        }
        for (pool, spec) in &vacation.pools {
            for rot in &spec.rotations {
                if !rotation_ids.contains(rot.as_str())
                    && !rotation_groups.contains(rot.as_str())
                {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidReference,
                        format!("Vacation pool {pool} names unknown rotation: {rot}"),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_bounds(errors: &mut Vec<ValidationError>, bounds: &[i64], what: &str) {
    if let [min, max] = bounds {
        if min > max {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvertedBounds,
                format!("Inverted bounds [{min}, {max}] in {what}"),
            ));
        }
    }
}

fn check_count(errors: &mut Vec<ValidationError>, count: &CountConfig, what: &str) {
    match count {
        CountConfig::Exact(_) => {}
        CountConfig::Bounds(bounds) => check_bounds(errors, bounds, what),
        CountConfig::PerResident(map) => {
            for (key, value) in map {
                if let CountValue::Bounds(bounds) = value {
                    check_bounds(errors, bounds, &format!("{what} for {key}"));
                }
            }
        }
    }
}
