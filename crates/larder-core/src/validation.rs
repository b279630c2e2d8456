//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! Transaction amounts and descriptive fields are checked here, before any
//! I/O. SQLite CHECK, UNIQUE and foreign key constraints back them up.
//!
//! ## Usage
//! ```rust
//! use larder_core::validation::{validate_amount, validate_name};
//!
//! assert!(validate_name("Flour", "name").is_ok());
//! assert!(validate_amount(2.5).is_ok());
//! assert!(validate_amount(0.0).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{
    DepartmentPatch, EquipmentPatch, NewDepartment, NewEquipment, NewRawMaterial,
    RawMaterialPatch,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted name for items and departments.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a display name.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LEN`] characters after trimming
pub fn validate_name(name: &str, field: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional non-negative number (price, threshold, stock).
pub fn validate_non_negative(value: Option<f64>, field: &str) -> ValidationResult<()> {
    match value {
        Some(v) if !v.is_finite() => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        }),
        Some(v) if v < 0.0 => Err(ValidationError::Negative {
            field: field.to_string(),
            value: v,
        }),
        _ => Ok(()),
    }
}

/// Validates a transaction amount.
///
/// ## Rules
/// - Finite
/// - Strictly positive
pub fn validate_amount(amount: f64) -> CoreResult<()> {
    if !amount.is_finite() {
        return Err(CoreError::InvalidQuantity {
            field: "quantity",
            value: amount,
            reason: "must be a finite number",
        });
    }

    if amount <= 0.0 {
        return Err(CoreError::InvalidQuantity {
            field: "quantity",
            value: amount,
            reason: "must be greater than zero",
        });
    }

    Ok(())
}

/// Validates an equipment amount and converts it to whole units.
pub fn validate_units(amount: f64) -> CoreResult<i64> {
    validate_amount(amount)?;

    if amount.fract() != 0.0 {
        return Err(CoreError::InvalidQuantity {
            field: "quantity",
            value: amount,
            reason: "equipment is counted in whole units",
        });
    }

    Ok(amount as i64)
}

// =============================================================================
// Input Validators
// =============================================================================

pub fn validate_new_raw_material(input: &NewRawMaterial) -> ValidationResult<()> {
    validate_name(&input.name, "name")?;
    validate_non_negative(input.price_per_unit, "price_per_unit")?;
    validate_non_negative(Some(input.quantity), "quantity")?;
    validate_non_negative(input.critical_threshold, "critical_threshold")?;
    Ok(())
}

pub fn validate_new_equipment(input: &NewEquipment) -> ValidationResult<()> {
    validate_name(&input.name, "name")?;
    validate_non_negative(input.price_per_unit, "price_per_unit")?;
    if input.total_units < 0 {
        return Err(ValidationError::Negative {
            field: "total_units".to_string(),
            value: input.total_units as f64,
        });
    }
    if let Some(hours) = input.maintenance_threshold_hours {
        validate_non_negative(Some(hours as f64), "maintenance_threshold_hours")?;
    }
    Ok(())
}

pub fn validate_raw_material_patch(patch: &RawMaterialPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name(name, "name")?;
    }
    validate_non_negative(patch.price_per_unit, "price_per_unit")?;
    validate_non_negative(patch.critical_threshold, "critical_threshold")?;
    Ok(())
}

pub fn validate_equipment_patch(patch: &EquipmentPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name(name, "name")?;
    }
    validate_non_negative(patch.price_per_unit, "price_per_unit")?;
    validate_non_negative(
        patch.maintenance_threshold_hours.map(|h| h as f64),
        "maintenance_threshold_hours",
    )?;
    Ok(())
}

pub fn validate_new_department(input: &NewDepartment) -> ValidationResult<()> {
    validate_name(&input.name, "department name")
}

pub fn validate_department_patch(patch: &DepartmentPatch) -> ValidationResult<()> {
    match &patch.name {
        Some(name) => validate_name(name, "department name"),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Flour", "name").is_ok());
        assert!(validate_name("   ", "name").is_err());
        assert!(validate_name(&"A".repeat(201), "name").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(0.25).is_ok());
        assert!(matches!(
            validate_amount(0.0),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(validate_amount(-3.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_units() {
        assert_eq!(validate_units(4.0).unwrap(), 4);
        assert!(validate_units(1.5).is_err());
        assert!(validate_units(0.0).is_err());
    }

    #[test]
    fn test_validate_new_raw_material() {
        let mut input = NewRawMaterial {
            name: "Sugar".to_string(),
            quantity: 10.0,
            critical_threshold: Some(2.0),
            ..Default::default()
        };
        assert!(validate_new_raw_material(&input).is_ok());

        input.critical_threshold = Some(-1.0);
        assert!(matches!(
            validate_new_raw_material(&input),
            Err(ValidationError::Negative { .. })
        ));
    }

    #[test]
    fn test_validate_new_equipment() {
        let input = NewEquipment {
            name: "Mixer".to_string(),
            total_units: -1,
            ..Default::default()
        };
        assert!(validate_new_equipment(&input).is_err());
    }
}
