//! Local tank validation.
//!
//! Every create/update call runs through [`check_tank`] first; a tank
//! that fails here never reaches the wire. The server applies the same
//! rules again and remains the authority.

use garrison_protocol::TankAttributes;

use crate::ClientError;

/// The widest a factor may stray from the offsetting rule, after
/// rounding both factors to two decimals.
const FACTOR_TOLERANCE: f32 = 0.001;

/// Checks a tank against the rules the server will apply.
///
/// # Errors
/// Returns `ClientError::Validation` naming the first rule violated.
pub(crate) fn check_tank(tank: &TankAttributes) -> Result<(), ClientError> {
    if tank.name.is_empty() {
        return reject("the tank needs a name");
    }
    if !tank.name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return reject("tank names may only contain letters and digits");
    }
    for (label, factor) in [
        ("speed", tank.speed_factor),
        ("armor", tank.armor_factor),
    ] {
        if !(0.5..=1.5).contains(&factor) {
            return reject(&format!(
                "the {label} factor must be between 50% and 150%"
            ));
        }
    }
    // Speed and armor trade off against each other: their distances
    // from 1.0 must match.
    let speed_offset = (1.0 - round2(tank.speed_factor)).abs();
    let armor_offset = (1.0 - round2(tank.armor_factor)).abs();
    if (speed_offset - armor_offset).abs() > FACTOR_TOLERANCE {
        return reject(
            "the speed and armor factors must offset each other evenly",
        );
    }
    if tank.model.is_empty() {
        return reject("the tank needs a model");
    }
    if !tank.color.in_range() {
        return reject("color channels must be between 0 and 255");
    }
    if tank.weapon_id < 0 {
        return reject("the weapon id must not be negative");
    }
    Ok(())
}

fn reject(reason: &str) -> Result<(), ClientError> {
    Err(ClientError::Validation(reason.to_string()))
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
