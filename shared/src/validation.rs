//! Validation utilities for the Courier Logistics Service

use rust_decimal::Decimal;

use crate::models::{Address, Shipment};

// ============================================================================
// Document Validations
// ============================================================================

/// Consignment and manifest numbers: non-empty, no whitespace, at most 64 chars
pub fn validate_document_number(number: &str) -> Result<(), &'static str> {
    if number.trim().is_empty() {
        return Err("Document number is required");
    }
    if number.len() > 64 {
        return Err("Document number must be at most 64 characters");
    }
    if number.chars().any(char::is_whitespace) {
        return Err("Document number must not contain whitespace");
    }
    Ok(())
}

/// Branch codes: 2-10 uppercase alphanumeric
pub fn validate_branch_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Branch code must be at least 2 characters");
    }
    if code.len() > 10 {
        return Err("Branch code must be at most 10 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("Branch code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Vehicle registration, e.g. "DL01AB1234" or "DL 01 AB 1234"
pub fn validate_vehicle_number(vehicle: &str) -> Result<(), &'static str> {
    let compact: String = vehicle.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if compact.len() < 6 || compact.len() > 12 {
        return Err("Vehicle number must be 6 to 12 characters");
    }
    if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Vehicle number must be alphanumeric");
    }
    Ok(())
}

/// Quantities are non-negative
pub fn validate_quantity(qty: Decimal) -> Result<(), &'static str> {
    if qty < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Product lines and charges of a booking before it is stored
pub fn validate_shipment_lines(shipment: &Shipment) -> Result<(), &'static str> {
    if shipment.invoices.is_empty() {
        return Err("At least one invoice is required");
    }
    if shipment.products().next().is_none() {
        return Err("At least one product line is required");
    }
    for line in shipment.products() {
        if line.product_type.trim().is_empty() {
            return Err("Product type is required");
        }
        validate_quantity(line.amount)?;
    }
    if shipment.charges.iter().any(|c| c.amount < Decimal::ZERO) {
        return Err("Charges cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Contact Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Indian mobile number: 10 digits starting 6-9, optional +91 / 0 prefix
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('0') => &digits[1..],
        12 if digits.starts_with("91") => &digits[2..],
        _ => return Err("Invalid phone number format"),
    };
    match local.chars().next() {
        Some('6'..='9') => Ok(()),
        _ => Err("Invalid phone number format"),
    }
}

/// Six-digit postal code not starting with 0
pub fn validate_pincode(pincode: &str) -> Result<(), &'static str> {
    if pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0')
    {
        Ok(())
    } else {
        Err("Pincode must be 6 digits")
    }
}

/// Address blocks are optional; a filled one needs a city and a valid pincode
pub fn validate_address(address: &Address) -> Result<(), &'static str> {
    if address == &Address::default() {
        return Ok(());
    }
    if address.city.trim().is_empty() {
        return Err("City is required");
    }
    validate_pincode(&address.pincode)?;
    if let Some(phone) = &address.phone {
        validate_phone(phone)?;
    }
    Ok(())
}
