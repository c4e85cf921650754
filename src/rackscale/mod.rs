//! RackScale commands of the Group Extension NetFn.
//!
//! Requests carry the RackScale group extension marker as their first byte,
//! and responses may echo it right after the completion code.

use crate::connection::UnpackError;

/// The group extension marker identifying RackScale commands.
pub const RACKSCALE: u8 = 0x04;

const GET_ACPI_TABLE_NAMES: u8 = 0x0A;
const SET_ACPI_TABLE_NAMES: u8 = 0x0B;

/// Length of an ACPI table signature.
pub const ACPI_TABLE_NAME_LEN: usize = 4;

mod get_acpi_table_names;
pub use get_acpi_table_names::{AcpiTableNames, GetAcpiTableNames};

mod set_acpi_table_names;
pub use set_acpi_table_names::{InvalidTableName, SetAcpiTableNames, SetAcpiTableNamesResponse};

/// Offset of the first command-specific byte of a response, and whether the
/// group extension marker was echoed in front of it.
fn extension_offset(data: &[u8]) -> (usize, bool) {
    match data.get(1) {
        Some(&RACKSCALE) => (2, true),
        _ => (1, false),
    }
}

/// Split `data` into NUL-trimmed ACPI table signatures.
fn parse_table_names(data: &[u8]) -> Result<Vec<String>, UnpackError> {
    if data.len() % ACPI_TABLE_NAME_LEN != 0 {
        return Err(UnpackError::Invalid(
            "table name list is not a multiple of 4 bytes",
        ));
    }

    data.chunks_exact(ACPI_TABLE_NAME_LEN)
        .map(|name| {
            let end = name.iter().position(|b| *b == 0).unwrap_or(name.len());
            let name = &name[..end];

            if name.is_ascii() {
                Ok(String::from_utf8_lossy(name).into_owned())
            } else {
                Err(UnpackError::Invalid("table name is not ASCII"))
            }
        })
        .collect()
}
