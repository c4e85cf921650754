use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::{extension_offset, parse_table_names, GET_ACPI_TABLE_NAMES, RACKSCALE};

/// Read the names of the ACPI tables the BIOS publishes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GetAcpiTableNames;

impl Request for GetAcpiTableNames {
    fn netfn(&self) -> NetFn {
        NetFn::GroupExtension
    }

    fn cmd(&self) -> u8 {
        GET_ACPI_TABLE_NAMES
    }

    fn pack(&self, out: &mut Vec<u8>) {
        out.push(RACKSCALE);
    }

    fn command_name(&self) -> &'static str {
        "Get ACPI Table Names"
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcpiTableNames {
    completion_code: CompletionCode,
    rackscale_extension_byte_present: bool,
    list_tag: u8,
    acpi_table_names: Vec<String>,
}

impl AcpiTableNames {
    const MIN_RESP_SIZE: usize = 2;

    pub fn acpi_table_names(&self) -> &[String] {
        &self.acpi_table_names
    }

    /// Whether the responder echoed the RackScale marker after the completion code.
    pub fn is_rackscale_extension_byte_present(&self) -> bool {
        self.rackscale_extension_byte_present
    }

    /// The byte preceding the names. It is not interpreted.
    pub fn list_tag(&self) -> u8 {
        self.list_tag
    }
}

impl Response for AcpiTableNames {
    fn netfn(&self) -> NetFn {
        NetFn::GroupExtension
    }

    fn cmd(&self) -> u8 {
        GET_ACPI_TABLE_NAMES
    }

    fn command_name(&self) -> &'static str {
        "Get ACPI Table Names"
    }

    fn min_len(&self) -> usize {
        Self::MIN_RESP_SIZE
    }

    fn completion_code(&self) -> CompletionCode {
        self.completion_code
    }

    fn set_completion_code(&mut self, completion_code: CompletionCode) {
        self.completion_code = completion_code;
    }

    fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        let (offset, present) = extension_offset(data);

        self.rackscale_extension_byte_present = present;
        self.list_tag = codec::get_u8(data, offset)?;
        self.acpi_table_names = parse_table_names(&data[offset + 1..])?;

        Ok(())
    }
}

impl Loggable for AcpiTableNames {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        let mut log = log_vec![
            (0, "ACPI table names"),
            (1, "RackScale marker", self.rackscale_extension_byte_present)
        ];

        log.extend(
            self.acpi_table_names
                .iter()
                .enumerate()
                .map(|(i, name)| (1, format!("Table {i}"), name).into()),
        );

        log
    }
}
