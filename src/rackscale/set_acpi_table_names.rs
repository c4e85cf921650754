use crate::{
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::{extension_offset, ACPI_TABLE_NAME_LEN, RACKSCALE, SET_ACPI_TABLE_NAMES};

/// A table name that is not exactly four ASCII characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidTableName(pub String);

impl core::fmt::Display for InvalidTableName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ACPI table name {:?} is not {ACPI_TABLE_NAME_LEN} ASCII characters",
            self.0
        )
    }
}

impl std::error::Error for InvalidTableName {}

/// Select the ACPI tables the BIOS publishes.
#[derive(Clone, Debug, PartialEq)]
pub struct SetAcpiTableNames {
    names: Vec<[u8; ACPI_TABLE_NAME_LEN]>,
}

impl SetAcpiTableNames {
    pub fn new<I, S>(names: I) -> Result<Self, InvalidTableName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                let bytes: Option<[u8; ACPI_TABLE_NAME_LEN]> = name.as_bytes().try_into().ok();

                bytes
                    .filter(|_| name.is_ascii())
                    .ok_or_else(|| InvalidTableName(name.to_string()))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { names })
    }
}

impl Request for SetAcpiTableNames {
    fn netfn(&self) -> NetFn {
        NetFn::GroupExtension
    }

    fn cmd(&self) -> u8 {
        SET_ACPI_TABLE_NAMES
    }

    fn pack(&self, out: &mut Vec<u8>) {
        out.push(RACKSCALE);
        self.names.iter().for_each(|name| out.extend_from_slice(name));
    }

    fn command_name(&self) -> &'static str {
        "Set ACPI Table Names"
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetAcpiTableNamesResponse {
    completion_code: CompletionCode,
    rackscale_extension_byte_present: bool,
}

impl SetAcpiTableNamesResponse {
    pub fn is_rackscale_extension_byte_present(&self) -> bool {
        self.rackscale_extension_byte_present
    }
}

impl Response for SetAcpiTableNamesResponse {
    fn netfn(&self) -> NetFn {
        NetFn::GroupExtension
    }

    fn cmd(&self) -> u8 {
        SET_ACPI_TABLE_NAMES
    }

    fn command_name(&self) -> &'static str {
        "Set ACPI Table Names"
    }

    fn min_len(&self) -> usize {
        1
    }

    fn completion_code(&self) -> CompletionCode {
        self.completion_code
    }

    fn set_completion_code(&mut self, completion_code: CompletionCode) {
        self.completion_code = completion_code;
    }

    fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.rackscale_extension_byte_present = extension_offset(data).1;
        Ok(())
    }
}

impl Loggable for SetAcpiTableNamesResponse {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![
            (0, "Set ACPI table names"),
            (1, "Completion code", self.completion_code)
        ]
    }
}
