//! Serving cell identity.
//!
//! [`CellIdentity`] is the normalized view of the cell serving the UE at some
//! instant, whatever source it was read from. [`resolve`] produces one from a
//! [`CellInfoProvider`].

mod provider;
mod resolver;

pub use provider::{
    CdmaCell, CdmaLocation, CellInfo, CellInfoProvider, CellLocation, GsmCell,
    GsmLocation, LteCell, NoCellInfo, WcdmaCell,
};
pub use resolver::resolve;

use derive_more::Display;
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Joins the sub-fields of a flattened [`CellIdentity`].
pub const CELL_DELIMITER: char = '_';

const UNKNOWN_TAG: &str = "Unknown";
const LTE_TAG: &str = "LTE";
const WCDMA_TAG: &str = "WCDMA";
const GSM_TAG: &str = "GSM";
const CDMA_TAG: &str = "CDMA";
const LEGACY_GSM_TAG: &str = "LEGACY-GSM";
const LEGACY_CDMA_TAG: &str = "LEGACY-CDMA";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RadioTech {
    #[display("LTE")]
    Lte,
    #[display("WCDMA")]
    Wcdma,
    #[display("GSM")]
    Gsm,
    #[display("CDMA")]
    Cdma,
}

/// Families a technology-agnostic cell location can be read as.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegacyFamily {
    #[display("GSM")]
    Gsm,
    #[display("CDMA")]
    Cdma,
}

/// Identity of the serving cell.
///
/// MCC and MNC are kept as digit strings since their leading zeros are
/// significant (`07` and `7` are different networks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rat", rename_all = "UPPERCASE")]
pub enum CellIdentity {
    Unknown,
    Lte {
        mcc: String,
        mnc: String,
        tac: u32,
        cell_id: u32,
        pci: u32,
    },
    Wcdma {
        mcc: String,
        mnc: String,
        lac: u32,
        cell_id: u32,
        psc: u32,
    },
    Gsm {
        mcc: String,
        mnc: String,
        lac: u32,
        cell_id: u32,
    },
    Cdma {
        system_id: u32,
        network_id: u32,
        base_station_id: u32,
    },
    /// Read through the legacy location query, radio technology undetermined.
    Legacy(LegacyCell),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyCell {
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub location: LegacyLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "family", rename_all = "UPPERCASE")]
pub enum LegacyLocation {
    Gsm {
        lac: u32,
        cell_id: u32,
    },
    Cdma {
        system_id: u32,
        network_id: u32,
        base_station_id: u32,
    },
}

impl CellIdentity {
    pub fn is_known(&self) -> bool {
        !matches!(self, CellIdentity::Unknown)
    }

    fn tag(&self) -> &'static str {
        match self {
            CellIdentity::Unknown => UNKNOWN_TAG,
            CellIdentity::Lte { .. } => LTE_TAG,
            CellIdentity::Wcdma { .. } => WCDMA_TAG,
            CellIdentity::Gsm { .. } => GSM_TAG,
            CellIdentity::Cdma { .. } => CDMA_TAG,
            CellIdentity::Legacy(LegacyCell {
                location: LegacyLocation::Gsm { .. },
                ..
            }) => LEGACY_GSM_TAG,
            CellIdentity::Legacy(LegacyCell {
                location: LegacyLocation::Cdma { .. },
                ..
            }) => LEGACY_CDMA_TAG,
        }
    }

    fn sub_fields(&self) -> Vec<String> {
        match self {
            CellIdentity::Unknown => vec![],
            CellIdentity::Lte {
                mcc,
                mnc,
                tac,
                cell_id,
                pci,
            } => vec![
                mcc.clone(),
                mnc.clone(),
                tac.to_string(),
                cell_id.to_string(),
                pci.to_string(),
            ],
            CellIdentity::Wcdma {
                mcc,
                mnc,
                lac,
                cell_id,
                psc,
            } => vec![
                mcc.clone(),
                mnc.clone(),
                lac.to_string(),
                cell_id.to_string(),
                psc.to_string(),
            ],
            CellIdentity::Gsm {
                mcc,
                mnc,
                lac,
                cell_id,
            } => vec![
                mcc.clone(),
                mnc.clone(),
                lac.to_string(),
                cell_id.to_string(),
            ],
            CellIdentity::Cdma {
                system_id,
                network_id,
                base_station_id,
            } => vec![
                system_id.to_string(),
                network_id.to_string(),
                base_station_id.to_string(),
            ],
            CellIdentity::Legacy(legacy) => {
                let mut fields = vec![
                    legacy.mcc.clone().unwrap_or_default(),
                    legacy.mnc.clone().unwrap_or_default(),
                ];
                match legacy.location {
                    LegacyLocation::Gsm { lac, cell_id } => {
                        fields.extend([lac.to_string(), cell_id.to_string()]);
                    }
                    LegacyLocation::Cdma {
                        system_id,
                        network_id,
                        base_station_id,
                    } => {
                        fields.extend([
                            system_id.to_string(),
                            network_id.to_string(),
                            base_station_id.to_string(),
                        ]);
                    }
                }
                fields
            }
        }
    }
}

/// Flattens the identity to `TAG_field_field...`, e.g. `LTE_214_07_1200_55000111_301`.
impl fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())?;
        for field in self.sub_fields() {
            write!(f, "{CELL_DELIMITER}{field}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CellIdentityParseError {
    #[error("unknown radio technology tag {0:?}")]
    UnknownTag(String),

    #[error("{tag} cell identity expects {expected} fields, found {found}")]
    FieldCount {
        tag: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

impl FromStr for CellIdentity {
    type Err = CellIdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(CELL_DELIMITER);
        let tag = parts.next().unwrap_or_default();
        let fields: Vec<&str> = parts.collect();

        let arity = |expected: usize| {
            if fields.len() == expected {
                Ok(())
            } else {
                Err(CellIdentityParseError::FieldCount {
                    tag: tag.to_owned(),
                    expected,
                    found: fields.len(),
                })
            }
        };

        let identity = match tag {
            UNKNOWN_TAG => {
                arity(0)?;
                CellIdentity::Unknown
            }
            LTE_TAG => {
                arity(5)?;
                CellIdentity::Lte {
                    mcc: parse_code("mcc", fields[0])?,
                    mnc: parse_code("mnc", fields[1])?,
                    tac: parse_num("tac", fields[2])?,
                    cell_id: parse_num("cell_id", fields[3])?,
                    pci: parse_num("pci", fields[4])?,
                }
            }
            WCDMA_TAG => {
                arity(5)?;
                CellIdentity::Wcdma {
                    mcc: parse_code("mcc", fields[0])?,
                    mnc: parse_code("mnc", fields[1])?,
                    lac: parse_num("lac", fields[2])?,
                    cell_id: parse_num("cell_id", fields[3])?,
                    psc: parse_num("psc", fields[4])?,
                }
            }
            GSM_TAG => {
                arity(4)?;
                CellIdentity::Gsm {
                    mcc: parse_code("mcc", fields[0])?,
                    mnc: parse_code("mnc", fields[1])?,
                    lac: parse_num("lac", fields[2])?,
                    cell_id: parse_num("cell_id", fields[3])?,
                }
            }
            CDMA_TAG => {
                arity(3)?;
                CellIdentity::Cdma {
                    system_id: parse_num("system_id", fields[0])?,
                    network_id: parse_num("network_id", fields[1])?,
                    base_station_id: parse_num("base_station_id", fields[2])?,
                }
            }
            LEGACY_GSM_TAG => {
                arity(4)?;
                CellIdentity::Legacy(LegacyCell {
                    mcc: parse_opt_code("mcc", fields[0])?,
                    mnc: parse_opt_code("mnc", fields[1])?,
                    location: LegacyLocation::Gsm {
                        lac: parse_num("lac", fields[2])?,
                        cell_id: parse_num("cell_id", fields[3])?,
                    },
                })
            }
            LEGACY_CDMA_TAG => {
                arity(5)?;
                CellIdentity::Legacy(LegacyCell {
                    mcc: parse_opt_code("mcc", fields[0])?,
                    mnc: parse_opt_code("mnc", fields[1])?,
                    location: LegacyLocation::Cdma {
                        system_id: parse_num("system_id", fields[2])?,
                        network_id: parse_num("network_id", fields[3])?,
                        base_station_id: parse_num("base_station_id", fields[4])?,
                    },
                })
            }
            other => return Err(CellIdentityParseError::UnknownTag(other.to_owned())),
        };

        Ok(identity)
    }
}

/// Returns the code if it looks like an MCC or MNC: two or three decimal digits.
pub(crate) fn plmn_code(code: &str) -> Option<String> {
    let code = code.trim();
    let valid =
        (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit());

    valid.then(|| code.to_owned())
}

fn parse_code(
    field: &'static str,
    value: &str,
) -> Result<String, CellIdentityParseError> {
    plmn_code(value).ok_or_else(|| CellIdentityParseError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

fn parse_opt_code(
    field: &'static str,
    value: &str,
) -> Result<Option<String>, CellIdentityParseError> {
    if value.is_empty() {
        return Ok(None);
    }

    parse_code(field, value).map(Some)
}

fn parse_num(field: &'static str, value: &str) -> Result<u32, CellIdentityParseError> {
    value
        .parse()
        .map_err(|_| CellIdentityParseError::InvalidField {
            field,
            value: value.to_owned(),
        })
}
