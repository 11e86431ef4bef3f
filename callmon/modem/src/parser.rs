//! Parsers for Quectel EC2x AT command responses.
//!
//! See https://files.pine64.org/doc/datasheet/project_anakin/LTE_module/Quectel_EC25&EC21_QuecCell_AT_Commands_Manual_V1.1.pdf

use callmon::cell::{CellInfo, GsmCell, GsmLocation, LteCell, WcdmaCell};
use callmon::SignalStrength;
use color_eyre::eyre::{eyre, Result};

const SERVINGCELL_PREFIX: &str = "+QENG: \"servingcell\",";
// No closing quote, so "neighbourcell intra" and "neighbourcell inter" match too.
const NEIGHBOURCELL_PREFIX: &str = "+QENG: \"neighbourcell";

fn split_quoted_fields(line: &str) -> Vec<String> {
    line.split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect()
}

fn field<'a>(fields: &'a [String], idx: usize) -> Option<&'a str> {
    fields
        .get(idx)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty() && *f != "-")
}

fn opt_u32(fields: &[String], idx: usize) -> Option<u32> {
    field(fields, idx)?.parse().ok()
}

fn opt_hex(fields: &[String], idx: usize) -> Option<u32> {
    u32::from_str_radix(field(fields, idx)?, 16).ok()
}

fn opt_mcc(fields: &[String], idx: usize) -> Option<String> {
    field(fields, idx).map(str::to_owned)
}

/// Some firmwares drop the leading zero of two digit MNCs.
fn opt_mnc(fields: &[String], idx: usize) -> Option<String> {
    field(fields, idx).map(|mnc| match mnc.len() {
        1 => format!("0{mnc}"),
        _ => mnc.to_owned(),
    })
}

/// Parses `AT+QENG="servingcell"`.
///
/// Returns `Ok(None)` while the modem is searching or otherwise reports no
/// radio technology.
pub fn parse_serving_cell(response: &str) -> Result<Option<CellInfo>> {
    let line = response
        .lines()
        .find_map(|l| l.find(SERVINGCELL_PREFIX).map(|idx| &l[idx..]))
        .ok_or_else(|| eyre!("no +QENG: \"servingcell\" line in response"))?;

    let fields = split_quoted_fields(&line[SERVINGCELL_PREFIX.len()..]);
    // <state>,<rat>,...
    let Some(rat) = fields.get(1) else {
        return Ok(None);
    };
    let fields = &fields[2..];

    let cell = match rat.as_str() {
        "LTE" => {
            // <is_tdd>,<mcc>,<mnc>,<cellID>,<pcid>,<earfcn>,<band>,<ul_bw>,<dl_bw>,<tac>,...
            if fields.len() < 10 {
                return Err(eyre!("invalid LTE serving cell format: {fields:?}"));
            }
            CellInfo::Lte(LteCell {
                mcc: opt_mcc(fields, 1),
                mnc: opt_mnc(fields, 2),
                cell_id: opt_hex(fields, 3),
                pci: opt_u32(fields, 4),
                tac: opt_hex(fields, 9),
            })
        }
        "WCDMA" => {
            // <mcc>,<mnc>,<lac>,<cellID>,<uarfcn>,<psc>,...
            if fields.len() < 6 {
                return Err(eyre!("invalid WCDMA serving cell format: {fields:?}"));
            }
            CellInfo::Wcdma(WcdmaCell {
                mcc: opt_mcc(fields, 0),
                mnc: opt_mnc(fields, 1),
                lac: opt_hex(fields, 2),
                cell_id: opt_hex(fields, 3),
                psc: opt_u32(fields, 5),
            })
        }
        "GSM" => {
            // <mcc>,<mnc>,<lac>,<cellid>,<bsic>,<arfcn>,...
            if fields.len() < 4 {
                return Err(eyre!("invalid GSM serving cell format: {fields:?}"));
            }
            CellInfo::Gsm(GsmCell {
                mcc: opt_mcc(fields, 0),
                mnc: opt_mnc(fields, 1),
                lac: opt_hex(fields, 2),
                cell_id: opt_hex(fields, 3),
            })
        }
        other => CellInfo::Other {
            rat: other.to_owned(),
        },
    };

    Ok(Some(cell))
}

/// Parses `AT+QENG="neighbourcell"`. Lines that can't be read are skipped.
pub fn parse_neighbour_cells(response: &str) -> Vec<CellInfo> {
    response
        .lines()
        .filter_map(|line| {
            let idx = line.find(NEIGHBOURCELL_PREFIX)?;
            let after = &line[idx + NEIGHBOURCELL_PREFIX.len()..];
            let (_, after) = after.split_once(',')?;
            let fields = split_quoted_fields(after);
            let (rat, fields) = fields.split_first()?;

            parse_neighbour_fields(rat, fields)
        })
        .collect()
}

fn parse_neighbour_fields(rat: &str, fields: &[String]) -> Option<CellInfo> {
    match rat {
        // <mcc>,<mnc>,<lac>,<cellid>,<bsic>,<arfcn>,<rxlev>,...
        "GSM" if fields.len() >= 6 => Some(CellInfo::Gsm(GsmCell {
            mcc: opt_mcc(fields, 0),
            mnc: opt_mnc(fields, 1),
            lac: opt_hex(fields, 2),
            cell_id: opt_hex(fields, 3),
        })),
        // <uarfcn>,<psc>,<rscp>,<ecno>,...
        "WCDMA" if fields.len() >= 2 => Some(CellInfo::Wcdma(WcdmaCell {
            psc: opt_u32(fields, 1),
            ..WcdmaCell::default()
        })),
        // <earfcn>,<pcid>,<rsrq>,<rsrp>,<rssi>,<sinr>,...
        "LTE" if !fields.is_empty() => Some(CellInfo::Lte(LteCell {
            pci: opt_u32(fields, 1),
            ..LteCell::default()
        })),
        _ => None,
    }
}

/// Parses `AT+COPS?` after `AT+COPS=3,2`: `+COPS: <mode>,<format>,"<oper>",<act>`.
pub fn parse_operator(response: &str) -> Option<String> {
    let fields = response_fields(response, "+COPS:")?;
    let operator = field(&fields, 2)?;

    operator
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| operator.to_owned())
}

/// Parses `AT+CREG?` after `AT+CREG=2`: `+CREG: <n>,<stat>[,"<lac>","<ci>"[,<act>]]`.
///
/// Unsolicited `+CREG: <stat>[,"<lac>","<ci>"[,<act>]]` lines may precede the
/// answer. LAC and CI are the only quoted fields in either form.
pub fn parse_registration(response: &str) -> Option<GsmLocation> {
    response.lines().find_map(|line| {
        let idx = line.find("+CREG:")?;
        let mut quoted = line[idx + "+CREG:".len()..]
            .split(',')
            .map(str::trim)
            .filter_map(|f| f.strip_prefix('"')?.strip_suffix('"'));
        let lac = u32::from_str_radix(quoted.next()?, 16).ok()?;
        let cell_id = u32::from_str_radix(quoted.next()?, 16).ok()?;

        Some(GsmLocation { lac, cell_id })
    })
}

/// Parses `AT+CSQ`: `+CSQ: <rssi>,<ber>`, `<rssi>` 0..31 or 99 when unknown.
pub fn parse_signal_quality(response: &str) -> SignalStrength {
    response_fields(response, "+CSQ:")
        .and_then(|fields| opt_u32(&fields, 0))
        .and_then(|rssi| i32::try_from(rssi).ok())
        .filter(|rssi| (0..=31).contains(rssi))
        .map_or(SignalStrength::UNKNOWN, SignalStrength)
}

fn response_fields(response: &str, prefix: &str) -> Option<Vec<String>> {
    response.lines().find_map(|line| {
        let idx = line.find(prefix)?;
        Some(split_quoted_fields(&line[idx + prefix.len()..]))
    })
}
