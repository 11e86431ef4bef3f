use super::{
    plmn_code, CdmaCell, CellIdentity, CellInfo, CellInfoProvider, CellLocation,
    GsmCell, LegacyCell, LegacyFamily, LegacyLocation, LteCell, RadioTech, WcdmaCell,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use tracing::debug;

type Interpretation = fn(&CellLocation) -> Option<LegacyLocation>;

/// Order in which a legacy cell location is tried.
const LEGACY_INTERPRETATIONS: [(LegacyFamily, Interpretation); 2] = [
    (LegacyFamily::Gsm, as_gsm_location),
    (LegacyFamily::Cdma, as_cdma_location),
];

/// Resolves the identity of the serving cell.
///
/// The visible cell list is tried first and only its first entry is looked at,
/// neighbours are ignored. When the list is empty or unsupported the legacy
/// operator + cell location queries are used instead. Never fails: every dead
/// end ends in [`CellIdentity::Unknown`] and a diagnostic.
pub fn resolve<P>(provider: &P, diagnostics: &dyn Diagnostics) -> CellIdentity
where
    P: CellInfoProvider + ?Sized,
{
    match provider.visible_cells() {
        Some(cells) => match cells.into_iter().next() {
            Some(serving) => return classify(&serving, diagnostics),
            None => debug!("visible cell list is empty, using legacy location"),
        },
        None => debug!("visible cell list unsupported, using legacy location"),
    }

    resolve_legacy(provider, diagnostics)
}

fn classify(cell: &CellInfo, diagnostics: &dyn Diagnostics) -> CellIdentity {
    let (rat, identity) = match cell {
        CellInfo::Lte(c) => (RadioTech::Lte, lte_identity(c)),
        CellInfo::Wcdma(c) => (RadioTech::Wcdma, wcdma_identity(c)),
        CellInfo::Gsm(c) => (RadioTech::Gsm, gsm_identity(c)),
        CellInfo::Cdma(c) => (RadioTech::Cdma, cdma_identity(c)),
        CellInfo::Other { rat } => {
            diagnostics.report(Diagnostic::UnsupportedRat { rat: rat.clone() });
            return CellIdentity::Unknown;
        }
    };

    identity.unwrap_or_else(|| {
        diagnostics.report(Diagnostic::IncompleteCellInfo { rat });
        CellIdentity::Unknown
    })
}

fn code(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(plmn_code)
}

fn lte_identity(c: &LteCell) -> Option<CellIdentity> {
    Some(CellIdentity::Lte {
        mcc: code(&c.mcc)?,
        mnc: code(&c.mnc)?,
        tac: c.tac?,
        cell_id: c.cell_id?,
        pci: c.pci?,
    })
}

fn wcdma_identity(c: &WcdmaCell) -> Option<CellIdentity> {
    Some(CellIdentity::Wcdma {
        mcc: code(&c.mcc)?,
        mnc: code(&c.mnc)?,
        lac: c.lac?,
        cell_id: c.cell_id?,
        psc: c.psc?,
    })
}

fn gsm_identity(c: &GsmCell) -> Option<CellIdentity> {
    Some(CellIdentity::Gsm {
        mcc: code(&c.mcc)?,
        mnc: code(&c.mnc)?,
        lac: c.lac?,
        cell_id: c.cell_id?,
    })
}

fn cdma_identity(c: &CdmaCell) -> Option<CellIdentity> {
    Some(CellIdentity::Cdma {
        system_id: c.system_id?,
        network_id: c.network_id?,
        base_station_id: c.base_station_id?,
    })
}

fn resolve_legacy<P>(provider: &P, diagnostics: &dyn Diagnostics) -> CellIdentity
where
    P: CellInfoProvider + ?Sized,
{
    let (mcc, mnc) = match provider.network_operator() {
        Some(operator) => split_operator(&operator).unwrap_or_else(|| {
            diagnostics.report(Diagnostic::MalformedOperator { operator });
            (None, None)
        }),
        None => (None, None),
    };

    let Some(location) = provider.cell_location() else {
        diagnostics.report(Diagnostic::CellInfoUnavailable);
        return CellIdentity::Unknown;
    };

    for (family, interpret) in LEGACY_INTERPRETATIONS {
        match interpret(&location) {
            Some(location) => {
                return CellIdentity::Legacy(LegacyCell { mcc, mnc, location });
            }
            None => {
                diagnostics.report(Diagnostic::LegacyInterpretationFailed { family })
            }
        }
    }

    diagnostics.report(Diagnostic::CellLocationUnresolved {
        location: format!("{location:?}"),
    });

    CellIdentity::Unknown
}

/// Splits `21407` into MCC `214` and MNC `07`.
fn split_operator(operator: &str) -> Option<(Option<String>, Option<String>)> {
    let operator = operator.trim();
    let (mcc, mnc) = operator.split_at_checked(3)?;
    let mcc = plmn_code(mcc).filter(|mcc| mcc.len() == 3)?;
    let mnc = plmn_code(mnc)?;

    Some((Some(mcc), Some(mnc)))
}

fn as_gsm_location(location: &CellLocation) -> Option<LegacyLocation> {
    match location {
        CellLocation::Gsm(gsm) => Some(LegacyLocation::Gsm {
            lac: gsm.lac,
            cell_id: gsm.cell_id,
        }),
        _ => None,
    }
}

fn as_cdma_location(location: &CellLocation) -> Option<LegacyLocation> {
    match location {
        CellLocation::Cdma(cdma) => Some(LegacyLocation::Cdma {
            system_id: cdma.system_id,
            network_id: cdma.network_id,
            base_station_id: cdma.base_station_id,
        }),
        _ => None,
    }
}
