use crate::session::SignalStrength;

/// Source of raw radio information.
///
/// Providers never fail outward: anything they can't answer is `None`.
pub trait CellInfoProvider {
    /// Cells currently seen by the UE. Platforms put the serving cell first.
    ///
    /// `None` means the query is not supported at all.
    fn visible_cells(&self) -> Option<Vec<CellInfo>>;

    /// Numeric operator of the registered network, MCC followed by MNC.
    fn network_operator(&self) -> Option<String>;

    /// Technology agnostic location of the serving cell.
    fn cell_location(&self) -> Option<CellLocation>;

    fn signal_strength(&self) -> SignalStrength {
        SignalStrength::UNKNOWN
    }
}

impl<P: CellInfoProvider + ?Sized> CellInfoProvider for Box<P> {
    fn visible_cells(&self) -> Option<Vec<CellInfo>> {
        (**self).visible_cells()
    }

    fn network_operator(&self) -> Option<String> {
        (**self).network_operator()
    }

    fn cell_location(&self) -> Option<CellLocation> {
        (**self).cell_location()
    }

    fn signal_strength(&self) -> SignalStrength {
        (**self).signal_strength()
    }
}

/// A visible cell as reported by the radio stack. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellInfo {
    Lte(LteCell),
    Wcdma(WcdmaCell),
    Gsm(GsmCell),
    Cdma(CdmaCell),
    Other { rat: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LteCell {
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub tac: Option<u32>,
    pub cell_id: Option<u32>,
    pub pci: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WcdmaCell {
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub lac: Option<u32>,
    pub cell_id: Option<u32>,
    pub psc: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GsmCell {
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub lac: Option<u32>,
    pub cell_id: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CdmaCell {
    pub system_id: Option<u32>,
    pub network_id: Option<u32>,
    pub base_station_id: Option<u32>,
}

/// Location reported without a radio technology attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellLocation {
    Gsm(GsmLocation),
    Cdma(CdmaLocation),
    /// Something the provider could not map to either family.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsmLocation {
    pub lac: u32,
    pub cell_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdmaLocation {
    pub system_id: u32,
    pub network_id: u32,
    pub base_station_id: u32,
}

/// Provider for hosts without any radio access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCellInfo;

impl CellInfoProvider for NoCellInfo {
    fn visible_cells(&self) -> Option<Vec<CellInfo>> {
        None
    }

    fn network_operator(&self) -> Option<String> {
        None
    }

    fn cell_location(&self) -> Option<CellLocation> {
        None
    }
}
