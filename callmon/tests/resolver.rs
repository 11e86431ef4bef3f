use callmon::cell::{
    CellInfo, CellInfoProvider, CellLocation, GsmCell, GsmLocation, LegacyCell,
    LegacyLocation, LteCell,
};
use callmon::diagnostics::{CollectingDiagnostics, Diagnostic};
use callmon::{resolve, CellIdentity, SignalStrength};
use mockall::mock;
use test_log::test;

mock! {
    pub Radio {}
    impl CellInfoProvider for Radio {
        fn visible_cells(&self) -> Option<Vec<CellInfo>>;
        fn network_operator(&self) -> Option<String>;
        fn cell_location(&self) -> Option<CellLocation>;
        fn signal_strength(&self) -> SignalStrength;
    }
}

fn lte(cell_id: u32, pci: u32) -> CellInfo {
    CellInfo::Lte(LteCell {
        mcc: Some("214".into()),
        mnc: Some("07".into()),
        tac: Some(1200),
        cell_id: Some(cell_id),
        pci: Some(pci),
    })
}

#[test]
fn first_visible_cell_wins() {
    // Arrange
    let mut radio = MockRadio::new();
    radio.expect_visible_cells().times(1).returning(|| {
        Some(vec![
            lte(55000111, 301),
            lte(55000112, 12),
            CellInfo::Gsm(GsmCell::default()),
        ])
    });
    radio.expect_network_operator().never();
    radio.expect_cell_location().never();
    let diagnostics = CollectingDiagnostics::new();

    // Act
    let identity = resolve(&radio, &diagnostics);

    // Assert
    assert_eq!(
        identity,
        CellIdentity::Lte {
            mcc: "214".into(),
            mnc: "07".into(),
            tac: 1200,
            cell_id: 55000111,
            pci: 301,
        }
    );
    assert!(diagnostics.events().is_empty());
}

#[test]
fn empty_list_falls_back_to_legacy_gsm_location() {
    // Arrange
    let mut radio = MockRadio::new();
    radio.expect_visible_cells().returning(|| Some(vec![]));
    radio
        .expect_network_operator()
        .times(1)
        .returning(|| Some("21407".into()));
    radio.expect_cell_location().times(1).returning(|| {
        Some(CellLocation::Gsm(GsmLocation {
            lac: 100,
            cell_id: 2000,
        }))
    });
    let diagnostics = CollectingDiagnostics::new();

    // Act
    let identity = resolve(&radio, &diagnostics);

    // Assert
    assert_eq!(
        identity,
        CellIdentity::Legacy(LegacyCell {
            mcc: Some("214".into()),
            mnc: Some("07".into()),
            location: LegacyLocation::Gsm {
                lac: 100,
                cell_id: 2000,
            },
        })
    );
    assert_eq!(identity.to_string(), "LEGACY-GSM_214_07_100_2000");
}

#[test]
fn no_data_anywhere_is_unknown() {
    // Arrange
    let mut radio = MockRadio::new();
    radio.expect_visible_cells().returning(|| None);
    radio.expect_network_operator().returning(|| None);
    radio.expect_cell_location().returning(|| None);
    let diagnostics = CollectingDiagnostics::new();

    // Act
    let identity = resolve(&radio, &diagnostics);

    // Assert
    assert_eq!(identity, CellIdentity::Unknown);
    assert_eq!(diagnostics.events(), vec![Diagnostic::CellInfoUnavailable]);
}

#[test]
fn unrecognized_location_degrades_after_both_interpretations() {
    // Arrange
    let mut radio = MockRadio::new();
    radio.expect_visible_cells().returning(|| Some(vec![]));
    radio.expect_network_operator().returning(|| Some("21407".into()));
    radio
        .expect_cell_location()
        .returning(|| Some(CellLocation::Other("nr".into())));
    let diagnostics = CollectingDiagnostics::new();

    // Act
    let identity = resolve(&radio, &diagnostics);

    // Assert
    assert_eq!(identity, CellIdentity::Unknown);
    let events = diagnostics.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[2],
        Diagnostic::CellLocationUnresolved { .. }
    ));
}
