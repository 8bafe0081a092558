//! TypeScript Generation Tests
//!
//! Snapshot types must implement `specta::Type` when the tauri feature is enabled so a
//! desktop front end can mirror them.

#[cfg(feature = "tauri")]
#[test]
fn snapshot_types_implement_specta_type() {
    use specta::Type;

    fn assert_type<T: Type>() {}

    assert_type::<aerofly_reader::FlightSnapshot>();
    assert_type::<aerofly_reader::SnapshotSummary>();
    assert_type::<aerofly_reader::Vector3D>();
    assert_type::<aerofly_reader::ConnectionState>();
    assert_type::<aerofly_reader::SnapshotSource>();
    assert_type::<aerofly_reader::UpdateRate>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn tauri_feature_disabled() {
    let _ = aerofly_reader::UpdateRate::Native;
}
