use mcr_core::SchemaVersion;

#[test]
fn readers_accept_older_minor_versions_of_the_same_major() {
    let reader = SchemaVersion::new(1, 2, 0);
    assert!(reader.reads(&SchemaVersion::new(1, 0, 5)));
    assert!(reader.reads(&SchemaVersion::new(1, 2, 3)));
    assert!(!reader.reads(&SchemaVersion::new(1, 3, 0)));
    assert!(!reader.reads(&SchemaVersion::new(2, 0, 0)));
    assert_eq!(SchemaVersion::default().to_string(), "1.0.0");
}
