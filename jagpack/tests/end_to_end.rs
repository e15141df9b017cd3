//! Full read path: archive id to blob via the block store, blob to
//! named entry via the package codec.

use jagpack::{Bundle, Package};
use rand::Rng;
use runefs_storage::BlockStore;
use std::io::Cursor;

fn memory_store() -> BlockStore<Cursor<Vec<u8>>> {
    BlockStore::new(0, Cursor::new(Vec::new()), Cursor::new(Vec::new()))
}

#[test]
fn store_then_lookup_by_name() {
    let mut rng = rand::rng();
    let names = ["TITLE.DAT", "LOGO", "MAP", "BADGE.IDX"];
    let payloads: Vec<Vec<u8>> = names
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let mut data = vec![0u8; 200 + i * 977];
            rng.fill(&mut data[..]);
            data
        })
        .collect();

    for (archive_id, wholly) in [(0u16, false), (1u16, true)] {
        let mut bundle = Bundle::new(names.len(), wholly);
        for (i, name) in names.iter().enumerate() {
            bundle.put(i, name, &payloads[i]).unwrap();
        }

        let store = memory_store();
        assert!(store.put(archive_id, &bundle.pack().unwrap()));

        let blob = store.get(archive_id).expect("archive readable");
        let package = Package::parse(blob).unwrap();
        assert_eq!(package.entry_count(), names.len());
        for (i, name) in names.iter().enumerate() {
            assert_eq!(package.get(name), Some(payloads[i].clone()), "{name}");
        }
    }
}

#[test]
fn overwritten_archive_serves_new_package() {
    let store = memory_store();

    let mut first = Bundle::new(1, false);
    first.put(0, "CONFIG", b"v1").unwrap();
    assert!(store.put(2, &first.pack().unwrap()));

    let mut second = Bundle::new(2, false);
    second.put(0, "CONFIG", b"v2").unwrap();
    second.put(1, "EXTRA", b"added later").unwrap();
    assert!(store.put(2, &second.pack().unwrap()));

    let package = Package::parse(store.get(2).unwrap()).unwrap();
    assert_eq!(package.get("CONFIG"), Some(b"v2".to_vec()));
    assert_eq!(package.get("EXTRA"), Some(b"added later".to_vec()));
}
