use crate::mach::FreeStore;

#[test]
fn test_alloc_and_free() {
    let mut store = FreeStore::new(100, 10);
    let a = store.alloc(4).expect("fits");
    let b = store.alloc(6).expect("fits");
    assert_eq!((a, b), (100, 104));
    assert_eq!(store.alloc(1), None);

    store.free(a).expect("live block");
    assert_eq!(store.alloc(4), Some(100));
    assert_eq!(store.in_use(), 10);
}

#[test]
fn test_free_coalesces() {
    let mut store = FreeStore::new(0, 12);
    let a = store.alloc(4).expect("fits");
    let b = store.alloc(4).expect("fits");
    let c = store.alloc(4).expect("fits");

    // free out of order; the three blocks must merge back into one
    store.free(a).expect("live block");
    store.free(c).expect("live block");
    store.free(b).expect("live block");
    assert_eq!(store.alloc(12), Some(0));
}

#[test]
fn test_bad_free_is_rejected() {
    let mut store = FreeStore::new(0, 8);
    assert!(store.free(0).is_err());

    let a = store.alloc(2).expect("fits");
    assert!(store.free(a + 1).is_err());
    assert!(store.free(a).is_ok());
    assert!(store.free(a).is_err());
}

#[test]
fn test_zero_sized_alloc_fails() {
    let mut store = FreeStore::new(0, 8);
    assert_eq!(store.alloc(0), None);
    assert_eq!(store.alloc(9), None);
    assert_eq!(store.in_use(), 0);
}
