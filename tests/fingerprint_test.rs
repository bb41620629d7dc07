//! Tests for image fingerprinting.

use autopost_optimizer::fingerprint::fallback_fingerprint;
use autopost_optimizer::{Fingerprint, derive_fingerprint};

fn photo(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(17).wrapping_add(seed))
        .collect()
}

fn fp(buffers: &[Vec<u8>]) -> Fingerprint {
    derive_fingerprint(buffers)
}

#[test]
fn fingerprint_is_sha256_hex() {
    let f = fp(&[photo(5000, 1)]);
    assert_eq!(f.as_str().len(), 64);
    assert!(f.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(f.short(), &f.as_str()[..16]);
}

#[test]
fn identical_content_gives_identical_fingerprint() {
    let a = vec![photo(5 * 1024, 1), photo(3 * 1024, 2)];
    let b = a.clone();
    assert_eq!(fp(&a), fp(&b));
}

#[test]
fn order_matters() {
    let x = photo(4000, 1);
    let y = photo(4000, 2);
    assert_ne!(fp(&[x.clone(), y.clone()]), fp(&[y, x]));
}

#[test]
fn count_matters() {
    let x = photo(1000, 3);
    assert_ne!(fp(&[x.clone()]), fp(&[x.clone(), x]));
}

#[test]
fn bytes_outside_sampled_windows_are_ignored() {
    // 10,000 bytes: head [0, 2048), middle [5000, 6024), tail [8976, 10000)
    let original = photo(10_000, 5);
    let mut edited = original.clone();
    edited[3000] ^= 0xFF;
    edited[7000] ^= 0xFF;
    assert_eq!(fp(&[original]), fp(&[edited]));
}

#[test]
fn bytes_inside_each_window_are_significant() {
    let original = photo(10_000, 5);
    for offset in [10, 5500, 9999] {
        let mut edited = original.clone();
        edited[offset] ^= 0xFF;
        assert_ne!(
            fp(&[original.clone()]),
            fp(&[edited]),
            "change at offset {offset} should alter the fingerprint"
        );
    }
}

#[test]
fn small_buffers_are_hashed_whole() {
    let original = photo(2048, 9);
    let mut edited = original.clone();
    edited[1500] ^= 0x01;
    assert_ne!(fp(&[original]), fp(&[edited]));
}

#[test]
fn empty_buffer_falls_back_to_whole_buffer_hash() {
    let buffers = vec![photo(100, 1), Vec::new(), photo(200, 2)];
    assert_eq!(fp(&buffers), fallback_fingerprint(&buffers));
}

#[test]
fn fallback_only_reads_first_three_buffers() {
    let mut buffers = vec![Vec::new(), photo(10, 1), photo(10, 2), photo(10, 3)];
    let before = fp(&buffers);
    buffers[3] = photo(10, 4);
    assert_eq!(before, fp(&buffers));
}

#[test]
fn empty_set_is_stable() {
    let none: Vec<Vec<u8>> = Vec::new();
    assert_eq!(fp(&none), fp(&none));
    assert_ne!(fp(&none), fp(&[photo(1, 0)]));
}

#[test]
fn accepts_borrowed_slices() {
    let owned = photo(3000, 7);
    let borrowed: Vec<&[u8]> = vec![owned.as_slice()];
    assert_eq!(derive_fingerprint(&borrowed), fp(&[owned]));
}
