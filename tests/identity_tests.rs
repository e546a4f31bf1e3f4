//! Tests for record UUIDs and partitioning
//!
//! Golden values were produced independently (SHA-1 name-based UUIDs,
//! Java `String.hashCode` partitions) to pin the on-disk layout.

use warcmap::identity::{generate_id, RecordIdGenerator};
use warcmap::partition::{
    java_string_hash, partition_for, partition_for_composite, shard_name, OutputStream,
};

// =============================================================================
// UUIDs
// =============================================================================

#[test]
fn test_generate_id_golden_values() {
    assert_eq!(
        generate_id("clueweb12", "clueweb12-0000wb-00-00000").to_string(),
        "0c6e1d4b-d6a5-5494-9c68-2412a715fb5a"
    );
    assert_eq!(
        generate_id("commoncrawl", "<urn:uuid:00000000-0000-0000-0000-000000000001>").to_string(),
        "8a51cb4a-4c8f-5ddd-929b-b1b54cb95702"
    );
}

#[test]
fn test_generate_id_is_deterministic() {
    let a = generate_id("test", "rec-1");
    let b = generate_id("test", "rec-1");
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "3eccc0ee-a6e6-5de5-80bd-f38ef19080c4");
}

#[test]
fn test_generate_id_version_and_variant() {
    let uuid = generate_id("any", "key");
    assert_eq!(uuid.get_version_num(), 5);
    assert_eq!(uuid.get_variant(), uuid::Variant::RFC4122);
    assert_eq!(uuid.to_string().len(), 36);
}

#[test]
fn test_prefix_changes_id() {
    assert_ne!(generate_id("a", "key"), generate_id("b", "key"));
    assert_ne!(generate_id("test", "rec-1"), generate_id("test", "rec-2"));
}

#[test]
fn test_generator_matches_free_function() {
    let ids = RecordIdGenerator::new("clueweb12");
    assert_eq!(
        ids.generate("clueweb12-0000wb-00-00000"),
        generate_id("clueweb12", "clueweb12-0000wb-00-00000")
    );
}

// =============================================================================
// Partitioning
// =============================================================================

#[test]
fn test_java_string_hash_golden_values() {
    assert_eq!(java_string_hash(""), 0);
    assert_eq!(java_string_hash("a"), 97);
    assert_eq!(java_string_hash("hello"), 99162322);
    assert_eq!(java_string_hash("http://example.com/"), 1905149924);
    assert_eq!(java_string_hash("polygenelubricants"), i32::MIN);
    // UTF-16 code units, including a surrogate pair
    assert_eq!(java_string_hash("\u{e9}\u{20ac}\u{1d11e}"), 16751501);
}

#[test]
fn test_partition_golden_values() {
    assert_eq!(partition_for("hello", 100), 22);
    assert_eq!(partition_for("http://example.com/", 100), 24);
    assert_eq!(partition_for("0c6e1d4b-d6a5-5494-9c68-2412a715fb5a", 100), 0);
    assert_eq!(partition_for("0c6e1d4b-d6a5-5494-9c68-2412a715fb5a", 7), 6);
}

#[test]
fn test_partition_of_negative_hash_is_non_negative() {
    assert_eq!(partition_for("polygenelubricants", 100), 52);
    assert_eq!(partition_for("polygenelubricants", 7), 5);
}

#[test]
fn test_partition_always_in_range() {
    for n in [1u32, 2, 3, 7, 100, 1000] {
        for i in 0..500 {
            let key = generate_id("range", &i.to_string()).to_string();
            let p = partition_for(&key, n);
            assert!(p < n);
            assert_eq!(p, partition_for(&key, n));
        }
    }
}

#[test]
fn test_composite_prefix_is_stripped() {
    assert_eq!(partition_for_composite("datahello", 100), partition_for("hello", 100));
    assert_eq!(
        partition_for_composite("urihttp://example.com/", 100),
        partition_for("http://example.com/", 100)
    );
    // Unknown prefixes hash the whole key
    assert_eq!(partition_for_composite("hello", 100), 22);
}

#[test]
fn test_output_stream_keys() {
    assert_eq!(OutputStream::Data.key("abc"), "dataabc");
    assert_eq!(
        OutputStream::split_key("urihttp://x/"),
        Some((OutputStream::Uri, "http://x/"))
    );
    assert_eq!(OutputStream::split_key("other"), None);
}

#[test]
fn test_shard_names() {
    assert_eq!(shard_name("data", 7), "data-r-00007");
    assert_eq!(OutputStream::Uri.shard_name(12345), "uri-r-12345");
}
