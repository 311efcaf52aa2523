//! serde support. Maps serialize as maps and sets as sequences, in iteration
//! order. Table geometry is not part of the format: deserialization sizes a
//! fresh container from the length hint and reinserts.

use core::fmt;
use core::marker::PhantomData;

use ::serde::de::Deserialize;
use ::serde::de::Deserializer;
use ::serde::de::MapAccess;
use ::serde::de::SeqAccess;
use ::serde::de::Visitor;
use ::serde::ser::Serialize;
use ::serde::ser::SerializeMap;
use ::serde::ser::SerializeSeq;
use ::serde::ser::Serializer;

use crate::array_map::ArrayMap;
use crate::big_hash_set::BigHashSet;
use crate::big_table::BigHashTable;
use crate::hash_map::HashMap;
use crate::hash_set::HashSet;
use crate::hash_table::HashTable;
use crate::key::Key;
use crate::key::Strategy;

// Upper bound on preallocation from an untrusted length hint.
const MAX_PREALLOC: usize = 1 << 12;

fn cautious(hint: Option<usize>) -> usize {
    hint.unwrap_or(0).min(MAX_PREALLOC)
}

fn serialize_map<'a, K, V, Ser>(
    len: usize,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
    serializer: Ser,
) -> Result<Ser::Ok, Ser::Error>
where
    K: Serialize + 'a,
    V: Serialize + 'a,
    Ser: Serializer,
{
    let mut map = serializer.serialize_map(Some(len))?;
    for (k, v) in entries {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

fn serialize_seq<'a, K, Ser>(
    len: usize,
    keys: impl Iterator<Item = &'a K>,
    serializer: Ser,
) -> Result<Ser::Ok, Ser::Error>
where
    K: Serialize + 'a,
    Ser: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(len))?;
    for k in keys {
        seq.serialize_element(k)?;
    }
    seq.end()
}

impl<K, V, S> Serialize for HashTable<K, V, S>
where
    K: Key + Serialize,
    V: Serialize,
    S: Strategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serialize_map(self.len(), self.iter(), serializer)
    }
}

impl<K, V, S> Serialize for HashMap<K, V, S>
where
    K: Key + Serialize,
    V: Serialize,
    S: Strategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serialize_map(self.len(), self.iter(), serializer)
    }
}

impl<K, V, S, const SHIFT: u32> Serialize for BigHashTable<K, V, S, SHIFT>
where
    K: Key + Serialize,
    V: Serialize,
    S: Strategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let len = usize::try_from(self.len()).map_err(<Ser::Error as ::serde::ser::Error>::custom)?;
        serialize_map(len, self.iter(), serializer)
    }
}

impl<K, V> Serialize for ArrayMap<K, V>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serialize_map(self.len(), self.iter(), serializer)
    }
}

impl<K, S> Serialize for HashSet<K, S>
where
    K: Key + Serialize,
    S: Strategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serialize_seq(self.len(), self.iter(), serializer)
    }
}

impl<K, S, const SHIFT: u32> Serialize for BigHashSet<K, S, SHIFT>
where
    K: Key + Serialize,
    S: Strategy<K>,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let len = usize::try_from(self.len()).map_err(<Ser::Error as ::serde::ser::Error>::custom)?;
        serialize_seq(len, self.iter(), serializer)
    }
}

/// Visits a serde map, handing each entry to `insert` on a container built
/// by `make` from the cautious length hint.
struct MapVisitor<C, K, V> {
    make: fn(usize) -> C,
    insert: fn(&mut C, K, V),
    marker: PhantomData<fn() -> (K, V)>,
}

impl<'de, C, K, V> Visitor<'de> for MapVisitor<C, K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = C;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<C, A::Error> {
        let mut container = (self.make)(cautious(access.size_hint()));
        while let Some((k, v)) = access.next_entry()? {
            (self.insert)(&mut container, k, v);
        }
        Ok(container)
    }
}

struct SeqVisitor<C, K> {
    make: fn(usize) -> C,
    insert: fn(&mut C, K),
    marker: PhantomData<fn() -> K>,
}

impl<'de, C, K> Visitor<'de> for SeqVisitor<C, K>
where
    K: Deserialize<'de>,
{
    type Value = C;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<C, A::Error> {
        let mut container = (self.make)(cautious(access.size_hint()));
        while let Some(k) = access.next_element()? {
            (self.insert)(&mut container, k);
        }
        Ok(container)
    }
}

impl<'de, K, V, S> Deserialize<'de> for HashTable<K, V, S>
where
    K: Key + Deserialize<'de>,
    V: Deserialize<'de>,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor {
            make: HashTable::with_capacity,
            insert: |table: &mut Self, k, v| {
                table.insert(k, v);
            },
            marker: PhantomData,
        })
    }
}

impl<'de, K, V, S> Deserialize<'de> for HashMap<K, V, S>
where
    K: Key + Deserialize<'de>,
    V: Deserialize<'de>,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor {
            make: HashMap::with_capacity,
            insert: |map: &mut Self, k, v| {
                map.insert(k, v);
            },
            marker: PhantomData,
        })
    }
}

impl<'de, K, V, S, const SHIFT: u32> Deserialize<'de> for BigHashTable<K, V, S, SHIFT>
where
    K: Key + Deserialize<'de>,
    V: Deserialize<'de>,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor {
            make: |len| BigHashTable::with_capacity(len as u64),
            insert: |table: &mut Self, k, v| {
                table.insert(k, v);
            },
            marker: PhantomData,
        })
    }
}

impl<'de, K, V> Deserialize<'de> for ArrayMap<K, V>
where
    K: PartialEq + Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor {
            make: ArrayMap::with_capacity,
            insert: |map: &mut Self, k, v| {
                map.insert(k, v);
            },
            marker: PhantomData,
        })
    }
}

impl<'de, K, S> Deserialize<'de> for HashSet<K, S>
where
    K: Key + Deserialize<'de>,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(SeqVisitor {
            make: HashSet::with_capacity,
            insert: |set: &mut Self, k| {
                set.insert(k);
            },
            marker: PhantomData,
        })
    }
}

impl<'de, K, S, const SHIFT: u32> Deserialize<'de> for BigHashSet<K, S, SHIFT>
where
    K: Key + Deserialize<'de>,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(SeqVisitor {
            make: |len| BigHashSet::with_capacity(len as u64),
            insert: |set: &mut Self, k| {
                set.insert(k);
            },
            marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    use super::*;
    use crate::key::Natural;

    #[test]
    fn map_round_trip() {
        let mut map: HashMap<u32, String> = HashMap::new();
        for k in 0..50 {
            map.insert(k, k.to_string());
        }
        let json = serde_json::to_string(&map).unwrap();
        let back: HashMap<u32, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.get(&0).map(String::as_str), Some("0"));
    }

    #[test]
    fn array_map_round_trip_keeps_storage_order() {
        let mut map: ArrayMap<String, u32> = ArrayMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        map.insert("c".to_string(), 3);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":2,"a":1,"c":3}"#);

        let back: ArrayMap<String, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);

        let dup: ArrayMap<u8, u8> = serde_json::from_str(r#"{"1":1,"2":2,"1":3}"#).unwrap();
        assert_eq!(dup.keys(), [1, 2]);
        assert_eq!(dup.get(&1), Some(&3));
    }

    #[test]
    fn table_serializes_in_iteration_order() {
        let table: HashTable<u8, u8> = [(1, 10), (0, 5)].into_iter().collect();
        let expected: Vec<String> = table.iter().map(|(k, v)| alloc::format!("\"{k}\":{v}")).collect();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, alloc::format!("{{{}}}", expected.join(",")));

        let back: HashTable<u8, u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(&0), Some(&5));
    }

    #[test]
    fn sets_round_trip_as_sequences() {
        let set: HashSet<i64> = (-20..20).collect();
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.starts_with('['));
        let back: HashSet<i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);

        let big: BigHashSet<u64, Natural, 3> = (0..100).collect();
        let json = serde_json::to_string(&big).unwrap();
        let back: BigHashSet<u64, Natural, 3> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, big);
    }

    #[test]
    fn big_table_round_trip() {
        let table: BigHashTable<u64, bool, Natural, 3> = (0..64).map(|k| (k, k % 3 == 0)).collect();
        let json = serde_json::to_string(&table).unwrap();
        let back: BigHashTable<u64, bool, Natural, 3> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 64);
        assert!(back.iter().all(|(k, v)| *v == (k % 3 == 0)));
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let back: HashMap<String, u8> = serde_json::from_str(r#"{"a":1,"b":2,"a":3}"#).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(&"a".to_string()), Some(&3));
    }
}
