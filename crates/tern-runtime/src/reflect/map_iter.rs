//! `reflect.MapIter`.

use super::value::ReflectValue;
use crate::panic::{Panic, RtResult};
use crate::value::Value;

/// External iterator over a map's entries.
///
/// The key set is captured on the first [`next`](MapIter::next). Entries
/// deleted afterwards are skipped; entries added afterwards are not visited.
pub struct MapIter {
    map: ReflectValue,
    keys: Option<Vec<Value>>,
    pos: usize,
    current: Option<(Value, Value)>,
    exhausted: bool,
}

impl MapIter {
    pub(crate) fn new(map: ReflectValue) -> Self {
        Self { map, keys: None, pos: 0, current: None, exhausted: false }
    }

    /// Advance to the next entry. Calling it again after it returned
    /// `false` faults until the iterator is reset.
    pub fn next(&mut self) -> RtResult<bool> {
        if self.exhausted {
            return Err(Panic::reflect("reflect: MapIter.Next called on exhausted iterator"));
        }
        let map = self.map.map_value();
        let keys = self
            .keys
            .get_or_insert_with(|| map.as_ref().map(|m| m.keys()).unwrap_or_default());
        while self.pos < keys.len() {
            let key = keys[self.pos].clone();
            self.pos += 1;
            let found = match &map {
                Some(m) => m.get(&key)?,
                None => None,
            };
            if let Some(value) = found {
                self.current = Some((key, value));
                return Ok(true);
            }
        }
        self.current = None;
        self.exhausted = true;
        Ok(false)
    }

    fn entry(&self, method: &str) -> RtResult<(ReflectValue, ReflectValue)> {
        match &self.current {
            Some((key, value)) => self.map.map_entry(key.clone(), value.clone()),
            None if self.exhausted => {
                Err(Panic::reflect(format!("reflect: MapIter.{} called on exhausted iterator", method)))
            }
            None => Err(Panic::reflect(format!("reflect: MapIter.{} called before Next", method))),
        }
    }

    pub fn key(&self) -> RtResult<ReflectValue> {
        Ok(self.entry("Key")?.0)
    }

    pub fn value(&self) -> RtResult<ReflectValue> {
        Ok(self.entry("Value")?.1)
    }

    /// Restart over the same map.
    pub fn reset(&mut self) {
        self.keys = None;
        self.pos = 0;
        self.current = None;
        self.exhausted = false;
    }

    /// Restart over another map value.
    pub fn reset_to(&mut self, map: ReflectValue) -> RtResult<()> {
        map.map_range()?;
        self.map = map;
        self.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::map::MapValue;
    use crate::reflect::{basic, map_of, value_of};
    use tern_common_core::Kind;

    fn sample() -> MapValue {
        let ty = map_of(basic(Kind::String), basic(Kind::Int));
        MapValue::with_entries(
            &ty,
            [("a", 1i64), ("b", 2), ("c", 3)].into_iter().map(|(k, v)| (Value::from(k), Value::Int(v))),
        )
        .unwrap()
    }

    #[test]
    fn test_iterates_in_insertion_order() {
        let mut it = value_of(sample()).map_range().unwrap();
        let mut seen = Vec::new();
        while it.next().unwrap() {
            seen.push((it.key().unwrap().string(), it.value().unwrap().int().unwrap()));
        }
        assert_eq!(seen, vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]);
        assert!(it.key().is_err());
        assert!(it.next().is_err());

        it.reset();
        assert!(it.next().unwrap());
        assert_eq!(it.key().unwrap().string(), "a");
    }

    #[test]
    fn test_key_before_next_faults() {
        let it = value_of(sample()).map_range().unwrap();
        assert!(it.key().is_err());
        assert!(it.value().is_err());
    }

    #[test]
    fn test_deleted_entries_are_skipped() {
        let m = sample();
        let mut it = value_of(m.clone()).map_range().unwrap();
        assert!(it.next().unwrap());
        m.remove(&Value::from("b")).unwrap();
        m.insert(Value::from("d"), Value::Int(4)).unwrap();
        assert!(it.next().unwrap());
        assert_eq!(it.key().unwrap().string(), "c");
        assert!(!it.next().unwrap());
    }

    #[test]
    fn test_nil_map_is_empty() {
        let nil_map = crate::reflect::zero(&map_of(basic(Kind::String), basic(Kind::Int))).unwrap();
        let mut it = nil_map.map_range().unwrap();
        assert!(!it.next().unwrap());
    }
}
