use std::collections::HashMap;
use std::path::Path;

use weaver_options::{OptionError, OptionSpec, OptionValue, PrefixCursor, Resolved};

#[derive(Debug, Clone)]
enum CacheSlot {
    Value(OptionValue),
    Sequence {
        current: OptionValue,
        cursor: PrefixCursor,
    },
}

/// The option store of an ability instance.
///
/// Raw values layer caller-supplied defaults over descriptor defaults;
/// interpreted values are memoized per option and recomputed when the raw
/// value changes. Lazy sequences (prefix scans) keep their position in the
/// cache slot and advance one step per bypassing read.
#[derive(Debug, Clone)]
pub struct OptionSet {
    specs: Vec<OptionSpec>,
    values: HashMap<String, OptionValue>,
    defaults: HashMap<String, OptionValue>,
    cache: HashMap<String, CacheSlot>,
}

impl OptionSet {
    /// Builds the store from an ability's declared specs, every option at
    /// its descriptor default.
    pub fn new(specs: Vec<OptionSpec>) -> Self {
        let values = specs
            .iter()
            .map(|s| (s.name().to_string(), s.default_value().clone()))
            .collect();
        Self {
            specs,
            values,
            defaults: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Layers caller defaults on top of descriptor defaults. Each entry is
    /// validated like a regular `set`; entries for undeclared names are
    /// rejected.
    pub fn apply_defaults(
        &mut self,
        defaults: &HashMap<String, OptionValue>,
    ) -> Result<(), OptionError> {
        for (name, value) in defaults {
            self.set(name, value.clone())?;
            self.defaults.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    /// Declared option names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    /// The descriptor for `name`.
    pub fn spec(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    /// True when the ability declares an option called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.spec(name).is_some()
    }

    /// Sets a raw value. A string of the form `Name()` is accepted iff
    /// `Name` is a generator of the option's kind, and is materialized
    /// immediately with a single draw.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), OptionError> {
        let value = value.into();
        let spec = self
            .spec(name)
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
        let stored = match value.as_str().and_then(|s| s.strip_suffix("()")) {
            Some(generator) if spec.is_generator(generator) => {
                match spec.generate_one_value(&OptionValue::from(generator))? {
                    Resolved::Value(v) => v,
                    // Generator names never resolve to sequences.
                    Resolved::Sequence(_) => {
                        return Err(OptionError::InvalidValue {
                            name: name.to_string(),
                            value: value.to_string(),
                        })
                    }
                }
            }
            _ => {
                if !spec.is_valid(&value) {
                    return Err(OptionError::InvalidValue {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
                value
            }
        };
        self.values.insert(name.to_string(), stored);
        self.cache.remove(name);
        Ok(())
    }

    /// Returns the raw stored value.
    pub fn get_raw(&self, name: &str) -> Result<OptionValue, OptionError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))
    }

    /// Returns the interpreted value, memoized per option. With
    /// `bypass_cache`, a cached sequence advances one step (failing with
    /// `EndOfSequence` when exhausted) and any other cached value is
    /// recomputed from the raw entry.
    pub fn get(&mut self, name: &str, bypass_cache: bool) -> Result<OptionValue, OptionError> {
        let spec = self
            .spec(name)
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))?
            .clone();
        let raw = self.get_raw(name)?;

        if bypass_cache {
            if let Some(CacheSlot::Sequence { current, cursor }) = self.cache.get_mut(name) {
                let next = cursor
                    .next()
                    .ok_or_else(|| OptionError::EndOfSequence(name.to_string()))?;
                *current = OptionValue::Str(next.to_string());
                return Ok(current.clone());
            }
            self.cache.remove(name);
        }

        if !self.cache.contains_key(name) {
            let slot = match spec.generate_one_value(&raw)? {
                Resolved::Value(v) => CacheSlot::Value(v),
                Resolved::Sequence(mut cursor) => {
                    let first = cursor
                        .next()
                        .ok_or_else(|| OptionError::EndOfSequence(name.to_string()))?;
                    CacheSlot::Sequence {
                        current: OptionValue::Str(first.to_string()),
                        cursor,
                    }
                }
            };
            self.cache.insert(name.to_string(), slot);
        }

        Ok(match &self.cache[name] {
            CacheSlot::Value(v) => v.clone(),
            CacheSlot::Sequence { current, .. } => current.clone(),
        })
    }

    /// Restores one option to its layered default.
    pub fn clear(&mut self, name: &str) -> Result<(), OptionError> {
        let default = match self.defaults.get(name) {
            Some(v) => v.clone(),
            None => self
                .spec(name)
                .ok_or_else(|| OptionError::UnknownOption(name.to_string()))?
                .default_value()
                .clone(),
        };
        self.set(name, default)
    }

    /// Restores every option to its layered default.
    pub fn clear_all(&mut self) -> Result<(), OptionError> {
        let names: Vec<String> = self.names().iter().map(|n| n.to_string()).collect();
        for name in names {
            self.clear(&name)?;
        }
        Ok(())
    }

    /// Completion candidates for an option, filtered by the typed prefix.
    pub fn completion(&self, name: &str, typed: &str, reference: Option<&Path>) -> Vec<String> {
        self.spec(name)
            .map(|s| s.possible_values(typed, reference))
            .unwrap_or_default()
    }

    /// Whether `value` would be accepted for `name`.
    pub fn is_valid_value(&self, name: &str, value: &OptionValue) -> bool {
        self.spec(name).map(|s| s.is_valid(value)).unwrap_or(false)
    }

    /// Whether the option still holds its layered default. `None` when the
    /// option is unknown.
    pub fn has_default_value(&self, name: &str) -> Option<bool> {
        let spec = self.spec(name)?;
        let default = self
            .defaults
            .get(name)
            .cloned()
            .unwrap_or_else(|| spec.default_value().clone());
        let current = self.values.get(name)?;
        Some(*current == default || current.to_string() == default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_options::OptionSpec;

    fn demo_set() -> OptionSet {
        OptionSet::new(vec![
            OptionSpec::choice("mode", &["a", "b", "c"], Some("a"), "demo mode", false),
            OptionSpec::prefix("targets", "10.0.0.0/30", "scan range", false, true),
            OptionSpec::port("port_dst", "RandPort", "destination port", false),
            OptionSpec::string("msg", "default", "message", false),
        ])
    }

    #[test]
    fn set_validates_and_clear_restores() {
        let mut opts = demo_set();
        opts.set("mode", "b").unwrap();
        assert_eq!(opts.get_raw("mode").unwrap().as_str(), Some("b"));
        assert!(matches!(
            opts.set("mode", "d"),
            Err(OptionError::InvalidValue { .. })
        ));
        opts.clear("mode").unwrap();
        assert_eq!(opts.get_raw("mode").unwrap().as_str(), Some("a"));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let mut opts = demo_set();
        assert!(matches!(
            opts.set("nope", "x"),
            Err(OptionError::UnknownOption(_))
        ));
        assert!(matches!(
            opts.get("nope", false),
            Err(OptionError::UnknownOption(_))
        ));
    }

    #[test]
    fn interpreted_values_are_memoized() {
        let mut opts = demo_set();
        let first = opts.get("port_dst", false).unwrap();
        for _ in 0..8 {
            assert_eq!(opts.get("port_dst", false).unwrap(), first);
        }
    }

    #[test]
    fn generator_call_draws_once_on_set() {
        let mut opts = demo_set();
        opts.set("port_dst", "RandPort()").unwrap();
        let raw = opts.get_raw("port_dst").unwrap();
        assert!(raw.as_int().is_some());
        assert_eq!(opts.get("port_dst", false).unwrap(), raw);
        assert!(matches!(
            opts.set("msg", "NotAGenerator()"),
            Ok(())
        ));
        assert_eq!(
            opts.get_raw("msg").unwrap().as_str(),
            Some("NotAGenerator()")
        );
    }

    #[test]
    fn prefix_sequence_advances_and_exhausts() {
        let mut opts = demo_set();
        assert_eq!(
            opts.get("targets", true).unwrap().as_str(),
            Some("10.0.0.1")
        );
        assert_eq!(
            opts.get("targets", true).unwrap().as_str(),
            Some("10.0.0.2")
        );
        assert_eq!(
            opts.get("targets", true),
            Err(OptionError::EndOfSequence("targets".into()))
        );
        // A plain read still returns the last drawn address.
        assert_eq!(
            opts.get("targets", false).unwrap().as_str(),
            Some("10.0.0.2")
        );
    }

    #[test]
    fn set_resets_sequence_position() {
        let mut opts = demo_set();
        let _ = opts.get("targets", true).unwrap();
        opts.set("targets", "10.1.0.0/30").unwrap();
        assert_eq!(
            opts.get("targets", true).unwrap().as_str(),
            Some("10.1.0.1")
        );
    }

    #[test]
    fn caller_defaults_layer_over_descriptor_defaults() {
        let mut opts = demo_set();
        let defaults = HashMap::from([("mode".to_string(), OptionValue::from("c"))]);
        opts.apply_defaults(&defaults).unwrap();
        assert_eq!(opts.get_raw("mode").unwrap().as_str(), Some("c"));
        opts.set("mode", "a").unwrap();
        assert_eq!(opts.has_default_value("mode"), Some(false));
        opts.clear("mode").unwrap();
        assert_eq!(opts.get_raw("mode").unwrap().as_str(), Some("c"));
        assert_eq!(opts.has_default_value("mode"), Some(true));
    }

    #[test]
    fn bad_caller_default_is_rejected() {
        let mut opts = demo_set();
        let defaults = HashMap::from([("mode".to_string(), OptionValue::from("z"))]);
        assert!(opts.apply_defaults(&defaults).is_err());
    }
}
