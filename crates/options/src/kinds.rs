use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use ipnet::IpNet;
use nix::unistd::{access, AccessFlags};
use rand::Rng;

use crate::{draw, OptionError, OptionValue, PrefixCursor, Resolved};

const IP_GENERATORS: [&str; 9] = [
    "RandIP4",
    "RandIP6",
    "RandIP_classA",
    "RandIP_classB",
    "RandIP_classC",
    "RandIP_classD",
    "RandIP_classD_Multicast",
    "RandIP_classE",
    "RandIP_classE_Reserved",
];

const MAC_GENERATORS: [&str; 4] = ["RandMac", "RandMulticastMac", "MacFF", "Mac00"];

const NUM_GENERATORS: [&str; 8] = [
    "RandByte",
    "RandShort",
    "RandInt",
    "RandLong",
    "RandSByte",
    "RandSShort",
    "RandSInt",
    "RandSLong",
];

const PORT_GENERATORS: [&str; 2] = ["RandPort", "RandPrivilegedPort"];

const STR_GENERATORS: [&str; 1] = ["RandString"];

const BOOL_VALUES: [&str; 2] = ["True", "False"];

/// A generator name matches by prefix; the longest known name wins so that
/// `RandIP_classD_Multicast` is not captured by `RandIP_classD`.
fn matched<'a>(known: &[&'a str], v: &str) -> Option<&'a str> {
    known
        .iter()
        .copied()
        .filter(|g| v.starts_with(g))
        .max_by_key(|g| g.len())
}

fn is_mac_literal(s: &str) -> bool {
    let colon_form = || {
        let parts: Vec<&str> = s.split(':').collect();
        parts.len() == 6
            && parts.iter().all(|p| {
                *p == "*" || (p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
            })
    };
    let compact_form = || s.len() == 12 && s.chars().all(|c| c.is_ascii_hexdigit());
    colon_form() || compact_form()
}

fn nic_exists(name: &str) -> bool {
    netdev::get_interfaces().iter().any(|i| i.name == name)
}

/// File-system constraints attached to a path option.
///
/// Each permission flag is three-valued: `Some(true)` requires the running
/// user to hold the permission, `Some(false)` requires them not to, `None`
/// leaves it unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathConstraints {
    /// The target must (or must not) exist.
    pub must_exist: Option<bool>,
    /// Read permission constraint.
    pub readable: Option<bool>,
    /// Write permission constraint.
    pub writable: Option<bool>,
    /// Execute permission constraint.
    pub executable: Option<bool>,
    /// The target must be a directory.
    pub is_dir: bool,
}

impl PathConstraints {
    fn check(&self, path: &Path) -> bool {
        let exists = access(path, AccessFlags::F_OK).is_ok();
        if let Some(must_exist) = self.must_exist {
            if must_exist != exists {
                return false;
            }
        }
        if self.is_dir && !path.is_dir() {
            return false;
        }
        let probes = [
            (AccessFlags::R_OK, self.readable),
            (AccessFlags::W_OK, self.writable),
            (AccessFlags::X_OK, self.executable),
        ];
        for (flag, wanted) in probes {
            if let Some(wanted) = wanted {
                if access(path, flag).is_ok() != wanted {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
struct Meta {
    name: String,
    default: OptionValue,
    comment: String,
    optional: bool,
}

#[derive(Debug, Clone)]
enum Kind {
    Ip,
    Prefix { ordered: bool },
    Mac,
    Port,
    Num,
    Bool,
    Choice { choices: Vec<String> },
    Str,
    Path(PathConstraints),
    Nic,
    Callback,
}

/// A typed parameter descriptor.
///
/// Descriptors are immutable and shared by every instance of an ability;
/// they validate raw values, materialize generator draws, and enumerate
/// completion candidates.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    meta: Meta,
    kind: Kind,
}

impl OptionSpec {
    fn build(
        name: &str,
        default: impl Into<OptionValue>,
        comment: &str,
        optional: bool,
        kind: Kind,
    ) -> Self {
        let spec = Self {
            meta: Meta {
                name: name.to_string(),
                default: default.into(),
                comment: comment.to_string(),
                optional,
            },
            kind,
        };
        debug_assert!(
            spec.is_valid(&spec.meta.default),
            "default value for option `{name}` fails its own validation"
        );
        spec
    }

    /// An IPv4/IPv6 address option.
    pub fn ip(name: &str, default: impl Into<OptionValue>, comment: &str, optional: bool) -> Self {
        Self::build(name, default, comment, optional, Kind::Ip)
    }

    /// A CIDR prefix option whose interpreted value is a lazy address scan.
    pub fn prefix(
        name: &str,
        default: impl Into<OptionValue>,
        comment: &str,
        optional: bool,
        ordered: bool,
    ) -> Self {
        Self::build(name, default, comment, optional, Kind::Prefix { ordered })
    }

    /// A MAC address option (`hh:hh:hh:hh:hh:hh` with `*` wildcards, or the
    /// 12-hex compact form).
    pub fn mac(name: &str, default: impl Into<OptionValue>, comment: &str, optional: bool) -> Self {
        Self::build(name, default, comment, optional, Kind::Mac)
    }

    /// A TCP/UDP port option, bounded to `0..=65535`.
    pub fn port(
        name: &str,
        default: impl Into<OptionValue>,
        comment: &str,
        optional: bool,
    ) -> Self {
        Self::build(name, default, comment, optional, Kind::Port)
    }

    /// An integer or float option.
    pub fn num(name: &str, default: impl Into<OptionValue>, comment: &str, optional: bool) -> Self {
        Self::build(name, default, comment, optional, Kind::Num)
    }

    /// A boolean option, also accepting the strings `true`/`false`.
    pub fn boolean(
        name: &str,
        default: impl Into<OptionValue>,
        comment: &str,
        optional: bool,
    ) -> Self {
        Self::build(name, default, comment, optional, Kind::Bool)
    }

    /// A choice among an ordered, non-empty enumeration. A non-optional
    /// choice without a default takes the first entry.
    pub fn choice(
        name: &str,
        choices: &[&str],
        default: Option<&str>,
        comment: &str,
        optional: bool,
    ) -> Self {
        assert!(
            !choices.is_empty(),
            "choice option `{name}` needs at least one choice"
        );
        let default = match default {
            Some(d) => OptionValue::from(d),
            None if !optional => OptionValue::from(choices[0]),
            None => OptionValue::None,
        };
        Self::build(
            name,
            default,
            comment,
            optional,
            Kind::Choice {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    /// A free-form string option.
    pub fn string(
        name: &str,
        default: impl Into<OptionValue>,
        comment: &str,
        optional: bool,
    ) -> Self {
        Self::build(name, default, comment, optional, Kind::Str)
    }

    /// A filesystem path option checked against `constraints`. Without an
    /// explicit default, directory options default to the current directory
    /// and file options to `/bin/true`.
    pub fn path(
        name: &str,
        constraints: PathConstraints,
        default: Option<&str>,
        comment: &str,
        optional: bool,
    ) -> Self {
        let default = match default {
            Some(d) => OptionValue::from(d),
            None if constraints.is_dir => OptionValue::Str(
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("/"))
                    .display()
                    .to_string(),
            ),
            None => OptionValue::Str("/bin/true".to_string()),
        };
        Self::build(name, default, comment, optional, Kind::Path(constraints))
    }

    /// A network interface option; the value must name a local interface.
    pub fn nic(name: &str, default: impl Into<OptionValue>, comment: &str, optional: bool) -> Self {
        Self::build(name, default, comment, optional, Kind::Nic)
    }

    /// An invokable option.
    pub fn callback(name: &str, comment: &str, optional: bool) -> Self {
        Self::build(
            name,
            crate::Callback::identity(),
            comment,
            optional,
            Kind::Callback,
        )
    }

    /// The option name, unique within an ability.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// The descriptor default.
    pub fn default_value(&self) -> &OptionValue {
        &self.meta.default
    }

    /// The human-readable description.
    pub fn comment(&self) -> &str {
        &self.meta.comment
    }

    /// Whether the option may be left absent.
    pub fn is_optional(&self) -> bool {
        self.meta.optional
    }

    /// The permitted values of a choice option.
    pub fn choices(&self) -> Option<&[String]> {
        match &self.kind {
            Kind::Choice { choices } => Some(choices),
            _ => None,
        }
    }

    /// True when `name` is a generator recognized by this option kind.
    pub fn is_generator(&self, name: &str) -> bool {
        let table: &[&str] = match &self.kind {
            Kind::Ip => &IP_GENERATORS,
            Kind::Mac => &MAC_GENERATORS,
            Kind::Num => &NUM_GENERATORS,
            Kind::Port => &PORT_GENERATORS,
            Kind::Str => &STR_GENERATORS,
            Kind::Bool => &BOOL_VALUES,
            _ => return false,
        };
        matched(table, name).is_some()
    }

    /// Whether a raw value is acceptable for this option.
    pub fn is_valid(&self, v: &OptionValue) -> bool {
        if v.is_none() {
            // NIC options tolerate absence regardless of optionality; the
            // interface may be picked later by the orchestrator.
            return matches!(self.kind, Kind::Nic) || self.meta.optional;
        }
        match &self.kind {
            Kind::Ip => v
                .as_str()
                .map(|s| s.parse::<IpAddr>().is_ok() || matched(&IP_GENERATORS, s).is_some())
                .unwrap_or(false),
            Kind::Prefix { .. } => v
                .as_str()
                .map(|s| s.parse::<IpNet>().is_ok())
                .unwrap_or(false),
            Kind::Mac => v
                .as_str()
                .map(|s| is_mac_literal(s) || matched(&MAC_GENERATORS, s).is_some())
                .unwrap_or(false),
            Kind::Port => match v {
                OptionValue::Int(n) => (0..=65535).contains(n),
                OptionValue::Str(s) => {
                    matched(&PORT_GENERATORS, s).is_some()
                        || s.parse::<i128>().map(|n| (0..=65535).contains(&n)).unwrap_or(false)
                }
                _ => false,
            },
            Kind::Num => match v {
                OptionValue::Int(_) | OptionValue::Float(_) => true,
                OptionValue::Str(s) => {
                    s.parse::<i128>().is_ok()
                        || s.parse::<f64>().is_ok()
                        || matched(&NUM_GENERATORS, s).is_some()
                }
                _ => false,
            },
            Kind::Bool => v.as_bool().is_some(),
            Kind::Choice { choices } => v
                .as_str()
                .map(|s| choices.iter().any(|c| c == s))
                .unwrap_or(false),
            Kind::Str => matches!(v, OptionValue::Str(_)),
            Kind::Path(constraints) => v
                .as_str()
                .map(|s| constraints.check(Path::new(s)))
                .unwrap_or(false),
            Kind::Nic => v.as_str().map(nic_exists).unwrap_or(false),
            Kind::Callback => matches!(v, OptionValue::Callback(_)),
        }
    }

    /// Materializes a concrete value from a raw one, drawing generator
    /// values at random. Prefix options resolve to a lazy address sequence.
    pub fn generate_one_value(&self, v: &OptionValue) -> Result<Resolved, OptionError> {
        if !self.is_valid(v) {
            return Err(self.invalid(v));
        }
        if v.is_none() {
            if let Kind::Choice { choices } = &self.kind {
                if !self.meta.optional {
                    return Ok(Resolved::Value(OptionValue::Str(choices[0].clone())));
                }
            }
            return Ok(Resolved::Value(OptionValue::None));
        }
        let mut rng = rand::thread_rng();
        let value = match &self.kind {
            Kind::Ip => match v.as_str().and_then(|s| matched(&IP_GENERATORS, s)) {
                Some(generator) => OptionValue::Str(self.draw_ip(&mut rng, generator)?),
                None => v.clone(),
            },
            Kind::Prefix { ordered } => {
                let net: IpNet = v
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| self.invalid(v))?;
                return Ok(Resolved::Sequence(PrefixCursor::new(net, *ordered)));
            }
            Kind::Mac => match v.as_str().and_then(|s| matched(&MAC_GENERATORS, s)) {
                Some("RandMac") => OptionValue::Str(draw::mac(&mut rng, "*:*:*:*:*:*")?),
                Some("RandMulticastMac") => {
                    OptionValue::Str(draw::mac(&mut rng, "01:00:5e:00-7f:*:*")?)
                }
                Some("MacFF") => OptionValue::Str("ff:ff:ff:ff:ff:ff".to_string()),
                Some("Mac00") => OptionValue::Str("00:00:00:00:00:00".to_string()),
                _ => v.clone(),
            },
            Kind::Port => match v.as_str().and_then(|s| matched(&PORT_GENERATORS, s)) {
                Some("RandPort") => OptionValue::Int(draw::number(&mut rng, 1, 65535) as i128),
                Some("RandPrivilegedPort") => {
                    OptionValue::Int(draw::number(&mut rng, 1, 1024) as i128)
                }
                _ => OptionValue::Int(v.as_int().ok_or_else(|| self.invalid(v))?),
            },
            Kind::Num => match v {
                OptionValue::Int(_) | OptionValue::Float(_) => v.clone(),
                OptionValue::Str(s) => {
                    if let Ok(n) = s.parse::<i128>() {
                        OptionValue::Int(n)
                    } else if let Ok(x) = s.parse::<f64>() {
                        OptionValue::Float(x)
                    } else {
                        self.draw_num(&mut rng, s)?
                    }
                }
                _ => return Err(self.invalid(v)),
            },
            Kind::Bool => OptionValue::Bool(v.as_bool().ok_or_else(|| self.invalid(v))?),
            Kind::Str => match v.as_str().and_then(|s| matched(&STR_GENERATORS, s)) {
                Some(_) => OptionValue::Str(draw::string(&mut rng, 0)),
                None => v.clone(),
            },
            Kind::Choice { .. } | Kind::Path(_) | Kind::Nic | Kind::Callback => v.clone(),
        };
        Ok(Resolved::Value(value))
    }

    fn draw_ip<R: Rng>(&self, rng: &mut R, generator: &str) -> Result<String, OptionError> {
        match generator {
            "RandIP4" => draw::ipv4(rng, "*.*.*.*"),
            "RandIP6" => Ok(draw::ipv6(rng)),
            "RandIP_classA" => draw::ipv4(rng, "0-127.*.*.*"),
            "RandIP_classB" => draw::ipv4(rng, "128-191.*.*.*"),
            "RandIP_classC" => draw::ipv4(rng, "192-223.*.*.*"),
            "RandIP_classD" | "RandIP_classD_Multicast" => draw::ipv4(rng, "224-239.*.*.*"),
            "RandIP_classE" | "RandIP_classE_Reserved" => draw::ipv4(rng, "240-255.*.*.*"),
            other => Err(OptionError::BadPattern(other.to_string())),
        }
    }

    fn draw_num<R: Rng>(&self, rng: &mut R, generator: &str) -> Result<OptionValue, OptionError> {
        let n: i128 = match matched(&NUM_GENERATORS, generator) {
            Some("RandByte") => draw::number(rng, 0, u8::MAX as i64) as i128,
            Some("RandShort") => draw::number(rng, 0, u16::MAX as i64) as i128,
            Some("RandInt") => draw::number(rng, 0, u32::MAX as i64) as i128,
            Some("RandLong") => {
                let bits: u64 = rng.gen();
                bits as i128
            }
            Some("RandSByte") => draw::number(rng, i8::MIN as i64, i8::MAX as i64) as i128,
            Some("RandSShort") => draw::number(rng, i16::MIN as i64, i16::MAX as i64) as i128,
            Some("RandSInt") => draw::number(rng, i32::MIN as i64, i32::MAX as i64) as i128,
            Some("RandSLong") => draw::number(rng, i64::MIN, i64::MAX) as i128,
            _ => return Err(OptionError::BadPattern(generator.to_string())),
        };
        Ok(OptionValue::Int(n))
    }

    /// Completion candidates for this option, filtered by the typed prefix.
    /// Path options list directory entries under `reference` (or the current
    /// directory); NIC options list the host interface table.
    pub fn possible_values(&self, typed: &str, reference: Option<&Path>) -> Vec<String> {
        let filter = |names: &[&str]| {
            names
                .iter()
                .filter(|n| n.starts_with(typed))
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
        };
        match &self.kind {
            Kind::Ip => filter(&IP_GENERATORS),
            Kind::Mac => filter(&MAC_GENERATORS),
            Kind::Num => filter(&NUM_GENERATORS),
            Kind::Port => filter(&PORT_GENERATORS),
            Kind::Str => filter(&STR_GENERATORS),
            Kind::Bool => filter(&BOOL_VALUES),
            Kind::Choice { choices } => choices
                .iter()
                .filter(|c| c.starts_with(typed))
                .cloned()
                .collect(),
            Kind::Path(_) => path_completions(typed, reference),
            Kind::Nic => netdev::get_interfaces()
                .into_iter()
                .map(|i| i.name)
                .filter(|n| n.starts_with(typed))
                .collect(),
            Kind::Prefix { .. } | Kind::Callback => Vec::new(),
        }
    }

    fn invalid(&self, v: &OptionValue) -> OptionError {
        OptionError::InvalidValue {
            name: self.meta.name.clone(),
            value: v.to_string(),
        }
    }
}

fn path_completions(typed: &str, reference: Option<&Path>) -> Vec<String> {
    let base = reference
        .map(Path::to_path_buf)
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let (dir, stem) = match typed.rfind('/') {
        Some(pos) => (base.join(&typed[..pos + 1]), typed[pos + 1..].to_string()),
        None => (base, typed.to_string()),
    };
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !stem.is_empty() && !name.starts_with(&stem) {
                return None;
            }
            if entry.path().is_dir() {
                Some(format!("{name}/"))
            } else {
                Some(name)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ip_accepts_literals_and_generators() {
        let opt = OptionSpec::ip("ip_dst", "RandIP4", "target", false);
        assert!(opt.is_valid(&"192.0.2.1".into()));
        assert!(opt.is_valid(&"2001:db8::1".into()));
        assert!(opt.is_valid(&"RandIP_classD_Multicast".into()));
        assert!(!opt.is_valid(&"300.1.2.3".into()));
        assert!(!opt.is_valid(&OptionValue::None));
    }

    #[test]
    fn ip_generator_draws_in_class() {
        let opt = OptionSpec::ip("ip", "RandIP_classC", "c-class", false);
        for _ in 0..32 {
            let Resolved::Value(v) = opt.generate_one_value(&"RandIP_classC".into()).unwrap()
            else {
                panic!("ip generation must be a single value");
            };
            let first: u8 = v
                .as_str()
                .unwrap()
                .split('.')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            assert!((192..=223).contains(&first));
        }
    }

    #[test]
    fn mac_forms() {
        let opt = OptionSpec::mac("mac_src", "RandMac", "source mac", false);
        assert!(opt.is_valid(&"00:11:22:33:44:55".into()));
        assert!(opt.is_valid(&"00:11:*:33:*:55".into()));
        assert!(opt.is_valid(&"001122334455".into()));
        assert!(opt.is_valid(&"Mac00".into()));
        assert!(!opt.is_valid(&"00:11:22:33:44".into()));
        assert!(!opt.is_valid(&"00-11-22-33-44-55".into()));
    }

    #[test]
    fn mac_named_generators_resolve() {
        let opt = OptionSpec::mac("mac", "RandMac", "", false);
        let Resolved::Value(v) = opt.generate_one_value(&"MacFF".into()).unwrap() else {
            panic!("mac generation must be a single value");
        };
        assert_eq!(v.as_str(), Some("ff:ff:ff:ff:ff:ff"));
    }

    #[test]
    fn port_bounds() {
        let opt = OptionSpec::port("port_dst", "RandPort", "target port", false);
        assert!(opt.is_valid(&OptionValue::Int(0)));
        assert!(opt.is_valid(&OptionValue::Int(65535)));
        assert!(opt.is_valid(&OptionValue::Str("53".into())));
        assert!(!opt.is_valid(&OptionValue::Int(65536)));
        assert!(!opt.is_valid(&OptionValue::Int(-1)));
        for _ in 0..16 {
            let Resolved::Value(v) =
                opt.generate_one_value(&"RandPrivilegedPort".into()).unwrap()
            else {
                panic!("port generation must be a single value");
            };
            assert!((1..=1024).contains(&v.as_int().unwrap()));
        }
    }

    #[test]
    fn num_parsing_and_generators() {
        let opt = OptionSpec::num("count", "RandByte", "how many", false);
        let Resolved::Value(v) = opt.generate_one_value(&"12".into()).unwrap() else {
            panic!()
        };
        assert_eq!(v, OptionValue::Int(12));
        let Resolved::Value(v) = opt.generate_one_value(&"0.5".into()).unwrap() else {
            panic!()
        };
        assert_eq!(v, OptionValue::Float(0.5));
        let Resolved::Value(v) = opt.generate_one_value(&"RandSByte".into()).unwrap() else {
            panic!()
        };
        assert!((-128..=127).contains(&v.as_int().unwrap()));
    }

    #[test]
    fn bool_normalization() {
        let opt = OptionSpec::boolean("quiet", true, "silence", false);
        let Resolved::Value(v) = opt.generate_one_value(&"False".into()).unwrap() else {
            panic!()
        };
        assert_eq!(v, OptionValue::Bool(false));
        assert!(!opt.is_valid(&"maybe".into()));
    }

    #[test]
    fn choice_first_entry_default() {
        let opt = OptionSpec::choice("protocol", &["tcp", "udp"], None, "l4", false);
        assert_eq!(opt.default_value().as_str(), Some("tcp"));
        let optional = OptionSpec::choice("protocol", &["tcp", "udp"], None, "l4", true);
        assert!(optional.default_value().is_none());
        assert_eq!(
            optional.generate_one_value(&OptionValue::None).map(|r| match r {
                Resolved::Value(v) => v,
                Resolved::Sequence(_) => unreachable!(),
            }),
            Ok(OptionValue::None)
        );
    }

    #[test]
    fn prefix_resolves_to_sequence() {
        let opt = OptionSpec::prefix("targets", "10.0.0.0/30", "scan range", false, true);
        let Resolved::Sequence(cursor) = opt.generate_one_value(&"10.0.0.0/30".into()).unwrap()
        else {
            panic!("prefix must resolve to a sequence");
        };
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn path_constraints() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let existing = OptionSpec::path(
            "path_src",
            PathConstraints {
                must_exist: Some(true),
                readable: Some(true),
                ..Default::default()
            },
            Some("/bin/true"),
            "input file",
            false,
        );
        assert!(existing.is_valid(&file.display().to_string().as_str().into()));
        assert!(!existing.is_valid(&dir.path().join("absent").display().to_string().as_str().into()));

        let fresh = OptionSpec::path(
            "path_dst",
            PathConstraints {
                must_exist: Some(false),
                ..Default::default()
            },
            Some("/nonexistent/weaver-out.pcap"),
            "output file",
            true,
        );
        assert!(fresh.is_valid(&dir.path().join("new.pcap").display().to_string().as_str().into()));
        assert!(!fresh.is_valid(&file.display().to_string().as_str().into()));
    }

    #[test]
    fn path_completion_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("captures")).unwrap();
        std::fs::File::create(dir.path().join("cap.pcap")).unwrap();
        std::fs::File::create(dir.path().join("notes.txt")).unwrap();

        let opt = OptionSpec::path("path_dst", PathConstraints::default(), None, "", false);
        let mut all = opt.possible_values("cap", Some(dir.path()));
        all.sort();
        assert_eq!(all, vec!["cap.pcap".to_string(), "captures/".to_string()]);
    }

    #[test]
    fn generator_call_names() {
        let opt = OptionSpec::ip("ip", "RandIP4", "", false);
        assert!(opt.is_generator("RandIP4"));
        assert!(!opt.is_generator("RandMac"));
        let opt = OptionSpec::boolean("flag", false, "", false);
        assert!(opt.is_generator("True"));
    }

    #[test]
    fn completion_filters_by_prefix() {
        let opt = OptionSpec::ip("ip", "RandIP4", "", false);
        let candidates = opt.possible_values("RandIP_classD", None);
        assert_eq!(
            candidates,
            vec![
                "RandIP_classD".to_string(),
                "RandIP_classD_Multicast".to_string()
            ]
        );
    }
}
