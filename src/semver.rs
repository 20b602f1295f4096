//! Semantic version engine.
//!
//! Parses SemVer 2.0.0 versions and the range grammar used by manifests:
//! comparators (`=`, `<`, `<=`, `>`, `>=`), caret and tilde shorthands,
//! wildcards (`1.x`, `1.2.*`, `*`), space-separated AND within a set, and
//! `||`-separated OR across sets. Comparator operands may omit minor and
//! patch components (`>=5.4` reads as `>=5.4.0`).

use std::cmp::Ordering;
use std::fmt;

/// A prerelease identifier: numeric identifiers sort below alphanumeric
/// ones and compare by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alpha(_)) => Ordering::Less,
            (Identifier::Alpha(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alpha(a), Identifier::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed semantic version. Build metadata is kept for display but
/// ignored by ordering, per SemVer 2.0.0.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<Identifier>,
    pub build: Vec<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    fn core_cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.core_cmp(other) {
            Ordering::Equal => {}
            ord => return ord,
        }
        // A prerelease is lower than its core release.
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.pre.iter().zip(other.pre.iter()) {
                    match a.cmp(b) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                self.pre.len().cmp(&other.pre.len())
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            let parts: Vec<String> = self
                .pre
                .iter()
                .map(|id| match id {
                    Identifier::Numeric(n) => n.to_string(),
                    Identifier::Alpha(s) => s.clone(),
                })
                .collect();
            write!(f, "-{}", parts.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

fn parse_numeric(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Leading zeros are invalid in numeric identifiers.
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

fn parse_pre_identifier(s: &str) -> Option<Identifier> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_numeric(s).map(Identifier::Numeric);
    }
    Some(Identifier::Alpha(s.to_string()))
}

/// Parse a strict `MAJOR.MINOR.PATCH[-prerelease][+build]` version.
pub fn parse_version(input: &str) -> Option<Version> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let (rest, build) = match s.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (s, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let mut parts = core.split('.');
    let major = parse_numeric(parts.next()?)?;
    let minor = parse_numeric(parts.next()?)?;
    let patch = parse_numeric(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }

    let mut version = Version::new(major, minor, patch);
    if let Some(pre) = pre {
        for part in pre.split('.') {
            version.pre.push(parse_pre_identifier(part)?);
        }
    }
    if let Some(build) = build {
        for part in build.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
                return None;
            }
            version.build.push(part.to_string());
        }
    }
    Some(version)
}

/// Parse a comparator operand, filling omitted minor/patch with zero.
fn parse_operand(s: &str) -> Option<Version> {
    if let Some(version) = parse_version(s) {
        return Some(version);
    }
    let mut parts = s.split('.');
    let major = parse_numeric(parts.next()?)?;
    let minor = match parts.next() {
        Some(p) => parse_numeric(p)?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, 0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One constraint inside a comparator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn matches(&self, version: &Version) -> bool {
        let ord = version.cmp(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        }
    }
}

/// A version range: an OR over comparator sets, each set an AND over
/// comparators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub raw: String,
    pub sets: Vec<Vec<Comparator>>,
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn caret_upper(v: &Version) -> Version {
    if v.major > 0 {
        Version::new(v.major + 1, 0, 0)
    } else if v.minor > 0 {
        Version::new(0, v.minor + 1, 0)
    } else {
        Version::new(0, 0, v.patch + 1)
    }
}

/// Split a wildcard token into its leading numeric segments, if it is one.
/// Returns `Some(segments)` for `*`, `1.x`, `1.2.*`, and the like.
fn wildcard_segments(token: &str) -> Option<Vec<u64>> {
    let mut segments = Vec::new();
    for part in token.split('.') {
        match part {
            "*" | "x" | "X" => return Some(segments),
            _ => segments.push(parse_numeric(part)?),
        }
    }
    None
}

fn wildcard_comparators(segments: &[u64]) -> Option<Vec<Comparator>> {
    match segments {
        [] => Some(vec![Comparator {
            op: Op::Ge,
            version: Version::new(0, 0, 0),
        }]),
        [major] => Some(vec![
            Comparator {
                op: Op::Ge,
                version: Version::new(*major, 0, 0),
            },
            Comparator {
                op: Op::Lt,
                version: Version::new(major + 1, 0, 0),
            },
        ]),
        [major, minor] => Some(vec![
            Comparator {
                op: Op::Ge,
                version: Version::new(*major, *minor, 0),
            },
            Comparator {
                op: Op::Lt,
                version: Version::new(*major, minor + 1, 0),
            },
        ]),
        _ => None,
    }
}

/// Parse a single range token into comparators.
fn parse_token(token: &str) -> Option<Vec<Comparator>> {
    if let Some(rest) = token.strip_prefix(">=") {
        return Some(vec![Comparator {
            op: Op::Ge,
            version: parse_operand(rest)?,
        }]);
    }
    if let Some(rest) = token.strip_prefix("<=") {
        return Some(vec![Comparator {
            op: Op::Le,
            version: parse_operand(rest)?,
        }]);
    }
    if let Some(rest) = token.strip_prefix('>') {
        return Some(vec![Comparator {
            op: Op::Gt,
            version: parse_operand(rest)?,
        }]);
    }
    if let Some(rest) = token.strip_prefix('<') {
        return Some(vec![Comparator {
            op: Op::Lt,
            version: parse_operand(rest)?,
        }]);
    }
    if let Some(rest) = token.strip_prefix('=') {
        return Some(vec![Comparator {
            op: Op::Eq,
            version: parse_operand(rest)?,
        }]);
    }
    if let Some(rest) = token.strip_prefix('^') {
        let lower = parse_operand(rest)?;
        let upper = caret_upper(&lower);
        return Some(vec![
            Comparator {
                op: Op::Ge,
                version: lower,
            },
            Comparator {
                op: Op::Lt,
                version: upper,
            },
        ]);
    }
    if let Some(rest) = token.strip_prefix('~') {
        let lower = parse_operand(rest)?;
        let upper = Version::new(lower.major, lower.minor + 1, 0);
        return Some(vec![
            Comparator {
                op: Op::Ge,
                version: lower,
            },
            Comparator {
                op: Op::Lt,
                version: upper,
            },
        ]);
    }
    if let Some(segments) = wildcard_segments(token) {
        return wildcard_comparators(&segments);
    }
    // Exact full version.
    if let Some(version) = parse_version(token) {
        return Some(vec![Comparator {
            op: Op::Eq,
            version,
        }]);
    }
    // Bare partial ("1" or "1.2") is the corresponding wildcard.
    let mut segments = Vec::new();
    for part in token.split('.') {
        segments.push(parse_numeric(part)?);
    }
    if segments.len() > 2 {
        return None;
    }
    wildcard_comparators(&segments)
}

/// Parse a range expression. Returns `None` on any malformed token.
pub fn parse_range(input: &str) -> Option<Range> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }

    let mut sets = Vec::new();
    for set_str in raw.split("||") {
        let set_str = set_str.trim();
        if set_str.is_empty() {
            return None;
        }
        let mut comparators = Vec::new();
        for token in set_str.split_whitespace() {
            comparators.extend(parse_token(token)?);
        }
        sets.push(comparators);
    }

    Some(Range {
        raw: raw.to_string(),
        sets,
    })
}

/// A version satisfies a range when every comparator of at least one set
/// holds.
pub fn satisfies(version: &Version, range: &Range) -> bool {
    range
        .sets
        .iter()
        .any(|set| set.iter().all(|c| c.matches(version)))
}

impl Range {
    /// Lowest bound across sets: per set the highest lower-bound operand,
    /// with `0.0.0` when a set has no lower bound; the minimum of those.
    pub fn min_version(&self) -> Option<Version> {
        let mut result: Option<Version> = None;
        for set in &self.sets {
            let mut lower = Version::new(0, 0, 0);
            for comparator in set {
                if matches!(comparator.op, Op::Ge | Op::Gt | Op::Eq)
                    && comparator.version > lower
                {
                    lower = comparator.version.clone();
                }
            }
            if result.as_ref().map(|r| lower < *r).unwrap_or(true) {
                result = Some(lower);
            }
        }
        result
    }

    /// `"MAJOR.MINOR"` of `min_version`, used by mapped binding mode.
    pub fn selection_key(&self) -> String {
        match self.min_version() {
            Some(v) => format!("{}.{}", v.major, v.minor),
            None => String::new(),
        }
    }
}

/// Highest version satisfying the range; prerelease-aware via ordering.
pub fn select_best<'a>(versions: &'a [Version], range: &Range) -> Option<&'a Version> {
    versions
        .iter()
        .filter(|v| satisfies(v, range))
        .max_by(|a, b| a.cmp(b))
}
