use std::net::{Ipv4Addr, Ipv6Addr};

/// IPv4 network in CIDR notation, e.g. `13.107.0.0/16`.
/// The prefix length is always within 0..=32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

/// IPv6 network in CIDR notation, e.g. `2603:1030::/23`.
/// The prefix length is always within 0..=128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Cidr {
    network: Ipv6Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Returns `None` for a prefix length above 32.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Option<Self> {
        (prefix_len <= 32).then_some(Self { network, prefix_len })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Network mask for the prefix length. A zero-length prefix yields an
    /// all-zero mask, so it contains every address.
    pub fn mask(&self) -> u32 {
        u32::MAX
            .checked_shl(32 - u32::from(self.prefix_len))
            .unwrap_or(0)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = self.mask();
        u32::from(addr) & mask == u32::from(self.network) & mask
    }
}

impl Ipv6Cidr {
    /// Returns `None` for a prefix length above 128.
    pub fn new(network: Ipv6Addr, prefix_len: u8) -> Option<Self> {
        (prefix_len <= 128).then_some(Self { network, prefix_len })
    }

    pub fn network(&self) -> Ipv6Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn mask(&self) -> u128 {
        u128::MAX
            .checked_shl(128 - u32::from(self.prefix_len))
            .unwrap_or(0)
    }

    /// The address is folded into a single `u128` (segment by segment,
    /// most significant first) before masking.
    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        let mask = self.mask();
        fold_segments(addr.segments()) & mask == fold_segments(self.network.segments()) & mask
    }
}

fn fold_segments(segments: [u16; 8]) -> u128 {
    segments
        .iter()
        .fold(0u128, |acc, &segment| (acc << 16) | u128::from(segment))
}

/// Shape of an address-like search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Ipv4,
    Ipv4Cidr,
    Ipv6,
    Ipv6Cidr,
}

/// A parsed address literal or CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressLiteral {
    V4(Ipv4Addr),
    V4Cidr(Ipv4Cidr),
    V6(Ipv6Addr),
    V6Cidr(Ipv6Cidr),
}

impl AddressLiteral {
    /// Lenient parse of any supported form. IPv6 forms need at least one `:`
    /// so that bare hex words are never mistaken for addresses.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.contains('/') {
            if let Some(cidr) = parse_ipv4_cidr(s) {
                return Some(AddressLiteral::V4Cidr(cidr));
            }
            if s.contains(':') {
                return parse_ipv6_cidr(s).map(AddressLiteral::V6Cidr);
            }
            return None;
        }

        if let Some(addr) = parse_ipv4(s) {
            return Some(AddressLiteral::V4(addr));
        }
        if s.contains(':') {
            return parse_ipv6(s).map(AddressLiteral::V6);
        }
        None
    }

    pub fn kind(&self) -> AddressKind {
        match self {
            AddressLiteral::V4(_) => AddressKind::Ipv4,
            AddressLiteral::V4Cidr(_) => AddressKind::Ipv4Cidr,
            AddressLiteral::V6(_) => AddressKind::Ipv6,
            AddressLiteral::V6Cidr(_) => AddressKind::Ipv6Cidr,
        }
    }

    pub fn is_cidr(&self) -> bool {
        matches!(self, AddressLiteral::V4Cidr(_) | AddressLiteral::V6Cidr(_))
    }
}

/// How a dataset prefix matched an address query.
/// Variants are ordered by precedence: the smallest is the strongest match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrefixMatch {
    /// Query CIDR is textually identical to the prefix (case-insensitive)
    ExactCidr,
    /// Query address falls inside the prefix network
    Containment,
    /// Query address equals a bare-address prefix
    ExactAddress,
}

/// Matches one dataset prefix against a parsed query.
pub fn match_prefix(query: &AddressLiteral, query_raw: &str, prefix_raw: &str) -> Option<PrefixMatch> {
    let prefix_raw = prefix_raw.trim();

    if query.is_cidr() {
        return prefix_raw
            .eq_ignore_ascii_case(query_raw.trim())
            .then_some(PrefixMatch::ExactCidr);
    }

    match (query, AddressLiteral::parse(prefix_raw)?) {
        (AddressLiteral::V4(addr), AddressLiteral::V4Cidr(cidr)) => {
            cidr.contains(*addr).then_some(PrefixMatch::Containment)
        }
        (AddressLiteral::V6(addr), AddressLiteral::V6Cidr(cidr)) => {
            cidr.contains(*addr).then_some(PrefixMatch::Containment)
        }
        (AddressLiteral::V4(addr), AddressLiteral::V4(prefix)) => {
            (*addr == prefix).then_some(PrefixMatch::ExactAddress)
        }
        (AddressLiteral::V6(addr), AddressLiteral::V6(prefix)) => {
            (*addr == prefix).then_some(PrefixMatch::ExactAddress)
        }
        _ => None,
    }
}

/// Decides whether a search term is an address literal at all.
///
/// Anything the lenient parsers accept counts, including short IPv6 forms
/// such as `2603:1030` that are zero-filled at the end.
pub fn classify(term: &str) -> Option<AddressKind> {
    AddressLiteral::parse(term).map(|literal| literal.kind())
}

/// Whether an address-like term is written out in full.
///
/// IPv4 forms always are, since the parser needs all four octets. IPv6
/// forms are complete only with a `::` marker or all eight segments.
pub fn is_complete(term: &str) -> bool {
    let term = term.trim();
    let address = term.split_once('/').map_or(term, |(network, _)| network);
    !address.contains(':') || address.contains("::") || address.split(':').count() == 8
}

/// Exactly four dot-separated decimal groups, each 0-255. Leading zeros are accepted.
pub fn parse_ipv4(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut groups = s.split('.');

    for octet in octets.iter_mut() {
        *octet = parse_decimal(groups.next()?)?;
    }

    if groups.next().is_some() {
        return None;
    }

    Some(Ipv4Addr::from(octets))
}

pub fn parse_ipv4_cidr(s: &str) -> Option<Ipv4Cidr> {
    let (network, prefix) = s.split_once('/')?;
    Ipv4Cidr::new(parse_ipv4(network)?, parse_decimal(prefix)?)
}

/// Parses up to eight colon-separated hextets with at most one `::`.
///
/// The compressed run is expanded with zero segments. Input without `::`
/// and fewer than eight segments is zero-filled at the end.
pub fn parse_ipv6(s: &str) -> Option<Ipv6Addr> {
    let (head, tail) = match s.split_once("::") {
        Some((head, tail)) => {
            if tail.contains("::") {
                return None;
            }
            (parse_hextets(head)?, parse_hextets(tail)?)
        }
        None => {
            if s.is_empty() {
                return None;
            }
            (parse_hextets(s)?, Vec::new())
        }
    };

    if head.len() + tail.len() > 8 {
        return None;
    }

    let mut segments = [0u16; 8];
    segments[..head.len()].copy_from_slice(&head);
    segments[8 - tail.len()..].copy_from_slice(&tail);

    Some(Ipv6Addr::from(segments))
}

pub fn parse_ipv6_cidr(s: &str) -> Option<Ipv6Cidr> {
    let (network, prefix) = s.split_once('/')?;
    Ipv6Cidr::new(parse_ipv6(network)?, parse_decimal(prefix)?)
}

pub fn contains_ipv4(addr: Ipv4Addr, cidr: &Ipv4Cidr) -> bool {
    cidr.contains(addr)
}

pub fn contains_ipv6(addr: Ipv6Addr, cidr: &Ipv6Cidr) -> bool {
    cidr.contains(addr)
}

fn parse_decimal(group: &str) -> Option<u8> {
    if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    group.parse().ok()
}

fn parse_hextets(group: &str) -> Option<Vec<u16>> {
    if group.is_empty() {
        return Some(Vec::new());
    }
    group.split(':').map(parse_hextet).collect()
}

fn parse_hextet(segment: &str) -> Option<u16> {
    if segment.is_empty() || segment.len() > 4 || !segment.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(segment, 16).ok()
}
